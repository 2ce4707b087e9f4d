//! Worklist-based frame analyzer.
//!
//! This module provides the iterative solver that computes one [`Frame`] per instruction
//! position by abstract interpretation. It is the instruction-level counterpart of a
//! block-level data flow solver: the transfer function is a single instruction, and the
//! lattice join is delegated to [`Interpreter::merge`] slot by slot.
//!
//! # Algorithm
//!
//! 1. Build the entry frame from the parameter types and queue position 0
//! 2. While the worklist is non-empty:
//!    a. Remove a position from the worklist
//!    b. Execute its instruction on a copy of the position's frame
//!    c. Merge the resulting frame into every successor
//!    d. Queue each successor whose frame was created or changed
//! 3. Positions never queued keep no frame (unreachable code)
//!
//! Exception edges are taken from every instruction inside a protected region. The
//! handler receives the locals both before and after the instruction, with a stack
//! holding only the caught exception.
//!
//! # Complexity
//!
//! Each position is re-processed only when its input frame changes, so the total work is
//! bounded by the number of positions times the lattice height of a frame.

use std::collections::{HashMap, VecDeque};

use crate::{
    analysis::frames::{
        edge::{Edge, EdgeKind},
        frame::{Frame, Frames},
        interpreter::Interpreter,
    },
    assembly::{Instruction, LabelId, MethodBody, Opcode},
    Error, Result,
};

/// A resolved try/catch region, positions instead of labels.
struct Handler {
    start: usize,
    end: usize,
    handler: usize,
    catch_type: Option<String>,
}

/// Computes frames for a method body with a given [`Interpreter`].
///
/// # Usage
///
/// ```rust
/// use boxelide::analysis::frames::{BasicInterpreter, BasicValue, FrameAnalyzer};
/// use boxelide::assembly::{MethodBuilder, PrimitiveType, StackType};
///
/// let body = MethodBuilder::new("twice")
///     .param(PrimitiveType::Long)
///     .returns(PrimitiveType::Long)
///     .load(0)
///     .load(0)
///     .add()
///     .ret()
///     .build()?;
///
/// let mut analyzer = FrameAnalyzer::new(BasicInterpreter);
/// let frames = analyzer.analyze(&body)?;
/// let before_add = frames.get(2).unwrap();
/// assert_eq!(before_add.stack(), &[BasicValue::Typed(StackType::Long); 2]);
/// # Ok::<(), boxelide::Error>(())
/// ```
pub struct FrameAnalyzer<I: Interpreter> {
    /// The value domain.
    interpreter: I,
    /// Frame before each position.
    frames: Vec<Option<Frame<I::Value>>>,
    /// Worklist of positions to process.
    worklist: VecDeque<usize>,
    /// Whether each position is currently in the worklist (for deduplication).
    in_worklist: Vec<bool>,
    /// Number of iterations performed.
    iterations: usize,
}

impl<I: Interpreter> FrameAnalyzer<I> {
    /// Creates a new analyzer around the given interpreter.
    #[must_use]
    pub fn new(interpreter: I) -> Self {
        Self {
            interpreter,
            frames: Vec::new(),
            worklist: VecDeque::new(),
            in_worklist: Vec::new(),
            iterations: 0,
        }
    }

    /// The interpreter, including any state it accumulated during analysis.
    #[must_use]
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Consumes the analyzer, returning the interpreter.
    #[must_use]
    pub fn into_interpreter(self) -> I {
        self.interpreter
    }

    /// Runs the analysis to a fixpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Analysis`] on stack underflow, a local slot out of range, stack
    /// heights that disagree at a join, a branch or region naming a label that is not
    /// placed, or control falling off the end of the body.
    pub fn analyze(&mut self, body: &MethodBody) -> Result<Frames<I::Value>> {
        let count = body.len();
        self.frames = vec![None; count];
        self.in_worklist = vec![false; count];
        self.worklist.clear();
        self.iterations = 0;

        if count == 0 {
            return Ok(Frames::new(Vec::new(), 0));
        }

        let labels = body.label_positions()?;
        let handlers = Self::resolve_handlers(body, &labels)?;

        let params = body.params();
        let locals = (0..body.max_locals())
            .map(|slot| self.interpreter.new_value(params.get(slot)))
            .collect();
        self.frames[0] = Some(Frame::new(locals));
        self.enqueue(0);

        while let Some(position) = self.worklist.pop_front() {
            self.in_worklist[position] = false;
            self.iterations += 1;
            self.process(body, &labels, &handlers, position)?;
        }

        tracing::trace!(
            method = body.name(),
            iterations = self.iterations,
            "frame analysis converged"
        );
        Ok(Frames::new(
            std::mem::take(&mut self.frames),
            self.iterations,
        ))
    }

    /// Executes one position and propagates its output frame.
    fn process(
        &mut self,
        body: &MethodBody,
        labels: &HashMap<LabelId, usize>,
        handlers: &[Handler],
        position: usize,
    ) -> Result<()> {
        let Some(insn) = body.instruction_at(position) else {
            return Err(Error::analysis(body.name(), position, "position out of range"));
        };
        let Some(before) = self.frames[position].clone() else {
            return Err(Error::analysis(body.name(), position, "queued without a frame"));
        };

        let mut after = before.clone();
        self.execute(body, insn, &mut after)
            .map_err(|message| Error::analysis(body.name(), position, message))?;

        for edge in Self::successors(body, labels, handlers, position, insn)? {
            match edge.kind() {
                EdgeKind::Exception { catch_type } => {
                    let exception = self.interpreter.new_exception_value(catch_type.as_deref());
                    for source in [&before, &after] {
                        let mut entry = source.clone();
                        entry.clear_stack();
                        entry.push(exception.clone());
                        self.merge_into(body, edge.target(), &entry)?;
                    }
                }
                EdgeKind::Fallthrough | EdgeKind::Branch => {
                    self.merge_into(body, edge.target(), &after)?;
                }
            }
        }
        Ok(())
    }

    /// Applies the instruction at hand to `frame`.
    fn execute(
        &mut self,
        body: &MethodBody,
        insn: &Instruction,
        frame: &mut Frame<I::Value>,
    ) -> std::result::Result<(), String> {
        let needed = insn.op.stack_behavior().pops;
        if frame.stack_size() < needed {
            return Err(format!(
                "stack underflow: '{}' needs {needed} values, found {}",
                insn.op.mnemonic(),
                frame.stack_size()
            ));
        }
        let pop = |frame: &mut Frame<I::Value>| {
            frame
                .pop()
                .ok_or_else(|| format!("stack underflow at '{}'", insn.op.mnemonic()))
        };

        match &insn.op {
            Opcode::Label(_) | Opcode::Nop | Opcode::Goto(_) | Opcode::ReturnVoid => {}
            Opcode::Const(_) | Opcode::ConstNull | Opcode::New(_) | Opcode::GetStatic(_) => {
                let value = self.interpreter.new_operation(insn);
                frame.push(value);
            }
            Opcode::Load(slot) => {
                let value = frame
                    .local(usize::from(*slot))
                    .cloned()
                    .ok_or_else(|| format!("local slot {slot} out of range"))?;
                let value = self.interpreter.copy_operation(insn, value);
                frame.push(value);
            }
            Opcode::Store(slot) => {
                let value = pop(frame)?;
                let value = self.interpreter.copy_operation(insn, value);
                if !frame.set_local(usize::from(*slot), value) {
                    return Err(format!("local slot {slot} out of range"));
                }
            }
            Opcode::Dup => {
                let value = pop(frame)?;
                frame.push(value.clone());
                let copy = self.interpreter.copy_operation(insn, value);
                frame.push(copy);
            }
            Opcode::Pop => {
                pop(frame)?;
            }
            Opcode::Swap => {
                let top = pop(frame)?;
                let below = pop(frame)?;
                let top = self.interpreter.copy_operation(insn, top);
                frame.push(top);
                let below = self.interpreter.copy_operation(insn, below);
                frame.push(below);
            }
            Opcode::Neg
            | Opcode::Convert(_)
            | Opcode::GetField(_)
            | Opcode::CheckCast(_)
            | Opcode::InstanceOf(_)
            | Opcode::IfTrue(_)
            | Opcode::IfFalse(_)
            | Opcode::IfNull(_)
            | Opcode::IfNonNull(_)
            | Opcode::PutStatic(_)
            | Opcode::Throw => {
                let value = pop(frame)?;
                if let Some(result) = self.interpreter.unary_operation(insn, value) {
                    frame.push(result);
                }
            }
            Opcode::Arith(_) | Opcode::PutField(_) | Opcode::IfCmp(..) => {
                let second = pop(frame)?;
                let first = pop(frame)?;
                if let Some(result) = self.interpreter.binary_operation(insn, first, second) {
                    frame.push(result);
                }
            }
            Opcode::InvokeStatic(_) | Opcode::InvokeVirtual(_) => {
                let mut values = Vec::with_capacity(needed);
                for _ in 0..needed {
                    values.push(pop(frame)?);
                }
                values.reverse();
                if let Some(result) = self.interpreter.nary_operation(insn, values) {
                    frame.push(result);
                }
            }
            Opcode::Return => {
                let value = pop(frame)?;
                self.interpreter
                    .return_operation(insn, value, body.return_type());
            }
        }
        Ok(())
    }

    /// Collects the control flow successors of one position.
    fn successors(
        body: &MethodBody,
        labels: &HashMap<LabelId, usize>,
        handlers: &[Handler],
        position: usize,
        insn: &Instruction,
    ) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        if let Some(label) = insn.op.branch_target() {
            let target = labels.get(&label).copied().ok_or_else(|| {
                Error::analysis(
                    body.name(),
                    position,
                    format!("branch to unplaced label {label}"),
                )
            })?;
            edges.push(Edge::new(target, EdgeKind::Branch));
        }
        if insn.op.falls_through() {
            if position + 1 >= body.len() {
                return Err(Error::analysis(
                    body.name(),
                    position,
                    "execution falls off the end of the method",
                ));
            }
            edges.push(Edge::new(position + 1, EdgeKind::Fallthrough));
        }
        for handler in handlers {
            if (handler.start..handler.end).contains(&position) {
                edges.push(Edge::new(
                    handler.handler,
                    EdgeKind::Exception {
                        catch_type: handler.catch_type.clone(),
                    },
                ));
            }
        }
        Ok(edges)
    }

    /// Joins `incoming` into the frame at `target`, queueing it if it changed.
    fn merge_into(
        &mut self,
        body: &MethodBody,
        target: usize,
        incoming: &Frame<I::Value>,
    ) -> Result<()> {
        let changed = match &mut self.frames[target] {
            None => {
                self.frames[target] = Some(incoming.clone());
                true
            }
            Some(existing) => existing
                .merge(incoming, &mut self.interpreter)
                .map_err(|(expected, found)| {
                    Error::analysis(
                        body.name(),
                        target,
                        format!("inconsistent stack heights at join: {expected} vs {found}"),
                    )
                })?,
        };
        if changed {
            self.enqueue(target);
        }
        Ok(())
    }

    fn enqueue(&mut self, position: usize) {
        if !self.in_worklist[position] {
            self.worklist.push_back(position);
            self.in_worklist[position] = true;
        }
    }

    fn resolve_handlers(
        body: &MethodBody,
        labels: &HashMap<LabelId, usize>,
    ) -> Result<Vec<Handler>> {
        let resolve = |label: LabelId| {
            labels.get(&label).copied().ok_or_else(|| {
                Error::analysis(
                    body.name(),
                    0,
                    format!("try/catch region names unplaced label {label}"),
                )
            })
        };
        body.try_catch_blocks()
            .iter()
            .map(|block| {
                Ok(Handler {
                    start: resolve(block.start)?,
                    end: resolve(block.end)?,
                    handler: resolve(block.handler)?,
                    catch_type: block.catch_type.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::frames::basic::{BasicInterpreter, BasicValue},
        assembly::{MethodBuilder, PrimitiveType, StackType},
    };

    const INT: BasicValue = BasicValue::Typed(StackType::Int);
    const REF: BasicValue = BasicValue::Typed(StackType::Reference);

    #[test]
    fn test_loop_converges() {
        // for (i = 0; i < n; i++) {}
        let body = MethodBuilder::new("count")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .const_int(0)
            .store(1)
            .label("head")
            .load(1)
            .load(0)
            .if_cmp_ge("exit")
            .load(1)
            .const_int(1)
            .add()
            .store(1)
            .goto("head")
            .label("exit")
            .load(1)
            .ret()
            .build()
            .unwrap();

        let frames = FrameAnalyzer::new(BasicInterpreter).analyze(&body).unwrap();
        let head = frames.get(2).unwrap();
        assert_eq!(head.locals(), &[INT, INT]);
        assert_eq!(frames.iter().count(), body.len());
    }

    #[test]
    fn test_unreachable_code_has_no_frame() {
        let body = MethodBuilder::new("dead")
            .ret_void()
            .nop()
            .ret_void()
            .build()
            .unwrap();
        let frames = FrameAnalyzer::new(BasicInterpreter).analyze(&body).unwrap();
        assert!(frames.is_reachable(0));
        assert!(!frames.is_reachable(1));
    }

    #[test]
    fn test_merge_of_different_types_is_uninitialized() {
        let body = MethodBuilder::new("mixed")
            .param(PrimitiveType::Bool)
            .load(0)
            .if_true("other")
            .const_int(1)
            .store(1)
            .goto("join")
            .label("other")
            .const_null()
            .store(1)
            .label("join")
            .ret_void()
            .build()
            .unwrap();
        let frames = FrameAnalyzer::new(BasicInterpreter).analyze(&body).unwrap();
        let join = frames.get(body.len() - 1).unwrap();
        assert_eq!(join.local(1), Some(&BasicValue::Uninitialized));
    }

    #[test]
    fn test_analysis_errors_name_position() {
        let underflow = MethodBuilder::new("underflow").pop().ret_void().build().unwrap();
        match FrameAnalyzer::new(BasicInterpreter).analyze(&underflow) {
            Err(Error::Analysis { method, index, .. }) => {
                assert_eq!(method, "underflow");
                assert_eq!(index, 0);
            }
            other => panic!("expected analysis error, got {other:?}"),
        }

        let falls_off = MethodBuilder::new("falls_off").nop().build().unwrap();
        assert!(matches!(
            FrameAnalyzer::new(BasicInterpreter).analyze(&falls_off),
            Err(Error::Analysis { .. })
        ));

        let heights = MethodBuilder::new("heights")
            .param(PrimitiveType::Bool)
            .load(0)
            .if_true("join")
            .const_int(1)
            .label("join")
            .ret_void()
            .build()
            .unwrap();
        assert!(matches!(
            FrameAnalyzer::new(BasicInterpreter).analyze(&heights),
            Err(Error::Analysis { .. })
        ));
    }

    #[test]
    fn test_exception_edge_reaches_handler() {
        let body = MethodBuilder::new("guarded")
            .label("try")
            .const_int(1)
            .store(0)
            .label("end")
            .ret_void()
            .label("handler")
            .store(1)
            .ret_void()
            .try_catch("try", "end", "handler", None)
            .build()
            .unwrap();

        let frames = FrameAnalyzer::new(BasicInterpreter).analyze(&body).unwrap();
        let handler = frames.get(5).unwrap();
        assert_eq!(handler.stack(), &[REF]);
        // Slot 0 is only initialized on some paths into the handler.
        assert_eq!(handler.local(0), Some(&BasicValue::Uninitialized));
    }
}
