//! Redundant boxing elimination.
//!
//! Removes wrapper objects that are created only to be unboxed again. A box site is
//! eliminated when the boxing analysis proves that every use of its value is an
//! exactly-typed unboxing, a cast that cannot fail or a null test, and that the value
//! never meets a different value at a join point.
//!
//! # Example
//!
//! Before:
//! ```text
//! load 0
//! invoke_static core.Int.box(int) -> core.Int
//! store 1
//! load 1
//! invoke_virtual core.Int.int_value() -> int
//! return
//! ```
//!
//! After:
//! ```text
//! load 0
//! store 1
//! load 1
//! return
//! ```
//!
//! # Rewrites
//!
//! | Attached instruction     | Rewrite                                   |
//! |--------------------------|-------------------------------------------|
//! | boxing factory call      | removed, the primitive stays on the stack |
//! | iterator `next()`        | replaced by the primitive accessor        |
//! | unboxing accessor        | removed                                   |
//! | `checkcast`              | removed                                   |
//! | `if_null`                | replaced by `pop`                         |
//! | `if_non_null`            | `pop` inserted, replaced by `goto`        |
//!
//! A single analysis followed by one batch of edits is enough: deleting the
//! instructions of one candidate cannot invalidate the proof for another, and the
//! attached instruction sets of surviving candidates are disjoint.

use std::{collections::HashMap, sync::Arc};

use crate::{
    analysis::{
        boxing::{
            BoxOrigin, BoxedRecord, BoxingInterpreter, CandidateTracking, SymbolClassifier,
            TransparentOps, WrapperSymbols,
        },
        frames::FrameAnalyzer,
    },
    assembly::{Edit, InsnId, MethodBody, Opcode},
    compiler::{pass::MethodPass, CompilerContext, EventKind, EventLog},
    Error, Result,
};

/// What one run of [`RedundantBoxingPass::transform`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoxingReport {
    /// Box sites eliminated
    pub candidates_eliminated: usize,
    /// Instructions removed from the body
    pub instructions_removed: usize,
    /// Iterator `next()` calls replaced by primitive accessors
    pub iterators_specialized: usize,
    /// Null tests rewritten into stack adjustments
    pub null_checks_rewritten: usize,
}

impl BoxingReport {
    /// Returns `true` if the body was changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.candidates_eliminated > 0
    }
}

/// Redundant boxing elimination pass.
pub struct RedundantBoxingPass {
    symbols: Arc<dyn SymbolClassifier>,
    transparent: TransparentOps,
}

impl Default for RedundantBoxingPass {
    fn default() -> Self {
        Self::new(Arc::new(WrapperSymbols))
    }
}

impl RedundantBoxingPass {
    /// Creates a pass recognizing calls through `symbols`.
    #[must_use]
    pub fn new(symbols: Arc<dyn SymbolClassifier>) -> Self {
        Self {
            symbols,
            transparent: TransparentOps::default(),
        }
    }

    /// Restricts the operations a candidate may pass through.
    #[must_use]
    pub fn with_transparent_ops(mut self, transparent: TransparentOps) -> Self {
        self.transparent = transparent;
        self
    }

    /// Eliminates every redundant box site of `method`.
    ///
    /// Running the transform on its own output changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Analysis`] if frames cannot be computed for the method and
    /// [`Error::InvariantViolation`] if a surviving candidate has an attached instruction
    /// that cannot be rewritten.
    pub fn transform(&self, method: &mut MethodBody) -> Result<BoxingReport> {
        self.eliminate(method, &EventLog::new())
    }

    fn eliminate(&self, method: &mut MethodBody, changes: &EventLog) -> Result<BoxingReport> {
        let interpreter = BoxingInterpreter::with_hooks(
            Arc::clone(&self.symbols),
            self.transparent,
            CandidateTracking::new(),
        );
        let mut analyzer = FrameAnalyzer::new(interpreter);
        analyzer.analyze(method)?;
        let interpreter = analyzer.into_interpreter();

        let survivors: Vec<&BoxedRecord> = interpreter.final_candidates().collect();
        let mut report = BoxingReport::default();
        if survivors.is_empty() {
            return Ok(report);
        }

        let mut owners: HashMap<InsnId, InsnId> = HashMap::new();
        let mut edits = Vec::new();

        for record in &survivors {
            let value = record.value();
            for &id in record.associated_instructions() {
                let position = Self::position(method, id)?;
                if let Some(other) = owners.insert(id, value.site()) {
                    return Err(Error::invariant(
                        method.name(),
                        position,
                        format!("instruction is attached to box sites {other} and {}", value.site()),
                    ));
                }

                let Some(insn) = method.get(id) else {
                    return Err(Error::invariant(method.name(), position, "instruction vanished"));
                };
                match (&insn.op, id == value.site()) {
                    (Opcode::InvokeStatic(_), true) if value.origin() == BoxOrigin::Factory => {
                        edits.push(Edit::Remove(id));
                        report.instructions_removed += 1;
                        changes
                            .record(EventKind::InstructionRemoved)
                            .at(method.name(), position)
                            .message(format!("box site {id}"));
                    }
                    (Opcode::InvokeVirtual(_), true) => {
                        let element = value.boxed_type();
                        let next = self.symbols.specialized_next(element);
                        changes
                            .record(EventKind::IteratorSpecialized)
                            .at(method.name(), position)
                            .message(format!("next() -> {next}"));
                        edits.push(Edit::Replace(id, Opcode::InvokeVirtual(next)));
                        report.iterators_specialized += 1;
                    }
                    (Opcode::InvokeVirtual(_) | Opcode::CheckCast(_), false) => {
                        edits.push(Edit::Remove(id));
                        report.instructions_removed += 1;
                        changes
                            .record(EventKind::InstructionRemoved)
                            .at(method.name(), position)
                            .message(format!("{} of box site {}", insn.op.mnemonic(), value.site()));
                    }
                    (Opcode::IfNull(_), false) => {
                        edits.push(Edit::Replace(id, Opcode::Pop));
                        report.null_checks_rewritten += 1;
                        changes
                            .record(EventKind::NullCheckRemoved)
                            .at(method.name(), position);
                    }
                    (Opcode::IfNonNull(target), false) => {
                        edits.push(Edit::InsertBefore(id, Opcode::Pop));
                        edits.push(Edit::Replace(id, Opcode::Goto(*target)));
                        report.null_checks_rewritten += 1;
                        changes
                            .record(EventKind::NullCheckRemoved)
                            .at(method.name(), position);
                        changes
                            .record(EventKind::BranchSimplified)
                            .at(method.name(), position);
                    }
                    (op, _) => {
                        return Err(Error::invariant(
                            method.name(),
                            position,
                            format!("cannot rewrite '{op}' attached to box site {}", value.site()),
                        ));
                    }
                }
            }

            report.candidates_eliminated += 1;
            changes
                .record(EventKind::BoxingEliminated)
                .at(method.name(), Self::position(method, value.site())?)
                .message(format!("{value}"));
        }

        method.apply(edits)?;
        tracing::debug!(
            method = method.name(),
            eliminated = report.candidates_eliminated,
            removed = report.instructions_removed,
            "redundant boxing eliminated"
        );
        Ok(report)
    }

    fn position(method: &MethodBody, id: InsnId) -> Result<usize> {
        method.position_of(id).ok_or_else(|| {
            Error::invariant(method.name(), 0, format!("instruction {id} is not live"))
        })
    }
}

impl MethodPass for RedundantBoxingPass {
    fn name(&self) -> &'static str {
        "redundant-boxing"
    }

    fn description(&self) -> &'static str {
        "Removes wrapper objects that are only ever unboxed again"
    }

    fn should_run(&self, method: &MethodBody, _ctx: &CompilerContext) -> bool {
        method.iter().any(|insn| match &insn.op {
            Opcode::InvokeStatic(m) => self.symbols.boxing_factory(m).is_some(),
            Opcode::InvokeVirtual(m) => self.symbols.is_iterator_next(m),
            _ => false,
        })
    }

    fn run_on_method(&self, method: &mut MethodBody, ctx: &CompilerContext) -> Result<bool> {
        let changes = EventLog::new();
        let report = self.eliminate(method, &changes)?;
        if report.changed() {
            ctx.events.merge(&changes);
        }
        Ok(report.changed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{MethodBuilder, PrimitiveType, TypeSig};

    #[test]
    fn test_local_round_trip() {
        let mut body = MethodBuilder::new("round_trip")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .store(1)
            .load(1)
            .unbox(PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();

        let report = RedundantBoxingPass::default().transform(&mut body).unwrap();
        assert_eq!(report.candidates_eliminated, 1);
        assert_eq!(report.instructions_removed, 2);
        let ops: Vec<_> = body.iter().map(|i| i.op.clone()).collect();
        assert_eq!(
            ops,
            vec![Opcode::Load(0), Opcode::Store(1), Opcode::Load(1), Opcode::Return]
        );
    }

    #[test]
    fn test_null_tests_become_stack_adjustments() {
        let mut body = MethodBuilder::new("checked")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .store(1)
            .load(1)
            .if_null("null")
            .load(1)
            .if_non_null("ok")
            .label("null")
            .const_int(0)
            .ret()
            .label("ok")
            .load(1)
            .unbox(PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();

        let report = RedundantBoxingPass::default().transform(&mut body).unwrap();
        assert_eq!(report.candidates_eliminated, 1);
        assert_eq!(report.null_checks_rewritten, 2);
        let mnemonics: Vec<_> = body.iter().map(|i| i.op.mnemonic()).collect();
        assert_eq!(
            mnemonics,
            vec![
                "load", "store", "load", "pop", "load", "pop", "goto", "label", "const", "return",
                "label", "load", "return"
            ]
        );
    }

    #[test]
    fn test_escaping_box_is_kept() {
        let mut body = MethodBuilder::new("escapes")
            .param(PrimitiveType::Int)
            .returns(TypeSig::object("core.Int"))
            .load(0)
            .box_value(PrimitiveType::Int)
            .dup()
            .unbox(PrimitiveType::Int)
            .pop()
            .ret()
            .build()
            .unwrap();
        let before = body.len();
        let report = RedundantBoxingPass::default().transform(&mut body).unwrap();
        assert!(!report.changed());
        assert_eq!(body.len(), before);
    }

    #[test]
    fn test_pass_records_events() {
        let body = MethodBuilder::new("m")
            .param(PrimitiveType::Long)
            .returns(PrimitiveType::Long)
            .load(0)
            .box_value(PrimitiveType::Long)
            .unbox(PrimitiveType::Long)
            .ret()
            .build()
            .unwrap();
        let ctx = CompilerContext::with_methods([body]);
        let pass = RedundantBoxingPass::default();

        let mut method = ctx.method("m").unwrap();
        assert!(pass.should_run(&method, &ctx));
        assert!(pass.run_on_method(&mut method, &ctx).unwrap());
        assert_eq!(ctx.events.count_kind(EventKind::BoxingEliminated), 1);
        assert_eq!(ctx.events.count_kind(EventKind::InstructionRemoved), 2);

        assert!(!pass.should_run(&method, &ctx));
        assert!(!pass.run_on_method(&mut method, &ctx).unwrap());
    }
}
