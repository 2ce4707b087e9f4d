//! Step-based executor for method bodies.
//!
//! The [`Executor`] runs a single [`MethodBody`] to completion against a
//! [`ManagedHeap`] and a table of statics. It only knows the core runtime library (see
//! [`super::runtime`]); any other call is an [`Error::Emulation`].
//!
//! Everything a caller can observe is collected into an [`Outcome`]: how the method
//! completed, and every field and static write in order. Values are recorded as
//! [`Observed`] snapshots, so two runs that differ only in object identity or in the
//! number of allocations produce equal observations.

use std::collections::HashMap;

use crate::{
    assembly::{ArithOp, CmpOp, FieldRef, LabelId, MethodBody, Opcode, StackType},
    emulation::{
        heap::{HeapObject, ManagedHeap},
        runtime::{
            self, Invocation, ARITHMETIC_EXCEPTION, CLASS_CAST_EXCEPTION, NULL_POINTER_EXCEPTION,
        },
        value::{EmValue, Observed},
    },
    Error, Result,
};

/// Resource limits for a single run.
#[derive(Clone, Debug)]
pub struct EmulationLimits {
    /// Maximum instructions to execute, labels included.
    ///
    /// When exceeded, the run stops with [`Error::StepLimit`].
    pub max_steps: usize,

    /// Maximum number of heap objects over the executor's lifetime.
    pub max_heap_objects: usize,
}

impl Default for EmulationLimits {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_heap_objects: 10_000,
        }
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Normal return, with the returned value unless the method is `void`
    Returned(Option<Observed>),
    /// An exception left the method
    Threw(Observed),
}

/// A field or static write, in program order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    /// `owner.name` of the written field
    pub field: String,
    /// Value written
    pub value: Observed,
}

/// Result of running a method.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// How the method completed
    pub completion: Completion,
    /// Instance field writes
    pub field_writes: Vec<Write>,
    /// Static field writes
    pub static_writes: Vec<Write>,
    /// Objects allocated by the run
    pub allocations: usize,
    /// Instructions executed
    pub steps: usize,
}

impl Outcome {
    /// Returns `true` if both runs are indistinguishable to a caller.
    ///
    /// Allocation counts and step counts are ignored.
    #[must_use]
    pub fn same_observations(&self, other: &Outcome) -> bool {
        self.completion == other.completion
            && self.field_writes == other.field_writes
            && self.static_writes == other.static_writes
    }
}

/// Control flow after one instruction.
enum Flow {
    Next,
    Jump(LabelId),
    Return(Option<EmValue>),
    Throw(EmValue),
}

/// A resolved try/catch region.
struct Handler {
    start: usize,
    end: usize,
    handler: usize,
    catch_type: Option<String>,
}

/// Concrete executor.
///
/// The heap and the statics outlive a single [`Executor::run`], so arguments can be
/// allocated up front with [`Executor::heap_mut`] and statics seeded with
/// [`Executor::set_static`].
///
/// # Example
///
/// ```rust
/// use boxelide::assembly::{MethodBuilder, PrimitiveType};
/// use boxelide::emulation::{Completion, EmValue, Executor, Observed};
///
/// let body = MethodBuilder::new("round_trip")
///     .param(PrimitiveType::Int)
///     .returns(PrimitiveType::Int)
///     .load(0)
///     .box_value(PrimitiveType::Int)
///     .unbox(PrimitiveType::Int)
///     .ret()
///     .build()?;
///
/// let outcome = Executor::new().run(&body, &[EmValue::I32(7)])?;
/// assert_eq!(outcome.completion, Completion::Returned(Some(Observed::Int(7))));
/// assert_eq!(outcome.allocations, 1);
/// # Ok::<(), boxelide::Error>(())
/// ```
pub struct Executor {
    limits: EmulationLimits,
    heap: ManagedHeap,
    statics: HashMap<String, EmValue>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(EmulationLimits::default())
    }

    /// Creates an executor with the given limits.
    #[must_use]
    pub fn with_limits(limits: EmulationLimits) -> Self {
        Self {
            heap: ManagedHeap::new(limits.max_heap_objects),
            limits,
            statics: HashMap::new(),
        }
    }

    /// The heap shared by all runs of this executor.
    #[must_use]
    pub fn heap(&self) -> &ManagedHeap {
        &self.heap
    }

    /// Mutable access to the heap, for allocating arguments.
    pub fn heap_mut(&mut self) -> &mut ManagedHeap {
        &mut self.heap
    }

    /// Seeds a static field.
    pub fn set_static(&mut self, field: &FieldRef, value: EmValue) {
        self.statics.insert(Self::field_key(field), value);
    }

    /// Current value of a static field, if it was ever written.
    #[must_use]
    pub fn get_static(&self, field: &FieldRef) -> Option<EmValue> {
        self.statics.get(&Self::field_key(field)).copied()
    }

    /// Runs `method` with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the body is ill-typed at runtime, calls an
    /// unknown method or falls off its end, and [`Error::StepLimit`] if it runs longer
    /// than [`EmulationLimits::max_steps`].
    pub fn run(&mut self, method: &MethodBody, args: &[EmValue]) -> Result<Outcome> {
        if args.len() != method.params().len() {
            return Err(Error::Emulation(format!(
                "'{}' takes {} arguments, got {}",
                method.name(),
                method.params().len(),
                args.len()
            )));
        }

        let labels = method.label_positions()?;
        let handlers = Self::resolve_handlers(method, &labels)?;
        let allocated_before = self.heap.len();

        let mut locals: Vec<Option<EmValue>> = vec![None; method.max_locals().max(args.len())];
        for (slot, arg) in args.iter().enumerate() {
            locals[slot] = Some(*arg);
        }
        let mut stack: Vec<EmValue> = Vec::new();
        let mut field_writes = Vec::new();
        let mut static_writes = Vec::new();
        let mut position = 0;
        let mut steps = 0;

        let completion = loop {
            if steps >= self.limits.max_steps {
                return Err(Error::StepLimit(self.limits.max_steps));
            }
            steps += 1;

            let Some(insn) = method.instruction_at(position) else {
                return Err(Error::Emulation(format!(
                    "control fell off the end of '{}'",
                    method.name()
                )));
            };

            let flow = self.step(
                &insn.op,
                &mut stack,
                &mut locals,
                &mut field_writes,
                &mut static_writes,
            )?;

            match flow {
                Flow::Next => position += 1,
                Flow::Jump(label) => {
                    position = *labels.get(&label).ok_or_else(|| {
                        Error::Emulation(format!("branch to unplaced label {label}"))
                    })?;
                }
                Flow::Return(value) => {
                    let value = value.map(|v| self.heap.observe(v)).transpose()?;
                    break Completion::Returned(value);
                }
                Flow::Throw(exception) => match self.find_handler(&handlers, position, exception)? {
                    Some(handler) => {
                        tracing::trace!(method = method.name(), position, handler, "exception caught");
                        stack.clear();
                        stack.push(exception);
                        position = handler;
                    }
                    None => break Completion::Threw(self.heap.observe(exception)?),
                },
            }
        };

        Ok(Outcome {
            completion,
            field_writes,
            static_writes,
            allocations: self.heap.len() - allocated_before,
            steps,
        })
    }

    /// Executes a single instruction.
    fn step(
        &mut self,
        op: &Opcode,
        stack: &mut Vec<EmValue>,
        locals: &mut Vec<Option<EmValue>>,
        field_writes: &mut Vec<Write>,
        static_writes: &mut Vec<Write>,
    ) -> Result<Flow> {
        match op {
            Opcode::Label(_) | Opcode::Nop => {}
            Opcode::Const(constant) => stack.push(EmValue::from_constant(*constant)),
            Opcode::ConstNull => stack.push(EmValue::Null),
            Opcode::New(class) => {
                let object = self.heap.alloc_instance(class)?;
                stack.push(EmValue::ObjectRef(object));
            }
            Opcode::Load(slot) => {
                let value = locals
                    .get(usize::from(*slot))
                    .copied()
                    .flatten()
                    .ok_or_else(|| Error::Emulation(format!("read of unset slot {slot}")))?;
                stack.push(value);
            }
            Opcode::Store(slot) => {
                let value = pop(stack)?;
                let slot = usize::from(*slot);
                if slot >= locals.len() {
                    locals.resize(slot + 1, None);
                }
                locals[slot] = Some(value);
            }
            Opcode::Dup => {
                let value = pop(stack)?;
                stack.push(value);
                stack.push(value);
            }
            Opcode::Pop => {
                pop(stack)?;
            }
            Opcode::Swap => {
                let top = pop(stack)?;
                let below = pop(stack)?;
                stack.push(top);
                stack.push(below);
            }
            Opcode::Arith(op) => {
                let right = pop(stack)?;
                let left = pop(stack)?;
                match arith(*op, left, right)? {
                    Some(value) => stack.push(value),
                    None => return self.raise(ARITHMETIC_EXCEPTION),
                }
            }
            Opcode::Neg => {
                let value = match pop(stack)? {
                    EmValue::I32(v) => EmValue::I32(v.wrapping_neg()),
                    EmValue::I64(v) => EmValue::I64(v.wrapping_neg()),
                    EmValue::F32(v) => EmValue::F32(-v),
                    EmValue::F64(v) => EmValue::F64(-v),
                    other => return Err(Error::Emulation(format!("cannot negate {other}"))),
                };
                stack.push(value);
            }
            Opcode::Convert(target) => {
                let value = pop(stack)?.convert(*target)?;
                stack.push(value);
            }
            Opcode::GetField(field) => {
                let Some(object) = pop(stack)?.as_object()? else {
                    return self.raise(NULL_POINTER_EXCEPTION);
                };
                let HeapObject::Instance { fields, .. } = self.heap.get(object)? else {
                    return Err(Error::Emulation(format!("no field {field} on {object}")));
                };
                let value = match fields.get(&field.name) {
                    Some(value) => *value,
                    None => EmValue::zero(&field.ty)?,
                };
                stack.push(value);
            }
            Opcode::PutField(field) => {
                let value = pop(stack)?;
                let Some(object) = pop(stack)?.as_object()? else {
                    return self.raise(NULL_POINTER_EXCEPTION);
                };
                field_writes.push(Write {
                    field: Self::field_key(field),
                    value: self.heap.observe(value)?,
                });
                let HeapObject::Instance { fields, .. } = self.heap.get_mut(object)? else {
                    return Err(Error::Emulation(format!("no field {field} on {object}")));
                };
                fields.insert(field.name.clone(), value);
            }
            Opcode::GetStatic(field) => {
                let value = match self.statics.get(&Self::field_key(field)) {
                    Some(value) => *value,
                    None => EmValue::zero(&field.ty)?,
                };
                stack.push(value);
            }
            Opcode::PutStatic(field) => {
                let value = pop(stack)?;
                static_writes.push(Write {
                    field: Self::field_key(field),
                    value: self.heap.observe(value)?,
                });
                self.statics.insert(Self::field_key(field), value);
            }
            Opcode::InvokeStatic(method) => {
                let args = pop_n(stack, method.params.len())?;
                let invocation = runtime::invoke_static(&mut self.heap, method, &args)?;
                return self.complete_call(invocation, stack);
            }
            Opcode::InvokeVirtual(method) => {
                let args = pop_n(stack, method.params.len())?;
                let receiver = pop(stack)?;
                let invocation = runtime::invoke_virtual(&mut self.heap, method, receiver, &args)?;
                return self.complete_call(invocation, stack);
            }
            Opcode::CheckCast(class) => {
                let value = pop(stack)?;
                if let Some(object) = value.as_object()? {
                    if !self.heap.get(object)?.is_instance_of(class) {
                        return self.raise(CLASS_CAST_EXCEPTION);
                    }
                }
                stack.push(value);
            }
            Opcode::InstanceOf(class) => {
                let matches = match pop(stack)?.as_object()? {
                    Some(object) => self.heap.get(object)?.is_instance_of(class),
                    None => false,
                };
                stack.push(EmValue::I32(i32::from(matches)));
            }
            Opcode::Goto(label) => return Ok(Flow::Jump(*label)),
            Opcode::IfTrue(label) => {
                if pop(stack)?.as_i32()? != 0 {
                    return Ok(Flow::Jump(*label));
                }
            }
            Opcode::IfFalse(label) => {
                if pop(stack)?.as_i32()? == 0 {
                    return Ok(Flow::Jump(*label));
                }
            }
            Opcode::IfCmp(cmp, label) => {
                let right = pop(stack)?;
                let left = pop(stack)?;
                if compare(*cmp, left, right)? {
                    return Ok(Flow::Jump(*label));
                }
            }
            Opcode::IfNull(label) => {
                if pop(stack)?.as_object()?.is_none() {
                    return Ok(Flow::Jump(*label));
                }
            }
            Opcode::IfNonNull(label) => {
                if pop(stack)?.as_object()?.is_some() {
                    return Ok(Flow::Jump(*label));
                }
            }
            Opcode::Return => return Ok(Flow::Return(Some(pop(stack)?))),
            Opcode::ReturnVoid => return Ok(Flow::Return(None)),
            Opcode::Throw => {
                let exception = pop(stack)?;
                if exception.as_object()?.is_none() {
                    return self.raise(NULL_POINTER_EXCEPTION);
                }
                return Ok(Flow::Throw(exception));
            }
        }
        Ok(Flow::Next)
    }

    fn complete_call(&mut self, invocation: Invocation, stack: &mut Vec<EmValue>) -> Result<Flow> {
        match invocation {
            Invocation::Return(Some(value)) => {
                stack.push(value);
                Ok(Flow::Next)
            }
            Invocation::Return(None) => Ok(Flow::Next),
            Invocation::Throw(class) => self.raise(class),
        }
    }

    /// Allocates a runtime exception and throws it.
    fn raise(&mut self, class: &str) -> Result<Flow> {
        let exception = self.heap.alloc_exception(class)?;
        Ok(Flow::Throw(EmValue::ObjectRef(exception)))
    }

    fn find_handler(
        &self,
        handlers: &[Handler],
        position: usize,
        exception: EmValue,
    ) -> Result<Option<usize>> {
        let Some(object) = exception.as_object()? else {
            return Ok(None);
        };
        let object = self.heap.get(object)?;
        Ok(handlers
            .iter()
            .filter(|h| (h.start..h.end).contains(&position))
            .find(|h| {
                h.catch_type
                    .as_deref()
                    .map_or(true, |class| object.is_instance_of(class))
            })
            .map(|h| h.handler))
    }

    fn resolve_handlers(
        method: &MethodBody,
        labels: &HashMap<LabelId, usize>,
    ) -> Result<Vec<Handler>> {
        let resolve = |label: LabelId| {
            labels.get(&label).copied().ok_or_else(|| {
                Error::Emulation(format!(
                    "try/catch region of '{}' names unplaced label {label}",
                    method.name()
                ))
            })
        };
        method
            .try_catch_blocks()
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

    fn field_key(field: &FieldRef) -> String {
        format!("{}.{}", field.owner, field.name)
    }
}

fn pop(stack: &mut Vec<EmValue>) -> Result<EmValue> {
    stack
        .pop()
        .ok_or_else(|| Error::Emulation("operand stack underflow".to_string()))
}

fn pop_n(stack: &mut Vec<EmValue>, count: usize) -> Result<Vec<EmValue>> {
    if stack.len() < count {
        return Err(Error::Emulation("operand stack underflow".to_string()));
    }
    Ok(stack.split_off(stack.len() - count))
}

/// Binary arithmetic. `None` signals integer division by zero.
fn arith(op: ArithOp, left: EmValue, right: EmValue) -> Result<Option<EmValue>> {
    let value = match (left, right) {
        (EmValue::I32(a), EmValue::I32(b)) => EmValue::I32(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div | ArithOp::Rem if b == 0 => return Ok(None),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem => a.wrapping_rem(b),
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
        }),
        (EmValue::I64(a), EmValue::I64(b)) => EmValue::I64(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div | ArithOp::Rem if b == 0 => return Ok(None),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem => a.wrapping_rem(b),
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
        }),
        (EmValue::F32(a), EmValue::F32(b)) => EmValue::F32(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
            _ => return Err(bad_operands(op, left, right)),
        }),
        (EmValue::F64(a), EmValue::F64(b)) => EmValue::F64(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
            _ => return Err(bad_operands(op, left, right)),
        }),
        _ => return Err(bad_operands(op, left, right)),
    };
    Ok(Some(value))
}

fn compare(cmp: CmpOp, left: EmValue, right: EmValue) -> Result<bool> {
    let ordering = match (left, right) {
        (EmValue::I32(a), EmValue::I32(b)) => a.partial_cmp(&b),
        (EmValue::I64(a), EmValue::I64(b)) => a.partial_cmp(&b),
        (EmValue::F32(a), EmValue::F32(b)) => a.partial_cmp(&b),
        (EmValue::F64(a), EmValue::F64(b)) => a.partial_cmp(&b),
        (a, b) if a.stack_type() == StackType::Reference && b.stack_type() == StackType::Reference => {
            let same = a == b;
            return match cmp {
                CmpOp::Eq => Ok(same),
                CmpOp::Ne => Ok(!same),
                _ => Err(Error::Emulation(format!("cannot order references with {cmp:?}"))),
            };
        }
        (a, b) => return Err(Error::Emulation(format!("cannot compare {a} with {b}"))),
    };
    // Unordered (NaN) operands only satisfy `ne`.
    let Some(ordering) = ordering else {
        return Ok(cmp == CmpOp::Ne);
    };
    Ok(match cmp {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => ordering.is_ne(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Ge => ordering.is_ge(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Le => ordering.is_le(),
    })
}

fn bad_operands(op: ArithOp, left: EmValue, right: EmValue) -> Error {
    let name: &'static str = op.into();
    Error::Emulation(format!("cannot apply {name} to {left} and {right}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{MethodBuilder, PrimitiveType, TypeSig};

    #[test]
    fn test_loop_and_arithmetic() {
        // Sums 1..=n.
        let body = MethodBuilder::new("sum")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .const_int(0)
            .store(1)
            .label("loop")
            .load(0)
            .if_false("done")
            .load(1)
            .load(0)
            .add()
            .store(1)
            .load(0)
            .const_int(1)
            .sub()
            .store(0)
            .goto("loop")
            .label("done")
            .load(1)
            .ret()
            .build()
            .unwrap();

        let outcome = Executor::new().run(&body, &[EmValue::I32(10)]).unwrap();
        assert_eq!(outcome.completion, Completion::Returned(Some(Observed::Int(55))));
        assert_eq!(outcome.allocations, 0);
    }

    #[test]
    fn test_step_limit() {
        let body = MethodBuilder::new("spin")
            .label("top")
            .goto("top")
            .build()
            .unwrap();
        let limits = EmulationLimits {
            max_steps: 50,
            ..EmulationLimits::default()
        };
        let result = Executor::with_limits(limits).run(&body, &[]);
        assert!(matches!(result, Err(Error::StepLimit(50))));
    }

    #[test]
    fn test_division_by_zero_is_caught() {
        let body = MethodBuilder::new("safe_div")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .label("try")
            .const_int(1)
            .load(0)
            .arith(ArithOp::Div)
            .ret()
            .label("end")
            .label("handler")
            .pop()
            .const_int(-1)
            .ret()
            .try_catch("try", "end", "handler", Some(ARITHMETIC_EXCEPTION))
            .build()
            .unwrap();

        let mut executor = Executor::new();
        let ok = executor.run(&body, &[EmValue::I32(1)]).unwrap();
        assert_eq!(ok.completion, Completion::Returned(Some(Observed::Int(1))));
        let caught = executor.run(&body, &[EmValue::I32(0)]).unwrap();
        assert_eq!(caught.completion, Completion::Returned(Some(Observed::Int(-1))));
        assert_eq!(caught.allocations, 1);
    }

    #[test]
    fn test_uncaught_cast_failure() {
        let body = MethodBuilder::new("bad_cast")
            .param(PrimitiveType::Int)
            .returns(TypeSig::object("core.Long"))
            .load(0)
            .box_value(PrimitiveType::Int)
            .checkcast("core.Long")
            .ret()
            .build()
            .unwrap();
        let outcome = Executor::new().run(&body, &[EmValue::I32(3)]).unwrap();
        assert_eq!(
            outcome.completion,
            Completion::Threw(Observed::Object {
                class: CLASS_CAST_EXCEPTION.to_string(),
                fields: Vec::new(),
            })
        );
    }

    #[test]
    fn test_field_and_static_writes() {
        let value = crate::assembly::FieldRef::new("app.Holder", "value", TypeSig::object("core.Int"));
        let counter = crate::assembly::FieldRef::new("app.Holder", "count", PrimitiveType::Int.into());
        let body = MethodBuilder::new("store")
            .param(PrimitiveType::Int)
            .new_object("app.Holder")
            .load(0)
            .box_value(PrimitiveType::Int)
            .put_field(value.clone())
            .get_static(counter.clone())
            .const_int(1)
            .add()
            .put_static(counter.clone())
            .ret_void()
            .build()
            .unwrap();

        let mut executor = Executor::new();
        executor.set_static(&counter, EmValue::I32(41));
        let outcome = executor.run(&body, &[EmValue::I32(5)]).unwrap();

        assert_eq!(outcome.completion, Completion::Returned(None));
        assert_eq!(
            outcome.field_writes,
            vec![Write {
                field: "app.Holder.value".to_string(),
                value: Observed::Boxed(PrimitiveType::Int, Box::new(Observed::Int(5))),
            }]
        );
        assert_eq!(executor.get_static(&counter), Some(EmValue::I32(42)));
        assert_eq!(outcome.static_writes.len(), 1);
        assert_eq!(outcome.allocations, 2);
    }

    #[test]
    fn test_argument_count_checked() {
        let body = MethodBuilder::new("unary")
            .param(PrimitiveType::Int)
            .ret_void()
            .build()
            .unwrap();
        assert!(matches!(Executor::new().run(&body, &[]), Err(Error::Emulation(_))));
    }
}
