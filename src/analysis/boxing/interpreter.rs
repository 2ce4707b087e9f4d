//! The boxing-aware interpreter.
//!
//! [`BoxingInterpreter`] implements the frame analyzer's transfer functions over
//! [`AbstractValue`]. It recognizes box sites, exact unboxings, transparent casts and
//! null tests, and decides how boxed values survive join points. Everything else is
//! delegated to [`BasicInterpreter`].
//!
//! What happens when a boxed value is created, escapes or fails to merge is left to a
//! [`BoxingHooks`] strategy. [`PlainRecognition`] ignores these events and is used where
//! only the shape of the frames matters (null-check elimination);
//! [`CandidateTracking`](super::CandidateTracking) turns them into candidate-set updates
//! (boxing elimination). Both share one recognition core.

use std::{collections::BTreeMap, sync::Arc};

use bitflags::bitflags;
use strum::Display;

use crate::{
    analysis::{
        boxing::{
            symbols::SymbolClassifier,
            value::{AbstractValue, BoxOrigin, BoxedRecord, BoxedValue},
        },
        frames::{BasicInterpreter, Interpreter},
    },
    assembly::{InsnId, Instruction, Opcode, TypeSig},
};

bitflags! {
    /// Unary operations that may consume a boxed value without disqualifying it.
    ///
    /// A transparent operation is attached to the boxed value and rewritten together
    /// with it when the value is eliminated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransparentOps: u8 {
        /// `checkcast` to the wrapper class, `core.Number` or `core.Object`
        const CAST = 0x01;
        /// `if_null` / `if_non_null`
        const NULL_TEST = 0x02;
    }
}

impl Default for TransparentOps {
    fn default() -> Self {
        TransparentOps::CAST | TransparentOps::NULL_TEST
    }
}

/// Why a boxed value stopped being a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EscapeReason {
    /// Passed to a call that is not an exactly-typed unboxing
    Call,
    /// Stored into an object field
    FieldStore,
    /// Duplicated on the stack
    OpaqueCopy,
    /// Consumed by any other operation (return, throw, arithmetic, a non-transparent cast)
    Consumed,
}

/// Events raised by the boxing interpreter.
///
/// All methods default to doing nothing.
pub trait BoxingHooks {
    /// A box site was interpreted for the first time.
    fn on_new_boxed_value(&mut self, _value: &BoxedValue) {}

    /// A boxed value was used in a way that needs a real reference.
    fn on_escaped(&mut self, _value: &BoxedValue, _reason: EscapeReason) {}

    /// A boxed value met a different value at a join point.
    fn on_merge_failed(&mut self, _value: &BoxedValue) {}

    /// Two different boxed values met at a join point.
    ///
    /// Called before [`BoxingHooks::on_merge_failed`] is raised for each side.
    fn on_boxed_merge(&mut self, _first: &BoxedValue, _second: &BoxedValue) {}

    /// A boxed value is being duplicated on the stack.
    ///
    /// Returning `true` makes the copy an ordinary reference instead of an alias of the
    /// boxed value, and the value then escapes with [`EscapeReason::OpaqueCopy`].
    fn on_opaque_copy(&mut self, _value: &BoxedValue) -> bool {
        false
    }
}

/// Hooks that observe nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRecognition;

impl BoxingHooks for PlainRecognition {}

/// Abstract interpreter recognizing boxing, unboxing and primitive iteration.
pub struct BoxingInterpreter<H: BoxingHooks = PlainRecognition> {
    basic: BasicInterpreter,
    symbols: Arc<dyn SymbolClassifier>,
    transparent: TransparentOps,
    records: BTreeMap<InsnId, BoxedRecord>,
    hooks: H,
}

impl BoxingInterpreter<PlainRecognition> {
    /// Creates an interpreter that recognizes boxing but tracks no candidates.
    #[must_use]
    pub fn new(symbols: Arc<dyn SymbolClassifier>, transparent: TransparentOps) -> Self {
        Self::with_hooks(symbols, transparent, PlainRecognition)
    }
}

impl<H: BoxingHooks> BoxingInterpreter<H> {
    /// Creates an interpreter raising events on `hooks`.
    #[must_use]
    pub fn with_hooks(
        symbols: Arc<dyn SymbolClassifier>,
        transparent: TransparentOps,
        hooks: H,
    ) -> Self {
        BoxingInterpreter {
            basic: BasicInterpreter,
            symbols,
            transparent,
            records: BTreeMap::new(),
            hooks,
        }
    }

    /// Records of every box site seen so far, by site.
    #[must_use]
    pub fn records(&self) -> &BTreeMap<InsnId, BoxedRecord> {
        &self.records
    }

    /// The record of one box site.
    #[must_use]
    pub fn record(&self, site: InsnId) -> Option<&BoxedRecord> {
        self.records.get(&site)
    }

    /// The hook strategy.
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The classifier used to recognize calls.
    #[must_use]
    pub fn symbols(&self) -> &Arc<dyn SymbolClassifier> {
        &self.symbols
    }

    /// Returns the value for a box site, creating it on the first visit.
    fn boxed_at(&mut self, value: BoxedValue) -> AbstractValue {
        let hooks = &mut self.hooks;
        let record = self.records.entry(value.site()).or_insert_with(|| {
            hooks.on_new_boxed_value(&value);
            BoxedRecord::new(value)
        });
        AbstractValue::Boxed(*record.value())
    }

    /// Attaches `insn` to the record of `value`.
    fn associate(&mut self, value: &BoxedValue, insn: InsnId) -> Option<&mut BoxedRecord> {
        let record = self.records.get_mut(&value.site())?;
        record.add_instruction(insn);
        Some(record)
    }

    fn escape(&mut self, value: &AbstractValue, reason: EscapeReason) {
        if let AbstractValue::Boxed(boxed) = value {
            tracing::trace!(
                site = %boxed.site(),
                reason = %reason,
                "boxed value escapes"
            );
            self.hooks.on_escaped(boxed, reason);
        }
    }

    fn ordinary_call(&mut self, insn: &Instruction, values: Vec<AbstractValue>) -> Option<AbstractValue> {
        for value in &values {
            self.escape(value, EscapeReason::Call);
        }
        let basic = values.iter().map(AbstractValue::to_basic).collect();
        self.basic.nary_operation(insn, basic).map(AbstractValue::from)
    }
}

impl<H: BoxingHooks> Interpreter for BoxingInterpreter<H> {
    type Value = AbstractValue;

    fn new_value(&mut self, ty: Option<&TypeSig>) -> AbstractValue {
        self.basic.new_value(ty).into()
    }

    fn new_exception_value(&mut self, catch_type: Option<&str>) -> AbstractValue {
        self.basic.new_exception_value(catch_type).into()
    }

    fn new_operation(&mut self, insn: &Instruction) -> AbstractValue {
        self.basic.new_operation(insn).into()
    }

    fn copy_operation(&mut self, insn: &Instruction, value: AbstractValue) -> AbstractValue {
        if let (Opcode::Dup, AbstractValue::Boxed(boxed)) = (&insn.op, &value) {
            if self.hooks.on_opaque_copy(boxed) {
                self.escape(&value, EscapeReason::OpaqueCopy);
                return AbstractValue::REFERENCE;
            }
        }
        value
    }

    fn unary_operation(&mut self, insn: &Instruction, value: AbstractValue) -> Option<AbstractValue> {
        if let AbstractValue::Boxed(boxed) = &value {
            match &insn.op {
                Opcode::CheckCast(target)
                    if self.transparent.contains(TransparentOps::CAST)
                        && self.symbols.is_transparent_cast(target, boxed) =>
                {
                    self.associate(boxed, insn.id);
                    return Some(value);
                }
                Opcode::IfNull(_) | Opcode::IfNonNull(_)
                    if self.transparent.contains(TransparentOps::NULL_TEST) =>
                {
                    self.associate(boxed, insn.id);
                    return None;
                }
                _ => self.escape(&value, EscapeReason::Consumed),
            }
        }
        self.basic
            .unary_operation(insn, value.to_basic())
            .map(AbstractValue::from)
    }

    fn binary_operation(
        &mut self,
        insn: &Instruction,
        first: AbstractValue,
        second: AbstractValue,
    ) -> Option<AbstractValue> {
        if let Opcode::PutField(_) = insn.op {
            self.escape(&first, EscapeReason::Consumed);
            self.escape(&second, EscapeReason::FieldStore);
        } else {
            self.escape(&first, EscapeReason::Consumed);
            self.escape(&second, EscapeReason::Consumed);
        }
        self.basic
            .binary_operation(insn, first.to_basic(), second.to_basic())
            .map(AbstractValue::from)
    }

    fn nary_operation(&mut self, insn: &Instruction, values: Vec<AbstractValue>) -> Option<AbstractValue> {
        match &insn.op {
            Opcode::InvokeStatic(method) => {
                if let Some(prim) = self.symbols.boxing_factory(method) {
                    if let [AbstractValue::Basic(ty)] = values.as_slice() {
                        if *ty == prim.stack_type() {
                            let value = BoxedValue::new(insn.id, prim, BoxOrigin::Factory);
                            return Some(self.boxed_at(value));
                        }
                    }
                }
                self.ordinary_call(insn, values)
            }
            Opcode::InvokeVirtual(method) => {
                let receiver = values.first();

                if self.symbols.is_iterator_next(method) {
                    if let Some((family, iter)) = receiver.and_then(AbstractValue::as_iterator) {
                        let value =
                            BoxedValue::new(insn.id, iter.element(), BoxOrigin::IteratorNext(family));
                        return Some(self.boxed_at(value));
                    }
                }

                if let Some((family, element)) = self.symbols.iterator_source(method) {
                    for value in &values {
                        self.escape(value, EscapeReason::Call);
                    }
                    return Some(AbstractValue::iterator(family, element));
                }

                if let Some(prim) = self.symbols.unboxing_accessor(method) {
                    if let Some(AbstractValue::Boxed(boxed)) = receiver {
                        if boxed.boxed_type() == prim {
                            let boxed = *boxed;
                            if let Some(record) = self.associate(&boxed, insn.id) {
                                record.set_was_unboxed();
                            }
                            return Some(AbstractValue::Basic(prim.stack_type()));
                        }
                    }
                }

                self.ordinary_call(insn, values)
            }
            _ => self.ordinary_call(insn, values),
        }
    }

    fn return_operation(&mut self, _insn: &Instruction, value: AbstractValue, _expected: &TypeSig) {
        self.escape(&value, EscapeReason::Consumed);
    }

    fn merge(&mut self, old: &AbstractValue, new: &AbstractValue) -> AbstractValue {
        match (old, new) {
            (AbstractValue::Boxed(a), AbstractValue::Boxed(b)) if a == b => old.clone(),
            (AbstractValue::Boxed(a), AbstractValue::Boxed(b)) => {
                tracing::trace!(first = %a.site(), second = %b.site(), "distinct boxed values merge");
                self.hooks.on_boxed_merge(a, b);
                self.hooks.on_merge_failed(a);
                self.hooks.on_merge_failed(b);
                AbstractValue::REFERENCE
            }
            (AbstractValue::Boxed(_), AbstractValue::Uninitialized)
            | (AbstractValue::Uninitialized, AbstractValue::Boxed(_)) => AbstractValue::Uninitialized,
            (AbstractValue::Boxed(boxed), other) | (other, AbstractValue::Boxed(boxed)) => {
                tracing::trace!(site = %boxed.site(), "boxed value merges with {other}");
                self.hooks.on_merge_failed(boxed);
                self.basic
                    .merge(&AbstractValue::REFERENCE.to_basic(), &other.to_basic())
                    .into()
            }
            _ if old == new => old.clone(),
            _ => self.basic.merge(&old.to_basic(), &new.to_basic()).into(),
        }
    }
}
