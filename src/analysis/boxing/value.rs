//! Abstract values of the boxing analysis.
//!
//! The domain extends the ordinary one-value-per-stack-type domain with values that
//! remember where a wrapper object came from:
//!
//! - [`BoxedValue`] - the result of one particular boxing site
//! - [`IteratorValue`] - an iterator over a primitive range or progression
//!
//! There is no ordering between these values. How two values combine at a join point is
//! decided by [`BoxingInterpreter::merge`](super::BoxingInterpreter).

use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
};

use crate::{
    analysis::frames::BasicValue,
    assembly::{runtime, InsnId, MethodRef, PrimitiveType, StackType},
};

pub use crate::assembly::runtime::IteratorFamily;

/// How a boxed value came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxOrigin {
    /// A static wrapper factory such as `core.Int.box(int)`
    Factory,
    /// The generic `next()` of a primitive range or progression iterator
    IteratorNext(IteratorFamily),
}

/// A wrapper object produced at a known instruction.
///
/// Two boxed values are equal if and only if they have the same box site. The other
/// fields are carried for convenience and never take part in comparisons.
#[derive(Debug, Clone, Copy)]
pub struct BoxedValue {
    site: InsnId,
    boxed_type: PrimitiveType,
    origin: BoxOrigin,
}

impl BoxedValue {
    /// Creates a boxed value for the given site.
    #[must_use]
    pub const fn new(site: InsnId, boxed_type: PrimitiveType, origin: BoxOrigin) -> Self {
        BoxedValue {
            site,
            boxed_type,
            origin,
        }
    }

    /// The instruction that produced the wrapper.
    #[must_use]
    pub const fn site(&self) -> InsnId {
        self.site
    }

    /// The primitive held by the wrapper.
    #[must_use]
    pub const fn boxed_type(&self) -> PrimitiveType {
        self.boxed_type
    }

    /// How the site produces the wrapper.
    #[must_use]
    pub const fn origin(&self) -> BoxOrigin {
        self.origin
    }
}

impl PartialEq for BoxedValue {
    fn eq(&self, other: &Self) -> bool {
        self.site == other.site
    }
}

impl Eq for BoxedValue {}

impl Hash for BoxedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.site.hash(state);
    }
}

impl fmt::Display for BoxedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boxed {} @{}", self.boxed_type, self.site)
    }
}

/// An iterator over a primitive range or progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorValue {
    element: PrimitiveType,
}

impl IteratorValue {
    /// Creates an iterator value producing `element`s.
    #[must_use]
    pub const fn new(element: PrimitiveType) -> Self {
        IteratorValue { element }
    }

    /// The type of the produced elements.
    #[must_use]
    pub const fn element(&self) -> PrimitiveType {
        self.element
    }

    /// The primitive accessor replacing the generic `next()`.
    #[must_use]
    pub fn next_method(&self) -> MethodRef {
        runtime::specialized_next(self.element)
    }
}

/// A value in a stack or local slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbstractValue {
    /// Unusable slot
    Uninitialized,
    /// An ordinary value of the given stack type
    Basic(StackType),
    /// A wrapper from a known box site
    Boxed(BoxedValue),
    /// An iterator over a closed primitive range
    RangeIterator(IteratorValue),
    /// An iterator over a stepped primitive progression
    ProgressionIterator(IteratorValue),
}

impl AbstractValue {
    /// An ordinary reference.
    pub const REFERENCE: AbstractValue = AbstractValue::Basic(StackType::Reference);

    /// Returns the boxed value, if this is one.
    #[must_use]
    pub const fn as_boxed(&self) -> Option<&BoxedValue> {
        match self {
            AbstractValue::Boxed(boxed) => Some(boxed),
            _ => None,
        }
    }

    /// Returns `true` for boxed values.
    #[must_use]
    pub const fn is_boxed(&self) -> bool {
        matches!(self, AbstractValue::Boxed(_))
    }

    /// Returns the iterator family and value, if this is an iterator.
    #[must_use]
    pub const fn as_iterator(&self) -> Option<(IteratorFamily, IteratorValue)> {
        match self {
            AbstractValue::RangeIterator(iter) => Some((IteratorFamily::Range, *iter)),
            AbstractValue::ProgressionIterator(iter) => Some((IteratorFamily::Progression, *iter)),
            _ => None,
        }
    }

    /// Builds an iterator value of the given family.
    #[must_use]
    pub const fn iterator(family: IteratorFamily, element: PrimitiveType) -> Self {
        let value = IteratorValue::new(element);
        match family {
            IteratorFamily::Range => AbstractValue::RangeIterator(value),
            IteratorFamily::Progression => AbstractValue::ProgressionIterator(value),
        }
    }

    /// The stack type of this value, `None` if uninitialized.
    #[must_use]
    pub const fn stack_type(&self) -> Option<StackType> {
        match self {
            AbstractValue::Uninitialized => None,
            AbstractValue::Basic(ty) => Some(*ty),
            AbstractValue::Boxed(_)
            | AbstractValue::RangeIterator(_)
            | AbstractValue::ProgressionIterator(_) => Some(StackType::Reference),
        }
    }

    /// Forgets everything except the stack type.
    #[must_use]
    pub const fn to_basic(&self) -> BasicValue {
        match self.stack_type() {
            Some(ty) => BasicValue::Typed(ty),
            None => BasicValue::Uninitialized,
        }
    }
}

impl From<BasicValue> for AbstractValue {
    fn from(value: BasicValue) -> Self {
        match value {
            BasicValue::Uninitialized => AbstractValue::Uninitialized,
            BasicValue::Typed(ty) => AbstractValue::Basic(ty),
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractValue::Uninitialized => f.write_str("."),
            AbstractValue::Basic(ty) => write!(f, "{ty}"),
            AbstractValue::Boxed(boxed) => write!(f, "{boxed}"),
            AbstractValue::RangeIterator(iter) => write!(f, "range iterator<{}>", iter.element),
            AbstractValue::ProgressionIterator(iter) => {
                write!(f, "progression iterator<{}>", iter.element)
            }
        }
    }
}

/// Mutable facts gathered about one box site during analysis.
#[derive(Debug, Clone)]
pub struct BoxedRecord {
    value: BoxedValue,
    associated: BTreeSet<InsnId>,
    was_unboxed: bool,
}

impl BoxedRecord {
    /// Starts a record whose only associated instruction is the box site.
    #[must_use]
    pub fn new(value: BoxedValue) -> Self {
        BoxedRecord {
            value,
            associated: BTreeSet::from([value.site()]),
            was_unboxed: false,
        }
    }

    /// The boxed value this record describes.
    #[must_use]
    pub const fn value(&self) -> &BoxedValue {
        &self.value
    }

    /// Instructions that must be rewritten together if the value is eliminated.
    #[must_use]
    pub fn associated_instructions(&self) -> &BTreeSet<InsnId> {
        &self.associated
    }

    /// Whether an exactly-typed unboxing consumed the value.
    #[must_use]
    pub const fn was_unboxed(&self) -> bool {
        self.was_unboxed
    }

    pub(crate) fn add_instruction(&mut self, insn: InsnId) {
        self.associated.insert(insn);
    }

    pub(crate) fn set_was_unboxed(&mut self) {
        self.was_unboxed = true;
    }
}
