//! Well-known symbols of the core runtime library.
//!
//! The optimization passes only ever recognize calls by symbol; these constructors are the
//! single place that spells out what the wrapper factories, unboxing accessors, range
//! classes and iterator methods look like. The same symbols drive
//! [`crate::analysis::boxing::WrapperSymbols`] and the reference executor in
//! [`crate::emulation`], so the recognizer and the runtime cannot drift apart.
//!
//! | Symbol                               | Shape                                   |
//! |--------------------------------------|-----------------------------------------|
//! | `core.Int.box(int)`                  | static factory, returns `core.Int`      |
//! | `core.Int.int_value()`               | accessor on a wrapper or `core.Number`  |
//! | `core.IntRange.of(int, int)`         | static factory for a closed range       |
//! | `core.IntProgression.of(int, int, int)` | static factory with a step           |
//! | `core.IntRange.iterator()`           | returns `core.Iterator`                 |
//! | `core.Iterator.next()`               | returns the boxed element               |
//! | `core.IntIterator.next_int()`        | specialized, returns the raw element    |

use crate::assembly::{
    instruction::MethodRef,
    types::{PrimitiveType, TypeSig, OBJECT_CLASS},
};

/// Name of the boxing factory on every wrapper class.
pub const BOX_METHOD: &str = "box";

/// Generic iterator interface returned by `iterator()`.
pub const ITERATOR_CLASS: &str = "core.Iterator";

/// Name of the method producing an iterator from a range or progression.
pub const ITERATOR_METHOD: &str = "iterator";

/// Name of the generic element accessor on [`ITERATOR_CLASS`].
pub const NEXT_METHOD: &str = "next";

/// Name of the exhaustion test on [`ITERATOR_CLASS`].
pub const HAS_NEXT_METHOD: &str = "has_next";

/// Name of the static factory on range and progression classes.
pub const RANGE_FACTORY: &str = "of";

/// The two shapes of primitive iteration sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorFamily {
    /// Closed range with unit step
    Range,
    /// Range with an explicit, non-zero step
    Progression,
}

/// A range or progression class of the runtime library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeClass {
    /// Fully qualified class name
    pub class: &'static str,
    /// Whether the class carries a step
    pub family: IteratorFamily,
    /// Element type produced by its iterator
    pub element: PrimitiveType,
}

/// Every range and progression class known to the runtime.
pub const RANGE_CLASSES: [RangeClass; 6] = [
    RangeClass {
        class: "core.IntRange",
        family: IteratorFamily::Range,
        element: PrimitiveType::Int,
    },
    RangeClass {
        class: "core.CharRange",
        family: IteratorFamily::Range,
        element: PrimitiveType::Char,
    },
    RangeClass {
        class: "core.LongRange",
        family: IteratorFamily::Range,
        element: PrimitiveType::Long,
    },
    RangeClass {
        class: "core.IntProgression",
        family: IteratorFamily::Progression,
        element: PrimitiveType::Int,
    },
    RangeClass {
        class: "core.CharProgression",
        family: IteratorFamily::Progression,
        element: PrimitiveType::Char,
    },
    RangeClass {
        class: "core.LongProgression",
        family: IteratorFamily::Progression,
        element: PrimitiveType::Long,
    },
];

/// Looks up a range or progression class by name.
#[must_use]
pub fn range_class(class: &str) -> Option<&'static RangeClass> {
    RANGE_CLASSES.iter().find(|range| range.class == class)
}

/// The boxing factory for `prim`: `Wrapper.box(prim) -> Wrapper`.
#[must_use]
pub fn box_method(prim: PrimitiveType) -> MethodRef {
    MethodRef::new(
        prim.wrapper_class(),
        BOX_METHOD,
        vec![prim.into()],
        TypeSig::object(prim.wrapper_class()),
    )
}

/// Accessor name returning `prim` (`int_value`, `long_value`, ...).
#[must_use]
pub fn unbox_name(prim: PrimitiveType) -> String {
    format!("{}_value", prim.name())
}

/// The unboxing accessor `owner.<prim>_value() -> prim`.
#[must_use]
pub fn unbox_method(owner: &str, prim: PrimitiveType) -> MethodRef {
    MethodRef::new(owner, unbox_name(prim), Vec::new(), prim.into())
}

/// Static factory of a range or progression class.
///
/// Ranges take `(first, last)`; progressions take `(first, last, step)`. The bounds have
/// the stack type of the element, so a `CharRange` takes two ints.
#[must_use]
pub fn range_factory(range: &RangeClass) -> MethodRef {
    let bound: TypeSig = match range.element {
        PrimitiveType::Long => PrimitiveType::Long.into(),
        _ => PrimitiveType::Int.into(),
    };
    let mut params = vec![bound.clone(), bound.clone()];
    if range.family == IteratorFamily::Progression {
        params.push(bound);
    }
    MethodRef::new(range.class, RANGE_FACTORY, params, TypeSig::object(range.class))
}

/// `owner.iterator() -> core.Iterator`.
#[must_use]
pub fn iterator_method(owner: &str) -> MethodRef {
    MethodRef::new(
        owner,
        ITERATOR_METHOD,
        Vec::new(),
        TypeSig::object(ITERATOR_CLASS),
    )
}

/// The generic `core.Iterator.next() -> core.Object`.
#[must_use]
pub fn next_method() -> MethodRef {
    MethodRef::new(
        ITERATOR_CLASS,
        NEXT_METHOD,
        Vec::new(),
        TypeSig::object(OBJECT_CLASS),
    )
}

/// `core.Iterator.has_next() -> bool`.
#[must_use]
pub fn has_next_method() -> MethodRef {
    MethodRef::new(
        ITERATOR_CLASS,
        HAS_NEXT_METHOD,
        Vec::new(),
        PrimitiveType::Bool.into(),
    )
}

/// Class of the primitive-specialized iterator for `prim`.
#[must_use]
pub const fn primitive_iterator_class(prim: PrimitiveType) -> &'static str {
    match prim {
        PrimitiveType::Bool => "core.BooleanIterator",
        PrimitiveType::Char => "core.CharIterator",
        PrimitiveType::Byte => "core.ByteIterator",
        PrimitiveType::Short => "core.ShortIterator",
        PrimitiveType::Int => "core.IntIterator",
        PrimitiveType::Long => "core.LongIterator",
        PrimitiveType::Float => "core.FloatIterator",
        PrimitiveType::Double => "core.DoubleIterator",
    }
}

/// The unboxed element accessor, e.g. `core.IntIterator.next_int() -> int`.
#[must_use]
pub fn specialized_next(prim: PrimitiveType) -> MethodRef {
    MethodRef::new(
        primitive_iterator_class(prim),
        format!("{NEXT_METHOD}_{}", prim.name()),
        Vec::new(),
        prim.into(),
    )
}
