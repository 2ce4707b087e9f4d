//! Classification of calls into boxing, unboxing and iteration primitives.
//!
//! The boxing analysis never hard-codes method names. It asks a [`SymbolClassifier`],
//! and anything the classifier does not recognize is an ordinary call. Lookups that fail
//! are not errors: an unrecognized symbol simply keeps its ordinary meaning.

use crate::{
    analysis::boxing::value::{BoxedValue, IteratorFamily},
    assembly::{
        runtime::{self, ITERATOR_CLASS},
        MethodRef, PrimitiveType, TypeSig, NUMBER_CLASS, OBJECT_CLASS,
    },
};

/// Answers which calls box, unbox or iterate over primitives.
///
/// Implementations must be thread-safe so that one classifier can be shared by passes
/// running on many methods in parallel.
pub trait SymbolClassifier: Send + Sync {
    /// If `method` is a boxing factory, the primitive it wraps.
    fn boxing_factory(&self, method: &MethodRef) -> Option<PrimitiveType>;

    /// If `method` is an unboxing accessor, the primitive it returns.
    fn unboxing_accessor(&self, method: &MethodRef) -> Option<PrimitiveType>;

    /// If `method` creates an iterator over a primitive range, its family and element type.
    fn iterator_source(&self, method: &MethodRef) -> Option<(IteratorFamily, PrimitiveType)>;

    /// Whether `method` is the generic element accessor of an iterator.
    fn is_iterator_next(&self, method: &MethodRef) -> bool;

    /// Whether a cast of `value` to `target` always succeeds.
    fn is_transparent_cast(&self, target: &str, value: &BoxedValue) -> bool;

    /// The primitive element accessor replacing the generic one for `element`.
    fn specialized_next(&self, element: PrimitiveType) -> MethodRef;
}

/// Classifier for the core runtime library's wrapper classes.
///
/// Recognizes:
///
/// - `W.box(p) -> W` where `W` is the wrapper class of primitive `p`
/// - `W.<p>_value() -> p` on the wrapper of `p`; numeric wrappers and `core.Number`
///   also expose the accessors of every other numeric primitive
/// - `R.iterator() -> core.Iterator` on the range and progression classes
/// - `core.Iterator.next() -> core.Object`
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapperSymbols;

impl SymbolClassifier for WrapperSymbols {
    fn boxing_factory(&self, method: &MethodRef) -> Option<PrimitiveType> {
        if method.name != runtime::BOX_METHOD {
            return None;
        }
        let [TypeSig::Primitive(prim)] = method.params.as_slice() else {
            return None;
        };
        let wrapper = prim.wrapper_class();
        (method.owner == wrapper && method.ret.as_class() == Some(wrapper)).then_some(*prim)
    }

    fn unboxing_accessor(&self, method: &MethodRef) -> Option<PrimitiveType> {
        if !method.params.is_empty() {
            return None;
        }
        let prim = method.ret.as_primitive()?;
        if method.name != runtime::unbox_name(prim) {
            return None;
        }
        let declared = if method.owner == NUMBER_CLASS {
            prim.is_numeric()
        } else {
            match PrimitiveType::from_wrapper_class(&method.owner) {
                Some(held) if held == prim => true,
                Some(held) => held.is_numeric() && prim.is_numeric(),
                None => false,
            }
        };
        declared.then_some(prim)
    }

    fn iterator_source(&self, method: &MethodRef) -> Option<(IteratorFamily, PrimitiveType)> {
        if method.name != runtime::ITERATOR_METHOD
            || !method.params.is_empty()
            || method.ret.as_class() != Some(ITERATOR_CLASS)
        {
            return None;
        }
        runtime::range_class(&method.owner).map(|range| (range.family, range.element))
    }

    fn is_iterator_next(&self, method: &MethodRef) -> bool {
        method.owner == ITERATOR_CLASS
            && method.name == runtime::NEXT_METHOD
            && method.params.is_empty()
            && method.ret.as_class() == Some(OBJECT_CLASS)
    }

    fn is_transparent_cast(&self, target: &str, value: &BoxedValue) -> bool {
        let prim = value.boxed_type();
        target == prim.wrapper_class()
            || target == OBJECT_CLASS
            || (target == NUMBER_CLASS && prim.is_numeric())
    }

    fn specialized_next(&self, element: PrimitiveType) -> MethodRef {
        runtime::specialized_next(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::boxing::value::BoxOrigin, assembly::InsnId};

    #[test]
    fn test_boxing_factories() {
        let symbols = WrapperSymbols;
        assert_eq!(
            symbols.boxing_factory(&runtime::box_method(PrimitiveType::Char)),
            Some(PrimitiveType::Char)
        );

        // Right name, wrong owner.
        let mut foreign = runtime::box_method(PrimitiveType::Int);
        foreign.owner = "app.Util".to_string();
        assert_eq!(symbols.boxing_factory(&foreign), None);

        // Right owner, wrong parameter.
        let mut widened = runtime::box_method(PrimitiveType::Int);
        widened.params = vec![PrimitiveType::Long.into()];
        assert_eq!(symbols.boxing_factory(&widened), None);
    }

    #[test]
    fn test_unboxing_accessors() {
        let symbols = WrapperSymbols;
        let own = runtime::unbox_method("core.Int", PrimitiveType::Int);
        assert_eq!(symbols.unboxing_accessor(&own), Some(PrimitiveType::Int));

        let widening = runtime::unbox_method("core.Int", PrimitiveType::Long);
        assert_eq!(symbols.unboxing_accessor(&widening), Some(PrimitiveType::Long));

        let number = runtime::unbox_method(NUMBER_CLASS, PrimitiveType::Double);
        assert_eq!(symbols.unboxing_accessor(&number), Some(PrimitiveType::Double));

        let not_numeric = runtime::unbox_method(NUMBER_CLASS, PrimitiveType::Bool);
        assert_eq!(symbols.unboxing_accessor(&not_numeric), None);

        let char_as_int = runtime::unbox_method("core.Char", PrimitiveType::Int);
        assert_eq!(symbols.unboxing_accessor(&char_as_int), None);
    }

    #[test]
    fn test_iteration_symbols() {
        let symbols = WrapperSymbols;
        assert_eq!(
            symbols.iterator_source(&runtime::iterator_method("core.LongProgression")),
            Some((IteratorFamily::Progression, PrimitiveType::Long))
        );
        assert_eq!(
            symbols.iterator_source(&runtime::iterator_method("app.List")),
            None
        );
        assert!(symbols.is_iterator_next(&runtime::next_method()));
        assert!(!symbols.is_iterator_next(&runtime::has_next_method()));
    }

    #[test]
    fn test_transparent_casts() {
        let symbols = WrapperSymbols;
        let int = BoxedValue::new(InsnId(0), PrimitiveType::Int, BoxOrigin::Factory);
        let boolean = BoxedValue::new(InsnId(1), PrimitiveType::Bool, BoxOrigin::Factory);
        assert!(symbols.is_transparent_cast("core.Int", &int));
        assert!(symbols.is_transparent_cast(NUMBER_CLASS, &int));
        assert!(symbols.is_transparent_cast(OBJECT_CLASS, &boolean));
        assert!(!symbols.is_transparent_cast(NUMBER_CLASS, &boolean));
        assert!(!symbols.is_transparent_cast("core.Long", &int));
    }
}
