//! Concrete semantics of the core runtime library.
//!
//! Only the calls named in [`crate::assembly::runtime`] are supported: wrapper factories
//! and accessors, range and progression factories, and the iterator protocol. Failures a
//! real runtime would report as exceptions come back as [`Invocation::Throw`]; calls the
//! executor does not know are [`Error::Emulation`].

use strum::IntoEnumIterator;

use crate::{
    assembly::{
        runtime::{
            range_class, unbox_name, IteratorFamily, BOX_METHOD, HAS_NEXT_METHOD, ITERATOR_METHOD,
            NEXT_METHOD, RANGE_FACTORY,
        },
        MethodRef, PrimitiveType, StackType, TypeSig,
    },
    emulation::{
        heap::{HeapObject, ManagedHeap},
        value::{EmValue, HeapRef},
    },
    Error, Result,
};

/// Raised when a `null` receiver is dereferenced.
pub const NULL_POINTER_EXCEPTION: &str = "core.NullPointerException";
/// Raised by a failing `checkcast` or a mismatched unboxing accessor.
pub const CLASS_CAST_EXCEPTION: &str = "core.ClassCastException";
/// Raised by integer division by zero.
pub const ARITHMETIC_EXCEPTION: &str = "core.ArithmeticException";
/// Raised by `next()` on an exhausted iterator.
pub const NO_SUCH_ELEMENT_EXCEPTION: &str = "core.NoSuchElementException";
/// Raised by a progression factory with a zero step.
pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "core.IllegalArgumentException";

/// Result of a runtime library call.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The call completed, with a value unless it returns `void`
    Return(Option<EmValue>),
    /// The call raised an exception of the named class
    Throw(&'static str),
}

/// Executes a static call.
///
/// # Errors
///
/// Returns [`Error::Emulation`] for an unknown method or ill-typed arguments.
pub fn invoke_static(heap: &mut ManagedHeap, method: &MethodRef, args: &[EmValue]) -> Result<Invocation> {
    if method.name == BOX_METHOD {
        if let Some(prim) = PrimitiveType::from_wrapper_class(&method.owner) {
            if method.params == [TypeSig::Primitive(prim)] {
                let value = single(args, prim.stack_type(), method)?;
                let boxed = heap.alloc_boxed(prim, value)?;
                return Ok(Invocation::Return(Some(EmValue::ObjectRef(boxed))));
            }
        }
    }

    if method.name == RANGE_FACTORY {
        if let Some(range) = range_class(&method.owner) {
            let bounds = args
                .iter()
                .map(|arg| match (range.element, arg) {
                    (PrimitiveType::Long, EmValue::I64(v)) => Ok(*v),
                    (PrimitiveType::Long, _) => Err(unsupported(method)),
                    (_, EmValue::I32(v)) => Ok(i64::from(*v)),
                    _ => Err(unsupported(method)),
                })
                .collect::<Result<Vec<i64>>>()?;
            let (first, last, step) = match (range.family, bounds.as_slice()) {
                (IteratorFamily::Range, [first, last]) => (*first, *last, 1),
                (IteratorFamily::Progression, [first, last, step]) => (*first, *last, *step),
                _ => return Err(unsupported(method)),
            };
            if step == 0 {
                return Ok(Invocation::Throw(ILLEGAL_ARGUMENT_EXCEPTION));
            }
            let object = heap.alloc(HeapObject::Range {
                range,
                first,
                last,
                step,
            })?;
            return Ok(Invocation::Return(Some(EmValue::ObjectRef(object))));
        }
    }

    Err(unsupported(method))
}

/// Executes an instance call on `receiver`.
///
/// # Errors
///
/// Returns [`Error::Emulation`] for an unknown method or a receiver that does not
/// support it.
pub fn invoke_virtual(
    heap: &mut ManagedHeap,
    method: &MethodRef,
    receiver: EmValue,
    args: &[EmValue],
) -> Result<Invocation> {
    let Some(target) = receiver.as_object()? else {
        return Ok(Invocation::Throw(NULL_POINTER_EXCEPTION));
    };
    if !args.is_empty() {
        return Err(unsupported(method));
    }

    match heap.get(target)?.clone() {
        HeapObject::Boxed { prim, value } => {
            let Some(wanted) = PrimitiveType::iter().find(|p| unbox_name(*p) == method.name) else {
                return Err(unsupported(method));
            };
            if prim != wanted && !(prim.is_numeric() && wanted.is_numeric()) {
                return Ok(Invocation::Throw(CLASS_CAST_EXCEPTION));
            }
            Ok(Invocation::Return(Some(value.convert_primitive(prim, wanted)?)))
        }
        HeapObject::Range {
            range,
            first,
            last,
            step,
        } if method.name == ITERATOR_METHOD => {
            let iterator = heap.alloc(HeapObject::Iterator {
                element: range.element,
                next: first,
                last,
                step,
                exhausted: false,
            })?;
            Ok(Invocation::Return(Some(EmValue::ObjectRef(iterator))))
        }
        HeapObject::Iterator { element, .. } => {
            if method.name == HAS_NEXT_METHOD {
                let has_next = heap.get(target)?.has_next();
                return Ok(Invocation::Return(Some(EmValue::I32(i32::from(has_next)))));
            }
            let specialized = format!("{NEXT_METHOD}_{}", element.name());
            if method.name != NEXT_METHOD && method.name != specialized {
                return Err(unsupported(method));
            }
            let Some(raw) = advance(heap, target)? else {
                return Ok(Invocation::Throw(NO_SUCH_ELEMENT_EXCEPTION));
            };
            let value = element_value(element, raw);
            if method.name == NEXT_METHOD {
                let boxed = heap.alloc_boxed(element, value)?;
                Ok(Invocation::Return(Some(EmValue::ObjectRef(boxed))))
            } else {
                Ok(Invocation::Return(Some(value)))
            }
        }
        _ => Err(unsupported(method)),
    }
}

/// Takes the next element of an iterator, `None` when exhausted.
fn advance(heap: &mut ManagedHeap, iterator: HeapRef) -> Result<Option<i64>> {
    let object = heap.get_mut(iterator)?;
    if !object.has_next() {
        return Ok(None);
    }
    let HeapObject::Iterator {
        next,
        step,
        exhausted,
        ..
    } = object
    else {
        return Ok(None);
    };
    let current = *next;
    match current.checked_add(*step) {
        Some(following) => *next = following,
        None => *exhausted = true,
    }
    Ok(Some(current))
}

#[allow(clippy::cast_possible_truncation)]
fn element_value(element: PrimitiveType, raw: i64) -> EmValue {
    match element {
        PrimitiveType::Long => EmValue::I64(raw),
        _ => EmValue::I32(raw as i32),
    }
}

fn single(args: &[EmValue], expected: StackType, method: &MethodRef) -> Result<EmValue> {
    match args {
        [value] if value.stack_type() == expected => Ok(*value),
        _ => Err(unsupported(method)),
    }
}

fn unsupported(method: &MethodRef) -> Error {
    Error::Emulation(format!("unsupported call {method}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::runtime::{
        box_method, has_next_method, iterator_method, next_method, range_factory,
        specialized_next, unbox_method,
    };

    fn returned(invocation: Invocation) -> EmValue {
        match invocation {
            Invocation::Return(Some(value)) => value,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_box_and_unbox() {
        let mut heap = ManagedHeap::new(16);
        let boxed = returned(
            invoke_static(&mut heap, &box_method(PrimitiveType::Int), &[EmValue::I32(41)]).unwrap(),
        );
        let exact = unbox_method("core.Int", PrimitiveType::Int);
        assert_eq!(returned(invoke_virtual(&mut heap, &exact, boxed, &[]).unwrap()), EmValue::I32(41));

        let widened = unbox_method("core.Number", PrimitiveType::Long);
        assert_eq!(
            returned(invoke_virtual(&mut heap, &widened, boxed, &[]).unwrap()),
            EmValue::I64(41)
        );

        let wrong = unbox_method("core.Boolean", PrimitiveType::Bool);
        assert_eq!(
            invoke_virtual(&mut heap, &wrong, boxed, &[]).unwrap(),
            Invocation::Throw(CLASS_CAST_EXCEPTION)
        );
        assert_eq!(
            invoke_virtual(&mut heap, &exact, EmValue::Null, &[]).unwrap(),
            Invocation::Throw(NULL_POINTER_EXCEPTION)
        );
    }

    #[test]
    fn test_progression_iteration() {
        let mut heap = ManagedHeap::new(64);
        let class = range_class("core.IntProgression").unwrap();
        let progression = returned(
            invoke_static(
                &mut heap,
                &range_factory(class),
                &[EmValue::I32(10), EmValue::I32(4), EmValue::I32(-3)],
            )
            .unwrap(),
        );
        let iterator = returned(
            invoke_virtual(&mut heap, &iterator_method(class.class), progression, &[]).unwrap(),
        );

        let mut seen = Vec::new();
        while returned(invoke_virtual(&mut heap, &has_next_method(), iterator, &[]).unwrap())
            == EmValue::I32(1)
        {
            let next = specialized_next(PrimitiveType::Int);
            seen.push(returned(invoke_virtual(&mut heap, &next, iterator, &[]).unwrap()));
        }
        assert_eq!(seen, vec![EmValue::I32(10), EmValue::I32(7), EmValue::I32(4)]);
        assert_eq!(
            invoke_virtual(&mut heap, &next_method(), iterator, &[]).unwrap(),
            Invocation::Throw(NO_SUCH_ELEMENT_EXCEPTION)
        );
    }

    #[test]
    fn test_generic_next_allocates() {
        let mut heap = ManagedHeap::new(64);
        let class = range_class("core.LongRange").unwrap();
        let range = returned(
            invoke_static(&mut heap, &range_factory(class), &[EmValue::I64(1), EmValue::I64(1)])
                .unwrap(),
        );
        let iterator =
            returned(invoke_virtual(&mut heap, &iterator_method(class.class), range, &[]).unwrap());
        let before = heap.len();
        let element = returned(invoke_virtual(&mut heap, &next_method(), iterator, &[]).unwrap());
        assert_eq!(heap.len(), before + 1);
        assert!(matches!(
            heap.observe(element).unwrap(),
            crate::emulation::Observed::Boxed(PrimitiveType::Long, _)
        ));
    }

    #[test]
    fn test_zero_step_and_unknown_calls() {
        let mut heap = ManagedHeap::new(16);
        let class = range_class("core.LongProgression").unwrap();
        let zero = [EmValue::I64(0), EmValue::I64(5), EmValue::I64(0)];
        assert_eq!(
            invoke_static(&mut heap, &range_factory(class), &zero).unwrap(),
            Invocation::Throw(ILLEGAL_ARGUMENT_EXCEPTION)
        );
        let unknown = MethodRef::new("app.Util", "helper", Vec::new(), TypeSig::Void);
        assert!(matches!(
            invoke_static(&mut heap, &unknown, &[]),
            Err(Error::Emulation(_))
        ));
    }
}
