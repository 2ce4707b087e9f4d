//! Managed heap of the executor.
//!
//! Objects are never freed during a run; a [`HeapRef`] is an index into the allocation
//! list, so allocation order doubles as object identity. The number of allocations is
//! what the soundness checks compare to show that an eliminated box was never created.

use std::collections::{BTreeSet, HashMap};

use crate::{
    assembly::{
        runtime::{primitive_iterator_class, RangeClass, ITERATOR_CLASS},
        PrimitiveType, NUMBER_CLASS, OBJECT_CLASS,
    },
    emulation::value::{EmValue, HeapRef, Observed},
    Error, Result,
};

/// Root of the exception hierarchy raised by the runtime library.
pub const THROWABLE_CLASS: &str = "core.Throwable";

/// A heap-allocated object.
#[derive(Clone, Debug)]
pub enum HeapObject {
    /// A wrapper object, created by a boxing factory or a generic iterator `next()`.
    Boxed {
        /// Primitive held by the wrapper
        prim: PrimitiveType,
        /// The wrapped value, as passed to the factory
        value: EmValue,
    },

    /// An ordinary instance created by `new`.
    Instance {
        /// Class of the instance
        class: String,
        /// Fields that have been written, unset fields read as their type's zero
        fields: HashMap<String, EmValue>,
        /// Whether the class belongs to the runtime's exception hierarchy
        throwable: bool,
    },

    /// A range or progression.
    Range {
        /// The runtime class describing the element type and family
        range: &'static RangeClass,
        /// First element
        first: i64,
        /// Last element, inclusive
        last: i64,
        /// Distance between elements, never zero
        step: i64,
    },

    /// An iterator over a range or progression.
    Iterator {
        /// Element type
        element: PrimitiveType,
        /// Next element to produce
        next: i64,
        /// Last element, inclusive
        last: i64,
        /// Distance between elements
        step: i64,
        /// Set once stepping past `next` would overflow
        exhausted: bool,
    },
}

impl HeapObject {
    /// Runtime class of this object.
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            HeapObject::Boxed { prim, .. } => prim.wrapper_class(),
            HeapObject::Instance { class, .. } => class,
            HeapObject::Range { range, .. } => range.class,
            HeapObject::Iterator { element, .. } => primitive_iterator_class(*element),
        }
    }

    /// Returns `true` if this object passes a `checkcast` to `class`.
    #[must_use]
    pub fn is_instance_of(&self, class: &str) -> bool {
        if class == OBJECT_CLASS || class == self.class_name() {
            return true;
        }
        match self {
            HeapObject::Boxed { prim, .. } => prim.is_numeric() && class == NUMBER_CLASS,
            HeapObject::Instance { throwable, .. } => *throwable && class == THROWABLE_CLASS,
            HeapObject::Range { .. } => false,
            HeapObject::Iterator { .. } => class == ITERATOR_CLASS,
        }
    }

    /// Returns `true` while an iterator has elements left.
    #[must_use]
    pub fn has_next(&self) -> bool {
        match self {
            HeapObject::Iterator {
                next,
                last,
                step,
                exhausted,
                ..
            } => !*exhausted && if *step > 0 { next <= last } else { next >= last },
            _ => false,
        }
    }
}

/// Allocation-only object store.
#[derive(Debug, Default)]
pub struct ManagedHeap {
    objects: Vec<HeapObject>,
    max_objects: usize,
}

impl ManagedHeap {
    /// Creates an empty heap holding at most `max_objects` objects.
    #[must_use]
    pub fn new(max_objects: usize) -> Self {
        ManagedHeap {
            objects: Vec::new(),
            max_objects,
        }
    }

    /// Number of objects allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Allocates an object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the heap is full.
    pub fn alloc(&mut self, object: HeapObject) -> Result<HeapRef> {
        if self.objects.len() >= self.max_objects {
            return Err(Error::Emulation(format!(
                "heap limit of {} objects exceeded",
                self.max_objects
            )));
        }
        self.objects.push(object);
        Ok(HeapRef((self.objects.len() - 1) as u64))
    }

    /// Allocates a wrapper object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the heap is full.
    pub fn alloc_boxed(&mut self, prim: PrimitiveType, value: EmValue) -> Result<HeapRef> {
        self.alloc(HeapObject::Boxed { prim, value })
    }

    /// Allocates an instance with all fields unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the heap is full.
    pub fn alloc_instance(&mut self, class: &str) -> Result<HeapRef> {
        self.alloc(HeapObject::Instance {
            class: class.to_string(),
            fields: HashMap::new(),
            throwable: false,
        })
    }

    /// Allocates an exception raised by the runtime itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] if the heap is full.
    pub fn alloc_exception(&mut self, class: &str) -> Result<HeapRef> {
        self.alloc(HeapObject::Instance {
            class: class.to_string(),
            fields: HashMap::new(),
            throwable: true,
        })
    }

    /// Looks up an object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] for a dangling reference.
    pub fn get(&self, heap_ref: HeapRef) -> Result<&HeapObject> {
        usize::try_from(heap_ref.0)
            .ok()
            .and_then(|index| self.objects.get(index))
            .ok_or_else(|| Error::Emulation(format!("dangling reference {heap_ref}")))
    }

    /// Looks up an object for modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] for a dangling reference.
    pub fn get_mut(&mut self, heap_ref: HeapRef) -> Result<&mut HeapObject> {
        usize::try_from(heap_ref.0)
            .ok()
            .and_then(|index| self.objects.get_mut(index))
            .ok_or_else(|| Error::Emulation(format!("dangling reference {heap_ref}")))
    }

    /// Renders a value, following references into a deep snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emulation`] for a dangling reference.
    pub fn observe(&self, value: EmValue) -> Result<Observed> {
        self.observe_inner(value, &mut BTreeSet::new())
    }

    fn observe_inner(&self, value: EmValue, visiting: &mut BTreeSet<HeapRef>) -> Result<Observed> {
        let EmValue::ObjectRef(heap_ref) = value else {
            return Ok(Observed::from(value));
        };
        if !visiting.insert(heap_ref) {
            return Ok(Observed::Cycle);
        }

        let observed = match self.get(heap_ref)? {
            HeapObject::Boxed { prim, value } => {
                Observed::Boxed(*prim, Box::new(self.observe_inner(*value, visiting)?))
            }
            HeapObject::Instance { class, fields, .. } => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                let mut rendered = Vec::with_capacity(names.len());
                for name in names {
                    if let Some(field) = fields.get(name) {
                        rendered.push((name.clone(), self.observe_inner(*field, visiting)?));
                    }
                }
                Observed::Object {
                    class: class.clone(),
                    fields: rendered,
                }
            }
            HeapObject::Range {
                range,
                first,
                last,
                step,
            } => Observed::Runtime {
                class: range.class.to_string(),
                state: (*first, *last, *step),
            },
            HeapObject::Iterator {
                element,
                next,
                last,
                step,
                ..
            } => Observed::Runtime {
                class: primitive_iterator_class(*element).to_string(),
                state: (*next, *last, *step),
            },
        };

        visiting.remove(&heap_ref);
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tests() {
        let mut heap = ManagedHeap::new(16);
        let int = heap.alloc_boxed(PrimitiveType::Int, EmValue::I32(1)).unwrap();
        let flag = heap.alloc_boxed(PrimitiveType::Bool, EmValue::I32(1)).unwrap();

        let int = heap.get(int).unwrap();
        assert!(int.is_instance_of("core.Int"));
        assert!(int.is_instance_of(NUMBER_CLASS));
        assert!(int.is_instance_of(OBJECT_CLASS));
        assert!(!int.is_instance_of("core.Long"));

        let flag = heap.get(flag).unwrap();
        assert!(!flag.is_instance_of(NUMBER_CLASS));
    }

    #[test]
    fn test_heap_limit() {
        let mut heap = ManagedHeap::new(1);
        heap.alloc_instance("a.B").unwrap();
        assert!(matches!(heap.alloc_instance("a.B"), Err(Error::Emulation(_))));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_observe_ignores_identity() {
        let mut heap = ManagedHeap::new(16);
        let first = heap.alloc_boxed(PrimitiveType::Long, EmValue::I64(7)).unwrap();
        let second = heap.alloc_boxed(PrimitiveType::Long, EmValue::I64(7)).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            heap.observe(EmValue::ObjectRef(first)).unwrap(),
            heap.observe(EmValue::ObjectRef(second)).unwrap()
        );
    }

    #[test]
    fn test_observe_cycles() {
        let mut heap = ManagedHeap::new(16);
        let node = heap.alloc_instance("a.Node").unwrap();
        if let HeapObject::Instance { fields, .. } = heap.get_mut(node).unwrap() {
            fields.insert("next".to_string(), EmValue::ObjectRef(node));
        }
        let observed = heap.observe(EmValue::ObjectRef(node)).unwrap();
        assert_eq!(
            observed,
            Observed::Object {
                class: "a.Node".to_string(),
                fields: vec![("next".to_string(), Observed::Cycle)],
            }
        );
    }
}
