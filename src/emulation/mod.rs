//! Concrete executor for method bodies.
//!
//! The optimization passes never run code; this module exists to check them. It gives
//! the instruction set a concrete semantics so that an original and an optimized method
//! can be executed on the same inputs and their observable behavior compared.
//!
//! # Key Components
//!
//! ## Value System
//! - [`EmValue`] - Runtime value on the stack, in locals, fields and statics
//! - [`HeapRef`] - Reference to a heap-allocated object
//! - [`Observed`] - Identity-insensitive snapshot of a value
//!
//! ## Memory Model
//! - [`ManagedHeap`] - Allocation-only object store with an object limit
//! - [`HeapObject`] - Wrappers, instances, ranges and iterators
//!
//! ## Execution Engine
//! - [`Executor`] - Runs one method body to completion
//! - [`EmulationLimits`] - Step and heap limits
//! - [`Outcome`] - Completion, field and static writes, allocation count
//!
//! The runtime library (wrapper factories and accessors, ranges, iterators) is
//! implemented in [`runtime`].
//!
//! # Comparing Runs
//!
//! ```rust
//! use boxelide::assembly::{MethodBuilder, PrimitiveType};
//! use boxelide::compiler::RedundantBoxingPass;
//! use boxelide::emulation::{EmValue, Executor};
//!
//! let original = MethodBuilder::new("round_trip")
//!     .param(PrimitiveType::Long)
//!     .returns(PrimitiveType::Long)
//!     .load(0)
//!     .box_value(PrimitiveType::Long)
//!     .unbox(PrimitiveType::Long)
//!     .ret()
//!     .build()?;
//! let mut optimized = original.clone();
//! RedundantBoxingPass::default().transform(&mut optimized)?;
//!
//! let before = Executor::new().run(&original, &[EmValue::I64(-3)])?;
//! let after = Executor::new().run(&optimized, &[EmValue::I64(-3)])?;
//! assert!(before.same_observations(&after));
//! assert_eq!((before.allocations, after.allocations), (1, 0));
//! # Ok::<(), boxelide::Error>(())
//! ```

mod executor;
mod heap;
pub mod runtime;
mod value;

pub use executor::{Completion, EmulationLimits, Executor, Outcome, Write};
pub use heap::{HeapObject, ManagedHeap, THROWABLE_CLASS};
pub use value::{EmValue, HeapRef, Observed};
