// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # boxelide
//!
//! Redundant boxing and null-check elimination for stack-based bytecode.
//!
//! Front ends for languages with generic containers and primitive wrappers tend to emit
//! code that boxes a primitive only to unbox it again a few instructions later, or that
//! null-tests a wrapper it has just created. `boxelide` finds those wrapper objects with
//! an abstract interpretation over the operand stack and local slots, proves that they
//! never escape, and rewrites the method so the primitive stays unboxed.
//!
//! ## Features
//!
//! - **Boxing elimination** - removes a box site together with its unboxing accessors,
//!   casts and null tests, and specializes generic iterator `next()` calls over ranges
//! - **Null-check elimination** - folds null tests on values that were just boxed
//! - **Sound merging** - a wrapper that meets a different value at a join point is kept
//! - **Parallel pipeline** - passes run to a fixpoint over many methods with `rayon`
//! - **Reference executor** - runs original and optimized bodies to compare behavior
//!
//! ## Quick Start
//!
//! ```rust
//! use boxelide::prelude::*;
//!
//! let mut body = MethodBuilder::new("identity")
//!     .param(PrimitiveType::Int)
//!     .returns(PrimitiveType::Int)
//!     .load(0)
//!     .box_value(PrimitiveType::Int)
//!     .unbox(PrimitiveType::Int)
//!     .ret()
//!     .build()?;
//!
//! let report = RedundantBoxingPass::default().transform(&mut body)?;
//! assert_eq!(report.candidates_eliminated, 1);
//! assert_eq!(body.len(), 2);
//! # Ok::<(), boxelide::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - the instruction model: opcodes, method bodies, batch edits, builder
//! - [`analysis`] - the frame analyzer and the boxing-aware value domain
//! - [`compiler`] - the passes, their shared context, event log and scheduler
//! - [`emulation`] - a concrete executor used to check the passes
//! - [`prelude`] - re-exports of the most commonly used types
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). The passes either improve
//! a method or fail with a diagnostic naming the method and instruction position:
//!
//! ```rust
//! use boxelide::{assembly::MethodBuilder, compiler::RedundantBoxingPass, Error};
//!
//! // Falls off the end: no return.
//! let mut body = MethodBuilder::new("broken").nop().build()?;
//! match RedundantBoxingPass::default().transform(&mut body) {
//!     Err(Error::Analysis { method, index, .. }) => {
//!         assert_eq!(method, "broken");
//!         assert_eq!(index, 0);
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), boxelide::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use boxelide::prelude::*;
///
/// let scheduler = PassScheduler::default();
/// assert!(scheduler.passes.is_empty());
/// ```
pub mod prelude;

pub mod analysis;
pub mod assembly;
pub mod compiler;
pub mod emulation;

/// `boxelide` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `boxelide` Error type
///
/// See [`Error`] for the individual variants.
pub use error::Error;
