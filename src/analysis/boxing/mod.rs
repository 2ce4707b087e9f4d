//! Boxing-aware abstract interpretation.
//!
//! This module refines the ordinary frame analysis with values that remember the
//! instruction that boxed them. It is the analysis half of boxing elimination: it finds
//! wrapper objects whose every use is an exactly-typed unboxing, a cast that cannot fail
//! or a null test, and which never meet a different value at a join point.
//!
//! # Architecture
//!
//! - [`value`] - the [`AbstractValue`] domain and the per-site [`BoxedRecord`]
//! - [`symbols`] - the [`SymbolClassifier`] seam that recognizes wrapper calls
//! - [`BoxingInterpreter`] - recognition, parameterized by a [`BoxingHooks`] strategy
//! - [`CandidateSet`] - the union-find candidate set used by [`CandidateTracking`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use boxelide::analysis::boxing::{
//!     BoxingInterpreter, CandidateTracking, TransparentOps, WrapperSymbols,
//! };
//! use boxelide::analysis::frames::FrameAnalyzer;
//! use boxelide::assembly::{MethodBuilder, PrimitiveType};
//!
//! let body = MethodBuilder::new("round_trip")
//!     .param(PrimitiveType::Int)
//!     .returns(PrimitiveType::Int)
//!     .load(0)
//!     .box_value(PrimitiveType::Int)
//!     .unbox(PrimitiveType::Int)
//!     .ret()
//!     .build()?;
//!
//! let interpreter = BoxingInterpreter::with_hooks(
//!     Arc::new(WrapperSymbols),
//!     TransparentOps::default(),
//!     CandidateTracking::new(),
//! );
//! let mut analyzer = FrameAnalyzer::new(interpreter);
//! analyzer.analyze(&body)?;
//! assert_eq!(analyzer.interpreter().final_candidates().count(), 1);
//! # Ok::<(), boxelide::Error>(())
//! ```

mod candidates;
mod interpreter;
mod redundant;
pub mod symbols;
pub mod value;

pub use candidates::CandidateSet;
pub use interpreter::{BoxingHooks, BoxingInterpreter, EscapeReason, PlainRecognition, TransparentOps};
pub use redundant::{CandidateTracking, RedundantBoxingInterpreter};
pub use symbols::{SymbolClassifier, WrapperSymbols};
pub use value::{AbstractValue, BoxOrigin, BoxedRecord, BoxedValue, IteratorFamily, IteratorValue};
