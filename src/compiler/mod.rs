//! Compiler infrastructure for the boxing passes.
//!
//! This module turns the analyses of [`crate::analysis::boxing`] into rewrites of method
//! bodies and runs them over many methods:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Boxing Pipeline                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state                       │
//! │    ├─ Method bodies           (DashMap, keyed by name)           │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler                Fixpoint execution                 │
//! │    ├─ RedundantNullCheckPass  (null tests on fresh boxes)        │
//! │    └─ RedundantBoxingPass     (box/unbox round trips)            │
//! │    Each pass repeats until stable, then the sequence repeats     │
//! │                                                                  │
//! │  MethodPass trait             Interface for all passes           │
//! │  BoxingConfig                 Transparent ops, limits, rayon     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use boxelide::analysis::boxing::{SymbolClassifier, WrapperSymbols};
//! use boxelide::assembly::{MethodBuilder, PrimitiveType};
//! use boxelide::compiler::{BoxingConfig, CompilerContext, PassScheduler};
//!
//! let body = MethodBuilder::new("identity")
//!     .param(PrimitiveType::Int)
//!     .returns(PrimitiveType::Int)
//!     .load(0)
//!     .box_value(PrimitiveType::Int)
//!     .unbox(PrimitiveType::Int)
//!     .ret()
//!     .build()?;
//!
//! let ctx = CompilerContext::with_methods([body]);
//! let symbols: Arc<dyn SymbolClassifier> = Arc::new(WrapperSymbols);
//! let mut scheduler = PassScheduler::boxing_pipeline(&symbols, &BoxingConfig::default());
//! scheduler.run_pipeline(&ctx)?;
//!
//! assert_eq!(ctx.method("identity").map(|m| m.len()), Some(2));
//! assert_eq!(ctx.stats().boxings_eliminated, 1);
//! # Ok::<(), boxelide::Error>(())
//! ```

mod config;
mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use config::{BoxingConfig, TransparentOps};
pub use context::CompilerContext;
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog, EventLogIter};
pub use pass::MethodPass;
pub use passes::{BoxingReport, NullCheckReport, RedundantBoxingPass, RedundantNullCheckPass};
pub use scheduler::PassScheduler;
