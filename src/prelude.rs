//! # boxelide Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the boxelide library. Import this module to build method bodies, run the passes
//! and inspect what they changed.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all boxelide operations
pub use crate::Error;

/// The result type used throughout boxelide
pub use crate::Result;

// ================================================================================================
// Instruction Model
// ================================================================================================

/// Method bodies, batch edits and the fluent builder
pub use crate::assembly::{Edit, InsnId, MethodBody, MethodBuilder, Opcode, TryCatchBlock};

/// Types and member references
pub use crate::assembly::{FieldRef, MethodRef, PrimitiveType, StackType, TypeSig};

// ================================================================================================
// Analysis
// ================================================================================================

/// Frame analysis
pub use crate::analysis::frames::{Frame, FrameAnalyzer, Frames, Interpreter};

/// Boxing-aware values and interpreters
pub use crate::analysis::boxing::{
    AbstractValue, BoxedValue, BoxingInterpreter, RedundantBoxingInterpreter, SymbolClassifier,
    TransparentOps, WrapperSymbols,
};

// ================================================================================================
// Passes and Pipeline
// ================================================================================================

/// Passes, reports and the scheduler
pub use crate::compiler::{
    BoxingConfig, BoxingReport, CompilerContext, EventKind, EventLog, MethodPass,
    NullCheckReport, PassScheduler, RedundantBoxingPass, RedundantNullCheckPass,
};

// ================================================================================================
// Emulation
// ================================================================================================

/// Reference executor
pub use crate::emulation::{Completion, EmValue, Executor, Observed, Outcome};
