//! Fixed-point frame analysis over method bodies.
//!
//! This module computes, for every instruction position, an abstract [`Frame`] describing
//! the local slots and the operand stack before the instruction executes. The value
//! domain is pluggable through the [`Interpreter`] trait; [`BasicInterpreter`] provides
//! the ordinary one-value-per-type domain that richer domains build on.
//!
//! # Key Types
//!
//! - [`FrameAnalyzer`] - Worklist solver driving an interpreter to a fixpoint
//! - [`Interpreter`] - Transfer functions and join of a value domain
//! - [`Frame`] / [`Frames`] - Per-position state and the analysis result
//! - [`EdgeKind`] - Classification of control flow edges

mod analyzer;
mod basic;
mod edge;
mod frame;
mod interpreter;

pub use analyzer::FrameAnalyzer;
pub use basic::{BasicInterpreter, BasicValue};
pub use edge::{Edge, EdgeKind};
pub use frame::{Frame, Frames};
pub use interpreter::Interpreter;
