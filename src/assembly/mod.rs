//! Stack-machine instruction model.
//!
//! This module provides the program representation the optimization passes read and
//! rewrite: an operand-stack instruction set with untyped local slots, explicit branches
//! to labels, and a try/catch table.
//!
//! # Architecture
//!
//! - **Types** (`types`) - primitive, stack and signature types
//! - **Instructions** (`instruction`) - opcodes, operands, flow classification
//! - **Method bodies** (`method`) - instruction arena, order, batch editing
//! - **Builder** (`builder`) - fluent construction with named labels
//! - **Runtime symbols** ([`runtime`]) - the core library's wrapper and iterator methods
//!
//! # Examples
//!
//! ```rust
//! use boxelide::assembly::{MethodBuilder, Opcode, PrimitiveType};
//!
//! let body = MethodBuilder::new("roundtrip")
//!     .param(PrimitiveType::Int)
//!     .returns(PrimitiveType::Int)
//!     .load(0)
//!     .box_value(PrimitiveType::Int)
//!     .unbox(PrimitiveType::Int)
//!     .ret()
//!     .build()?;
//!
//! assert_eq!(body.len(), 4);
//! assert!(matches!(body.instruction_at(1).map(|i| &i.op), Some(Opcode::InvokeStatic(_))));
//! # Ok::<(), boxelide::Error>(())
//! ```

mod builder;
mod instruction;
mod method;
pub mod runtime;
mod types;

pub use builder::MethodBuilder;
pub use instruction::{
    ArithOp, CmpOp, Constant, FieldRef, FlowType, InsnId, Instruction, InstructionCategory,
    LabelId, MethodRef, Opcode, StackBehavior,
};
pub use method::{Edit, MethodBody, TryCatchBlock};
pub use types::{PrimitiveType, StackType, TypeSig, NUMBER_CLASS, OBJECT_CLASS};
