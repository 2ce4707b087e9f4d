//! Program analysis over method bodies.
//!
//! The analyses in this module never change a method; they compute facts the passes in
//! [`crate::compiler`] act on.
//!
//! # Architecture
//!
//! - [`frames`] - the generic worklist analyzer computing a [`frames::Frame`] per
//!   instruction for any value domain implementing [`frames::Interpreter`]
//! - [`boxing`] - the boxing-aware value domain: which wrapper objects were created
//!   where, where they flow, and which of them can be removed
//!
//! # Usage
//!
//! ```rust
//! use boxelide::analysis::frames::{BasicInterpreter, BasicValue, FrameAnalyzer};
//! use boxelide::assembly::{MethodBuilder, PrimitiveType, StackType};
//!
//! let body = MethodBuilder::new("negate")
//!     .param(PrimitiveType::Double)
//!     .returns(PrimitiveType::Double)
//!     .load(0)
//!     .neg()
//!     .ret()
//!     .build()?;
//!
//! let frames = FrameAnalyzer::new(BasicInterpreter).analyze(&body)?;
//! let before_return = frames.get(2).expect("reachable");
//! assert_eq!(before_return.stack_top(), Some(&BasicValue::Typed(StackType::Double)));
//! # Ok::<(), boxelide::Error>(())
//! ```

pub mod boxing;
pub mod frames;
