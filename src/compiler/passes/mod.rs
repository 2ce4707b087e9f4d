//! The boxing pipeline's passes.
//!
//! - [`RedundantNullCheckPass`] - removes null tests on values that were just boxed
//! - [`RedundantBoxingPass`] - removes box sites whose values are only unboxed again
//!
//! Both passes are idempotent and can also be used on their own through their
//! `transform` methods.

mod boxing;
mod nullcheck;

pub use boxing::{BoxingReport, RedundantBoxingPass};
pub use nullcheck::{NullCheckReport, RedundantNullCheckPass};
