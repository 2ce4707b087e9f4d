use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// None of these errors are expected on well-formed input. The optimization passes either
/// silently improve a method or abort with one of the diagnostics below, each of which names
/// the offending method and, where it applies, the instruction position.
///
/// # Error Categories
///
/// ## Analysis Errors
/// - [`Error::Analysis`] - The frame analyzer could not compute frames for a method
/// - [`Error::InvariantViolation`] - A rewrite site did not have the expected shape
///
/// ## Instruction List Errors
/// - [`Error::InvalidEdit`] - A batch edit referenced an instruction that is not live
/// - [`Error::UnresolvedLabel`] - A builder branch names a label that was never placed
/// - [`Error::Malformed`] - Internal inconsistency in a method body
///
/// ## Emulation Errors
/// - [`Error::Emulation`] - The executor hit a type error or an unsupported operation
/// - [`Error::StepLimit`] - The executor ran out of its step budget
///
/// # Examples
///
/// ```rust
/// use boxelide::{assembly::MethodBuilder, Error};
///
/// let result = MethodBuilder::new("broken").goto("nowhere").build();
/// assert!(matches!(result, Err(Error::UnresolvedLabel(_))));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The frame analyzer failed on a method body.
    ///
    /// Raised for stack underflow, inconsistent stack heights at a join point,
    /// branches to labels that do not exist, or control falling off the end of
    /// the body. This is treated as an internal compiler error: silently skipping
    /// the optimization could mask a front-end bug.
    #[error("Analysis of '{method}' failed at instruction {index}: {message}")]
    Analysis {
        /// Name of the method being analyzed
        method: String,
        /// Position of the instruction in the method body
        index: usize,
        /// What went wrong
        message: String,
    },

    /// A rewrite encountered an instruction it cannot handle.
    ///
    /// For example, a null-test rewrite site whose opcode is neither `ifnull` nor
    /// `ifnonnull`. Continuing would risk emitting incorrect bytecode.
    #[error("Invariant violated in '{method}' at instruction {index}: {message}")]
    InvariantViolation {
        /// Name of the method being rewritten
        method: String,
        /// Position of the instruction in the method body
        index: usize,
        /// What went wrong
        message: String,
    },

    /// A batch edit referenced an instruction that is not part of the method body.
    #[error("Invalid edit - {0}")]
    InvalidEdit(String),

    /// A branch in a [`crate::assembly::MethodBuilder`] references an unknown label.
    #[error("Unresolved label - {0}")]
    UnresolvedLabel(String),

    /// The method body is internally inconsistent.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The executor could not run an instruction.
    #[error("Emulation failed - {0}")]
    Emulation(String),

    /// The executor exceeded its configured step budget.
    #[error("Reached the maximum number of emulation steps - {0}")]
    StepLimit(usize),
}

impl Error {
    /// Creates an [`Error::Analysis`] for the given method and instruction position.
    pub(crate) fn analysis(method: &str, index: usize, message: impl Into<String>) -> Self {
        Error::Analysis {
            method: method.to_string(),
            index,
            message: message.into(),
        }
    }

    /// Creates an [`Error::InvariantViolation`] for the given method and instruction position.
    pub(crate) fn invariant(method: &str, index: usize, message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            method: method.to_string(),
            index,
            message: message.into(),
        }
    }
}
