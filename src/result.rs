//! Result and error types representing the outcome of compiling a function.

use std::fmt;

/// A compilation error.
///
/// When Oxbow fails to compile a function, it will return one of these error
/// codes. Bug-class invariant violations (an unallocated virtual register, a
/// callee-save outside the legal set) are not represented here: those are
/// compiler bugs and panic with a diagnostic instead.
#[derive(Debug, PartialEq, Eq)]
pub enum CodegenError {
    /// A feature or calling convention is not supported on the target.
    Unsupported(String),

    /// An implementation limit was exceeded.
    ImplLimitExceeded,

    /// A branch or PC-relative load displacement does not fit in its
    /// instruction's field. The driver may recover by inserting a
    /// trampoline or splitting the function.
    LabelOutOfRange {
        /// Offset of the referencing instruction in the code buffer.
        offset: u32,
        /// The label that could not be reached.
        label: u32,
    },

    /// The IR requested an atomic ordering with no AArch64 realization.
    UnsupportedAtomicOrdering,
}

/// A convenient alias for a `Result` that uses `CodegenError` as the error
/// type.
pub type CodegenResult<T> = Result<T, CodegenError>;

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodegenError::Unsupported(feature) => write!(f, "unsupported: {}", feature),
            CodegenError::ImplLimitExceeded => write!(f, "implementation limit exceeded"),
            CodegenError::LabelOutOfRange { offset, label } => write!(
                f,
                "label out of range: reference at offset {:#x} to label {}",
                offset, label
            ),
            CodegenError::UnsupportedAtomicOrdering => {
                write!(f, "unsupported atomic memory ordering")
            }
        }
    }
}

impl std::error::Error for CodegenError {}
