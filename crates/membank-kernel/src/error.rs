//! Kernel-specific error types.

use membank_types::error::MembankError;
use thiserror::Error;

/// Kernel error type wrapping MembankError with boot context.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A wrapped MembankError.
    #[error(transparent)]
    Membank(#[from] MembankError),

    /// The context could not be assembled.
    #[error("Boot failed: {0}")]
    BootFailed(String),
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
