//! Sandbox error types.

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A host function was asked to act on memory outside the guest's
    /// linear memory, or the guest's `memory` export is missing.
    #[error("memory error: {0}")]
    MemoryError(String),

    /// Descriptor table exhausted: too many live guest descriptors.
    #[error("descriptor table exhausted")]
    DescriptorsExhausted,

    /// The guest trapped (including a deliberate memory-bounds trap raised
    /// by this runtime).
    #[error("guest trapped: {0}")]
    GuestTrapped(String),
}
