//! Error Types
//!
//! All failures in this crate are local, synchronous and non-unwinding:
//! lookups degrade to `Option`, fallible operations return [`Result<T>`]
//! with a [`GfxError`], and refcount underflow is a logged no-op. Nothing
//! in the registry or GPU-sync layer panics on bad input.

use thiserror::Error;

/// The error type for registry and GPU synchronization operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    // ========================================================================
    // Registry errors
    // ========================================================================
    /// `create` was called with a UUID that is already registered.
    /// Callers needing idempotence should use `get_or_create`.
    #[error("resource uuid '{0}' already exists")]
    DuplicateUuid(String),

    /// The handle is stale (generation mismatch) or out of range.
    #[error("invalid or stale handle")]
    InvalidHandle,

    /// The pool or map could not grow / find a slot; the data structure is
    /// left in its last-valid state.
    #[error("allocation failed: {0}")]
    AllocationFailed(&'static str),

    /// A required argument was missing or empty (e.g. material name,
    /// shader vertex/fragment source).
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    // ========================================================================
    // GPU errors
    // ========================================================================
    /// No [`GpuOps`](crate::gpu::ops::GpuOps) backend has been installed.
    #[error("GPU ops not set")]
    NoGpuOps,

    /// The share-group registry is at capacity.
    #[error("share group registry full ({0} groups)")]
    ShareGroupsFull(usize),

    /// The backend failed to upload the resource. The CPU-side data and its
    /// version are untouched so a corrected retry can succeed.
    #[error("GPU upload failed for '{0}'")]
    UploadFailed(String),

    /// The backend failed to compile/link the shader program.
    #[error("shader compile failed for '{0}'")]
    CompileFailed(String),

    /// The resource has no data to upload (mesh without vertices, texture
    /// without pixels, shader without sources).
    #[error("resource '{0}' has no data")]
    NoData(String),
}

/// Convenience alias used by all fallible APIs in this crate.
pub type Result<T> = std::result::Result<T, GfxError>;
