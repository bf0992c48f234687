//! Convenience result type alias for Quill.

use crate::error::AppError;

/// A specialized `Result` type for Quill operations.
///
/// Plugin behavior failures never travel through this type; they are
/// recorded as plugin state by the host instead.
pub type AppResult<T> = Result<T, AppError>;
