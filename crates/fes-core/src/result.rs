//! Convenience result type alias for Fes.

use crate::error::FesError;

/// A specialized `Result` type for Fes operations.
pub type FesResult<T> = Result<T, FesError>;
