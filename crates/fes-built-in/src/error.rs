//! Errors raised by the build pipeline.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use fes_core::error::{ErrorKind, FesError};
use fes_plugin::{BoxError, PluginError};

/// Build pipeline errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// `modifyBundler` resolved to an id missing from the bundler catalog.
    #[error("Unknown bundler '{id}'")]
    UnknownBundler { id: String },

    /// `modifyBundler` returned something other than a bundler id.
    #[error("modifyBundler must resolve to a bundler id, got {value}")]
    InvalidBundler { value: Value },

    /// The bundler backend failed.
    #[error("Bundler '{id}' failed: {source}")]
    Bundler {
        id: String,
        #[source]
        source: BoxError,
    },

    /// Filesystem failure while preparing or writing output.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A hook pipeline failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<BuildError> for FesError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Plugin(e) => e.into(),
            BuildError::Io { .. } => FesError::with_source(ErrorKind::Io, "Build I/O failed", err),
            other => FesError::with_source(ErrorKind::Bundler, other.to_string(), other),
        }
    }
}
