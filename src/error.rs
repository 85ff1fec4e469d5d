//! Error types for socket enumeration.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while enumerating sockets or resolving their owners.
///
/// Cloneable so that cached failures can be handed out to every caller.
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    /// No decoder exists for the host's platform family.
    #[error("could not detect suitable ports manager for platform: {platform}")]
    UnsupportedPlatform { platform: String },

    /// An external command exited non-zero or could not be started.
    #[error("command `{command}` failed with status {status}: {stderr}")]
    CommandExecution {
        command: String,
        status: i32,
        stderr: String,
    },

    /// A record matched the expected layout but a numeric field did not parse.
    #[error("malformed record in {source_name}: invalid {field} `{value}`")]
    MalformedRecord {
        source_name: String,
        field: &'static str,
        value: String,
    },

    /// Structured command output (JSON) could not be decoded.
    #[error("malformed output from {source_name}: {reason}")]
    MalformedOutput { source_name: String, reason: String },

    /// A registry failed to populate; the failure is cached on the registry.
    #[error("{registry} registry unavailable: {message}")]
    RegistryPopulation {
        registry: &'static str,
        message: String,
    },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("something is wrong, looks like {} is a folder", path.display())]
    NotAFile { path: PathBuf },

    /// The socket carries no kernel inode, so its owner cannot be looked up.
    #[error("no inode available to resolve process")]
    NoInode,
}

impl ScanError {
    pub(crate) fn malformed(
        source_name: impl Into<String>,
        field: &'static str,
        value: impl Into<String>,
    ) -> Self {
        ScanError::MalformedRecord {
            source_name: source_name.into(),
            field,
            value: value.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Name of the failing field for [`ScanError::MalformedRecord`].
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ScanError::MalformedRecord { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
