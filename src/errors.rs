use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// All error types that can occur when storing session state or talking to a bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A storage backend operation failed.
    #[error("storage {action} error: {err:?}")]
    Storage { action: String, err: std::io::Error },

    /// The storage backend refused access (permissions or policy).
    #[error("storage at {path:?} is blocked by security settings")]
    StorageBlocked { path: PathBuf },

    /// A bridge request was made before an IP and username were stored.
    #[error("bridge address or username has not been set")]
    MissingCredentials,

    /// The HTTP transport failed while talking to the bridge.
    #[error("bridge transport error: {0}")]
    Transport(String),

    /// The bridge did not answer in time.
    #[error("timeout: bridge did not respond")]
    Timeout,

    /// The bridge answered with an error object.
    #[error("bridge error {kind} at {address}: {description}")]
    Bridge {
        kind: u16,
        address: String,
        description: String,
    },

    /// The bridge answered, but not with the expected resource.
    #[error("invalid bridge response")]
    InvalidBridgeResponse,

    /// Attempted to send a [`crate::StatePayload`] with no attributes set.
    #[error("invalid payload; no attributes set")]
    NoAttribute,

    /// Failed to parse a [`crate::Rgb255`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),
}

impl Error {
    /// Create a new storage error, mapping permission failures to [`Error::StorageBlocked`].
    pub fn storage(action: &str, path: &Path, err: std::io::Error) -> Self {
        if err.kind() == ErrorKind::PermissionDenied {
            return Error::StorageBlocked {
                path: path.to_path_buf(),
            };
        }
        Error::Storage {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new bridge error from the fields of a bridge error object.
    pub fn bridge(kind: u16, address: &str, description: &str) -> Self {
        Error::Bridge {
            kind,
            address: address.to_string(),
            description: description.to_string(),
        }
    }

    /// Returns true for security-class storage failures.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Error::StorageBlocked { .. })
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
