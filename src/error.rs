//! Crate-wide error taxonomy, mirroring apiserver status conventions.

use crate::apply::Conflicts;

/// Error covers every failure mode of the storage, patch, registry and
/// admission layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested object does not exist in its store.
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// Create was attempted for an id that is already present.
    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists { kind: String, name: String },

    /// The request document is invalid: malformed CRD spec, keyless
    /// array patch, schema violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An admission configuration field that this server does not
    /// implement was set.
    #[error("unsupported admission configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The admission webhook HTTP round trip failed.
    #[error("webhook transport error: {0}")]
    Transport(String),

    /// Server-side apply hit fields owned by other managers and force
    /// was not set.
    #[error("apply failed: {0}")]
    Conflict(Conflicts),

    /// The admission webhook disallowed the request.
    #[error("admission webhook \"{webhook}\" denied the request: {message}")]
    AdmissionDenied { webhook: String, message: String },
}

impl Error {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True for NotFound, matching callers that treat absence as a
    /// non-fatal outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
