use formweave_core::{ErrorKind, SchemaError};

/// All errors that can be returned by a storage or cache backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No document is stored under `id`.
    #[error("schema not found: {id}")]
    NotFound { id: String },

    /// The document exists but `version` is not in its history.
    #[error("version {version} of schema {id} not found")]
    VersionNotFound { id: String, version: String },

    /// A write precondition did not hold: the document was created or
    /// changed by someone else first.
    #[error("write conflict on schema {id}: {reason}")]
    Conflict { id: String, reason: String },

    /// The operation was abandoned before completing.
    #[error("storage operation cancelled")]
    Cancelled,

    /// A backend-specific failure (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for SchemaError {
    fn from(e: StorageError) -> Self {
        let message = e.to_string();
        match e {
            StorageError::NotFound { id } => SchemaError::not_found(message)
                .with_code("schema_not_found")
                .with_detail("id", id),
            StorageError::VersionNotFound { id, version } => SchemaError::not_found(message)
                .with_code("version_not_found")
                .with_detail("id", id)
                .with_detail("version", version),
            StorageError::Conflict { id, .. } => SchemaError::conflict(message)
                .with_code("write_conflict")
                .with_detail("id", id),
            StorageError::Cancelled => SchemaError::cancelled(),
            StorageError::Backend(_) => {
                SchemaError::new(ErrorKind::Internal, message).with_code("storage_backend")
            }
        }
    }
}
