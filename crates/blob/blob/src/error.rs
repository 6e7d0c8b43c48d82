use thiserror::Error;

/// Errors surfaced by blob store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested blob does not exist at the addressed location.
    #[error("blob '{blob}' not found in container '{container}'")]
    BlobNotFound {
        /// Container the blob was looked up in.
        container: String,
        /// Name of the missing blob.
        blob: String,
    },

    /// The addressed container does not exist.
    #[error("container '{0}' not found")]
    ContainerNotFound(String),

    /// The credentials do not permit the attempted operation.
    #[error("authorization failed: {0}")]
    Unauthorized(String),

    /// A signed URL was rejected (bad signature or past its validity).
    #[error("signed url rejected: {0}")]
    SignedUrlRejected(String),

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The blob address is malformed or unsupported by this store.
    #[error("invalid blob address: {0}")]
    InvalidAddress(String),

    /// A storage backend error occurred.
    #[error("storage error: {0}")]
    Storage(String),
}
