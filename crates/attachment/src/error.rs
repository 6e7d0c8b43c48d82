use claimcheck_blob::StoreError;
use thiserror::Error;

/// Errors surfaced by the claim-check transforms.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The configuration is invalid. Raised at component construction,
    /// before any store I/O.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The blob referenced by a received message could not be resolved.
    #[error(
        "blob '{blob_name}' under container '{container}' cannot be found; \
         check the configured container_name and blob_name_property for correct values"
    )]
    BlobUnresolvable {
        /// Name of the blob the message referenced.
        blob_name: String,
        /// Container the blob was expected in.
        container: String,
        /// Store-level failure behind this error.
        #[source]
        source: StoreError,
    },

    /// The blob behind an embedded signed URL could not be resolved.
    #[error("blob '{blob_name}' behind the embedded signed url cannot be found")]
    SignedUrlUnresolvable {
        /// Name of the blob the signed URL pointed at.
        blob_name: String,
        /// Store-level failure behind this error.
        #[source]
        source: StoreError,
    },

    /// A message property that should carry a string holds something
    /// else.
    #[error("message property '{property}' holds a non-string value")]
    InvalidPropertyValue {
        /// Name of the offending property.
        property: String,
    },

    /// A store operation failed; surfaced unchanged, no local retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}
