use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Credentials used to address containers and blobs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreCredentials {
    /// Storage account name plus shared account key.
    SharedKey {
        /// Account name.
        account_name: String,
        /// Shared account key. Redacted in `Debug`.
        account_key: String,
    },
    /// A shared-access-signature token (account-, service-, or
    /// container-scoped). Redacted in `Debug`.
    SasToken(String),
    /// No credentials (public containers, or stores that do not
    /// authenticate).
    Anonymous,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("account_key", &"[REDACTED]")
                .finish(),
            Self::SasToken(_) => f.debug_tuple("SasToken").field(&"[REDACTED]").finish(),
            Self::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Address of a blob container: endpoint, container name, credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAddress {
    /// Base endpoint of the store (no trailing container segment).
    pub endpoint: String,
    /// Container name.
    pub name: String,
    /// Credentials used for operations against this container.
    pub credentials: StoreCredentials,
}

impl ContainerAddress {
    /// Create a container address.
    pub fn new(
        endpoint: impl Into<String>,
        name: impl Into<String>,
        credentials: StoreCredentials,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            name: name.into(),
            credentials,
        }
    }

    /// Full container URL (endpoint joined with the container name).
    pub fn url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.name)
    }

    /// Address a blob by name within this container.
    pub fn blob(self, blob_name: impl Into<String>) -> BlobAddress {
        BlobAddress::Named {
            container: self,
            blob_name: blob_name.into(),
        }
    }
}

/// A reference to a single blob: either by name within an addressed
/// container, or directly through a time-limited signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobAddress {
    /// Addressed by container plus blob name, using the container's
    /// credentials.
    Named {
        /// Container holding the blob.
        container: ContainerAddress,
        /// Blob name within the container.
        blob_name: String,
    },
    /// Addressed directly through a signed URL; no stored credentials
    /// are needed.
    SignedUrl(String),
}

impl BlobAddress {
    /// Full blob URL.
    pub fn url(&self) -> String {
        match self {
            Self::Named {
                container,
                blob_name,
            } => format!("{}/{}", container.url(), blob_name),
            Self::SignedUrl(url) => url.clone(),
        }
    }

    /// The blob name this address points at.
    ///
    /// For signed URLs this is the last path segment, a best-effort
    /// value used by diagnostics.
    pub fn blob_name(&self) -> &str {
        match self {
            Self::Named { blob_name, .. } => blob_name,
            Self::SignedUrl(url) => path_segments(url).last().copied().unwrap_or(url),
        }
    }

    /// The container name this address points into, when it can be
    /// determined.
    pub fn container_name(&self) -> Option<&str> {
        match self {
            Self::Named { container, .. } => Some(&container.name),
            Self::SignedUrl(url) => {
                let segments = path_segments(url);
                (segments.len() >= 2).then(|| segments[segments.len() - 2])
            }
        }
    }
}

/// Attributes reported by the store for an existing blob.
#[derive(Debug, Clone, Default)]
pub struct BlobAttributes {
    /// Content length in bytes.
    pub size: u64,
    /// Store-side metadata key-value pairs.
    pub metadata: HashMap<String, String>,
}

fn path_segments(url: &str) -> Vec<&str> {
    let no_query = url.split('?').next().unwrap_or(url);
    let no_scheme = match no_query.find("://") {
        Some(idx) => &no_query[idx + 3..],
        None => no_query,
    };
    no_scheme.split('/').filter(|s| !s.is_empty()).collect()
}
