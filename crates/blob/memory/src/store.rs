use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use claimcheck_blob::{
    BlobAddress, BlobAttributes, BlobStore, ContainerAddress, StoreError,
};
use claimcheck_core::{Clock, SystemClock};

type HmacSha256 = Hmac<Sha256>;

/// URL scheme of signed URLs minted by [`MemoryBlobStore`].
pub const MEMORY_URL_SCHEME: &str = "memory";

struct StoredBlob {
    body: Bytes,
    metadata: HashMap<String, String>,
}

struct SignedUrlParts {
    container: String,
    blob_name: String,
    expires_micros: i64,
    signature: String,
}

/// In-memory blob store using `DashMap`. Suitable for development and
/// testing.
///
/// Blobs are keyed by `(container, blob name)`; uploading creates the
/// container implicitly. Signed URLs carry an expiry timestamp and an
/// HMAC-SHA256 signature over the blob path, both verified on fetch
/// against the store's clock and per-instance signing key.
pub struct MemoryBlobStore {
    containers: DashSet<String>,
    blobs: DashMap<(String, String), StoredBlob>,
    signing_key: [u8; 32],
    clock: Arc<dyn Clock>,
    deny_container_probe: bool,
    uploads: AtomicU64,
}

impl MemoryBlobStore {
    /// Create an empty store with a fresh signing key and the system
    /// clock.
    pub fn new() -> Self {
        let mut signing_key = [0u8; 32];
        signing_key[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        signing_key[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self {
            containers: DashSet::new(),
            blobs: DashMap::new(),
            signing_key,
            clock: Arc::new(SystemClock),
            deny_container_probe: false,
            uploads: AtomicU64::new(0),
        }
    }

    /// Swap the time source used for signed-URL expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Simulate container-scoped credentials: existence checks and
    /// creation are rejected while blob operations keep working.
    #[must_use]
    pub fn with_denied_container_probe(mut self) -> Self {
        self.deny_container_probe = true;
        self
    }

    /// Number of blob uploads performed over the lifetime of this store.
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::Relaxed)
    }

    fn mac(&self) -> Result<HmacSha256, StoreError> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StoreError::Storage(format!("signing key rejected: {e}")))
    }

    fn signature(
        &self,
        container: &str,
        blob_name: &str,
        expires_micros: i64,
    ) -> Result<String, StoreError> {
        let mut mac = self.mac()?;
        mac.update(format!("{container}/{blob_name}|{expires_micros}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify_signed_url(&self, url: &str) -> Result<(String, String), StoreError> {
        let parts = parse_signed_url(url)?;

        let mut mac = self.mac()?;
        mac.update(
            format!(
                "{}/{}|{}",
                parts.container, parts.blob_name, parts.expires_micros
            )
            .as_bytes(),
        );
        let signature = hex::decode(&parts.signature)
            .map_err(|_| StoreError::SignedUrlRejected("malformed signature".to_owned()))?;
        mac.verify_slice(&signature)
            .map_err(|_| StoreError::SignedUrlRejected("signature mismatch".to_owned()))?;

        if self.clock.now_utc().timestamp_micros() > parts.expires_micros {
            return Err(StoreError::SignedUrlRejected("validity expired".to_owned()));
        }

        Ok((parts.container, parts.blob_name))
    }

    fn resolve(&self, blob: &BlobAddress) -> Result<(String, String), StoreError> {
        match blob {
            BlobAddress::Named {
                container,
                blob_name,
            } => Ok((container.name.clone(), blob_name.clone())),
            BlobAddress::SignedUrl(url) => self.verify_signed_url(url),
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn container_exists(&self, container: &ContainerAddress) -> Result<bool, StoreError> {
        if self.deny_container_probe {
            return Err(StoreError::Unauthorized(
                "credentials are scoped to a single container".to_owned(),
            ));
        }
        Ok(self.containers.contains(&container.name))
    }

    async fn create_container_if_missing(
        &self,
        container: &ContainerAddress,
    ) -> Result<(), StoreError> {
        if self.deny_container_probe {
            return Err(StoreError::Unauthorized(
                "credentials are scoped to a single container".to_owned(),
            ));
        }
        self.containers.insert(container.name.clone());
        Ok(())
    }

    async fn upload(
        &self,
        blob: &BlobAddress,
        body: Bytes,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let BlobAddress::Named {
            container,
            blob_name,
        } = blob
        else {
            return Err(StoreError::InvalidAddress(
                "upload requires a named blob address".to_owned(),
            ));
        };

        self.containers.insert(container.name.clone());
        self.blobs.insert(
            (container.name.clone(), blob_name.clone()),
            StoredBlob {
                body,
                metadata: metadata.clone(),
            },
        );
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn fetch_attributes(&self, blob: &BlobAddress) -> Result<BlobAttributes, StoreError> {
        let key = self.resolve(blob)?;
        let stored = self.blobs.get(&key).ok_or_else(|| StoreError::BlobNotFound {
            container: key.0.clone(),
            blob: key.1.clone(),
        })?;
        Ok(BlobAttributes {
            size: stored.body.len() as u64,
            metadata: stored.metadata.clone(),
        })
    }

    async fn download(&self, blob: &BlobAddress, _size: u64) -> Result<Bytes, StoreError> {
        let key = self.resolve(blob)?;
        let stored = self.blobs.get(&key).ok_or_else(|| StoreError::BlobNotFound {
            container: key.0.clone(),
            blob: key.1.clone(),
        })?;
        Ok(stored.body.clone())
    }

    fn generate_signed_url(
        &self,
        blob: &BlobAddress,
        validity: Duration,
    ) -> Result<String, StoreError> {
        let BlobAddress::Named {
            container,
            blob_name,
        } = blob
        else {
            return Err(StoreError::InvalidAddress(
                "signing requires a named blob address".to_owned(),
            ));
        };

        let validity = chrono::Duration::from_std(validity)
            .map_err(|_| StoreError::InvalidAddress("validity window out of range".to_owned()))?;
        let expires_micros = (self.clock.now_utc() + validity).timestamp_micros();
        let signature = self.signature(&container.name, blob_name, expires_micros)?;
        Ok(format!(
            "{MEMORY_URL_SCHEME}://{}/{}?exp={expires_micros}&sig={signature}",
            container.name, blob_name
        ))
    }
}

fn parse_signed_url(url: &str) -> Result<SignedUrlParts, StoreError> {
    let rest = url
        .strip_prefix(&format!("{MEMORY_URL_SCHEME}://"))
        .ok_or_else(|| StoreError::InvalidAddress(format!("unsupported url scheme in '{url}'")))?;
    let (path, query) = rest
        .split_once('?')
        .ok_or_else(|| StoreError::SignedUrlRejected("missing token query".to_owned()))?;
    let (container, blob_name) = path
        .split_once('/')
        .ok_or_else(|| StoreError::InvalidAddress(format!("missing blob path in '{url}'")))?;

    let mut expires_micros = None;
    let mut signature = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("exp", value)) => expires_micros = value.parse::<i64>().ok(),
            Some(("sig", value)) => signature = Some(value.to_owned()),
            _ => {}
        }
    }

    Ok(SignedUrlParts {
        container: container.to_owned(),
        blob_name: blob_name.to_owned(),
        expires_micros: expires_micros
            .ok_or_else(|| StoreError::SignedUrlRejected("missing or bad expiry".to_owned()))?,
        signature: signature
            .ok_or_else(|| StoreError::SignedUrlRejected("missing signature".to_owned()))?,
    })
}
