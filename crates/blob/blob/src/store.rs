use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::types::{BlobAddress, BlobAttributes, ContainerAddress};

/// Narrow client surface of the object store consumed by the claim-check
/// transforms.
///
/// Implementors provide the actual storage mechanism; this workspace
/// ships an in-memory backend for development and testing, production
/// backends are brought by the host.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether the container exists.
    ///
    /// May fail under credentials scoped to a single container; callers
    /// decide whether that failure is fatal.
    async fn container_exists(&self, container: &ContainerAddress) -> Result<bool, StoreError>;

    /// Create the container if it does not exist yet.
    async fn create_container_if_missing(
        &self,
        container: &ContainerAddress,
    ) -> Result<(), StoreError>;

    /// Upload a blob body together with store-side metadata, overwriting
    /// any existing blob at the same address.
    async fn upload(
        &self,
        blob: &BlobAddress,
        body: Bytes,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Fetch size and metadata for an existing blob.
    ///
    /// Fails with [`StoreError::BlobNotFound`] if the blob cannot be
    /// found at the addressed location.
    async fn fetch_attributes(&self, blob: &BlobAddress) -> Result<BlobAttributes, StoreError>;

    /// Download the full blob content. `size` is the content length
    /// previously reported by [`BlobStore::fetch_attributes`].
    async fn download(&self, blob: &BlobAddress, size: u64) -> Result<Bytes, StoreError>;

    /// Produce a time-limited read URL for the blob, valid for
    /// `validity` from now. Local computation, no network round-trip.
    fn generate_signed_url(
        &self,
        blob: &BlobAddress,
        validity: Duration,
    ) -> Result<String, StoreError>;
}
