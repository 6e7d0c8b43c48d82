use std::sync::Arc;

use claimcheck_blob::{BlobAddress, BlobStore};
use claimcheck_core::Message;
use tracing::{debug, info, instrument};

use crate::config::AttachmentConfig;
use crate::error::AttachmentError;

/// Inbound claim-check resolver.
///
/// Runs after a message is received from the bus transport: detects a
/// blob reference in the application properties and swaps it back for
/// the original body.
pub struct InboundAttachment {
    config: AttachmentConfig,
    store: Arc<dyn BlobStore>,
}

impl InboundAttachment {
    /// Create the resolver. Fails on invalid configuration, before any
    /// store I/O.
    pub fn new(
        config: AttachmentConfig,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self, AttachmentError> {
        config.validate()?;
        Ok(Self { config, store })
    }

    /// Resolve an offloaded body back into the message.
    ///
    /// Messages without the blob-name property pass through untouched;
    /// that property is the sole skip signal, regardless of any other
    /// configured properties.
    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub async fn process(&self, message: &mut Message) -> Result<(), AttachmentError> {
        let Some(value) = message.properties.get(&self.config.blob_name_property) else {
            return Ok(());
        };
        let blob_name = value
            .as_str()
            .ok_or_else(|| AttachmentError::InvalidPropertyValue {
                property: self.config.blob_name_property.clone(),
            })?
            .to_owned();

        let blob = self.resolve_address(message, &blob_name).await?;

        let attributes = match self.store.fetch_attributes(&blob).await {
            Ok(attributes) => attributes,
            Err(source) => {
                let container = blob
                    .container_name()
                    .unwrap_or(&self.config.container_name)
                    .to_owned();
                return Err(AttachmentError::BlobUnresolvable {
                    blob_name,
                    container,
                    source,
                });
            }
        };

        debug!(blob_name = %blob_name, size = attributes.size, "downloading attachment blob");
        let body = self.store.download(&blob, attributes.size).await?;
        info!(blob_name = %blob_name, size = body.len(), "attachment blob downloaded");
        message.body = body;
        Ok(())
    }

    /// Pick the blob address: the embedded signed URL when signed-URL
    /// mode is configured and the message carries one, the configured
    /// container and credentials otherwise.
    async fn resolve_address(
        &self,
        message: &Message,
        blob_name: &str,
    ) -> Result<BlobAddress, AttachmentError> {
        if let Some(sas_property) = self.config.sas_uri_property.as_deref() {
            if let Some(value) = message.properties.get(sas_property) {
                let sas_uri =
                    value
                        .as_str()
                        .ok_or_else(|| AttachmentError::InvalidPropertyValue {
                            property: sas_property.to_owned(),
                        })?;
                return Ok(BlobAddress::SignedUrl(sas_uri.to_owned()));
            }
        }

        let container = self.config.resolve_container().await?;
        Ok(container.blob(blob_name))
    }
}
