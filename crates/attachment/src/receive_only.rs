use std::sync::Arc;

use claimcheck_blob::{BlobAddress, BlobStore};
use claimcheck_core::Message;
use tracing::{debug, instrument};

use crate::config::DEFAULT_SAS_URI_PROPERTY;
use crate::error::AttachmentError;

/// Signed-URL-only inbound resolver.
///
/// For receive sides that hold no store configuration at all: it
/// recognizes only the signed-URL property and fetches the body through
/// the embedded URL. Messages without that property pass through
/// untouched.
pub struct ReceiveOnlyAttachment {
    sas_uri_property: String,
    store: Arc<dyn BlobStore>,
}

impl ReceiveOnlyAttachment {
    /// Create a resolver watching `sas_uri_property` on incoming
    /// messages.
    pub fn new(
        sas_uri_property: impl Into<String>,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self, AttachmentError> {
        let sas_uri_property = sas_uri_property.into();
        if sas_uri_property.trim().is_empty() {
            return Err(AttachmentError::Configuration(
                "sas_uri_property must not be blank".to_owned(),
            ));
        }
        Ok(Self {
            sas_uri_property,
            store,
        })
    }

    /// Create a resolver watching the default signed-URL property.
    pub fn with_default_property(store: Arc<dyn BlobStore>) -> Self {
        Self {
            sas_uri_property: DEFAULT_SAS_URI_PROPERTY.to_owned(),
            store,
        }
    }

    /// Resolve an offloaded body through the embedded signed URL.
    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub async fn process(&self, message: &mut Message) -> Result<(), AttachmentError> {
        let Some(value) = message.properties.get(&self.sas_uri_property) else {
            return Ok(());
        };
        let sas_uri = value
            .as_str()
            .ok_or_else(|| AttachmentError::InvalidPropertyValue {
                property: self.sas_uri_property.clone(),
            })?;
        let blob = BlobAddress::SignedUrl(sas_uri.to_owned());

        let attributes = match self.store.fetch_attributes(&blob).await {
            Ok(attributes) => attributes,
            Err(source) => {
                return Err(AttachmentError::SignedUrlUnresolvable {
                    blob_name: blob.blob_name().to_owned(),
                    source,
                });
            }
        };

        debug!(blob_name = %blob.blob_name(), size = attributes.size, "downloading attachment blob via signed url");
        let body = self.store.download(&blob, attributes.size).await?;
        message.body = body;
        Ok(())
    }
}
