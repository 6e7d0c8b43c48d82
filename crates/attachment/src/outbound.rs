use std::collections::HashMap;
use std::sync::Arc;

use claimcheck_blob::BlobStore;
use claimcheck_core::{Clock, Message, SystemClock};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::AttachmentConfig;
use crate::error::AttachmentError;

/// Blob metadata key echoing the message identifier.
pub const MESSAGE_ID_METADATA_KEY: &str = "_MessageId";
/// Blob metadata key carrying the computed expiry timestamp.
pub const VALID_UNTIL_METADATA_KEY: &str = "_ValidUntilUtc";
/// Timestamp format for [`VALID_UNTIL_METADATA_KEY`]: fixed-width,
/// lexicographically sortable.
pub const VALID_UNTIL_FORMAT: &str = "%Y-%m-%d %H:%M:%S:%6f Z";

/// Outbound claim-check interceptor.
///
/// Runs before a message is handed to the bus transport: decides offload
/// eligibility, uploads the body, and rewrites the message body and
/// properties. Reprocessing an already-offloaded message is a no-op.
pub struct OutboundAttachment {
    config: AttachmentConfig,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl OutboundAttachment {
    /// Create the interceptor. Fails on invalid configuration, before
    /// any store I/O.
    pub fn new(
        config: AttachmentConfig,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self, AttachmentError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Swap the time source used for expiry metadata.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Offload the message body if the configured criteria ask for it.
    ///
    /// On success the transport body holds the replacement bytes and the
    /// blob-name property (plus the signed URL, in signed-URL mode) is
    /// set. Messages already carrying the blob-name property and
    /// messages failing the offload criteria pass through untouched.
    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    pub async fn process(&self, message: &mut Message) -> Result<(), AttachmentError> {
        if message
            .properties
            .contains_key(&self.config.blob_name_property)
        {
            debug!("attachment blob already associated, skipping offload");
            return Ok(());
        }
        if !(self.config.offload_criteria)(message) {
            return Ok(());
        }

        let container = self.config.resolve_container().await?;

        // The existence probe only works for shared-key or account-SAS
        // credentials; container-scoped credentials are a supported mode
        // and must not abort the upload when the probe is rejected.
        match self.store.container_exists(&container).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.store.create_container_if_missing(&container).await {
                    debug!(error = %e, container = %container.name, "container creation rejected, continuing");
                }
            }
            Err(e) => {
                debug!(error = %e, container = %container.name, "container probe rejected, continuing");
            }
        }

        let blob_name = (self.config.blob_name_resolver)(message);
        let blob = container.blob(blob_name.clone());

        let metadata = self.blob_metadata(message);
        let body = message.body.clone();
        let size = body.len();
        debug!(
            container = %self.config.container_name,
            blob_name = %blob_name,
            size,
            "uploading attachment blob"
        );
        self.store.upload(&blob, body, &metadata).await?;
        info!(blob_name = %blob_name, size, "attachment blob uploaded");

        let replacement = (self.config.body_replacer)(message);
        message.body = replacement;
        message.properties.insert(
            self.config.blob_name_property.clone(),
            Value::String(blob_name),
        );

        if let (Some(sas_property), Some(validity)) = (
            self.config.sas_uri_property.as_deref(),
            self.config.sas_token_validity,
        ) {
            let sas_uri = self.store.generate_signed_url(&blob, validity)?;
            message
                .properties
                .insert(sas_property.to_owned(), Value::String(sas_uri));
        }

        Ok(())
    }

    fn blob_metadata(&self, message: &Message) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        if !message.message_id.trim().is_empty() {
            metadata.insert(
                MESSAGE_ID_METADATA_KEY.to_owned(),
                message.message_id.clone(),
            );
        }
        if let Some(valid_until) = message.time_to_live.expires_at(self.clock.now_utc()) {
            metadata.insert(
                VALID_UNTIL_METADATA_KEY.to_owned(),
                valid_until.format(VALID_UNTIL_FORMAT).to_string(),
            );
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use claimcheck_blob_memory::MemoryBlobStore;
    use claimcheck_core::{FixedClock, TimeToLive};

    use super::*;

    fn config() -> AttachmentConfig {
        AttachmentConfig::from_connection_string("UseDevelopmentStorage=true")
    }

    #[test]
    fn invalid_configuration_fails_before_any_io() {
        let err = OutboundAttachment::new(
            config().with_container_name(""),
            Arc::new(MemoryBlobStore::new()),
        )
        .err()
        .expect("blank container must be rejected");
        assert!(matches!(err, AttachmentError::Configuration(_)));
    }

    #[test]
    fn expiry_metadata_uses_fixed_width_format() {
        let interceptor = OutboundAttachment::new(config(), Arc::new(MemoryBlobStore::new()))
            .unwrap()
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2017, 1, 2, 0, 0, 0).unwrap(),
            )));
        let message = Message::new("payload".as_bytes().to_vec())
            .with_message_id("msg-1")
            .with_time_to_live(TimeToLive::Bounded(Duration::from_secs(3600)));

        let metadata = interceptor.blob_metadata(&message);
        assert_eq!(
            metadata.get(VALID_UNTIL_METADATA_KEY).unwrap(),
            "2017-01-02 01:00:00:000000 Z"
        );
        assert_eq!(metadata.get(MESSAGE_ID_METADATA_KEY).unwrap(), "msg-1");
    }

    #[test]
    fn infinite_ttl_and_blank_id_write_no_metadata() {
        let interceptor =
            OutboundAttachment::new(config(), Arc::new(MemoryBlobStore::new())).unwrap();
        let message = Message::new("payload".as_bytes().to_vec()).with_message_id("   ");
        assert!(interceptor.blob_metadata(&message).is_empty());
    }
}
