//! One-shot helpers for hosts that don't register interceptors with
//! their bus client and instead transform individual messages in place.

use std::sync::Arc;

use claimcheck_blob::BlobStore;
use claimcheck_core::Message;

use crate::config::AttachmentConfig;
use crate::error::AttachmentError;
use crate::inbound::InboundAttachment;
use crate::outbound::OutboundAttachment;
use crate::receive_only::ReceiveOnlyAttachment;

/// Offload the message body according to `config`, exactly as the
/// outbound interceptor would.
pub async fn upload_attachment(
    message: &mut Message,
    config: &AttachmentConfig,
    store: &Arc<dyn BlobStore>,
) -> Result<(), AttachmentError> {
    OutboundAttachment::new(config.clone(), Arc::clone(store))?
        .process(message)
        .await
}

/// Resolve an offloaded body back into the message according to
/// `config`.
pub async fn download_attachment(
    message: &mut Message,
    config: &AttachmentConfig,
    store: &Arc<dyn BlobStore>,
) -> Result<(), AttachmentError> {
    InboundAttachment::new(config.clone(), Arc::clone(store))?
        .process(message)
        .await
}

/// Resolve an offloaded body through the signed URL carried under
/// `sas_uri_property`, with no store configuration.
pub async fn download_attachment_via_sas(
    message: &mut Message,
    sas_uri_property: impl Into<String>,
    store: &Arc<dyn BlobStore>,
) -> Result<(), AttachmentError> {
    ReceiveOnlyAttachment::new(sas_uri_property, Arc::clone(store))?
        .process(message)
        .await
}
