use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use claimcheck_attachment::{
    AttachmentConfig, AttachmentError, DEFAULT_SAS_URI_PROPERTY, InboundAttachment,
    MESSAGE_ID_METADATA_KEY, OutboundAttachment, ReceiveOnlyAttachment, VALID_UNTIL_FORMAT,
    VALID_UNTIL_METADATA_KEY, download_attachment, download_attachment_via_sas, upload_attachment,
};
use claimcheck_blob::{BlobAttributes, BlobStore, ContainerAddress, StoreCredentials};
use claimcheck_blob_memory::MemoryBlobStore;
use claimcheck_core::{FixedClock, Message, TimeToLive};

fn config() -> AttachmentConfig {
    AttachmentConfig::from_connection_string("UseDevelopmentStorage=true")
}

fn payload_message() -> Message {
    Message::new("payload".as_bytes().to_vec()).with_message_id("msg-1")
}

async fn stored_attributes(
    store: &MemoryBlobStore,
    container: &str,
    blob_name: &str,
) -> BlobAttributes {
    let address = ContainerAddress::new("memory://", container, StoreCredentials::Anonymous)
        .blob(blob_name);
    store.fetch_attributes(&address).await.unwrap()
}

#[tokio::test]
async fn offloads_body_and_sets_reference_property() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config().with_blob_name_property("attachment-id"),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    assert!(message.body.is_empty());
    let blob_name = message.property_str("attachment-id").unwrap().to_owned();
    assert!(!blob_name.is_empty());

    let address = ContainerAddress::new("memory://", "attachments", StoreCredentials::Anonymous)
        .blob(blob_name.clone());
    let attributes = store.fetch_attributes(&address).await.unwrap();
    let body = store.download(&address, attributes.size).await.unwrap();
    assert_eq!(body.as_ref(), b"payload");
}

#[tokio::test]
async fn leaves_small_message_untouched() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config()
            .with_blob_name_property("attachment-id")
            .with_offload_criteria(|message| message.body.len() > 100),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    assert_eq!(message.body.as_ref(), b"payload");
    assert!(!message.properties.contains_key("attachment-id"));
    assert_eq!(store.upload_count(), 0);
}

#[tokio::test]
async fn zero_threshold_offloads_the_same_payload() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config()
            .with_blob_name_property("attachment-id")
            .with_offload_criteria(|message| !message.body.is_empty()),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    assert!(message.body.is_empty());
    assert!(message.properties.contains_key("attachment-id"));
    assert_eq!(store.upload_count(), 1);
}

#[tokio::test]
async fn expiry_metadata_matches_message_ttl() {
    let t0 = Utc.with_ymd_and_hms(2017, 1, 2, 0, 0, 0).unwrap();
    let ttl = Duration::from_secs(3600);
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(config(), store.clone())
        .unwrap()
        .with_clock(Arc::new(FixedClock(t0)));

    let mut message = payload_message().with_time_to_live(TimeToLive::Bounded(ttl));
    interceptor.process(&mut message).await.unwrap();

    let blob_name = message.property_str("$attachment.blob").unwrap();
    let attributes = stored_attributes(&store, "attachments", blob_name).await;
    let expected = (t0 + chrono::Duration::from_std(ttl).unwrap())
        .format(VALID_UNTIL_FORMAT)
        .to_string();
    assert_eq!(
        attributes.metadata.get(VALID_UNTIL_METADATA_KEY).unwrap(),
        &expected
    );
    assert_eq!(expected, "2017-01-02 01:00:00:000000 Z");
}

#[tokio::test]
async fn infinite_ttl_writes_no_expiry_metadata() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(config(), store.clone()).unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    let blob_name = message.property_str("$attachment.blob").unwrap();
    let attributes = stored_attributes(&store, "attachments", blob_name).await;
    assert!(!attributes.metadata.contains_key(VALID_UNTIL_METADATA_KEY));
    assert_eq!(attributes.metadata.get(MESSAGE_ID_METADATA_KEY).unwrap(), "msg-1");
}

#[tokio::test]
async fn blank_message_id_is_not_echoed() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(config(), store.clone()).unwrap();

    let mut message = Message::new("payload".as_bytes().to_vec());
    interceptor.process(&mut message).await.unwrap();

    let blob_name = message.property_str("$attachment.blob").unwrap();
    let attributes = stored_attributes(&store, "attachments", blob_name).await;
    assert!(!attributes.metadata.contains_key(MESSAGE_ID_METADATA_KEY));
}

#[tokio::test]
async fn round_trip_restores_original_body() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor =
        OutboundAttachment::new(config().with_blob_name_property("attachment-id"), store.clone())
            .unwrap();
    let resolver =
        InboundAttachment::new(config().with_blob_name_property("attachment-id"), store.clone())
            .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    assert!(message.body.is_empty());

    resolver.process(&mut message).await.unwrap();
    assert_eq!(message.body.as_ref(), b"payload");
}

#[tokio::test]
async fn receives_with_a_separate_connection_string_config() {
    let store = Arc::new(MemoryBlobStore::new());
    let send_config = AttachmentConfig::from_credentials(
        StoreCredentials::SasToken("sig=container-scoped".into()),
        "http://127.0.0.1:10000/devstoreaccount1",
    )
    .with_blob_name_property("attachment-id");
    let interceptor = OutboundAttachment::new(send_config, store.clone()).unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    let receive_config = AttachmentConfig::from_connection_string("UseDevelopmentStorage=true")
        .with_blob_name_property("attachment-id");
    let resolver = InboundAttachment::new(receive_config, store.clone()).unwrap();
    resolver.process(&mut message).await.unwrap();

    assert_eq!(message.body.as_ref(), b"payload");
}

#[tokio::test]
async fn reprocessing_keeps_the_assigned_blob() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config().with_blob_name_property("attachment-id"),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    let first = message.property_str("attachment-id").unwrap().to_owned();

    interceptor.process(&mut message).await.unwrap();
    let second = message.property_str("attachment-id").unwrap().to_owned();

    assert_eq!(first, second);
    assert_eq!(store.upload_count(), 1);
}

#[tokio::test]
async fn no_sas_property_by_default() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(config(), store.clone()).unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    assert!(message.properties.contains_key("$attachment.blob"));
    assert!(!message.properties.contains_key(DEFAULT_SAS_URI_PROPERTY));
}

#[tokio::test]
async fn sas_property_is_set_when_enabled() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config()
            .with_blob_name_property("attachment-id")
            .with_blob_sas_uri("mySasUriProperty", Duration::from_secs(4 * 3600)),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    assert!(message.body.is_empty());
    assert!(message.properties.contains_key("attachment-id"));
    let sas_uri = message.property_str("mySasUriProperty").unwrap();
    assert!(sas_uri.starts_with("memory://attachments/"));
}

#[tokio::test]
async fn inbound_prefers_the_embedded_signed_url() {
    let store = Arc::new(MemoryBlobStore::new());
    let sas_config = config()
        .with_blob_name_property("attachment-id")
        .with_blob_sas_uri("mySasUriProperty", Duration::from_secs(3600));
    let interceptor = OutboundAttachment::new(sas_config.clone(), store.clone()).unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();

    // A receive config pointing at the wrong container still resolves,
    // because the embedded signed URL addresses the blob directly.
    let resolver = InboundAttachment::new(
        sas_config.with_container_name("attachments-wrong-containers"),
        store.clone(),
    )
    .unwrap();
    resolver.process(&mut message).await.unwrap();
    assert_eq!(message.body.as_ref(), b"payload");
}

#[tokio::test]
async fn missing_blob_error_names_container_and_blob() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(config(), store.clone()).unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    let blob_name = message.property_str("$attachment.blob").unwrap().to_owned();

    let resolver = InboundAttachment::new(
        config().with_container_name("attachments-wrong-containers"),
        store.clone(),
    )
    .unwrap();
    let err = resolver.process(&mut message).await.unwrap_err();

    assert!(matches!(err, AttachmentError::BlobUnresolvable { .. }));
    let text = err.to_string();
    assert!(text.contains("attachments-wrong-containers"));
    assert!(text.contains(&blob_name));
}

#[tokio::test]
async fn receive_only_resolver_uses_the_embedded_signed_url() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config().with_blob_sas_uri("mySasUriProperty", Duration::from_secs(3600)),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    assert!(message.body.is_empty());

    // The receiving side holds no store configuration at all.
    let resolver = ReceiveOnlyAttachment::new("mySasUriProperty", store.clone()).unwrap();
    resolver.process(&mut message).await.unwrap();
    assert_eq!(message.body.as_ref(), b"payload");
}

#[tokio::test]
async fn container_scoped_credentials_still_upload() {
    let store = Arc::new(MemoryBlobStore::new().with_denied_container_probe());
    let interceptor = OutboundAttachment::new(
        config().with_blob_name_property("attachment-id"),
        store.clone(),
    )
    .unwrap();
    let resolver = InboundAttachment::new(
        config().with_blob_name_property("attachment-id"),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    assert!(message.properties.contains_key("attachment-id"));

    resolver.process(&mut message).await.unwrap();
    assert_eq!(message.body.as_ref(), b"payload");
}

#[tokio::test]
async fn one_shot_helpers_round_trip() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let config = config().with_blob_sas_uri(DEFAULT_SAS_URI_PROPERTY, Duration::from_secs(3600));

    let mut message = payload_message();
    upload_attachment(&mut message, &config, &store).await.unwrap();
    assert!(message.body.is_empty());

    let mut by_config = message.clone();
    download_attachment(&mut by_config, &config, &store).await.unwrap();
    assert_eq!(by_config.body.as_ref(), b"payload");

    let mut by_sas = message.clone();
    download_attachment_via_sas(&mut by_sas, DEFAULT_SAS_URI_PROPERTY, &store)
        .await
        .unwrap();
    assert_eq!(by_sas.body.as_ref(), b"payload");
}

#[tokio::test]
async fn custom_body_replacer_leaves_a_marker() {
    let store = Arc::new(MemoryBlobStore::new());
    let interceptor = OutboundAttachment::new(
        config().with_body_replacer(|_| Bytes::from_static(b"<offloaded>")),
        store.clone(),
    )
    .unwrap();

    let mut message = payload_message();
    interceptor.process(&mut message).await.unwrap();
    assert_eq!(message.body.as_ref(), b"<offloaded>");
}
