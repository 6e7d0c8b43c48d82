pub mod config;
pub mod error;
pub mod inbound;
pub mod oneshot;
pub mod outbound;
pub mod receive_only;

pub use config::{
    AttachmentConfig, DEFAULT_BLOB_NAME_PROPERTY, DEFAULT_CONTAINER_NAME,
    DEFAULT_SAS_URI_PROPERTY, StoreConnection,
};
pub use error::AttachmentError;
pub use inbound::InboundAttachment;
pub use oneshot::{download_attachment, download_attachment_via_sas, upload_attachment};
pub use outbound::{
    MESSAGE_ID_METADATA_KEY, OutboundAttachment, VALID_UNTIL_FORMAT, VALID_UNTIL_METADATA_KEY,
};
pub use receive_only::ReceiveOnlyAttachment;
