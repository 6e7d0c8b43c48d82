use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use claimcheck_blob::{
    ConnectionString, ConnectionStringProvider, ContainerAddress, StaticConnectionStringProvider,
    StoreCredentials,
};
use claimcheck_core::Message;

use crate::error::AttachmentError;

/// Default container blobs are offloaded into.
pub const DEFAULT_CONTAINER_NAME: &str = "attachments";
/// Default message property carrying the blob name.
pub const DEFAULT_BLOB_NAME_PROPERTY: &str = "$attachment.blob";
/// Default message property carrying the signed read URL.
pub const DEFAULT_SAS_URI_PROPERTY: &str = "$attachment.sas.uri";

/// How the transforms reach the blob store.
#[derive(Clone)]
pub enum StoreConnection {
    /// Resolve a connection string on every call (rotatable secrets).
    Provider(Arc<dyn ConnectionStringProvider>),
    /// Fixed credentials and blob endpoint.
    Explicit {
        /// Store credentials.
        credentials: StoreCredentials,
        /// Base blob endpoint.
        endpoint: String,
    },
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(_) => write!(f, "Provider(..)"),
            Self::Explicit {
                credentials,
                endpoint,
            } => f
                .debug_struct("Explicit")
                .field("credentials", credentials)
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

type OffloadCriteria = Arc<dyn Fn(&Message) -> bool + Send + Sync>;
type BlobNameResolver = Arc<dyn Fn(&Message) -> String + Send + Sync>;
type BodyReplacer = Arc<dyn Fn(&Message) -> Bytes + Send + Sync>;

/// Immutable policy for the claim-check transforms.
///
/// Built from a connection string, a pluggable connection-string
/// provider, or explicit credentials plus endpoint, then refined with
/// the fluent `with_*` modifiers. Shared read-only by any number of
/// in-flight transforms.
#[derive(Clone)]
pub struct AttachmentConfig {
    pub(crate) connection: StoreConnection,
    pub(crate) container_name: String,
    pub(crate) blob_name_property: String,
    pub(crate) offload_criteria: OffloadCriteria,
    pub(crate) blob_name_resolver: BlobNameResolver,
    pub(crate) body_replacer: BodyReplacer,
    pub(crate) sas_uri_property: Option<String>,
    pub(crate) sas_token_validity: Option<Duration>,
}

impl fmt::Debug for AttachmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentConfig")
            .field("connection", &self.connection)
            .field("container_name", &self.container_name)
            .field("blob_name_property", &self.blob_name_property)
            .field("sas_uri_property", &self.sas_uri_property)
            .field("sas_token_validity", &self.sas_token_validity)
            .finish_non_exhaustive()
    }
}

impl AttachmentConfig {
    /// Build a configuration from a plain connection string.
    pub fn from_connection_string(connection_string: impl Into<String>) -> Self {
        Self::from_provider(Arc::new(StaticConnectionStringProvider::new(
            connection_string,
        )))
    }

    /// Build a configuration from a pluggable connection-string
    /// provider.
    pub fn from_provider(provider: Arc<dyn ConnectionStringProvider>) -> Self {
        Self::new(StoreConnection::Provider(provider))
    }

    /// Build a configuration from explicit credentials and a blob
    /// endpoint.
    pub fn from_credentials(
        credentials: StoreCredentials,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::new(StoreConnection::Explicit {
            credentials,
            endpoint: endpoint.into(),
        })
    }

    fn new(connection: StoreConnection) -> Self {
        Self {
            connection,
            container_name: DEFAULT_CONTAINER_NAME.to_owned(),
            blob_name_property: DEFAULT_BLOB_NAME_PROPERTY.to_owned(),
            offload_criteria: Arc::new(|_| true),
            blob_name_resolver: Arc::new(|_| uuid::Uuid::new_v4().to_string()),
            body_replacer: Arc::new(|_| Bytes::new()),
            sas_uri_property: None,
            sas_token_validity: None,
        }
    }

    /// Set the container blobs are offloaded into.
    #[must_use]
    pub fn with_container_name(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = container_name.into();
        self
    }

    /// Set the message property carrying the blob name.
    ///
    /// Sender and receiver of a message stream must agree on this value.
    #[must_use]
    pub fn with_blob_name_property(mut self, blob_name_property: impl Into<String>) -> Self {
        self.blob_name_property = blob_name_property.into();
        self
    }

    /// Offload only messages matching `criteria`.
    ///
    /// The default accepts every message; size thresholds are entirely
    /// the caller's policy.
    #[must_use]
    pub fn with_offload_criteria(
        mut self,
        criteria: impl Fn(&Message) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.offload_criteria = Arc::new(criteria);
        self
    }

    /// Derive blob names from the message instead of random identifiers.
    #[must_use]
    pub fn with_blob_name_resolver(
        mut self,
        resolver: impl Fn(&Message) -> String + Send + Sync + 'static,
    ) -> Self {
        self.blob_name_resolver = Arc::new(resolver);
        self
    }

    /// Choose the bytes left in the transport body after offload
    /// (default: empty).
    #[must_use]
    pub fn with_body_replacer(
        mut self,
        replacer: impl Fn(&Message) -> Bytes + Send + Sync + 'static,
    ) -> Self {
        self.body_replacer = Arc::new(replacer);
        self
    }

    /// Enable signed-URL mode: after offload the message also carries a
    /// read URL under `property`, valid for `validity` from upload time.
    #[must_use]
    pub fn with_blob_sas_uri(mut self, property: impl Into<String>, validity: Duration) -> Self {
        self.sas_uri_property = Some(property.into());
        self.sas_token_validity = Some(validity);
        self
    }

    /// The configured container name.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// The message property carrying the blob name.
    pub fn blob_name_property(&self) -> &str {
        &self.blob_name_property
    }

    /// The message property carrying the signed URL, when signed-URL
    /// mode is enabled.
    pub fn sas_uri_property(&self) -> Option<&str> {
        self.sas_uri_property.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), AttachmentError> {
        if self.container_name.trim().is_empty() {
            return Err(AttachmentError::Configuration(
                "container_name must not be blank".to_owned(),
            ));
        }
        if self.blob_name_property.trim().is_empty() {
            return Err(AttachmentError::Configuration(
                "blob_name_property must not be blank".to_owned(),
            ));
        }
        if let Some(property) = &self.sas_uri_property {
            if property.trim().is_empty() {
                return Err(AttachmentError::Configuration(
                    "sas_uri_property must not be blank".to_owned(),
                ));
            }
        }
        if self.sas_token_validity == Some(Duration::ZERO) {
            return Err(AttachmentError::Configuration(
                "sas_token_validity must be non-zero".to_owned(),
            ));
        }
        if let StoreConnection::Explicit { endpoint, .. } = &self.connection {
            if endpoint.trim().is_empty() {
                return Err(AttachmentError::Configuration(
                    "endpoint must not be blank".to_owned(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the endpoint and credentials for the current call.
    ///
    /// Provider-backed configurations re-resolve every time so rotated
    /// secrets take effect without rebuilding the pipeline.
    pub(crate) async fn resolve_connection(
        &self,
    ) -> Result<(String, StoreCredentials), AttachmentError> {
        match &self.connection {
            StoreConnection::Explicit {
                credentials,
                endpoint,
            } => Ok((endpoint.clone(), credentials.clone())),
            StoreConnection::Provider(provider) => {
                let raw = provider.get_connection_string().await?;
                let parsed = ConnectionString::parse(&raw)?;
                Ok((parsed.blob_endpoint(), parsed.credentials()))
            }
        }
    }

    pub(crate) async fn resolve_container(&self) -> Result<ContainerAddress, AttachmentError> {
        let (endpoint, credentials) = self.resolve_connection().await?;
        Ok(ContainerAddress::new(
            endpoint,
            self.container_name.clone(),
            credentials,
        ))
    }
}
