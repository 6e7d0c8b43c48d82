use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::StoreCredentials;

/// Blob endpoint of the local storage emulator's well-known development
/// account.
pub const DEVELOPMENT_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Deferred connection-string resolution.
///
/// Lets hosts plug in secret stores with late or rotating resolution;
/// the transforms re-resolve on every call.
#[async_trait]
pub trait ConnectionStringProvider: Send + Sync {
    /// Resolve the current connection string.
    async fn get_connection_string(&self) -> Result<String, StoreError>;
}

/// Provider wrapping a connection string known up front.
pub struct StaticConnectionStringProvider {
    connection_string: String,
}

impl StaticConnectionStringProvider {
    /// Wrap a plain connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }
}

impl std::fmt::Debug for StaticConnectionStringProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnectionStringProvider")
            .field("connection_string", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ConnectionStringProvider for StaticConnectionStringProvider {
    async fn get_connection_string(&self) -> Result<String, StoreError> {
        Ok(self.connection_string.clone())
    }
}

/// Parsed object-store connection string.
///
/// Recognizes the conventional `Key=Value;` format: `AccountName`,
/// `AccountKey`, `SharedAccessSignature`, `BlobEndpoint`,
/// `EndpointSuffix`, `DefaultEndpointsProtocol`, and
/// `UseDevelopmentStorage=true`. Unrecognized keys are ignored.
#[derive(Clone, Default)]
pub struct ConnectionString {
    /// Storage account name.
    pub account_name: Option<String>,
    account_key: Option<String>,
    sas_token: Option<String>,
    /// Explicit blob endpoint override.
    pub blob_endpoint: Option<String>,
    /// Endpoint DNS suffix (defaults to the public cloud suffix).
    pub endpoint_suffix: Option<String>,
    /// Endpoint scheme (defaults to `https`).
    pub protocol: Option<String>,
    /// Whether the string selected the local development account.
    pub development_storage: bool,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "[REDACTED]"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "[REDACTED]"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("protocol", &self.protocol)
            .field("development_storage", &self.development_storage)
            .finish()
    }
}

impl ConnectionString {
    /// Parse a `Key=Value;` connection string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConnectionString`] for malformed
    /// pairs, or when neither an account name, a blob endpoint, nor the
    /// development-storage flag is present.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut parsed = Self::default();

        for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(StoreError::InvalidConnectionString(format!(
                    "segment '{pair}' is not a Key=Value pair"
                )));
            };
            let value = value.trim();
            match key.trim() {
                "AccountName" => parsed.account_name = Some(value.to_owned()),
                "AccountKey" => parsed.account_key = Some(value.to_owned()),
                "SharedAccessSignature" => parsed.sas_token = Some(value.to_owned()),
                "BlobEndpoint" => parsed.blob_endpoint = Some(value.to_owned()),
                "EndpointSuffix" => parsed.endpoint_suffix = Some(value.to_owned()),
                "DefaultEndpointsProtocol" => parsed.protocol = Some(value.to_owned()),
                "UseDevelopmentStorage" => parsed.development_storage = value == "true",
                _ => {}
            }
        }

        if parsed.development_storage {
            parsed.account_name.get_or_insert_with(|| DEVELOPMENT_ACCOUNT_NAME.to_owned());
            parsed.account_key.get_or_insert_with(|| DEVELOPMENT_ACCOUNT_KEY.to_owned());
        }

        if parsed.account_name.is_none() && parsed.blob_endpoint.is_none() {
            return Err(StoreError::InvalidConnectionString(
                "no AccountName, BlobEndpoint, or UseDevelopmentStorage present".to_owned(),
            ));
        }

        Ok(parsed)
    }

    /// The blob endpoint this connection string addresses.
    ///
    /// An explicit `BlobEndpoint` wins; the development account maps to
    /// the local emulator; otherwise the endpoint is derived from the
    /// account name, protocol, and suffix.
    pub fn blob_endpoint(&self) -> String {
        if let Some(endpoint) = &self.blob_endpoint {
            return endpoint.trim_end_matches('/').to_owned();
        }
        if self.development_storage {
            return DEVELOPMENT_BLOB_ENDPOINT.to_owned();
        }
        let protocol = self.protocol.as_deref().unwrap_or("https");
        let suffix = self.endpoint_suffix.as_deref().unwrap_or("core.windows.net");
        let account = self.account_name.as_deref().unwrap_or_default();
        format!("{protocol}://{account}.blob.{suffix}")
    }

    /// The credentials carried by this connection string.
    ///
    /// A shared-access signature takes precedence over a shared key.
    pub fn credentials(&self) -> StoreCredentials {
        if let Some(sas) = &self.sas_token {
            return StoreCredentials::SasToken(sas.clone());
        }
        if let (Some(account_name), Some(account_key)) = (&self.account_name, &self.account_key) {
            return StoreCredentials::SharedKey {
                account_name: account_name.clone(),
                account_key: account_key.clone(),
            };
        }
        StoreCredentials::Anonymous
    }
}
