pub mod connection;
pub mod error;
pub mod store;
pub mod types;

pub use connection::{
    ConnectionString, ConnectionStringProvider, DEVELOPMENT_BLOB_ENDPOINT,
    StaticConnectionStringProvider,
};
pub use error::StoreError;
pub use store::BlobStore;
pub use types::{BlobAddress, BlobAttributes, ContainerAddress, StoreCredentials};
