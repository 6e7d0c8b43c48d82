pub mod store;

pub use store::{MEMORY_URL_SCHEME, MemoryBlobStore};
