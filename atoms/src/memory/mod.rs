//! In-process implementations of every seam, used by tests and local runs.
//! They enforce the same single-document guards as the DynamoDB stores.

pub mod cache;
pub mod files;
pub mod messages;
pub mod store;

pub use cache::InMemoryCache;
pub use files::InMemoryFiles;
pub use messages::RecordingSink;
pub use store::InMemoryStore;
