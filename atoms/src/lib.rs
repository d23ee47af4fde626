//! Domain atoms for the errand marketplace: models, store and cache seams,
//! and the two cache-aside components (membership sets and user briefs).
//!
//! Atoms take their clients as arguments or at construction; nothing here
//! reaches for process-wide state.

pub mod cache;
pub mod dynamo;
pub mod error;
pub mod files;
pub mod membership;
pub mod memory;
pub mod messages;
pub mod page;
pub mod participation;
pub mod tasks;
pub mod users;

pub use error::{CacheError, Error, Result, StoreError};
pub use page::{Page, Paginated};
