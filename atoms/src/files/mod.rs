pub mod dynamo;
pub mod model;
pub mod store;

pub use dynamo::DynamoFileStore;
pub use model::{Binding, FileKind, FileRef};
pub use store::FileStore;
