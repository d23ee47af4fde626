pub mod dynamo;
pub mod model;
pub mod store;
pub mod tracker;

pub use model::{MembershipSet, SetKind};
pub use store::MembershipStore;
pub use tracker::MembershipTracker;
