pub mod brief;
pub mod dynamo;
pub mod model;
pub mod service;
pub mod store;

pub use brief::UserBriefCache;
pub use model::{AccountType, Gender, ProfilePatch, UserBrief, UserProfile};
pub use service::ProfileService;
pub use store::UserProfiles;
