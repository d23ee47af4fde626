pub mod dynamo;
pub mod model;

pub use model::{Notification, NotificationKind, NotificationSink};
