pub mod dynamo;
pub mod model;
pub mod store;

pub use model::{Participation, ParticipationStatus, ReviewPatch};
pub use store::ParticipationStore;
