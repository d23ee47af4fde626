pub mod dynamo;
pub mod model;
pub mod store;

pub use model::{NewTask, Reward, Task, TaskCounter, TaskFilter, TaskPatch, TaskSort, TaskStatus, TaskType};
pub use store::TaskStore;
