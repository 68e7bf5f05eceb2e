pub mod service;
pub mod store;
pub mod task;

pub use service::{SweepReport, TaskExecutor, TaskScheduler};
pub use store::TaskStore;
pub use task::{ScheduledTask, TaskId, TaskStatus};
