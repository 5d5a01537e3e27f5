//! Pending work: tasks, their ids, and the queue that holds them.

pub mod queue;
pub mod task;

pub use queue::TaskQueue;
pub use task::{Player, Task, TaskId};
