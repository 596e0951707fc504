// Service seams for the status monitor and the task page

use crate::error::Result;
use crate::model::{Source, Task, TaskStatus};
use futures::future::BoxFuture;

pub trait StatusSource: Send + Sync {
    /// Lightweight status lookup, called on every poll tick.
    fn fetch_task_status(&self, task_id: i64) -> BoxFuture<'_, Result<TaskStatus>>;
}

pub trait TaskApi: StatusSource {
    fn fetch_task_detail(&self, task_id: i64) -> BoxFuture<'_, Result<Task>>;

    fn fetch_sources(&self, task_id: i64) -> BoxFuture<'_, Result<Vec<Source>>>;
}
