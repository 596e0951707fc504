pub mod api;
pub mod client;
pub mod error;
pub mod model;
pub mod monitor;

pub use api::{StatusSource, TaskApi};
pub use client::ApiClient;
pub use error::ClientError;
pub use model::{Source, Task, TaskStatus};
pub use monitor::{MonitorConfig, MonitorHandle, PollState, StatusMonitor, Transition};
