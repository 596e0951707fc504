use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a crawl task as reported by the service.
///
/// Values outside the known set are kept verbatim in `Unknown` so they can
/// still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Created,
    Active,
    InProcessing,
    Stopped,
    StoppedWithError,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Active => "active",
            TaskStatus::InProcessing => "in_processing",
            TaskStatus::Stopped => "stopped",
            TaskStatus::StoppedWithError => "stopped_with_error",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    /// Human readable name for status badges.
    pub fn label(&self) -> &str {
        match self {
            TaskStatus::Created => "Created",
            TaskStatus::Active => "Active",
            TaskStatus::InProcessing => "In processing",
            TaskStatus::Stopped => "Stopped",
            TaskStatus::StoppedWithError => "Stopped with error",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    /// The crawler will not touch the task again until it is re-activated.
    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskStatus::Stopped | TaskStatus::StoppedWithError)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "created" => TaskStatus::Created,
            "active" => TaskStatus::Active,
            "in_processing" => TaskStatus::InProcessing,
            "stopped" => TaskStatus::Stopped,
            "stopped_with_error" => TaskStatus::StoppedWithError,
            _ => TaskStatus::Unknown(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        TaskStatus::from(raw.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full task payload returned by `/get-task`.
///
/// The service does not echo the id back, the client fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    pub query: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sources_viewed: Option<i64>,
    /// Nanoseconds, as the service serialises durations.
    #[serde(default)]
    pub launch_duration: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
    pub depth_level: i32,
    pub min_weight: f64,
    pub max_sources: i64,
    pub max_neighbours_for_source: i64,
}

impl Task {
    pub fn launch_duration(&self) -> Option<Duration> {
        self.launch_duration
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos)
    }
}

/// Row of the task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: i64,
    pub query: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub count_sources: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
    #[serde(default)]
    pub total: i64,
}

/// A discovered document. `parent_id` is absent (or zero) for sources found
/// directly by the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub weight: f64,
}

impl Source {
    /// Parent reference with the service's zero sentinel folded into `None`.
    pub fn parent(&self) -> Option<i64> {
        self.parent_id.filter(|id| *id != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: i64,
}

/// Partial update of the crawl parameters. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sources: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_neighbours_for_source: Option<i64>,
}

impl TaskParams {
    pub fn is_empty(&self) -> bool {
        self.depth_level.is_none()
            && self.min_weight.is_none()
            && self.max_sources.is_none()
            && self.max_neighbours_for_source.is_none()
    }
}

/// Filter and paging for `/get-tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            status: None,
            query: None,
        }
    }
}

/// Filter and paging for `/get-protocol`. Unset fields do not filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolFilter {
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    // "available" or "unavailable"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_status: Option<String>,
}

impl Default for ProtocolFilter {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            task_id: None,
            query: None,
            source_id: None,
            title: None,
            source_status: None,
        }
    }
}

/// One launch of a crawl over one source, as listed by `/get-protocol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolItem {
    pub task_id: i64,
    pub query: String,
    pub source_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_status: String,
    pub launch_id: i64,
    pub launch_number: i64,
    pub started_at: DateTime<Utc>,
    /// Nanoseconds. Absent while the launch is still running.
    #[serde(default)]
    pub duration: Option<i64>,
    pub launch_status: String,
    #[serde(default)]
    pub launch_error_msg: Option<String>,
}

impl ProtocolItem {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos)
    }

    pub fn is_source_available(&self) -> bool {
        self.source_status == "available"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolResponse {
    #[serde(default)]
    pub protocol: Vec<ProtocolItem>,
}
