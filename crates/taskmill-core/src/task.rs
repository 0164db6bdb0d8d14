//! Task model: work types, lifecycle statuses, and the task value itself

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

/// Kind of work a task represents
///
/// The type selects the handler that executes the task and the default
/// timeout applied at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Computation-heavy work
    CpuIntensive,
    /// Work dominated by waiting on I/O
    IoBound,
    /// Work gated on elapsed time
    TimeBased,
}

impl TaskType {
    /// All task types, in declaration order
    pub const ALL: [TaskType; 3] = [
        TaskType::CpuIntensive,
        TaskType::IoBound,
        TaskType::TimeBased,
    ];

    /// Default timeout applied when a task of this type is created
    pub fn default_timeout(&self) -> Duration {
        match self {
            TaskType::CpuIntensive => Duration::from_secs(30),
            TaskType::IoBound => Duration::from_secs(60),
            TaskType::TimeBased => Duration::from_secs(20),
        }
    }

    /// Wire name of this type (the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CpuIntensive => "cpu_intensive",
            TaskType::IoBound => "io_bound",
            TaskType::TimeBased => "time_based",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu_intensive" => Ok(TaskType::CpuIntensive),
            "io_bound" => Ok(TaskType::IoBound),
            "time_based" => Ok(TaskType::TimeBased),
            other => Err(TaskError::UnknownTaskType(other.to_string())),
        }
    }
}

/// Lifecycle status of a task
///
/// Statuses only move forward: `Pending` to `Processing`, then to exactly
/// one of the terminal states. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// Claimed by a worker and executing
    Processing,
    /// Handler finished successfully
    Completed,
    /// Handler reported a failure, or no handler was registered
    Failed,
    /// Task exceeded its timeout, before or during execution
    Timeout,
}

impl TaskStatus {
    /// Whether this status is final
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout
        )
    }

    /// Whether a task in this status may move to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Timeout)
        )
    }

    /// Wire name of this status (the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work submitted to the engine
///
/// Constructed once via [`Task::new`], validated in full, and treated as an
/// immutable value afterwards except for `status`, which advances through
/// [`Task::transition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id
    pub id: String,

    /// Kind of work; selects the handler and the default timeout
    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// Opaque handler input, serialized at construction
    pub payload: serde_json::Value,

    /// Advisory priority; scheduling does not consult it
    pub priority: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Maximum time the task may spend executing
    #[serde(with = "duration_millis")]
    pub timeout: Duration,

    /// Lifecycle status
    pub status: TaskStatus,
}

impl Task {
    /// Create a task with a generated id and the type's default timeout
    ///
    /// The payload is serialized immediately; a payload that cannot be
    /// encoded fails construction, so no partially-built task ever reaches
    /// the queue. Initial status is [`TaskStatus::Pending`].
    pub fn new(task_type: TaskType, payload: impl Serialize) -> Result<Self, TaskError> {
        let payload = serde_json::to_value(payload)?;

        let task = Self {
            id: format!("task-{}", Uuid::now_v7()),
            task_type,
            payload,
            priority: 0,
            created_at: Utc::now(),
            timeout: task_type.default_timeout(),
            status: TaskStatus::Pending,
        };

        task.validate()?;
        Ok(task)
    }

    /// Set the advisory priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Override the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Re-check every construction invariant
    ///
    /// Type validity is carried by the enum and needs no check here.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.id.is_empty() {
            return Err(TaskError::validation("id must be supplied"));
        }

        if self.created_at == DateTime::<Utc>::UNIX_EPOCH {
            return Err(TaskError::validation("created at time is zero time"));
        }

        if self.timeout.is_zero() {
            return Err(TaskError::validation("timeout must be a positive number"));
        }

        Ok(())
    }

    /// Whether the task has outlived its timeout
    ///
    /// The boundary is exclusive: a task is not expired at exactly
    /// `created_at + timeout`. Pure predicate; status is not touched.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        elapsed > self.timeout
    }

    /// Advance the lifecycle status
    ///
    /// Rejects any move the status matrix does not allow, so a terminal
    /// task can never regress and `Pending` can never skip `Processing`.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        Ok(())
    }

    /// Deserialize the payload into a concrete type
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] status: {}, priority: {}",
            self.id, self.task_type, self.status, self.priority
        )
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
