use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::security::section;
use super::{parse_identity_key, require_fields, CorruptRecord, Identity};

pub type TaskId = u64;

pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: Identity,
    pub username: String,
    pub full_name: String,
    pub joined: DateTime<Utc>,
    /// Cached counters. Overwritten by every stats rebuild.
    #[serde(default)]
    pub task_count: u64,
    #[serde(default)]
    pub completed_count: u64,
}

impl UserRecord {
    pub fn from_json(key: &str, value: &Value) -> Result<Self, CorruptRecord> {
        require_fields("users", key, value, &["userId", "joined"])?;
        let record: UserRecord = serde_json::from_value(with_defaults(
            value,
            &[("username", ""), ("fullName", "")],
        ))
        .map_err(|e| CorruptRecord::new("users", key, e.to_string()))?;
        let id = parse_identity_key("users", key)?;
        if id != record.user_id {
            return Err(CorruptRecord::new(
                "users",
                key,
                format!("key does not match userId {}", record.user_id),
            ));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub user_id: Identity,
    pub text: String,
    pub category: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
}

impl TaskRecord {
    pub fn from_json(key: &str, value: &Value) -> Result<Self, CorruptRecord> {
        require_fields("tasks", key, value, &["id", "userId", "text", "created"])?;
        let record: TaskRecord = serde_json::from_value(with_defaults(
            value,
            &[("category", DEFAULT_CATEGORY)],
        ))
        .map_err(|e| CorruptRecord::new("tasks", key, e.to_string()))?;
        if key.trim().parse::<TaskId>().ok() != Some(record.id) {
            return Err(CorruptRecord::new(
                "tasks",
                key,
                format!("key does not match id {}", record.id),
            ));
        }
        Ok(record)
    }
}

/// The data document: users, tasks and the task-id counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataState {
    pub task_counter: TaskId,
    pub users: BTreeMap<Identity, UserRecord>,
    pub tasks: BTreeMap<TaskId, TaskRecord>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl DataState {
    /// Record-by-record reconstruction. The task counter is clamped to the
    /// highest task id actually present.
    pub fn from_json(document: &Value) -> (Self, Vec<CorruptRecord>) {
        let mut state = DataState::default();
        let mut corrupt = Vec::new();

        if let Some(users) = section(document, "users", &mut corrupt) {
            for (key, value) in users {
                match UserRecord::from_json(key, value) {
                    Ok(user) => {
                        state.users.insert(user.user_id, user);
                    }
                    Err(e) => corrupt.push(e),
                }
            }
        }

        if let Some(tasks) = section(document, "tasks", &mut corrupt) {
            for (key, value) in tasks {
                match TaskRecord::from_json(key, value) {
                    Ok(task) => {
                        state.tasks.insert(task.id, task);
                    }
                    Err(e) => corrupt.push(e),
                }
            }
        }

        let stored_counter = match document.get("taskCounter") {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_u64().unwrap_or_else(|| {
                corrupt.push(CorruptRecord::new(
                    "taskCounter",
                    "*",
                    "counter is not a non-negative integer",
                ));
                0
            }),
        };
        let max_id = state.tasks.keys().next_back().copied().unwrap_or(0);
        state.task_counter = stored_counter.max(max_id);

        state.saved_at = document
            .get("savedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        (state, corrupt)
    }
}

/// Fills optional string fields that older documents may lack.
fn with_defaults(value: &Value, defaults: &[(&str, &str)]) -> Value {
    let mut value = value.clone();
    if let Some(object) = value.as_object_mut() {
        for (field, default) in defaults {
            object
                .entry(*field)
                .or_insert_with(|| Value::String((*default).to_string()));
        }
    }
    value
}
