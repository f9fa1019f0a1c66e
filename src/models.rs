use serde::{Deserialize, Serialize};
use std::fmt;

pub type TaskId = u64;
pub type BoardId = u64;

/// A task status label. The set of valid labels belongs to the server, so this
/// is a plain string rather than an enum.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub fn new(label: impl Into<String>) -> Self {
        Status(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Status {
    fn from(label: &str) -> Self {
        Status::new(label)
    }
}

// Task as returned by the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "task_name", alias = "title")]
    pub title: String,
    #[serde(rename = "task_description", alias = "description", default)]
    pub description: Option<String>,
    pub board_id: BoardId,
    pub status: Status,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tasks_count: Option<u64>,
}

// Board read by id, with its tasks
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BoardWithTasks {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTask {
    #[serde(rename = "task_name")]
    pub title: String,
    #[serde(rename = "task_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub board_id: BoardId,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Full replacement of a task's editable fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(rename = "task_name")]
    pub title: String,
    #[serde(rename = "task_description")]
    pub description: Option<String>,
    pub status: Status,
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
