//! Domain entity types.
//!
//! These are the records callers see; the store-internal envelope
//! (key, revision) never appears here.

use crate::records::codec::Entity;
use crate::types::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a matter represents on the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatterKind {
    #[default]
    Normal,
    Repeat,
    Todo,
}

/// A scheduled task with a time range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub kind: MatterKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Matter {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            tags: None,
            start_time,
            end_time,
            priority: 0,
            kind: MatterKind::Normal,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Matter {
    const COLLECTION: Collection = Collection::Matters;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

/// A simple to-do item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub status: TodoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: TodoStatus::Todo,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Todo {
    const COLLECTION: Collection = Collection::Todos;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A tag. The name doubles as the identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            last_used_at: now,
        }
    }
}

impl Entity for Tag {
    const COLLECTION: Collection = Collection::Tags;

    fn id(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatTaskStatus {
    #[default]
    Active,
    Stopped,
    Archived,
}

/// A recurring-task definition. `repeat_time` carries the recurrence
/// pattern as an opaque string; interpreting it is presentation-layer
/// work, not the store's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepeatTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Option<String>,
    pub repeat_time: String,
    pub status: RepeatTaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: Option<String>,
}

impl RepeatTask {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        repeat_time: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            tags: None,
            repeat_time: repeat_time.into(),
            status: RepeatTaskStatus::Active,
            created_at: now,
            updated_at: now,
            priority: 0,
            description: None,
        }
    }
}

impl Entity for RepeatTask {
    const COLLECTION: Collection = Collection::RepeatTasks;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Unread,
    Read,
}

/// A delivered (or pending) notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Application-defined category; `mark_notifications_read_by_kind`
    /// matches on it.
    pub kind: i32,
    pub status: NotificationStatus,
    #[serde(default)]
    pub related_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action_url: Option<String>,
}

impl NotificationRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: i32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            kind,
            status: NotificationStatus::Unread,
            related_task_id: None,
            created_at: Utc::now(),
            read_at: None,
            expire_at: None,
            action_url: None,
        }
    }
}

impl Entity for NotificationRecord {
    const COLLECTION: Collection = Collection::Notifications;

    fn id(&self) -> &str {
        &self.id
    }
}

/// An arbitrary key/value setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            value: value.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for KvEntry {
    const COLLECTION: Collection = Collection::Kv;

    fn id(&self) -> &str {
        &self.key
    }
}
