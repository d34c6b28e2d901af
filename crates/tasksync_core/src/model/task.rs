//! Task model and the records a task owns.
//!
//! # Invariants
//! - `completed == 0` means open; `deleted == 0` means live, anything else
//!   is a soft-delete tombstone timestamp.
//! - Every dependent record references exactly one task by `TaskId` and must
//!   not outlive it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Local surrogate id of a task row.
pub type TaskId = i64;

/// Repeat cadence of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_rrule(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

/// Structured recurrence, persisted as an RRULE fragment
/// (`FREQ=WEEKLY;INTERVAL=2;UNTIL=...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    /// Epoch ms after which no occurrence is generated.
    pub until: Option<i64>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            until: None,
        }
    }
}

impl Display for RecurrenceRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_rrule())?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={until}")?;
        }
        Ok(())
    }
}

impl FromStr for RecurrenceRule {
    type Err = TaskValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TaskValidationError::InvalidRecurrence(value.to_string());
        let mut frequency = None;
        let mut interval = 1;
        let mut until = None;

        for part in value.trim().trim_start_matches("RRULE:").split(';') {
            let (key, raw) = part.split_once('=').ok_or_else(invalid)?;
            match key {
                "FREQ" => {
                    frequency = Some(match raw {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        "MONTHLY" => Frequency::Monthly,
                        "YEARLY" => Frequency::Yearly,
                        _ => return Err(invalid()),
                    })
                }
                "INTERVAL" => interval = raw.parse().map_err(|_| invalid())?,
                "UNTIL" => until = Some(raw.parse().map_err(|_| invalid())?),
                _ => {}
            }
        }

        let rule = Self {
            frequency: frequency.ok_or_else(invalid)?,
            interval,
            until,
        };
        if rule.interval == 0 {
            return Err(invalid());
        }
        Ok(rule)
    }
}

/// Validation failure for task-owned data.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValidationError {
    NegativeTimestamp(&'static str),
    InvalidRecurrence(String),
    InvalidCoordinates { latitude: f64, longitude: f64 },
    InvalidRadius(i64),
    BlankReference(&'static str),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeTimestamp(field) => write!(f, "{field} must not be negative"),
            Self::InvalidRecurrence(value) => write!(f, "invalid recurrence rule `{value}`"),
            Self::InvalidCoordinates {
                latitude,
                longitude,
            } => write!(f, "invalid coordinates ({latitude}, {longitude})"),
            Self::InvalidRadius(radius) => write!(f, "geofence radius must be positive, got {radius}"),
            Self::BlankReference(field) => write!(f, "{field} must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// A task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// `0` until the store assigns an id.
    pub id: TaskId,
    pub title: String,
    pub created: i64,
    pub modified: i64,
    pub completed: i64,
    pub deleted: i64,
    /// Epoch ms; `0` = no due date.
    pub due_date: i64,
    pub has_due_time: bool,
    pub recurrence: Option<RecurrenceRule>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            created: 0,
            modified: 0,
            completed: 0,
            deleted: 0,
            due_date: 0,
            has_due_time: false,
            recurrence: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted > 0
    }

    pub fn is_completed(&self) -> bool {
        self.completed > 0
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        for (field, value) in [
            ("created", self.created),
            ("modified", self.modified),
            ("completed", self.completed),
            ("deleted", self.deleted),
            ("due_date", self.due_date),
        ] {
            if value < 0 {
                return Err(TaskValidationError::NegativeTimestamp(field));
            }
        }
        if let Some(rule) = self.recurrence {
            if rule.interval == 0 {
                return Err(TaskValidationError::InvalidRecurrence(rule.to_string()));
            }
        }
        Ok(())
    }
}

/// Tag membership link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub task: TaskId,
    pub name: String,
}

/// Absolute-time reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub task: TaskId,
    pub time: i64,
}

/// Location trigger; `place` identifies the registration shared across tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: i64,
    pub task: TaskId,
    pub place: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub radius: i64,
}

impl Geofence {
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.place.trim().is_empty() {
            return Err(TaskValidationError::BlankReference("place"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TaskValidationError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        if self.radius <= 0 {
            return Err(TaskValidationError::InvalidRadius(self.radius));
        }
        Ok(())
    }
}

/// File attached to a task, referenced by URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub task: TaskId,
    pub uuid: String,
    pub uri: String,
}

/// Comment on a task with optional picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub task: TaskId,
    pub uuid: String,
    pub message: String,
    pub picture_uri: Option<String>,
    pub created: i64,
}

/// Provider link placing a task into one remote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMembership {
    pub id: i64,
    pub task: TaskId,
    pub list_id: i64,
    pub remote_id: Option<String>,
    /// Set when the task has been moved out of or deleted from this list.
    pub deleted: i64,
    pub remote_order: i64,
    pub remote_parent: Option<String>,
}
