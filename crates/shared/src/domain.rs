use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(CaseId);
id_newtype!(TaskId);
id_newtype!(HistoryId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// Lifecycle of an onboarding case.
///
/// Only `Canceled` is ever written directly; every other value is derived from
/// the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Todo,
    InProgress,
    Completed,
    Canceled,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Todo => "진행 전",
            Self::InProgress => "진행 중",
            Self::Completed => "진행 완료",
            Self::Canceled => "진행 취소",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Before,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Before => "업무 전",
            Self::InProgress => "진행 중",
            Self::Completed => "업무 완료",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Self::Before),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Tag carried by every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryKind {
    CaseCreate,
    CaseCancel,
    TaskStart,
    TaskComplete,
    TaskUpdate,
    AssigneeChange,
    FileUpload,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreate => "CASE_CREATE",
            Self::CaseCancel => "CASE_CANCEL",
            Self::TaskStart => "TASK_START",
            Self::TaskComplete => "TASK_COMPLETE",
            Self::TaskUpdate => "TASK_UPDATE",
            Self::AssigneeChange => "ASSIGNEE_CHANGE",
            Self::FileUpload => "FILE_UPLOAD",
        }
    }
}

impl FromStr for HistoryKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASE_CREATE" => Ok(Self::CaseCreate),
            "CASE_CANCEL" => Ok(Self::CaseCancel),
            "TASK_START" => Ok(Self::TaskStart),
            "TASK_COMPLETE" => Ok(Self::TaskComplete),
            "TASK_UPDATE" => Ok(Self::TaskUpdate),
            "ASSIGNEE_CHANGE" => Ok(Self::AssigneeChange),
            "FILE_UPLOAD" => Ok(Self::FileUpload),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Intake form submitted when a new hire is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseForm {
    pub name: String,
    pub position: String,
    pub job_title: String,
    pub division: String,
    pub office: String,
    pub team: String,
    pub part: String,
    pub role: String,
    pub detail_role: String,
    pub phone: String,
    pub email: String,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub case_id: CaseId,
    pub name: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryLog {
    pub id: HistoryId,
    pub case_id: CaseId,
    pub actor: User,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingCase {
    pub id: CaseId,
    #[serde(flatten)]
    pub form: CaseForm,
    pub owner: User,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub history: Vec<HistoryLog>,
}

impl OnboardingCase {
    pub fn is_canceled(&self) -> bool {
        self.status == CaseStatus::Canceled
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn completed_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Completed)
            .count()
    }
}
