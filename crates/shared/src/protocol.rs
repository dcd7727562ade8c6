use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CaseForm, CaseId, CaseStatus, HistoryLog, OnboardingCase, TaskId, User, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleLoginRequest {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    /// Set when the identity provider could not be reached and the fallback
    /// administrator identity was used instead.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    pub actor_id: UserId,
    #[serde(flatten)]
    pub form: CaseForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssigneeRequest {
    pub actor_id: UserId,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelCaseRequest {
    pub actor_id: UserId,
    pub reason: String,
}

/// Result of pressing the start/complete button on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Updated { case: Box<OnboardingCase> },
    FileRequired { task_id: TaskId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub canceled: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Todo,
    InProgress,
    Completed,
    Canceled,
}

impl StatusFilter {
    pub fn matches(&self, status: CaseStatus) -> bool {
        match self {
            Self::All => true,
            Self::Todo => status == CaseStatus::Todo,
            Self::InProgress => status == CaseStatus::InProgress,
            Self::Completed => status == CaseStatus::Completed,
            Self::Canceled => status == CaseStatus::Canceled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<StatusFilter>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRow {
    pub display_no: usize,
    pub case_id: CaseId,
    pub name: String,
    pub position: String,
    pub job_title: String,
    pub division: String,
    pub team: String,
    pub start_date: NaiveDate,
    pub owner_name: String,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub progress_percent: u8,
    pub status: CaseStatus,
    pub status_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasePage {
    pub rows: Vec<CaseRow>,
    pub page: usize,
    pub total_pages: usize,
    pub total_cases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryView {
    pub title: String,
    pub entries: Vec<HistoryLog>,
}
