//! Write cascades against the data store.
//!
//! Each operation issues its writes one after another with no transaction.
//! The primary write failing aborts the cascade and is returned to the caller;
//! earlier writes stay in place. Secondary writes (history entries, derived
//! case status) that fail are logged and skipped. None of these operations
//! check whether the case is canceled; see [`crate::actions`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    checklist::ONBOARDING_CHECKLIST,
    domain::{
        CaseForm, CaseId, CaseStatus, HistoryKind, OnboardingCase, Task, TaskId, TaskStatus,
        UserId,
    },
    error::ApiError,
};
use storage::{NewHistoryEntry, NewTask, TaskPatch};
use tracing::{error, info, warn};

use crate::{internal, rules::derive_case_status, ApiContext};

const CASE_CREATED: &str = "온보딩 케이스가 생성되었습니다.";
const TASK_STARTED: &str = "업무를 시작했습니다.";
const TASK_COMPLETED: &str = "업무를 완료 처리했습니다.";
const TASK_UPDATED: &str = "업무 정보가 업데이트되었습니다.";
const FILE_UPLOADED: &str = "증빙 파일을 업로드했습니다.";
const UNKNOWN_ASSIGNEE: &str = "담당자";

/// A single change to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskUpdate {
    Status { status: TaskStatus },
    Assign { assignee_id: UserId },
    Unassign,
    Attach { external_url: String },
}

/// Inserts the case, its nine checklist tasks and a creation entry.
pub async fn create_case(
    ctx: &ApiContext,
    form: CaseForm,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    let case_id = ctx
        .store
        .insert_case(&form, actor, CaseStatus::Todo)
        .await
        .map_err(|err| {
            error!(error = %err, "case insert failed");
            internal(err)
        })?;

    let tasks = checklist_tasks(actor);
    if let Err(err) = ctx.store.insert_tasks(case_id, &tasks).await {
        error!(%case_id, error = %err, "task insert failed; case row left without tasks");
        return Err(internal(err));
    }

    append_history(
        ctx,
        case_id,
        actor,
        HistoryKind::CaseCreate,
        CASE_CREATED.to_string(),
    )
    .await;
    info!(%case_id, name = %form.name, "onboarding case created");

    reload(ctx, case_id).await
}

/// Applies one update to a task, re-derives the case status and appends the
/// matching history entry.
pub async fn update_task(
    ctx: &ApiContext,
    case_id: CaseId,
    task_id: TaskId,
    update: TaskUpdate,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    let case = reload(ctx, case_id).await?;
    let task = case
        .task(task_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found("task not found"))?;

    let patch = task_patch(&task, &update, Utc::now());
    let updated = ctx
        .store
        .update_task(task_id, &patch)
        .await
        .map_err(|err| {
            error!(%task_id, error = %err, "task update failed");
            internal(err)
        })?;
    if !updated {
        return Err(ApiError::not_found("task not found"));
    }

    let tasks_after: Vec<Task> = case
        .tasks
        .iter()
        .map(|t| {
            if t.id == task_id {
                apply_patch(t, &patch)
            } else {
                t.clone()
            }
        })
        .collect();
    let next_status = derive_case_status(&tasks_after, case.status);
    if next_status != case.status {
        match ctx.store.set_case_status(case_id, next_status).await {
            Ok(_) => info!(
                %case_id,
                from = case.status.as_str(),
                to = next_status.as_str(),
                "case status derived"
            ),
            Err(err) => warn!(%case_id, error = %err, "derived case status was not persisted"),
        }
    }

    let assignee_name = match &update {
        TaskUpdate::Assign { assignee_id } => Some(display_name(ctx, *assignee_id).await),
        _ => None,
    };
    let (kind, description) = describe_update(&task, &update, assignee_name.as_deref());
    append_history(ctx, case_id, actor, kind, description).await;

    reload(ctx, case_id).await
}

/// Marks the case canceled with the given reason. There is no way back.
pub async fn cancel_case(
    ctx: &ApiContext,
    case_id: CaseId,
    reason: &str,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    let canceled = ctx
        .store
        .cancel_case(case_id, reason)
        .await
        .map_err(|err| {
            error!(%case_id, error = %err, "case cancel failed");
            internal(err)
        })?;
    if !canceled {
        return Err(ApiError::not_found("case not found"));
    }

    append_history(
        ctx,
        case_id,
        actor,
        HistoryKind::CaseCancel,
        format!("온보딩 프로세스 취소 (사유: {reason})"),
    )
    .await;
    info!(%case_id, "onboarding case canceled");

    reload(ctx, case_id).await
}

pub(crate) async fn reload(ctx: &ApiContext, case_id: CaseId) -> Result<OnboardingCase, ApiError> {
    ctx.store
        .load_case(case_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("case not found"))
}

fn checklist_tasks(assignee: UserId) -> Vec<NewTask> {
    ONBOARDING_CHECKLIST
        .iter()
        .enumerate()
        .map(|(index, name)| NewTask {
            name: (*name).to_string(),
            status: TaskStatus::Before,
            assignee_id: Some(assignee),
            sort_order: index as i64,
        })
        .collect()
}

fn task_patch(task: &Task, update: &TaskUpdate, now: DateTime<Utc>) -> TaskPatch {
    match update {
        TaskUpdate::Status { status } => TaskPatch {
            status: Some(*status),
            completed_at: (*status == TaskStatus::Completed).then_some(now),
            ..TaskPatch::default()
        },
        TaskUpdate::Assign { assignee_id } => TaskPatch {
            assignee: Some(Some(*assignee_id)),
            ..TaskPatch::default()
        },
        TaskUpdate::Unassign => TaskPatch {
            assignee: Some(None),
            ..TaskPatch::default()
        },
        TaskUpdate::Attach { external_url } => TaskPatch {
            external_url: Some(external_url.clone()),
            status: (task.status == TaskStatus::Before).then_some(TaskStatus::InProgress),
            ..TaskPatch::default()
        },
    }
}

fn apply_patch(task: &Task, patch: &TaskPatch) -> Task {
    let mut next = task.clone();
    if let Some(status) = patch.status {
        next.status = status;
    }
    if let Some(completed_at) = patch.completed_at {
        next.completed_at = Some(completed_at);
    }
    if let Some(url) = &patch.external_url {
        next.external_url = Some(url.clone());
    }
    next
}

/// History kind and description for an update, prefixed with the task name.
fn describe_update(
    task: &Task,
    update: &TaskUpdate,
    assignee_name: Option<&str>,
) -> (HistoryKind, String) {
    let (kind, text) = match update {
        TaskUpdate::Status {
            status: TaskStatus::Completed,
        } => (HistoryKind::TaskComplete, TASK_COMPLETED.to_string()),
        TaskUpdate::Status {
            status: TaskStatus::InProgress,
        } => (HistoryKind::TaskStart, TASK_STARTED.to_string()),
        TaskUpdate::Status {
            status: TaskStatus::Before,
        }
        | TaskUpdate::Unassign => (HistoryKind::TaskUpdate, TASK_UPDATED.to_string()),
        TaskUpdate::Assign { .. } => {
            let name = assignee_name.unwrap_or(UNKNOWN_ASSIGNEE);
            let text = if task.assignee.is_none() {
                format!("담당자를 {name}님으로 지정했습니다.")
            } else {
                format!("담당자를 {name}님으로 변경했습니다.")
            };
            (HistoryKind::AssigneeChange, text)
        }
        TaskUpdate::Attach { .. } => (HistoryKind::FileUpload, FILE_UPLOADED.to_string()),
    };
    (kind, format!("[{}] {text}", task.name))
}

async fn display_name(ctx: &ApiContext, user_id: UserId) -> String {
    match ctx.store.profile(user_id).await {
        Ok(Some(user)) => user.full_name,
        Ok(None) => UNKNOWN_ASSIGNEE.to_string(),
        Err(err) => {
            warn!(%user_id, error = %err, "assignee lookup failed");
            UNKNOWN_ASSIGNEE.to_string()
        }
    }
}

async fn append_history(
    ctx: &ApiContext,
    case_id: CaseId,
    actor: UserId,
    kind: HistoryKind,
    description: String,
) {
    let entry = NewHistoryEntry {
        case_id,
        actor_id: actor,
        kind,
        description,
    };
    if let Err(err) = ctx.store.insert_history(&entry).await {
        warn!(%case_id, kind = kind.as_str(), error = %err, "history entry was not recorded");
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
