//! Actions a signed-in user triggers from the case detail view. These carry
//! the guards the view enforces (no edits on a canceled case, a reason is
//! required to cancel, uploads only on the document task) before handing off
//! to [`crate::workflow`].

use google_client::UploadRequest;
use shared::{
    checklist::is_document_task,
    domain::{CaseForm, CaseId, OnboardingCase, TaskId, TaskStatus, UserId},
    error::{ApiError, ErrorCode},
    protocol::AdvanceOutcome,
};
use tracing::{info, warn};

use crate::{
    internal,
    workflow::{self, reload, TaskUpdate},
    ApiContext,
};

/// A file picked in the browser for the document-verification task.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Validates the intake form and opens a new case.
pub async fn register_case(
    ctx: &ApiContext,
    form: CaseForm,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    validate_form(&form)?;
    workflow::create_case(ctx, form, actor).await
}

/// Every text field is required and the email needs an `@`.
pub fn validate_form(form: &CaseForm) -> Result<(), ApiError> {
    let fields = [
        ("name", &form.name),
        ("position", &form.position),
        ("job_title", &form.job_title),
        ("division", &form.division),
        ("office", &form.office),
        ("team", &form.team),
        ("part", &form.part),
        ("role", &form.role),
        ("detail_role", &form.detail_role),
        ("phone", &form.phone),
        ("email", &form.email),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "required fields are empty: {}",
            missing.join(", ")
        )));
    }
    if !form.email.contains('@') {
        return Err(ApiError::validation("email must contain '@'"));
    }
    Ok(())
}

/// The start/complete button: BEFORE moves to IN_PROGRESS, IN_PROGRESS to
/// COMPLETED. The document task cannot be started without a file.
pub async fn advance_task(
    ctx: &ApiContext,
    case_id: CaseId,
    task_id: TaskId,
    actor: UserId,
) -> Result<AdvanceOutcome, ApiError> {
    let case = editable_case(ctx, case_id).await?;
    let task = case
        .task(task_id)
        .ok_or_else(|| ApiError::not_found("task not found"))?;

    let next = match task.status {
        TaskStatus::Before if is_document_task(&task.name) => {
            return Ok(AdvanceOutcome::FileRequired { task_id });
        }
        TaskStatus::Before => TaskStatus::InProgress,
        TaskStatus::InProgress => TaskStatus::Completed,
        TaskStatus::Completed => {
            return Err(ApiError::conflict("task is already completed"));
        }
    };

    let case = workflow::update_task(
        ctx,
        case_id,
        task_id,
        TaskUpdate::Status { status: next },
        actor,
    )
    .await?;
    Ok(AdvanceOutcome::Updated {
        case: Box::new(case),
    })
}

/// Sets or clears a task's assignee. The assignee must have a profile.
pub async fn change_assignee(
    ctx: &ApiContext,
    case_id: CaseId,
    task_id: TaskId,
    assignee: Option<UserId>,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    editable_case(ctx, case_id).await?;
    if let Some(assignee_id) = assignee {
        let profile = ctx.store.profile(assignee_id).await.map_err(internal)?;
        if profile.is_none() {
            return Err(ApiError::not_found("assignee not found"));
        }
    }
    let update = match assignee {
        Some(assignee_id) => TaskUpdate::Assign { assignee_id },
        None => TaskUpdate::Unassign,
    };
    workflow::update_task(ctx, case_id, task_id, update, actor).await
}

/// Uploads the file for the document task and records its link.
pub async fn attach_document(
    ctx: &ApiContext,
    case_id: CaseId,
    task_id: TaskId,
    credential: &str,
    upload: DocumentUpload,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    let case = editable_case(ctx, case_id).await?;
    let task = case
        .task(task_id)
        .ok_or_else(|| ApiError::not_found("task not found"))?;
    if !is_document_task(&task.name) {
        return Err(ApiError::validation(format!("'{}' does not accept attachments", task.name)));
    }

    let uploaded = ctx
        .drive
        .upload(
            credential,
            UploadRequest {
                case_name: &case.form.name,
                file_name: &upload.file_name,
                mime_type: upload.mime_type.as_deref(),
                bytes: &upload.bytes,
            },
        )
        .await
        .map_err(|err| {
            warn!(%case_id, error = %err, "document upload failed");
            ApiError::new(ErrorCode::Upstream, format!("upload failed: {err}"))
        })?;
    info!(%case_id, %task_id, link = %uploaded.web_view_link, "document uploaded");

    workflow::update_task(
        ctx,
        case_id,
        task_id,
        TaskUpdate::Attach {
            external_url: uploaded.web_view_link,
        },
        actor,
    )
    .await
}

/// Cancels a case after checking the reason is not blank.
pub async fn request_cancel(
    ctx: &ApiContext,
    case_id: CaseId,
    reason: &str,
    actor: UserId,
) -> Result<OnboardingCase, ApiError> {
    if reason.trim().is_empty() {
        return Err(ApiError::validation("a cancel reason is required"));
    }
    editable_case(ctx, case_id).await?;
    workflow::cancel_case(ctx, case_id, reason, actor).await
}

async fn editable_case(ctx: &ApiContext, case_id: CaseId) -> Result<OnboardingCase, ApiError> {
    let case = reload(ctx, case_id).await?;
    if case.is_canceled() {
        return Err(ApiError::conflict("case is canceled"));
    }
    Ok(case)
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
