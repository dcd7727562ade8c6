//! Read-side projections rendered by the dashboard, case table and history
//! panel.

use shared::{
    domain::{CaseId, CaseStatus, OnboardingCase, TaskId, User},
    error::ApiError,
    protocol::{CaseListQuery, CasePage, CaseRow, DashboardCounts, HistoryView},
};
use tracing::error;

use crate::{internal, workflow::reload, ApiContext};

pub const PAGE_SIZE: usize = 10;

const ALL_HISTORY_TITLE: &str = "전체 온보딩";

pub fn dashboard_counts(cases: &[OnboardingCase]) -> DashboardCounts {
    cases
        .iter()
        .fold(DashboardCounts::default(), |mut counts, case| {
            match case.status {
                CaseStatus::Todo => counts.todo += 1,
                CaseStatus::InProgress => counts.in_progress += 1,
                CaseStatus::Completed => counts.completed += 1,
                CaseStatus::Canceled => counts.canceled += 1,
            }
            counts
        })
}

/// Filters, paginates and flattens cases into table rows. Pages are 1-based
/// and an out-of-range page is clamped.
pub fn case_page(cases: &[OnboardingCase], query: &CaseListQuery) -> CasePage {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let status = query.status.unwrap_or_default();

    let filtered: Vec<&OnboardingCase> = cases
        .iter()
        .filter(|case| status.matches(case.status))
        .filter(|case| match &needle {
            Some(needle) => case.form.name.to_lowercase().contains(needle),
            None => true,
        })
        .collect();

    let total_cases = filtered.len();
    let total_pages = total_cases.div_ceil(PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(1).clamp(1, total_pages);
    let offset = (page - 1) * PAGE_SIZE;

    let rows = filtered
        .into_iter()
        .skip(offset)
        .take(PAGE_SIZE)
        .enumerate()
        .map(|(index, case)| case_row(case, offset + index + 1))
        .collect();

    CasePage {
        rows,
        page,
        total_pages,
        total_cases,
    }
}

/// History for the whole case, or only the entries written for one task.
pub fn history_view(
    case: &OnboardingCase,
    task_id: Option<TaskId>,
) -> Result<HistoryView, ApiError> {
    let Some(task_id) = task_id else {
        return Ok(HistoryView {
            title: ALL_HISTORY_TITLE.to_string(),
            entries: case.history.clone(),
        });
    };

    let task = case
        .task(task_id)
        .ok_or_else(|| ApiError::not_found("task not found"))?;
    let prefix = format!("[{}]", task.name);
    Ok(HistoryView {
        title: task.name.clone(),
        entries: case
            .history
            .iter()
            .filter(|entry| entry.description.starts_with(&prefix))
            .cloned()
            .collect(),
    })
}

pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Rounds half up.
    ((completed * 200 + total) / (2 * total)) as u8
}

/// All cases, newest first. A failed query is logged and yields an empty list.
pub async fn list_cases(ctx: &ApiContext) -> Vec<OnboardingCase> {
    match ctx.store.list_cases().await {
        Ok(cases) => cases,
        Err(err) => {
            error!(error = %err, "case list query failed");
            Vec::new()
        }
    }
}

/// Assignable users ordered by name. A failed query yields an empty list.
pub async fn list_users(ctx: &ApiContext) -> Vec<User> {
    match ctx.store.list_profiles().await {
        Ok(users) => users,
        Err(err) => {
            error!(error = %err, "user list query failed");
            Vec::new()
        }
    }
}

pub async fn get_case(ctx: &ApiContext, case_id: CaseId) -> Result<OnboardingCase, ApiError> {
    reload(ctx, case_id).await
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.store.health_check().await.map_err(internal)
}

fn case_row(case: &OnboardingCase, display_no: usize) -> CaseRow {
    let completed_tasks = case.completed_task_count();
    let total_tasks = case.tasks.len();
    CaseRow {
        display_no,
        case_id: case.id,
        name: case.form.name.clone(),
        position: case.form.position.clone(),
        job_title: case.form.job_title.clone(),
        division: case.form.division.clone(),
        team: case.form.team.clone(),
        start_date: case.form.start_date,
        owner_name: case.owner.full_name.clone(),
        completed_tasks,
        total_tasks,
        progress_percent: progress_percent(completed_tasks, total_tasks),
        status: case.status,
        status_label: case.status.label().to_string(),
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
