//! Onboarding workflows: the case-status rule, the write cascades against the
//! data store, the UI-facing actions that guard them, and the read-side
//! projections the dashboard renders.

use std::sync::Arc;

use google_client::{DriveClient, IdentityClient};
use shared::error::{ApiError, ErrorCode};

pub mod actions;
pub mod auth;
pub mod rules;
pub mod store;
pub mod view;
pub mod workflow;

pub use actions::{
    advance_task, attach_document, change_assignee, register_case, request_cancel, validate_form,
    DocumentUpload,
};
pub use auth::{login_demo, login_with_google};
pub use rules::derive_case_status;
pub use store::OnboardingStore;
pub use view::{
    case_page, dashboard_counts, get_case, health, history_view, list_cases, list_users, PAGE_SIZE,
};
pub use workflow::{cancel_case, create_case, update_task, TaskUpdate};

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn OnboardingStore>,
    pub identity: IdentityClient,
    pub drive: DriveClient,
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
