use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{CaseForm, CaseId, CaseStatus, HistoryId, OnboardingCase, TaskId, User, UserId};
use storage::{NewHistoryEntry, NewTask, Storage, TaskPatch};

/// The data-store operations the workflows depend on.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    async fn health_check(&self) -> Result<()>;
    async fn upsert_profile(&self, user: &User) -> Result<()>;
    async fn record_session(&self, user_id: UserId, user_agent: Option<&str>) -> Result<()>;
    async fn list_profiles(&self) -> Result<Vec<User>>;
    async fn profile(&self, user_id: UserId) -> Result<Option<User>>;
    async fn insert_case(&self, form: &CaseForm, owner_id: UserId, status: CaseStatus)
        -> Result<CaseId>;
    async fn insert_tasks(&self, case_id: CaseId, tasks: &[NewTask]) -> Result<Vec<TaskId>>;
    async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<HistoryId>;
    async fn set_case_status(&self, case_id: CaseId, status: CaseStatus) -> Result<bool>;
    async fn cancel_case(&self, case_id: CaseId, reason: &str) -> Result<bool>;
    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<bool>;
    async fn load_case(&self, case_id: CaseId) -> Result<Option<OnboardingCase>>;
    async fn list_cases(&self) -> Result<Vec<OnboardingCase>>;
}

#[async_trait]
impl OnboardingStore for Storage {
    async fn health_check(&self) -> Result<()> {
        Storage::health_check(self).await
    }

    async fn upsert_profile(&self, user: &User) -> Result<()> {
        Storage::upsert_profile(self, user).await
    }

    async fn record_session(&self, user_id: UserId, user_agent: Option<&str>) -> Result<()> {
        Storage::record_session(self, user_id, user_agent).await?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<User>> {
        Storage::list_profiles(self).await
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<User>> {
        Storage::profile(self, user_id).await
    }

    async fn insert_case(
        &self,
        form: &CaseForm,
        owner_id: UserId,
        status: CaseStatus,
    ) -> Result<CaseId> {
        Storage::insert_case(self, form, owner_id, status).await
    }

    async fn insert_tasks(&self, case_id: CaseId, tasks: &[NewTask]) -> Result<Vec<TaskId>> {
        Storage::insert_tasks(self, case_id, tasks).await
    }

    async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<HistoryId> {
        Storage::insert_history(self, entry).await
    }

    async fn set_case_status(&self, case_id: CaseId, status: CaseStatus) -> Result<bool> {
        Storage::set_case_status(self, case_id, status).await
    }

    async fn cancel_case(&self, case_id: CaseId, reason: &str) -> Result<bool> {
        Storage::cancel_case(self, case_id, reason).await
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<bool> {
        Storage::update_task(self, task_id, patch).await
    }

    async fn load_case(&self, case_id: CaseId) -> Result<Option<OnboardingCase>> {
        Storage::load_case(self, case_id).await
    }

    async fn list_cases(&self) -> Result<Vec<OnboardingCase>> {
        Storage::list_cases(self).await
    }
}
