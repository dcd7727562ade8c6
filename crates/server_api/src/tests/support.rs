use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use chrono::NaiveDate;
use google_client::{DriveClient, DriveConfig, IdentityClient};
use shared::domain::{CaseForm, CaseId, CaseStatus, HistoryId, OnboardingCase, TaskId, User, UserId};
use storage::{NewHistoryEntry, NewTask, Storage, TaskPatch};
use tokio::net::TcpListener;
use url::Url;

use crate::{ApiContext, OnboardingStore};

pub const DEMO_TOKEN: &str = "demo-token";
pub const FOLDER_ID: &str = "test-folder";

/// Nothing listens here; used where a test never reaches the network.
const UNREACHABLE: &str = "http://127.0.0.1:9/";

pub async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("storage")
}

pub fn context(store: Arc<dyn OnboardingStore>) -> ApiContext {
    context_with(store, unreachable(), unreachable())
}

pub fn context_with(
    store: Arc<dyn OnboardingStore>,
    userinfo_url: Url,
    upload_url: Url,
) -> ApiContext {
    ApiContext {
        store,
        identity: IdentityClient::new(userinfo_url),
        drive: DriveClient::new(DriveConfig {
            upload_url,
            folder_id: FOLDER_ID.to_string(),
            demo_token: DEMO_TOKEN.to_string(),
            demo_latency: Duration::ZERO,
        }),
    }
}

pub async fn memory_context() -> (ApiContext, Storage) {
    let storage = memory_storage().await;
    (context(Arc::new(storage.clone())), storage)
}

pub fn unreachable() -> Url {
    Url::parse(UNREACHABLE).expect("url")
}

/// Serves `app` on an ephemeral local port and returns `http://addr{path}`.
pub async fn spawn_stand_in(app: Router, path: &str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}{path}")).expect("url")
}

pub fn user(name: &str) -> User {
    let slug = name.to_lowercase();
    User {
        id: UserId::new(),
        full_name: name.to_string(),
        email: format!("{slug}@company.com"),
        avatar_url: format!("https://picsum.photos/seed/{slug}/80/80"),
    }
}

pub async fn seed_user(storage: &Storage, name: &str) -> User {
    let user = user(name);
    storage.upsert_profile(&user).await.expect("seed profile");
    user
}

pub fn form(name: &str) -> CaseForm {
    CaseForm {
        name: name.to_string(),
        position: "사원".to_string(),
        job_title: "Backend Engineer".to_string(),
        division: "Engineering".to_string(),
        office: "Seoul".to_string(),
        team: "Platform".to_string(),
        part: "Core".to_string(),
        role: "Developer".to_string(),
        detail_role: "API".to_string(),
        phone: "010-1234-5678".to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        start_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("date"),
    }
}

/// Operations a [`FailingStore`] can be told to fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Failures {
    pub upsert_profile: bool,
    pub record_session: bool,
    pub list_profiles: bool,
    pub insert_case: bool,
    pub insert_tasks: bool,
    pub insert_history: bool,
    pub set_case_status: bool,
    pub update_task: bool,
    pub list_cases: bool,
}

/// Delegates to a real [`Storage`] except for the operations marked to fail.
pub struct FailingStore {
    pub inner: Storage,
    pub failures: Failures,
}

fn injected<T>(op: &str) -> Result<T> {
    Err(anyhow!("injected {op} failure"))
}

#[async_trait]
impl OnboardingStore for FailingStore {
    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }

    async fn upsert_profile(&self, user: &User) -> Result<()> {
        if self.failures.upsert_profile {
            return injected("upsert_profile");
        }
        self.inner.upsert_profile(user).await
    }

    async fn record_session(&self, user_id: UserId, user_agent: Option<&str>) -> Result<()> {
        if self.failures.record_session {
            return injected("record_session");
        }
        self.inner.record_session(user_id, user_agent).await?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<User>> {
        if self.failures.list_profiles {
            return injected("list_profiles");
        }
        self.inner.list_profiles().await
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<User>> {
        self.inner.profile(user_id).await
    }

    async fn insert_case(
        &self,
        form: &CaseForm,
        owner_id: UserId,
        status: CaseStatus,
    ) -> Result<CaseId> {
        if self.failures.insert_case {
            return injected("insert_case");
        }
        self.inner.insert_case(form, owner_id, status).await
    }

    async fn insert_tasks(&self, case_id: CaseId, tasks: &[NewTask]) -> Result<Vec<TaskId>> {
        if self.failures.insert_tasks {
            return injected("insert_tasks");
        }
        self.inner.insert_tasks(case_id, tasks).await
    }

    async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<HistoryId> {
        if self.failures.insert_history {
            return injected("insert_history");
        }
        self.inner.insert_history(entry).await
    }

    async fn set_case_status(&self, case_id: CaseId, status: CaseStatus) -> Result<bool> {
        if self.failures.set_case_status {
            return injected("set_case_status");
        }
        self.inner.set_case_status(case_id, status).await
    }

    async fn cancel_case(&self, case_id: CaseId, reason: &str) -> Result<bool> {
        self.inner.cancel_case(case_id, reason).await
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<bool> {
        if self.failures.update_task {
            return injected("update_task");
        }
        self.inner.update_task(task_id, patch).await
    }

    async fn load_case(&self, case_id: CaseId) -> Result<Option<OnboardingCase>> {
        self.inner.load_case(case_id).await
    }

    async fn list_cases(&self) -> Result<Vec<OnboardingCase>> {
        if self.failures.list_cases {
            return injected("list_cases");
        }
        self.inner.list_cases().await
    }
}

pub async fn failing_context(failures: Failures) -> (ApiContext, Storage) {
    let storage = memory_storage().await;
    let store = FailingStore {
        inner: storage.clone(),
        failures,
    };
    (context(Arc::new(store)), storage)
}
