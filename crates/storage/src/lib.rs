use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use shared::domain::{
    CaseForm, CaseId, CaseStatus, HistoryId, HistoryKind, HistoryLog, OnboardingCase, Task, TaskId,
    TaskStatus, User, UserId,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One row of the checklist as it is inserted for a new case.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub status: TaskStatus,
    pub assignee_id: Option<UserId>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub case_id: CaseId,
    pub actor_id: UserId,
    pub kind: HistoryKind,
    pub description: String,
}

/// Column-level changes for a single task row. `None` leaves the column as is;
/// `assignee: Some(None)` clears the assignee.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub assignee: Option<Option<UserId>>,
    pub external_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assignee.is_none()
            && self.external_url.is_none()
            && self.completed_at.is_none()
    }
}

const CASE_COLUMNS: &str = "c.id, c.name, c.position, c.job_title, c.division, c.office, c.team, c.part,
       c.role, c.detail_role, c.phone, c.email, c.start_date, c.status, c.cancel_reason, c.created_at,
       p.id AS owner_id, p.full_name AS owner_name, p.email AS owner_email, p.avatar_url AS owner_avatar";

const TASK_COLUMNS: &str = "t.id, t.case_id, t.name, t.status, t.completed_at, t.external_url, t.sort_order,
       p.id AS assignee_id, p.full_name AS assignee_name, p.email AS assignee_email,
       p.avatar_url AS assignee_avatar";

const HISTORY_COLUMNS: &str = "h.id, h.case_id, h.type, h.description, h.created_at,
       p.id AS actor_id, p.full_name AS actor_name, p.email AS actor_email, p.avatar_url AS actor_avatar";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn upsert_profile(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, full_name, email, avatar_url, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name, email = excluded.email,
                 avatar_url = excluded.avatar_url, updated_at = excluded.updated_at",
        )
        .bind(user.id.to_string())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert profile {}", user.id))?;
        Ok(())
    }

    pub async fn record_session(&self, user_id: UserId, user_agent: Option<&str>) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO user_sessions (user_id, login_at, user_agent) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id.to_string())
        .bind(Utc::now())
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to record login session for {user_id}"))?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn session_count(&self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_profiles(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, full_name, email, avatar_url FROM profiles ORDER BY full_name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| user_from_row(row, "")).collect()
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, full_name, email, avatar_url FROM profiles WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| user_from_row(&row, "")).transpose()
    }

    pub async fn insert_case(
        &self,
        form: &CaseForm,
        owner_id: UserId,
        status: CaseStatus,
    ) -> Result<CaseId> {
        let case_id = CaseId::new();
        sqlx::query(
            "INSERT INTO onboarding_cases (id, name, position, job_title, division, office, team, part,
                 role, detail_role, phone, email, start_date, owner_id, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(case_id.to_string())
        .bind(&form.name)
        .bind(&form.position)
        .bind(&form.job_title)
        .bind(&form.division)
        .bind(&form.office)
        .bind(&form.team)
        .bind(&form.part)
        .bind(&form.role)
        .bind(&form.detail_role)
        .bind(&form.phone)
        .bind(&form.email)
        .bind(form.start_date)
        .bind(owner_id.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to insert onboarding case")?;
        debug!(%case_id, "inserted onboarding case");
        Ok(case_id)
    }

    /// Inserts the whole task set as one write; either every row lands or none.
    pub async fn insert_tasks(&self, case_id: CaseId, tasks: &[NewTask]) -> Result<Vec<TaskId>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let task_id = TaskId::new();
            sqlx::query(
                "INSERT INTO tasks (id, case_id, name, status, assignee_id, sort_order)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(task_id.to_string())
            .bind(case_id.to_string())
            .bind(&task.name)
            .bind(task.status.as_str())
            .bind(task.assignee_id.map(|id| id.to_string()))
            .bind(task.sort_order)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert task '{}' for case {case_id}", task.name))?;
            ids.push(task_id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<HistoryId> {
        let history_id = HistoryId::new();
        sqlx::query(
            "INSERT INTO history_logs (id, case_id, actor_id, type, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(history_id.to_string())
        .bind(entry.case_id.to_string())
        .bind(entry.actor_id.to_string())
        .bind(entry.kind.as_str())
        .bind(&entry.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to append history for case {}", entry.case_id))?;
        Ok(history_id)
    }

    pub async fn set_case_status(&self, case_id: CaseId, status: CaseStatus) -> Result<bool> {
        let affected = sqlx::query("UPDATE onboarding_cases SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(case_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    pub async fn cancel_case(&self, case_id: CaseId, reason: &str) -> Result<bool> {
        let affected =
            sqlx::query("UPDATE onboarding_cases SET status = ?, cancel_reason = ? WHERE id = ?")
                .bind(CaseStatus::Canceled.as_str())
                .bind(reason)
                .bind(case_id.to_string())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected > 0)
    }

    pub async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        let mut columns = builder.separated(", ");
        if let Some(status) = patch.status {
            columns.push("status = ");
            columns.push_bind_unseparated(status.as_str());
        }
        if let Some(assignee) = patch.assignee {
            columns.push("assignee_id = ");
            columns.push_bind_unseparated(assignee.map(|id| id.to_string()));
        }
        if let Some(url) = &patch.external_url {
            columns.push("external_url = ");
            columns.push_bind_unseparated(url.clone());
        }
        if let Some(completed_at) = patch.completed_at {
            columns.push("completed_at = ");
            columns.push_bind_unseparated(completed_at);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(task_id.to_string());

        let affected = builder
            .build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update task {task_id}"))?
            .rows_affected();
        Ok(affected > 0)
    }

    /// Loads one case with its tasks (by sort order) and history (oldest first).
    pub async fn load_case(&self, case_id: CaseId) -> Result<Option<OnboardingCase>> {
        let mut cases = self.load_cases(Some(case_id)).await?;
        Ok(cases.pop())
    }

    /// Every case, newest first, with nested tasks and history.
    pub async fn list_cases(&self) -> Result<Vec<OnboardingCase>> {
        self.load_cases(None).await
    }

    async fn load_cases(&self, only: Option<CaseId>) -> Result<Vec<OnboardingCase>> {
        let case_filter = if only.is_some() { "WHERE c.id = ?" } else { "" };
        let task_filter = if only.is_some() { "WHERE t.case_id = ?" } else { "" };
        let history_filter = if only.is_some() { "WHERE h.case_id = ?" } else { "" };

        let case_sql = format!(
            "SELECT {CASE_COLUMNS}
             FROM onboarding_cases c
             INNER JOIN profiles p ON p.id = c.owner_id
             {case_filter}
             ORDER BY c.created_at DESC, c.rowid DESC"
        );
        let task_sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             LEFT JOIN profiles p ON p.id = t.assignee_id
             {task_filter}
             ORDER BY t.case_id, t.sort_order ASC"
        );
        let history_sql = format!(
            "SELECT {HISTORY_COLUMNS}
             FROM history_logs h
             INNER JOIN profiles p ON p.id = h.actor_id
             {history_filter}
             ORDER BY h.created_at ASC, h.rowid ASC"
        );

        let filter_value = only.map(|id| id.to_string());
        let mut case_query = sqlx::query(&case_sql);
        let mut task_query = sqlx::query(&task_sql);
        let mut history_query = sqlx::query(&history_sql);
        if let Some(value) = &filter_value {
            case_query = case_query.bind(value.clone());
            task_query = task_query.bind(value.clone());
            history_query = history_query.bind(value.clone());
        }

        let case_rows = case_query
            .fetch_all(&self.pool)
            .await
            .context("failed to query onboarding cases")?;
        if case_rows.is_empty() {
            return Ok(Vec::new());
        }
        let task_rows = task_query
            .fetch_all(&self.pool)
            .await
            .context("failed to query tasks")?;
        let history_rows = history_query
            .fetch_all(&self.pool)
            .await
            .context("failed to query history logs")?;

        let mut tasks_by_case: HashMap<CaseId, Vec<Task>> = HashMap::new();
        for row in &task_rows {
            let task = task_from_row(row)?;
            tasks_by_case.entry(task.case_id).or_default().push(task);
        }
        let mut history_by_case: HashMap<CaseId, Vec<HistoryLog>> = HashMap::new();
        for row in &history_rows {
            let entry = history_from_row(row)?;
            history_by_case
                .entry(entry.case_id)
                .or_default()
                .push(entry);
        }

        case_rows
            .iter()
            .map(|row| {
                let mut case = case_from_row(row)?;
                case.tasks = tasks_by_case.remove(&case.id).unwrap_or_default();
                case.history = history_by_case.remove(&case.id).unwrap_or_default();
                Ok(case)
            })
            .collect()
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid uuid '{raw}' in store"))
}

/// Reads a profile whose columns are `<prefix>id`, `<prefix>name`... or, with
/// an empty prefix, the plain profile table columns.
fn user_from_row(row: &SqliteRow, prefix: &str) -> Result<User> {
    let (id_col, name_col, email_col, avatar_col) = if prefix.is_empty() {
        (
            "id".to_string(),
            "full_name".to_string(),
            "email".to_string(),
            "avatar_url".to_string(),
        )
    } else {
        (
            format!("{prefix}_id"),
            format!("{prefix}_name"),
            format!("{prefix}_email"),
            format!("{prefix}_avatar"),
        )
    };
    Ok(User {
        id: UserId(parse_uuid(&row.try_get::<String, _>(id_col.as_str())?)?),
        full_name: row.try_get(name_col.as_str())?,
        email: row.try_get(email_col.as_str())?,
        avatar_url: row.try_get(avatar_col.as_str())?,
    })
}

fn case_from_row(row: &SqliteRow) -> Result<OnboardingCase> {
    let status: String = row.try_get("status")?;
    Ok(OnboardingCase {
        id: CaseId(parse_uuid(&row.try_get::<String, _>("id")?)?),
        form: CaseForm {
            name: row.try_get("name")?,
            position: row.try_get("position")?,
            job_title: row.try_get("job_title")?,
            division: row.try_get("division")?,
            office: row.try_get("office")?,
            team: row.try_get("team")?,
            part: row.try_get("part")?,
            role: row.try_get("role")?,
            detail_role: row.try_get("detail_role")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            start_date: row.try_get::<NaiveDate, _>("start_date")?,
        },
        owner: user_from_row(row, "owner")?,
        status: status
            .parse()
            .map_err(|e| anyhow!("case status column: {e}"))?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        tasks: Vec::new(),
        history: Vec::new(),
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let status: String = row.try_get("status")?;
    let assignee = match row.try_get::<Option<String>, _>("assignee_id")? {
        Some(_) => Some(user_from_row(row, "assignee")?),
        None => None,
    };
    Ok(Task {
        id: TaskId(parse_uuid(&row.try_get::<String, _>("id")?)?),
        case_id: CaseId(parse_uuid(&row.try_get::<String, _>("case_id")?)?),
        name: row.try_get("name")?,
        status: status
            .parse()
            .map_err(|e| anyhow!("task status column: {e}"))?,
        assignee,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        external_url: row.try_get("external_url")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryLog> {
    let kind: String = row.try_get("type")?;
    Ok(HistoryLog {
        id: HistoryId(parse_uuid(&row.try_get::<String, _>("id")?)?),
        case_id: CaseId(parse_uuid(&row.try_get::<String, _>("case_id")?)?),
        actor: user_from_row(row, "actor")?,
        kind: kind
            .parse()
            .map_err(|e| anyhow!("history type column: {e}"))?,
        description: row.try_get("description")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
