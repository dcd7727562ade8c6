use super::*;

fn person(name: &str) -> User {
    User {
        id: UserId::new(),
        full_name: name.to_string(),
        email: format!("{}@company.com", name.to_lowercase()),
        avatar_url: format!("https://picsum.photos/seed/{name}/80/80"),
    }
}

fn form(name: &str) -> CaseForm {
    CaseForm {
        name: name.to_string(),
        position: "사원".into(),
        job_title: "팀원".into(),
        division: "경영지원본부".into(),
        office: "인사실".into(),
        team: "HR팀".into(),
        part: "채용파트".into(),
        role: "인사".into(),
        detail_role: "채용 및 온보딩".into(),
        phone: "010-0000-0000".into(),
        email: "new.hire@email.com".into(),
        start_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("date"),
    }
}

async fn seeded() -> (Storage, User) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = person("Kim");
    storage.upsert_profile(&owner).await.expect("profile");
    (storage, owner)
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("onboarding_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn profile_upsert_updates_in_place_and_lists_by_name() {
    let (storage, mut owner) = seeded().await;
    let lee = person("Lee");
    let park = person("Park");
    storage.upsert_profile(&park).await.expect("park");
    storage.upsert_profile(&lee).await.expect("lee");

    owner.full_name = "Ahn".into();
    storage.upsert_profile(&owner).await.expect("rename");

    let names: Vec<String> = storage
        .list_profiles()
        .await
        .expect("profiles")
        .into_iter()
        .map(|user| user.full_name)
        .collect();
    assert_eq!(names, vec!["Ahn", "Lee", "Park"]);

    let loaded = storage
        .profile(owner.id)
        .await
        .expect("lookup")
        .expect("exists");
    assert_eq!(loaded, owner);
}

#[tokio::test]
async fn records_login_sessions() {
    let (storage, owner) = seeded().await;
    storage
        .record_session(owner.id, Some("test-agent"))
        .await
        .expect("session");
    storage
        .record_session(owner.id, None)
        .await
        .expect("session");
    assert_eq!(storage.session_count(owner.id).await.expect("count"), 2);
}

#[tokio::test]
async fn case_round_trips_with_ordered_tasks_and_history() {
    let (storage, owner) = seeded().await;
    let case_id = storage
        .insert_case(&form("Kim"), owner.id, CaseStatus::Todo)
        .await
        .expect("case");
    let tasks: Vec<NewTask> = ["second", "first"]
        .iter()
        .enumerate()
        .map(|(i, name)| NewTask {
            name: name.to_string(),
            status: TaskStatus::Before,
            assignee_id: if i == 0 { Some(owner.id) } else { None },
            sort_order: 1 - i as i64,
        })
        .collect();
    storage.insert_tasks(case_id, &tasks).await.expect("tasks");
    for description in ["one", "two"] {
        storage
            .insert_history(&NewHistoryEntry {
                case_id,
                actor_id: owner.id,
                kind: HistoryKind::TaskUpdate,
                description: description.to_string(),
            })
            .await
            .expect("history");
    }

    let case = storage
        .load_case(case_id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(case.form, form("Kim"));
    assert_eq!(case.owner, owner);
    assert_eq!(case.status, CaseStatus::Todo);
    let names: Vec<&str> = case.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert!(case.tasks[0].assignee.is_none());
    assert_eq!(case.tasks[1].assignee.as_ref(), Some(&owner));
    let descriptions: Vec<&str> = case
        .history
        .iter()
        .map(|h| h.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["one", "two"]);
}

#[tokio::test]
async fn lists_cases_newest_first() {
    let (storage, owner) = seeded().await;
    let older = storage
        .insert_case(&form("Older"), owner.id, CaseStatus::Todo)
        .await
        .expect("case");
    let newer = storage
        .insert_case(&form("Newer"), owner.id, CaseStatus::Todo)
        .await
        .expect("case");

    let cases = storage.list_cases().await.expect("cases");
    let ids: Vec<CaseId> = cases.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![newer, older]);
}

#[tokio::test]
async fn task_patch_only_touches_named_columns() {
    let (storage, owner) = seeded().await;
    let case_id = storage
        .insert_case(&form("Kim"), owner.id, CaseStatus::Todo)
        .await
        .expect("case");
    let ids = storage
        .insert_tasks(
            case_id,
            &[NewTask {
                name: "only".into(),
                status: TaskStatus::Before,
                assignee_id: Some(owner.id),
                sort_order: 0,
            }],
        )
        .await
        .expect("tasks");

    let updated = storage
        .update_task(
            ids[0],
            &TaskPatch {
                external_url: Some("https://drive.example/file".into()),
                ..TaskPatch::default()
            },
        )
        .await
        .expect("patch");
    assert!(updated);

    let cleared = storage
        .update_task(
            ids[0],
            &TaskPatch {
                assignee: Some(None),
                status: Some(TaskStatus::InProgress),
                ..TaskPatch::default()
            },
        )
        .await
        .expect("patch");
    assert!(cleared);

    let case = storage
        .load_case(case_id)
        .await
        .expect("load")
        .expect("case");
    let task = &case.tasks[0];
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.assignee.is_none());
    assert_eq!(
        task.external_url.as_deref(),
        Some("https://drive.example/file")
    );
    assert!(task.completed_at.is_none());

    assert!(!storage
        .update_task(ids[0], &TaskPatch::default())
        .await
        .expect("empty patch"));
    assert!(!storage
        .update_task(
            TaskId::new(),
            &TaskPatch {
                status: Some(TaskStatus::Completed),
                ..TaskPatch::default()
            }
        )
        .await
        .expect("missing task"));
}

#[tokio::test]
async fn cancel_stores_reason_verbatim() {
    let (storage, owner) = seeded().await;
    let case_id = storage
        .insert_case(&form("Kim"), owner.id, CaseStatus::InProgress)
        .await
        .expect("case");
    assert!(storage
        .cancel_case(case_id, "  Position rescinded ")
        .await
        .expect("cancel"));

    let case = storage
        .load_case(case_id)
        .await
        .expect("load")
        .expect("case");
    assert_eq!(case.status, CaseStatus::Canceled);
    assert_eq!(case.cancel_reason.as_deref(), Some("  Position rescinded "));
}

#[tokio::test]
async fn case_insert_requires_known_owner() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .insert_case(&form("Ghost"), UserId::new(), CaseStatus::Todo)
        .await
        .expect_err("foreign key");
    assert!(err.to_string().contains("onboarding case"));
}

#[tokio::test]
async fn missing_case_loads_as_none() {
    let (storage, _owner) = seeded().await;
    assert!(storage
        .load_case(CaseId::new())
        .await
        .expect("load")
        .is_none());
}
