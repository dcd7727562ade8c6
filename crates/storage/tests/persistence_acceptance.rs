use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::NaiveDate;
use shared::domain::{CaseForm, CaseStatus, HistoryKind, TaskStatus, User, UserId};
use storage::{NewHistoryEntry, NewTask, Storage, TaskPatch};

fn form() -> CaseForm {
    CaseForm {
        name: "Choi".into(),
        position: "선임".into(),
        job_title: "Designer".into(),
        division: "Product".into(),
        office: "Pangyo".into(),
        team: "UX".into(),
        part: "Research".into(),
        role: "Design".into(),
        detail_role: "Interaction".into(),
        phone: "010-9876-5432".into(),
        email: "choi@example.com".into(),
        start_date: NaiveDate::from_ymd_opt(2026, 12, 1).expect("date"),
    }
}

#[tokio::test]
async fn case_survives_reopening_the_database_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = env::temp_dir().join(format!("onboarding_storage_acceptance_{suffix}"));
    let db_path = root.join("nested").join("store.db");
    let url = format!("sqlite://{}", db_path.display());

    let owner = User {
        id: UserId::new(),
        full_name: "HR Admin".into(),
        email: "hr@company.com".into(),
        avatar_url: "https://picsum.photos/seed/hr/80/80".into(),
    };

    let (case_id, task_ids) = {
        let storage = Storage::new(&url).await.expect("open");
        storage.upsert_profile(&owner).await.expect("profile");
        let case_id = storage
            .insert_case(&form(), owner.id, CaseStatus::Todo)
            .await
            .expect("case");
        let tasks: Vec<NewTask> = ["first", "second"]
            .iter()
            .enumerate()
            .map(|(i, name)| NewTask {
                name: (*name).into(),
                status: TaskStatus::Before,
                assignee_id: Some(owner.id),
                sort_order: i as i64,
            })
            .collect();
        let task_ids = storage.insert_tasks(case_id, &tasks).await.expect("tasks");
        storage
            .update_task(
                task_ids[0],
                &TaskPatch {
                    status: Some(TaskStatus::Completed),
                    completed_at: Some(chrono::Utc::now()),
                    ..TaskPatch::default()
                },
            )
            .await
            .expect("patch");
        storage
            .set_case_status(case_id, CaseStatus::InProgress)
            .await
            .expect("status");
        storage
            .insert_history(&NewHistoryEntry {
                case_id,
                actor_id: owner.id,
                kind: HistoryKind::TaskComplete,
                description: "[first] 업무를 완료 처리했습니다.".into(),
            })
            .await
            .expect("history");
        (case_id, task_ids)
    };

    let reopened = Storage::new(&url).await.expect("reopen");
    let case = reopened
        .load_case(case_id)
        .await
        .expect("load")
        .expect("case exists");
    assert_eq!(case.status, CaseStatus::InProgress);
    assert_eq!(case.owner, owner);
    assert_eq!(
        case.tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
        task_ids
    );
    assert_eq!(case.tasks[0].status, TaskStatus::Completed);
    assert!(case.tasks[0].completed_at.is_some());
    assert_eq!(case.tasks[1].status, TaskStatus::Before);
    assert_eq!(case.history.len(), 1);
    assert_eq!(case.history[0].kind, HistoryKind::TaskComplete);

    drop(reopened);
    fs::remove_dir_all(root).expect("cleanup");
}
