use shared::domain::{CaseStatus, Task, TaskStatus};

/// Derives a case's status from its full task list.
///
/// `Canceled` is absorbing. Otherwise every task completed gives `Completed`,
/// none completed gives `Todo`, anything in between `InProgress`. An empty
/// task list counts as all completed.
pub fn derive_case_status(tasks: &[Task], current: CaseStatus) -> CaseStatus {
    if current == CaseStatus::Canceled {
        return CaseStatus::Canceled;
    }

    let completed = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .count();
    if completed == tasks.len() {
        CaseStatus::Completed
    } else if completed == 0 {
        CaseStatus::Todo
    } else {
        CaseStatus::InProgress
    }
}
