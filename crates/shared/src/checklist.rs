//! The fixed onboarding checklist instantiated for every case.

/// Task names in display order; the index is the task's `sort_order`.
pub const ONBOARDING_CHECKLIST: [&str; 9] = [
    "입사안내메일 전송",
    "고웍스 사원등록",
    "신규계정신청서 작성",
    "사원증 발급",
    "PC 및 자리 확인",
    "네임택 제작",
    "입사서류 및 자사이력서 확인",
    "근로계약서 작성",
    "명함 신청",
];

/// The only task that accepts a document attachment.
pub const DOCUMENT_TASK_NAME: &str = "입사서류 및 자사이력서 확인";

pub fn is_document_task(task_name: &str) -> bool {
    task_name == DOCUMENT_TASK_NAME
}
