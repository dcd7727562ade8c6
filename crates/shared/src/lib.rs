pub mod checklist;
pub mod domain;
pub mod error;
pub mod protocol;
