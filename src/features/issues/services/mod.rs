pub mod issue_store;
pub mod report_service;

pub use issue_store::{IssueStore, PgIssueStore};
pub use report_service::{ReportService, ReportSettings};
