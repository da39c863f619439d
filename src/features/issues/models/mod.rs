mod issue;

pub use issue::{CreateIssue, Issue, IssueStatus, PriorityUpdate, ProgressUpdate};
