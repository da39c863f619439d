pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::{PgIssueStore, ReportService, ReportSettings};
pub use workers::PriorityRefresher;
