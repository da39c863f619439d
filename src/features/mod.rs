pub mod analytics;
pub mod auth;
pub mod issues;
pub mod officers;
pub mod prioritization;
