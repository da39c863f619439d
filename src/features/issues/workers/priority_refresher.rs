use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::features::issues::services::ReportService;

/// Background worker that keeps live priorities in step with the current
/// model and report counts, so list views never have to write
pub struct PriorityRefresher {
    report_service: Arc<ReportService>,
    period: Duration,
}

impl PriorityRefresher {
    pub fn new(report_service: Arc<ReportService>, period: Duration) -> Self {
        Self {
            report_service,
            period,
        }
    }

    /// Run the refresher in a background loop
    pub async fn run(&self) {
        tracing::info!(
            period_secs = self.period.as_secs(),
            "Starting priority refresher worker"
        );

        let mut interval = interval(self.period);
        // The first tick completes immediately; startup already has fresh scores
        interval.tick().await;

        loop {
            interval.tick().await;
            self.refresh_once().await;
        }
    }

    async fn refresh_once(&self) {
        match self.report_service.recompute_all_priorities().await {
            Ok(0) => tracing::debug!("Priority refresh: nothing to update"),
            Ok(updated) => tracing::info!(updated, "Priority refresh applied"),
            Err(e) => tracing::error!("Error refreshing priorities: {:?}", e),
        }
    }
}
