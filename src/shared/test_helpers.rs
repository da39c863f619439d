#[cfg(test)]
pub use fakes::*;

#[cfg(test)]
mod fakes {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{extract::Request, middleware::Next, Router};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::core::error::{AppError, Result};
    use crate::features::auth::model::AuthenticatedUser;
    use crate::features::issues::models::{
        CreateIssue, Issue, IssueStatus, PriorityUpdate, ProgressUpdate,
    };
    use crate::features::issues::services::issue_store::{IssueCursor, IssueTransaction};
    use crate::features::issues::services::{IssueStore, ReportService, ReportSettings};
    use crate::features::officers::models::{Officer, OfficerLoad};
    use crate::features::prioritization::embedder::Embedder;
    use crate::features::prioritization::geo_filter::DEFAULT_MAX_CANDIDATES;
    use crate::features::prioritization::model::FeatureVector;
    use crate::features::prioritization::{
        EmergencyKeywords, GeoQuery, SeverityClassifier, SeverityModel,
        SimilarityBackend, SimilarityMatcher, LIVE_GEO_DELTA, LIVE_MATCH_THRESHOLD,
    };
    use crate::shared::constants::{ROLE_AUTHORITY, ROLE_CITIZEN, ROLE_OFFICER};

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    fn user_with_role(sub: &str, role: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            sub: sub.to_string(),
            name: Some(format!("Test {}", sub)),
            roles: vec![role.to_string()],
        }
    }

    pub fn citizen(sub: &str) -> AuthenticatedUser {
        user_with_role(sub, ROLE_CITIZEN)
    }

    pub fn officer(sub: &str) -> AuthenticatedUser {
        user_with_role(sub, ROLE_OFFICER)
    }

    pub fn authority(sub: &str) -> AuthenticatedUser {
        user_with_role(sub, ROLE_AUTHORITY)
    }

    /// Inject a fixed user, standing in for the JWT middleware
    pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
        router.layer(axum::middleware::from_fn(
            move |mut request: Request, next: Next| {
                let user = user.clone();
                async move {
                    request.extensions_mut().insert(user);
                    next.run(request).await
                }
            },
        ))
    }

    // -------------------------------------------------------------------------
    // Prioritization fakes
    // -------------------------------------------------------------------------

    /// Severity model that always predicts the same raw class
    pub struct FixedSeverityModel {
        raw: i64,
        calls: AtomicUsize,
    }

    impl FixedSeverityModel {
        pub fn new(raw: i64) -> Self {
            Self {
                raw,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SeverityModel for FixedSeverityModel {
        fn vectorize(&self, _text: &str) -> Result<FeatureVector> {
            Ok(FeatureVector::default())
        }

        fn predict(&self, _features: &FeatureVector) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.raw)
        }
    }

    /// Severity model whose artifacts never load
    pub struct FailingSeverityModel;

    impl SeverityModel for FailingSeverityModel {
        fn vectorize(&self, _text: &str) -> Result<FeatureVector> {
            Err(AppError::ArtifactLoad("artifacts missing".to_string()))
        }

        fn predict(&self, _features: &FeatureVector) -> Result<i64> {
            Err(AppError::ArtifactLoad("artifacts missing".to_string()))
        }
    }

    /// Similarity backend returning canned scores
    pub struct FixedScoresBackend {
        scores: Vec<f64>,
        repeat: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedScoresBackend {
        pub fn new(scores: Vec<f64>) -> Self {
            Self {
                scores,
                repeat: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Same score for every candidate
        pub fn repeat(score: f64) -> Self {
            Self {
                scores: Vec::new(),
                repeat: Some(score),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SimilarityBackend for FixedScoresBackend {
        async fn scores(&self, _query: &str, candidates: &[&str]) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match self.repeat {
                Some(score) => vec![score; candidates.len()],
                None => self.scores.iter().copied().take(candidates.len()).collect(),
            })
        }
    }

    /// Bag-of-keywords embedder: one dimension per keyword occurrence count
    pub struct KeywordEmbedder {
        keywords: Vec<String>,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&str]) -> Self {
            Self {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lowered = text.to_lowercase();
            Ok(self
                .keywords
                .iter()
                .map(|kw| lowered.matches(kw.as_str()).count() as f32)
                .collect())
        }
    }

    // -------------------------------------------------------------------------
    // Issues
    // -------------------------------------------------------------------------

    pub fn sample_issue(description: &str) -> Issue {
        let now = Utc::now();
        Issue {
            id: Uuid::now_v7(),
            reporter_id: "reporter".to_string(),
            reporter_name: None,
            title: "Untitled Issue".to_string(),
            description: description.to_string(),
            location_name: "Ward 5".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            image_ref: None,
            status: IssueStatus::Pending,
            report_count: 1,
            is_urgent: false,
            severity: 1,
            priority_score: 0.0,
            priority: 1,
            assigned_officer_id: None,
            progress_percentage: 0,
            work_image_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn test_settings() -> ReportSettings {
        ReportSettings {
            geo_delta: LIVE_GEO_DELTA,
            geo_match_location_name: true,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            storage_max_retries: 3,
            recompute_on_read: false,
        }
    }

    /// Report service over the in-memory store; the model predicts Medium
    pub fn report_service(
        store: Arc<InMemoryIssueStore>,
        backend: Arc<dyn SimilarityBackend>,
    ) -> Arc<ReportService> {
        Arc::new(ReportService::new(
            store,
            SeverityClassifier::new(
                Arc::new(FixedSeverityModel::new(1)),
                EmergencyKeywords::default(),
            ),
            SimilarityMatcher::new(backend, LIVE_MATCH_THRESHOLD),
            test_settings(),
        ))
    }

    #[derive(Debug, Clone, Default)]
    struct StoreState {
        issues: Vec<Issue>,
        reported: HashSet<(Uuid, String)>,
        officers: Vec<Officer>,
    }

    impl StoreState {
        fn issue_mut(&mut self, id: Uuid) -> Result<&mut Issue> {
            self.issues
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
        }
    }

    /// `IssueStore` over a mutex-guarded snapshot. Transactions work on a
    /// copy and publish it on commit.
    #[derive(Default)]
    pub struct InMemoryIssueStore {
        state: Arc<Mutex<StoreState>>,
        failing_commits: Arc<AtomicU32>,
        progress_race: Mutex<Option<(Uuid, IssueStatus)>>,
    }

    impl InMemoryIssueStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn snapshot(&self) -> StoreState {
            self.state.lock().unwrap().clone()
        }

        pub fn issue_count(&self) -> usize {
            self.state.lock().unwrap().issues.len()
        }

        pub fn reported_count(&self) -> usize {
            self.state.lock().unwrap().reported.len()
        }

        pub fn insert_raw(&self, issue: Issue) -> Uuid {
            let id = issue.id;
            self.state.lock().unwrap().issues.push(issue);
            id
        }

        pub fn add_officer(&self, user_id: &str, age: Duration) -> Uuid {
            let officer = Officer {
                id: Uuid::now_v7(),
                user_id: user_id.to_string(),
                name: format!("Officer {}", user_id),
                department: "Public Works".to_string(),
                contact_number: None,
                created_at: Utc::now() - age,
            };
            let id = officer.id;
            self.state.lock().unwrap().officers.push(officer);
            id
        }

        /// Give an officer an open issue far from any test coordinates
        pub fn assign_open_issue(&self, officer_id: Uuid) -> Uuid {
            let mut issue = sample_issue(&format!("Existing workload {}", Uuid::now_v7()));
            issue.latitude = -60.0;
            issue.longitude = -60.0;
            issue.location_name = "Depot".to_string();
            issue.assigned_officer_id = Some(officer_id);
            self.insert_raw(issue)
        }

        /// Make the next `n` commits fail with a storage conflict
        pub fn fail_next_commits(&self, n: u32) {
            self.failing_commits.store(n, Ordering::SeqCst);
        }

        /// Another writer sets `status` on the issue just before the next
        /// progress update lands
        pub fn race_next_progress(&self, id: Uuid, status: IssueStatus) {
            *self.progress_race.lock().unwrap() = Some((id, status));
        }

        pub fn status_of(&self, id: Uuid) -> Option<IssueStatus> {
            let state = self.state.lock().unwrap();
            state.issues.iter().find(|i| i.id == id).map(|i| i.status)
        }

        pub fn overwrite_priority(&self, id: Uuid, severity: i16, score: f64, priority: i16) {
            let mut state = self.state.lock().unwrap();
            if let Ok(issue) = state.issue_mut(id) {
                issue.severity = severity;
                issue.priority_score = score;
                issue.priority = priority;
            }
        }
    }

    #[async_trait]
    impl IssueStore for InMemoryIssueStore {
        async fn begin(&self) -> Result<Box<dyn IssueTransaction>> {
            Ok(Box::new(InMemoryTransaction {
                shared: Arc::clone(&self.state),
                failing_commits: Arc::clone(&self.failing_commits),
                work: self.snapshot(),
            }))
        }

        async fn find_nearby(&self, query: &GeoQuery) -> Result<Vec<Issue>> {
            Ok(query.select(&self.snapshot().issues))
        }

        async fn get(&self, id: Uuid) -> Result<Option<Issue>> {
            Ok(self.snapshot().issues.into_iter().find(|i| i.id == id))
        }

        async fn find_exact(
            &self,
            description: &str,
            latitude: f64,
            longitude: f64,
        ) -> Result<Option<Issue>> {
            Ok(self.snapshot().issues.into_iter().find(|i| {
                i.description == description && i.latitude == latitude && i.longitude == longitude
            }))
        }

        async fn has_reported(&self, issue_id: Uuid, user_id: &str) -> Result<bool> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .reported
                .contains(&(issue_id, user_id.to_string())))
        }

        async fn list_ranked(&self, offset: i64, limit: i64) -> Result<(Vec<Issue>, i64)> {
            let mut issues = self.snapshot().issues;
            issues.sort_by(|a, b| {
                b.priority_score
                    .total_cmp(&a.priority_score)
                    .then(b.report_count.cmp(&a.report_count))
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
            let total = issues.len() as i64;
            let page = issues
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Ok((page, total))
        }

        async fn list_trending(&self, limit: i64) -> Result<Vec<Issue>> {
            let mut issues = self.snapshot().issues;
            issues.sort_by(|a, b| {
                b.report_count
                    .cmp(&a.report_count)
                    .then(b.priority_score.total_cmp(&a.priority_score))
                    .then(a.created_at.cmp(&b.created_at))
            });
            issues.truncate(limit as usize);
            Ok(issues)
        }

        async fn list_reported_by(&self, user_id: &str) -> Result<Vec<Issue>> {
            let state = self.snapshot();
            Ok(state
                .issues
                .into_iter()
                .filter(|i| state.reported.contains(&(i.id, user_id.to_string())))
                .collect())
        }

        async fn list_assigned_to(&self, officer_id: Uuid) -> Result<Vec<Issue>> {
            Ok(self
                .snapshot()
                .issues
                .into_iter()
                .filter(|i| i.assigned_officer_id == Some(officer_id))
                .collect())
        }

        async fn list_batch(&self, cursor: Option<IssueCursor>, limit: i64) -> Result<Vec<Issue>> {
            let mut issues = self.snapshot().issues;
            issues.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            Ok(issues
                .into_iter()
                .filter(|i| cursor.map_or(true, |c| (i.created_at, i.id) > c))
                .take(limit as usize)
                .collect())
        }

        async fn find_officer_by_user(&self, user_id: &str) -> Result<Option<Officer>> {
            Ok(self
                .snapshot()
                .officers
                .into_iter()
                .find(|o| o.user_id == user_id))
        }

        async fn update_progress(
            &self,
            issue_id: Uuid,
            officer_id: Uuid,
            update: &ProgressUpdate,
        ) -> Result<Option<Issue>> {
            let race = self.progress_race.lock().unwrap().take();
            let mut state = self.state.lock().unwrap();
            if let Some((id, status)) = race {
                state.issue_mut(id)?.status = status;
            }
            let Some(issue) = state.issues.iter_mut().find(|i| {
                i.id == issue_id
                    && i.assigned_officer_id == Some(officer_id)
                    && i.status.rank() <= update.status.rank()
            }) else {
                return Ok(None);
            };
            issue.status = update.status;
            issue.progress_percentage = update.progress_percentage;
            if let Some(image) = &update.work_image_ref {
                issue.work_image_ref = Some(image.clone());
            }
            issue.updated_at = Utc::now();
            Ok(Some(issue.clone()))
        }
    }

    struct InMemoryTransaction {
        shared: Arc<Mutex<StoreState>>,
        failing_commits: Arc<AtomicU32>,
        work: StoreState,
    }

    #[async_trait]
    impl IssueTransaction for InMemoryTransaction {
        async fn insert_issue(&mut self, create: &CreateIssue) -> Result<Issue> {
            let duplicate = self.work.issues.iter().any(|i| {
                i.description == create.description
                    && i.latitude == create.latitude
                    && i.longitude == create.longitude
            });
            if duplicate {
                return Err(AppError::StorageConflict(
                    "unique constraint unique_issue_location violated".to_string(),
                ));
            }

            let mut issue = sample_issue(&create.description);
            issue.reporter_id = create.reporter_id.clone();
            issue.reporter_name = create.reporter_name.clone();
            issue.title = create.title.clone();
            issue.location_name = create.location_name.clone();
            issue.latitude = create.latitude;
            issue.longitude = create.longitude;
            issue.image_ref = create.image_ref.clone();
            issue.is_urgent = create.is_urgent;
            self.work.issues.push(issue.clone());
            Ok(issue)
        }

        async fn attribute_report(&mut self, issue_id: Uuid, user_id: &str) -> Result<bool> {
            Ok(self.work.reported.insert((issue_id, user_id.to_string())))
        }

        async fn increment_report_count(
            &mut self,
            issue_id: Uuid,
            is_urgent: bool,
        ) -> Result<Issue> {
            let issue = self.work.issue_mut(issue_id)?;
            issue.report_count += 1;
            issue.is_urgent |= is_urgent;
            issue.updated_at = Utc::now();
            Ok(issue.clone())
        }

        async fn lock_issue(&mut self, issue_id: Uuid) -> Result<Option<Issue>> {
            Ok(self.work.issues.iter().find(|i| i.id == issue_id).cloned())
        }

        async fn officer_loads(&mut self) -> Result<Vec<OfficerLoad>> {
            Ok(self
                .work
                .officers
                .iter()
                .map(|o| OfficerLoad {
                    officer_id: o.id,
                    open_issues: self
                        .work
                        .issues
                        .iter()
                        .filter(|i| {
                            i.assigned_officer_id == Some(o.id) && i.status != IssueStatus::Solved
                        })
                        .count() as i64,
                    created_at: o.created_at,
                })
                .collect())
        }

        async fn apply_priority(&mut self, issue_id: Uuid, update: &PriorityUpdate) -> Result<Issue> {
            let issue = self.work.issue_mut(issue_id)?;
            issue.severity = update.severity;
            issue.priority_score = update.priority_score;
            issue.priority = update.priority;
            issue.assigned_officer_id = update.assigned_officer_id;
            issue.updated_at = Utc::now();
            Ok(issue.clone())
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            let pending = self.failing_commits.load(Ordering::SeqCst);
            if pending > 0 {
                self.failing_commits.store(pending - 1, Ordering::SeqCst);
                return Err(AppError::StorageConflict(
                    "could not serialize access".to_string(),
                ));
            }
            let this = *self;
            *this.shared.lock().unwrap() = this.work;
            Ok(())
        }
    }
}
