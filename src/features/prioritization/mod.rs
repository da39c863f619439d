pub mod embedder;
pub mod geo_filter;
pub mod model;
pub mod ranking;
pub mod scoring;
pub mod severity;
pub mod similarity;
mod text;

pub use embedder::OllamaEmbedder;
pub use geo_filter::{GeoQuery, LIVE_GEO_DELTA};
pub use model::{ArtifactSeverityModel, SeverityModel};
pub use ranking::{
    find_duplicate_pairs, DuplicatePair, KeywordSeverityRanking, RankedIssue, RankingStrategy,
    RankingStrategyKind, WeightedBlendRanking,
};
pub use scoring::{PriorityAssessment, PriorityScorer, PriorityTier};
pub use severity::{EmergencyKeywords, SeverityClassifier};
pub use similarity::{
    EmbeddingSimilarity, SimilarityBackend, SimilarityMatcher, TfidfSimilarity,
    BATCH_DUPLICATE_THRESHOLD, LIVE_MATCH_THRESHOLD,
};
