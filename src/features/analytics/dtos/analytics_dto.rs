use serde::Deserialize;
use utoipa::IntoParams;

use crate::features::prioritization::RankingStrategyKind;

/// Query parameters for the offline ranking endpoint
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RankingQuery {
    /// `weighted_blend` (default) or `keyword_severity`
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub strategy: RankingStrategyKind,
}
