use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};
use crate::features::prioritization::model::SeverityModel;

/// Live severity scale. Stored as 1..=3 in `issues.severity`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SeverityClass {
    Low,
    Medium,
    High,
}

impl SeverityClass {
    pub fn as_i16(self) -> i16 {
        match self {
            SeverityClass::Low => 1,
            SeverityClass::Medium => 2,
            SeverityClass::High => 3,
        }
    }

    /// Map the classifier's raw output (0, 1, 2) onto the live scale
    pub fn from_model_output(raw: i64) -> Self {
        match raw {
            1 => SeverityClass::Medium,
            2 => SeverityClass::High,
            _ => SeverityClass::Low,
        }
    }
}

impl TryFrom<i16> for SeverityClass {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            1 => Ok(SeverityClass::Low),
            2 => Ok(SeverityClass::Medium),
            3 => Ok(SeverityClass::High),
            other => Err(AppError::Validation(format!(
                "severity must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SeverityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityClass::Low => write!(f, "low"),
            SeverityClass::Medium => write!(f, "medium"),
            SeverityClass::High => write!(f, "high"),
        }
    }
}

/// Terms that force High severity regardless of the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyKeywords(BTreeSet<String>);

impl EmergencyKeywords {
    pub const DEFAULT: [&'static str; 12] = [
        "fire",
        "flood",
        "gas leak",
        "earthquake",
        "emergency",
        "explosion",
        "collapsed",
        "accident",
        "hazard",
        "toxic",
        "fatal",
        "ambulance",
    ];

    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    /// Substring match against the lower-cased description
    pub fn matches(&self, description: &str) -> Option<&str> {
        let lowered = description.to_lowercase();
        self.0
            .iter()
            .find(|kw| lowered.contains(kw.as_str()))
            .map(String::as_str)
    }
}

impl Default for EmergencyKeywords {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// Free text -> severity class, with an emergency override ahead of the model
#[derive(Clone)]
pub struct SeverityClassifier {
    model: Arc<dyn SeverityModel>,
    keywords: EmergencyKeywords,
}

impl SeverityClassifier {
    pub fn new(model: Arc<dyn SeverityModel>, keywords: EmergencyKeywords) -> Self {
        Self { model, keywords }
    }

    pub fn classify(&self, description: &str, is_urgent: bool) -> Result<SeverityClass> {
        if is_urgent {
            tracing::debug!("Issue flagged urgent by reporter, severity forced to high");
            return Ok(SeverityClass::High);
        }
        if let Some(keyword) = self.keywords.matches(description) {
            tracing::info!(keyword = %keyword, "Emergency keyword detected, severity forced to high");
            return Ok(SeverityClass::High);
        }

        let features = self.model.vectorize(description)?;
        let raw = self.model.predict(&features)?;
        let severity = SeverityClass::from_model_output(raw);
        tracing::debug!(raw, severity = %severity, "Severity predicted by model");
        Ok(severity)
    }
}
