use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::features::prioritization::geo_filter::DEFAULT_MAX_CANDIDATES;
use crate::features::prioritization::{
    EmergencyKeywords, LIVE_GEO_DELTA, LIVE_MATCH_THRESHOLD,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub prioritization: PrioritizationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Bearer tokens are issued by the external identity provider and signed
/// with a shared HS256 secret.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub jwt_leeway: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// Which representation the live similarity matcher uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityBackendKind {
    Tfidf,
    Embedding,
}

/// Tuning for the dedup and priority pipeline
#[derive(Debug, Clone)]
pub struct PrioritizationConfig {
    /// Directory holding `severity_model.json` and `tfidf_vectorizer.json`
    pub model_artifact_dir: PathBuf,
    pub similarity_backend: SimilarityBackendKind,
    /// Minimum similarity for a live report to merge into an existing issue
    pub match_threshold: f64,
    /// Coordinate tolerance (degrees) for the geo pre-filter
    pub geo_delta: f64,
    pub geo_match_location_name: bool,
    /// Cap on candidates handed to the similarity matcher per request
    pub max_candidates: i64,
    /// Attempts for a unit of work that hit a storage conflict
    pub storage_max_retries: u32,
    pub ollama_url: Option<String>,
    pub embedding_model: String,
    pub embedding_timeout: Duration,
    /// 0 disables the background refresher
    pub refresh_interval_secs: u64,
    pub recompute_on_read: bool,
    pub emergency_keywords: EmergencyKeywords,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            prioritization: PrioritizationConfig::from_env()?,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_or("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_or("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_or("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_or("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("AUTH_JWT_SECRET")
            .map_err(|_| "AUTH_JWT_SECRET environment variable is required".to_string())?;

        let issuer = env::var("AUTH_ISSUER")
            .map_err(|_| "AUTH_ISSUER environment variable is required".to_string())?;

        let audience = env::var("AUTH_AUDIENCE")
            .unwrap_or_else(|_| "civicconnect-core".to_string());

        let jwt_leeway_secs = parse_or("JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            jwt_secret,
            issuer,
            audience,
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "CivicConnect API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Civic issue reporting, deduplication and prioritization".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl PrioritizationConfig {
    const DEFAULT_STORAGE_MAX_RETRIES: u32 = 3;
    const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

    pub fn from_env() -> Result<Self, String> {
        let model_artifact_dir = env::var("MODEL_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("artifacts"));

        let ollama_url = env::var("OLLAMA_URL").ok().filter(|s| !s.is_empty());

        let similarity_backend = match env::var("SIMILARITY_BACKEND").ok().as_deref() {
            Some("tfidf") => SimilarityBackendKind::Tfidf,
            Some("embedding") => SimilarityBackendKind::Embedding,
            Some(other) => {
                return Err(format!(
                    "SIMILARITY_BACKEND must be 'tfidf' or 'embedding', got '{}'",
                    other
                ))
            }
            None if ollama_url.is_some() => SimilarityBackendKind::Embedding,
            None => SimilarityBackendKind::Tfidf,
        };

        if similarity_backend == SimilarityBackendKind::Embedding && ollama_url.is_none() {
            return Err("SIMILARITY_BACKEND=embedding requires OLLAMA_URL".to_string());
        }

        let match_threshold = parse_or("MATCH_THRESHOLD", LIVE_MATCH_THRESHOLD)?;
        if !(0.0..=1.0).contains(&match_threshold) {
            return Err("MATCH_THRESHOLD must be between 0 and 1".to_string());
        }

        let geo_delta = parse_or("GEO_FILTER_DELTA", LIVE_GEO_DELTA)?;
        if !(geo_delta.is_finite() && geo_delta > 0.0) {
            return Err("GEO_FILTER_DELTA must be a positive number".to_string());
        }

        let max_candidates = parse_or("MAX_CANDIDATES", DEFAULT_MAX_CANDIDATES)?;
        if max_candidates < 1 {
            return Err("MAX_CANDIDATES must be at least 1".to_string());
        }

        let emergency_keywords = match env::var("EMERGENCY_KEYWORDS") {
            Ok(list) if !list.trim().is_empty() => {
                EmergencyKeywords::new(list.split(',').map(str::trim))
            }
            _ => EmergencyKeywords::default(),
        };

        Ok(Self {
            model_artifact_dir,
            similarity_backend,
            match_threshold,
            geo_delta,
            geo_match_location_name: parse_or("GEO_MATCH_LOCATION_NAME", true)?,
            max_candidates,
            storage_max_retries: parse_or(
                "STORAGE_MAX_RETRIES",
                Self::DEFAULT_STORAGE_MAX_RETRIES,
            )?
            .max(1),
            ollama_url,
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "all-minilm".to_string()),
            embedding_timeout: Duration::from_secs(parse_or(
                "EMBEDDING_TIMEOUT_SECS",
                Self::DEFAULT_EMBEDDING_TIMEOUT_SECS,
            )?),
            refresh_interval_secs: parse_or(
                "PRIORITY_REFRESH_INTERVAL_SECS",
                Self::DEFAULT_REFRESH_INTERVAL_SECS,
            )?,
            recompute_on_read: parse_or("PRIORITY_RECOMPUTE_ON_READ", false)?,
            emergency_keywords,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} has an invalid value: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
