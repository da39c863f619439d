//! Dense text embeddings via Ollama `/api/embeddings`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, Result};

/// Provider interface for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("http client build: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let req = OllamaEmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("POST {}: {}", self.url, e)))?;

        if resp.status() != StatusCode::OK {
            let code = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            return Err(AppError::ExternalServiceError(format!(
                "ollama embeddings non-200: {}; body: {}",
                code, body
            )));
        }

        let parsed: OllamaEmbedResponse = resp.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("parse embeddings json: {}", e))
        })?;

        if parsed.embedding.is_empty() {
            return Err(AppError::ExternalServiceError(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as HttpStatus, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Serve canned `/api/embeddings` responses under three prefixes
    async fn serve(seen: Arc<Mutex<Vec<Value>>>) -> String {
        let router = Router::new()
            .route(
                "/ok/api/embeddings",
                post(move |Json(body): Json<Value>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(body);
                        Json(json!({ "embedding": [0.5, 0.25, 1.0] }))
                    }
                }),
            )
            .route(
                "/down/api/embeddings",
                post(|| async { (HttpStatus::INTERNAL_SERVER_ERROR, "model not loaded") }),
            )
            .route(
                "/empty/api/embeddings",
                post(|| async { Json(json!({ "embedding": [] })) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn embedder(base: &str) -> OllamaEmbedder {
        OllamaEmbedder::new(base, "all-minilm", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_embed_posts_model_and_prompt() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = serve(seen.clone()).await;

        let vector = embedder(&format!("{}/ok/", base))
            .embed("Pothole near school")
            .await
            .unwrap();

        assert_eq!(vector, vec![0.5, 0.25, 1.0]);
        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["model"], "all-minilm");
        assert_eq!(requests[0]["prompt"], "Pothole near school");
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_external_failure() {
        let base = serve(Arc::new(Mutex::new(Vec::new()))).await;

        let err = embedder(&format!("{}/down", base))
            .embed("Pothole")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_empty_embedding_is_rejected() {
        let base = serve(Arc::new(Mutex::new(Vec::new()))).await;

        let err = embedder(&format!("{}/empty", base))
            .embed("Pothole")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
    }
}
