//! Cohere-compatible rerank API client.
//!
//! Talks to any endpoint that accepts `POST /v1/rerank` with
//! `{model, query, documents, top_n}` and answers with
//! `{results: [{index, relevance_score}]}`.

use super::{RerankDocument, Reranker, check_rerank_args};
use crate::config::RerankConfig;
use crate::document::{RerankHit, RerankResult};
use crate::error::{BenchError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on the delay between two retries.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Request body for a rerank call.
#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

/// Response from a rerank call.
#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseItem>,
}

#[derive(Debug, Deserialize)]
struct RerankResponseItem {
    index: usize,
    relevance_score: f64,
}

/// API error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// HTTP reranker with per-request timeout and bounded retry.
#[derive(Clone)]
pub struct CohereReranker {
    client: Client,
    config: RerankConfig,
}

impl CohereReranker {
    /// Create a new client with the given configuration.
    pub fn new(config: RerankConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BenchError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/rerank", base)
    }

    /// Send one request without retrying.
    async fn send_once(&self, request: &RerankRequest<'_>) -> Result<RerankResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(classify_status(status, detail));
        }

        serde_json::from_str(&body).map_err(|e| BenchError::OracleResponse(e.to_string()))
    }

    /// Send with exponential backoff on transient failures.
    async fn send_with_retry(&self, request: &RerankRequest<'_>) -> Result<RerankResponse> {
        let mut delay = self.config.retry_backoff().min(MAX_BACKOFF);
        let mut attempt = 0;

        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "rerank call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Test connectivity and credentials with a one-document request.
    pub async fn test_connection(&self) -> Result<()> {
        let query = RerankDocument::Text("ping".to_string());
        let docs = vec![RerankDocument::Text("pong".to_string())];
        self.rerank(&query, &docs, 1).await.map(|_| ())
    }
}

/// Double the retry delay, saturating at [`MAX_BACKOFF`].
fn next_backoff(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_BACKOFF)
}

/// Map an HTTP failure status onto our error taxonomy.
fn classify_status(status: StatusCode, detail: String) -> BenchError {
    let message = format!("({}) {}", status, detail);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BenchError::OracleAuth(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            BenchError::OracleUnavailable(message)
        }
        s if s.is_server_error() => BenchError::OracleUnavailable(message),
        _ => BenchError::OracleResponse(message),
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult> {
        check_rerank_args(documents, top_n)?;

        let request = RerankRequest {
            model: &self.config.model,
            query: query.to_payload(),
            documents: documents.iter().map(RerankDocument::to_payload).collect(),
            top_n,
        };

        let response = self.send_with_retry(&request).await?;

        let mut result = RerankResult::new(
            response
                .results
                .into_iter()
                .map(|r| RerankHit {
                    index: r.index,
                    relevance_score: r.relevance_score,
                })
                .collect(),
        );

        if result.len() != top_n || !result.is_valid_for(documents.len()) {
            return Err(BenchError::OracleResponse(format!(
                "expected {} distinct indices below {}, got {:?}",
                top_n,
                documents.len(),
                result.indices()
            )));
        }

        // Stable, so equal scores keep the server's order
        result.hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(model = %self.config.model, documents = documents.len(), top_n, "reranked");
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
