//! HTTP-backed embedder against an Ollama-compatible `/api/embeddings`
//! endpoint (S5, spec §4.5: "obtain a dense embedding from an external
//! embedder"). Mirrors the request/response shape
//! [`crate::ai::provider::LocalProvider`] uses for generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{PipelineError, Result};

use super::embed::Embedder;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Calls `{api_base}/api/embeddings` with `{model, prompt}` and expects
/// back `{embedding: [f32; dim]}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    model: String,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, dim: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::LlmApi(format!("failed to build embedding HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            dim,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.api_base);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| PipelineError::LlmApi(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::LlmApi(format!(
                "embedding provider error ({status}): {body}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::LlmApi(format!("failed to parse embedding response: {e}")))?;

        Ok(body.embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
