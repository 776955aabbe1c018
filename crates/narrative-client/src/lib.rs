use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use screener_core::{NarrativeAnalyzer, ScreenError};

/// HTTP client for the narrative/LLM sidecar service. One call per finalist;
/// callers degrade to a placeholder when this fails, so every error path
/// maps to `ScreenError::Collaborator`.
pub struct NarrativeClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CommentaryRequest<'a> {
    symbol: &'a str,
    summary: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommentaryResponse {
    commentary: String,
}

impl NarrativeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NarrativeAnalyzer for NarrativeClient {
    async fn commentary(&self, symbol: &str, summary: &str) -> Result<String, ScreenError> {
        let url = format!("{}/v1/commentary", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&CommentaryRequest { symbol, summary })
            .send()
            .await
            .map_err(|e| ScreenError::Collaborator(format!("narrative service: {e}")))?;

        if !response.status().is_success() {
            return Err(ScreenError::Collaborator(format!(
                "narrative service HTTP {}",
                response.status()
            )));
        }

        let parsed: CommentaryResponse = response
            .json()
            .await
            .map_err(|e| ScreenError::Collaborator(format!("narrative response: {e}")))?;

        tracing::debug!(symbol, "narrative commentary received");
        Ok(parsed.commentary)
    }
}
