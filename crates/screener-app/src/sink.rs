use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;

use screener_core::{Candidate, CandidateSink, ScreenError};

/// Writes the ranked list to a dated JSON file under the results directory.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl CandidateSink for JsonFileSink {
    async fn persist(&self, candidates: &[Candidate]) -> Result<(), ScreenError> {
        let io_err = |e: std::io::Error| ScreenError::Collaborator(format!("results file: {e}"));

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let date = Utc::now().format("%Y-%m-%d");
        let path = self.dir.join(format!("selected_tickers_{date}.json"));
        let payload = json!({
            "date": date.to_string(),
            "candidates": candidates,
        });
        let body = serde_json::to_string_pretty(&payload)
            .map_err(|e| ScreenError::Collaborator(format!("serialize candidates: {e}")))?;

        tokio::fs::write(&path, body).await.map_err(io_err)?;
        tracing::info!(path = %path.display(), count = candidates.len(), "results written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::MetricSet;

    #[tokio::test]
    async fn writes_a_dated_json_file_with_candidates() {
        let dir = std::env::temp_dir().join(format!("marketsift-sink-{}", std::process::id()));
        let sink = JsonFileSink::new(dir.clone());

        let candidates = vec![Candidate {
            symbol: "ACME".into(),
            metrics: MetricSet {
                price: Some(2.5),
                ..Default::default()
            },
            score: 7.5,
            commentary: None,
        }];

        sink.persist(&candidates).await.unwrap();

        let date = Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("selected_tickers_{date}.json"));
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["candidates"][0]["symbol"], "ACME");
        assert_eq!(parsed["candidates"][0]["score"], 7.5);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
