//! LLM reranking hook
//!
//! Reranks the top candidates with `0.7·original + 0.3·llm_overall`. A
//! provider timeout or error degrades every affected candidate to a
//! neutral score, so a dead provider never sinks the result set. Both
//! the weight and the fallback are configurable.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::domain::ports::LlmPort;
use crate::retriever::interleaver::FusedHit;

#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Only this many top candidates reach the LLM
    pub top_k: usize,
    pub llm_weight: f64,
    /// Score used when the provider times out or fails
    pub neutral_score: f64,
    pub timeout: Duration,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            llm_weight: 0.3,
            neutral_score: 0.5,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LlmScore {
    #[serde(default = "default_half")]
    overall: f64,
}

fn default_half() -> f64 {
    0.5
}

pub struct LlmReranker {
    llm: Arc<dyn LlmPort>,
    config: RerankConfig,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmPort>, config: RerankConfig) -> Self {
        Self { llm, config }
    }

    /// Rerank in place: the top-k get blended scores, the tail keeps its
    /// original ordering below them.
    pub async fn rerank(&self, query: &str, mut candidates: Vec<FusedHit>) -> Vec<FusedHit> {
        let k = self.config.top_k.min(candidates.len());
        let original_weight = 1.0 - self.config.llm_weight;

        for candidate in candidates.iter_mut().take(k) {
            let llm_score = self.score_candidate(query, candidate).await;
            candidate.final_score =
                original_weight * candidate.final_score + self.config.llm_weight * llm_score;
        }

        candidates.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    async fn score_candidate(&self, query: &str, candidate: &FusedHit) -> f64 {
        let preview = candidate
            .hit
            .metadata
            .get("content_preview")
            .cloned()
            .unwrap_or_default();
        let prompt = format!(
            "Score how well this code chunk answers the query.\n\
             Query: {}\nChunk ({}):\n{}\n\
             Reply with JSON: {{\"overall\": <0.0-1.0>}}",
            query, candidate.hit.chunk_id, preview
        );

        let response =
            tokio::time::timeout(self.config.timeout, self.llm.generate(&prompt, 64, 0.0)).await;

        match response {
            Ok(Ok(text)) => parse_overall(&text).unwrap_or_else(|| {
                warn!(chunk = %candidate.hit.chunk_id, "rerank_response_unparseable");
                self.config.neutral_score
            }),
            Ok(Err(e)) => {
                warn!(error = %e, "rerank_provider_error");
                self.config.neutral_score
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout.as_millis() as u64, "rerank_timeout");
                self.config.neutral_score
            }
        }
    }
}

fn parse_overall(text: &str) -> Option<f64> {
    // Providers wrap JSON in prose often enough; find the object
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let parsed: LlmScore = serde_json::from_str(&text[start..=end]).ok()?;
    Some(parsed.overall.clamp(0.0, 1.0))
}
