use std::sync::Arc;

use research_chat_model::ModelRequest;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_structured;
use crate::config::ModelSelector;
use crate::credential::CredentialPool;
use crate::error::Error;
use crate::invoker::{DIRECT_CALL_RETRIES, call_with_retries};
use crate::prompts;

/// The reflector's judgement of the research so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReflectionVerdict {
    /// Whether the summaries answer the topic.
    #[schemars(
        description = "Whether the provided summaries are sufficient to answer the user's question."
    )]
    pub is_sufficient: bool,
    /// What is still missing.
    #[serde(default)]
    #[schemars(
        description = "A description of what information is missing or needs clarification."
    )]
    pub knowledge_gap: String,
    /// Queries that would close the gap.
    #[serde(default)]
    #[schemars(description = "A list of follow-up queries to address the knowledge gap.")]
    pub follow_up_queries: Vec<String>,
}

/// Decides whether the gathered summaries are enough.
pub struct Reflector {
    pool: Arc<CredentialPool>,
    model: ModelSelector,
    schema: Value,
}

impl Reflector {
    /// Creates a reflector drawing clients from `pool`.
    pub fn new(pool: Arc<CredentialPool>, model: ModelSelector) -> Self {
        Self {
            pool,
            model,
            schema: schema_for!(ReflectionVerdict).to_value(),
        }
    }

    /// Reviews `summaries` in round `loop_count` of at most `max_loops`.
    pub async fn reflect(
        &self,
        topic: &str,
        summaries: &[String],
        loop_count: usize,
        max_loops: usize,
    ) -> Result<ReflectionVerdict, Error> {
        let model = self.model.select();
        debug!(model, loop_count, "reflecting on {} summaries", summaries.len());

        let prompt = prompts::reflection(topic, summaries, loop_count, max_loops);
        let req = ModelRequest::text(model, prompt)
            .with_temperature(1.0)
            .with_json_schema(self.schema.clone());
        let resp = call_with_retries(&self.pool, DIRECT_CALL_RETRIES, |client| {
            client.send_request(req.clone())
        })
        .await?;

        let verdict: ReflectionVerdict = parse_structured(&resp.text)?;
        trace!("reflection verdict: {verdict:?}");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use research_chat_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    #[tokio::test]
    async fn test_reflect() {
        let mut provider = TestModelProvider::default();
        provider.add_rule(
            "# Research review",
            PresetResponse::with_text(
                r#"{"is_sufficient": false, "knowledge_gap": "No benchmarks", "follow_up_queries": ["rust benchmarks 2026"]}"#,
            ),
        );
        let pool = Arc::new(CredentialPool::from_providers([provider.clone()]));
        let reflector = Reflector::new(pool, ModelSelector::default());

        let summaries = ["Rust is fast.".to_owned(), "Rust is safe.".to_owned()];
        let verdict = reflector
            .reflect("Is Rust good?", &summaries, 1, 3)
            .await
            .unwrap();
        assert!(!verdict.is_sufficient);
        assert_eq!(verdict.follow_up_queries, ["rust benchmarks 2026"]);

        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("review round 1 of at most 3"));
        assert!(prompt.contains("Rust is fast.\n\n---\n\nRust is safe."));
    }

    #[tokio::test]
    async fn test_sufficient_verdict_may_omit_fields() {
        let mut provider = TestModelProvider::default();
        provider.set_fallback(PresetResponse::with_text(r#"{"is_sufficient": true}"#));
        let pool = Arc::new(CredentialPool::from_providers([provider]));
        let reflector = Reflector::new(pool, ModelSelector::default());

        let verdict = reflector.reflect("topic", &[], 1, 1).await.unwrap();
        assert_eq!(
            verdict,
            ReflectionVerdict {
                is_sufficient: true,
                ..Default::default()
            }
        );
    }
}
