use std::sync::Arc;

use research_chat_model::ModelRequest;
use serde::{Deserialize, Serialize};

use crate::citation::{self, ResolvedSource};
use crate::config::ModelSelector;
use crate::credential::CredentialPool;
use crate::error::Error;
use crate::invoker::{DIRECT_CALL_RETRIES, call_with_retries};
use crate::prompts;

/// The answer of a research session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Markdown answer with the original source URLs.
    pub text: String,
    /// The sources the answer cites, in the order they were gathered.
    pub cited_sources: Vec<ResolvedSource>,
}

/// Writes the final answer from the gathered summaries.
pub struct Finalizer {
    pool: Arc<CredentialPool>,
    model: ModelSelector,
}

impl Finalizer {
    /// Creates a finalizer drawing clients from `pool`.
    #[inline]
    pub fn new(pool: Arc<CredentialPool>, model: ModelSelector) -> Self {
        Self { pool, model }
    }

    /// Answers `topic` from `summaries`, restoring the URLs of `sources`.
    ///
    /// Only sources the answer actually links to are kept.
    pub async fn finalize(
        &self,
        topic: &str,
        summaries: &[String],
        sources: &[ResolvedSource],
    ) -> Result<FinalAnswer, Error> {
        let model = self.model.select();
        debug!(model, "composing the final answer");

        let prompt = prompts::answer(topic, summaries, &prompts::current_date());
        let req = ModelRequest::text(model, prompt);
        let resp = call_with_retries(&self.pool, DIRECT_CALL_RETRIES, |client| {
            client.send_request(req.clone())
        })
        .await?;

        let (text, cited_sources) = citation::replace_short_urls(&resp.text, sources);
        debug!(
            "answer cites {} of {} sources",
            cited_sources.len(),
            sources.len()
        );
        Ok(FinalAnswer {
            text,
            cited_sources,
        })
    }
}
