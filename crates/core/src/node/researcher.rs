use research_chat_model::ModelRequest;
use serde::{Deserialize, Serialize};

use crate::citation::{self, ResolvedSource};
use crate::config::ModelSelector;
use crate::error::Error;
use crate::invoker::ResilientInvoker;
use crate::prompts;
use crate::state::SearchQuery;

/// The cited summary of one web search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOutput {
    /// The summary, with citation markers pointing at short URLs.
    pub text: String,
    /// The sources the markers point at.
    pub sources: Vec<ResolvedSource>,
}

/// Runs grounded web searches through the credential pool.
pub struct WebResearcher {
    invoker: ResilientInvoker,
    model: ModelSelector,
}

impl WebResearcher {
    /// Creates a researcher calling the model through `invoker`.
    #[inline]
    pub fn new(invoker: ResilientInvoker, model: ModelSelector) -> Self {
        Self { invoker, model }
    }

    /// Searches the web for `query` and summarizes the findings.
    pub async fn research(
        &self,
        query: &SearchQuery,
    ) -> Result<ResearchOutput, Error> {
        let prompt = prompts::web_searcher(&query.text, &prompts::current_date());
        let resp = self
            .invoker
            .invoke(|client| {
                // Every attempt may land on another model.
                let model = self.model.select();
                debug!(model, query_id = query.id, "searching the web");
                let req = ModelRequest::text(model, prompt.clone())
                    .with_grounded_search();
                client.send_request(req)
            })
            .await?;

        let (text, sources) = citation::resolve_grounded_text(
            &resp.text,
            resp.grounding.as_ref(),
            query.id,
        );
        debug!(
            query_id = query.id,
            sources = sources.len(),
            "web search finished"
        );
        Ok(ResearchOutput { text, sources })
    }
}
