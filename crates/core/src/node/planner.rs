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

/// A search query proposed by the planner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PlannedQuery {
    /// Why the query helps answering the topic.
    #[schemars(description = "Why this query is relevant to the research topic.")]
    pub reason: String,
    /// The search term.
    #[schemars(description = "The search term to use for the web search.")]
    pub query: String,
}

#[derive(Deserialize, JsonSchema)]
struct QueryPlan {
    #[schemars(description = "The web searches to run for the topic.")]
    searches: Vec<PlannedQuery>,
}

/// Turns a research topic into the first batch of search queries.
pub struct QueryPlanner {
    pool: Arc<CredentialPool>,
    model: ModelSelector,
    schema: Value,
}

impl QueryPlanner {
    /// Creates a planner drawing clients from `pool`.
    pub fn new(pool: Arc<CredentialPool>, model: ModelSelector) -> Self {
        Self {
            pool,
            model,
            schema: schema_for!(QueryPlan).to_value(),
        }
    }

    /// Plans at most `count` queries for `topic`.
    ///
    /// Queries the model leaves blank are dropped, so the result may be
    /// empty.
    pub async fn plan(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<PlannedQuery>, Error> {
        let model = self.model.select();
        debug!(model, count, "planning search queries");

        let prompt = prompts::query_writer(topic, count, &prompts::current_date());
        let req = ModelRequest::text(model, prompt)
            .with_temperature(1.0)
            .with_json_schema(self.schema.clone());
        let resp = call_with_retries(&self.pool, DIRECT_CALL_RETRIES, |client| {
            client.send_request(req.clone())
        })
        .await?;

        let plan: QueryPlan = parse_structured(&resp.text)?;
        let queries: Vec<_> = plan
            .searches
            .into_iter()
            .filter(|planned| !planned.query.trim().is_empty())
            .take(count)
            .collect();
        trace!("planned queries: {queries:?}");
        Ok(queries)
    }
}
