use crate::citation::ResolvedSource;
use crate::node::FinalAnswer;
use crate::state::SearchQuery;

/// Progress of a running research session, reported through the callback
/// registered with [`ResearchGraphBuilder::on_progress`].
///
/// [`ResearchGraphBuilder::on_progress`]: crate::ResearchGraphBuilder::on_progress
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// The planner produced the first batch of queries.
    QueryGenerated {
        /// The planned queries.
        queries: Vec<SearchQuery>,
    },
    /// A web search finished. Sent once per query, in issue order.
    SourcesFound {
        /// The query that was searched.
        query: SearchQuery,
        /// The sources its summary cites.
        sources: Vec<ResolvedSource>,
    },
    /// The reflector judged the research so far.
    Reflecting {
        /// Rounds completed, including this one.
        loop_count: usize,
        /// Whether the summaries answer the topic.
        is_sufficient: bool,
        /// Whether the follow-up queries are searched next. `false` once the
        /// loop limit is reached, even if the research is insufficient.
        will_continue: bool,
        /// What is still missing.
        knowledge_gap: String,
        /// Queries to run next, if the loop goes on.
        follow_up_queries: Vec<String>,
    },
    /// The final answer is ready.
    Finalized {
        /// The answer.
        answer: FinalAnswer,
    },
}
