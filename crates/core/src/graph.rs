mod builder;

use futures_util::future::try_join_all;

pub use builder::ResearchGraphBuilder;

use crate::config::ResearchConfig;
use crate::error::Error;
use crate::event::ProgressEvent;
use crate::node::{
    FinalAnswer, Finalizer, QueryPlanner, ReflectionVerdict, Reflector,
    WebResearcher,
};
use crate::state::{ChatMessage, ResearchState, SearchQuery, StateUpdate};

/// The result of a finished research session.
#[derive(Clone, Debug, PartialEq)]
pub struct ResearchOutcome {
    /// The final answer.
    pub answer: FinalAnswer,
    /// Everything the session gathered on the way.
    pub state: ResearchState,
}

enum Stage {
    Planning,
    Researching(Vec<SearchQuery>),
    Reflecting,
    Finalizing,
    Done(FinalAnswer),
}

/// Drives a research session: plan, search, reflect, repeat, answer.
///
/// A graph holds no per-session data and can run any number of sessions,
/// one after another or concurrently.
pub struct ResearchGraph {
    config: ResearchConfig,
    planner: QueryPlanner,
    researcher: WebResearcher,
    reflector: Reflector,
    finalizer: Finalizer,

    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl ResearchGraph {
    /// Returns the configuration of the graph.
    #[inline]
    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Creates the state of a session about `messages`, with the query and
    /// loop counts of the graph configuration.
    #[inline]
    pub fn initial_state(&self, messages: Vec<ChatMessage>) -> ResearchState {
        ResearchState::new(
            messages,
            self.config.initial_queries(),
            self.config.max_loops(),
        )
    }

    /// Runs a research session to completion.
    ///
    /// The first failing step aborts the session. Nothing gathered up to
    /// that point is returned.
    pub async fn run(
        &self,
        mut state: ResearchState,
    ) -> Result<ResearchOutcome, Error> {
        let mut stage = Stage::Planning;
        loop {
            stage = match stage {
                Stage::Planning => self.plan(&mut state).await?,
                Stage::Researching(queries) => {
                    self.research(&mut state, queries).await?
                }
                Stage::Reflecting => self.reflect(&mut state).await?,
                Stage::Finalizing => self.finalize(&state).await?,
                Stage::Done(answer) => {
                    debug!(
                        queries = state.search_query().len(),
                        loops = state.research_loop_count(),
                        "research finished"
                    );
                    return Ok(ResearchOutcome { answer, state });
                }
            };
        }
    }

    async fn plan(&self, state: &mut ResearchState) -> Result<Stage, Error> {
        let topic = state.research_topic();
        let planned = self
            .planner
            .plan(&topic, state.initial_search_query_count())
            .await?;

        let first_id = state.next_query_id();
        let mut texts: Vec<_> =
            planned.into_iter().map(|planned| planned.query).collect();
        if texts.is_empty() {
            debug!("planner returned no query, searching for the topic");
            texts.push(topic);
        }
        let queries: Vec<_> = texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| SearchQuery {
                id: first_id + idx,
                text,
            })
            .collect();

        state.merge(StateUpdate {
            search_query: queries.clone(),
            ..Default::default()
        });
        self.emit(ProgressEvent::QueryGenerated {
            queries: queries.clone(),
        });
        Ok(Stage::Researching(queries))
    }

    async fn research(
        &self,
        state: &mut ResearchState,
        queries: Vec<SearchQuery>,
    ) -> Result<Stage, Error> {
        debug!("researching {} queries", queries.len());
        let outputs =
            try_join_all(queries.iter().map(|q| self.researcher.research(q)))
                .await?;

        let mut update = StateUpdate::default();
        for (query, output) in queries.into_iter().zip(outputs) {
            self.emit(ProgressEvent::SourcesFound {
                query,
                sources: output.sources.clone(),
            });
            update.web_research_result.push(output.text);
            update.sources_gathered.extend(output.sources);
        }
        state.merge(update);
        Ok(Stage::Reflecting)
    }

    async fn reflect(&self, state: &mut ResearchState) -> Result<Stage, Error> {
        let max_loops = state.max_research_loops();
        if state.research_loop_count() >= max_loops {
            debug!("no reflection round left");
            return Ok(Stage::Finalizing);
        }

        let loop_count = state.research_loop_count() + 1;
        let verdict = self
            .reflector
            .reflect(
                &state.research_topic(),
                state.web_research_result(),
                loop_count,
                max_loops,
            )
            .await?;
        state.merge(StateUpdate {
            loops_completed: 1,
            ..Default::default()
        });

        let ReflectionVerdict {
            is_sufficient,
            knowledge_gap,
            follow_up_queries,
        } = verdict;
        let follow_up_queries: Vec<_> = follow_up_queries
            .into_iter()
            .filter(|query| !query.trim().is_empty())
            .collect();
        let will_continue = should_continue(is_sufficient, loop_count, max_loops)
            && !follow_up_queries.is_empty();
        self.emit(ProgressEvent::Reflecting {
            loop_count,
            is_sufficient,
            will_continue,
            knowledge_gap,
            follow_up_queries: follow_up_queries.clone(),
        });

        if !will_continue {
            return Ok(Stage::Finalizing);
        }

        let first_id = state.next_query_id();
        let queries: Vec<_> = follow_up_queries
            .into_iter()
            .enumerate()
            .map(|(idx, text)| SearchQuery {
                id: first_id + idx,
                text,
            })
            .collect();
        state.merge(StateUpdate {
            search_query: queries.clone(),
            ..Default::default()
        });
        Ok(Stage::Researching(queries))
    }

    async fn finalize(&self, state: &ResearchState) -> Result<Stage, Error> {
        let answer = self
            .finalizer
            .finalize(
                &state.research_topic(),
                state.web_research_result(),
                state.sources_gathered(),
            )
            .await?;
        self.emit(ProgressEvent::Finalized {
            answer: answer.clone(),
        });
        Ok(Stage::Done(answer))
    }

    #[inline]
    fn emit(&self, event: ProgressEvent) {
        trace!("progress: {event:?}");
        if let Some(on_progress) = &self.on_progress {
            on_progress(event);
        }
    }
}

/// Returns `true` if another search round should follow reflection round
/// `loop_count`.
#[inline]
pub fn should_continue(
    is_sufficient: bool,
    loop_count: usize,
    max_loops: usize,
) -> bool {
    !is_sufficient && loop_count < max_loops
}
