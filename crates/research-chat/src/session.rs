use std::sync::Arc;

use research_chat_core::{
    ChatMessage, CredentialPool, Effort, Error, FinalAnswer, ProgressEvent,
    ResearchConfig, ResearchGraph, ResearchGraphBuilder, ResearchState,
};
use research_chat_model::ModelProvider;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    graph_builder: ResearchGraphBuilder,
    effort: Option<Effort>,
}

impl SessionBuilder {
    /// Creates a session builder drawing model clients from `pool`.
    #[inline]
    pub fn with_pool(pool: Arc<CredentialPool>) -> Self {
        Self {
            graph_builder: ResearchGraphBuilder::new(pool),
            effort: None,
        }
    }

    /// Creates a session builder with one model provider per credential.
    pub fn with_model_providers<P, I>(providers: I) -> Self
    where
        P: ModelProvider + 'static,
        I: IntoIterator<Item = P>,
    {
        Self::with_pool(Arc::new(CredentialPool::from_providers(providers)))
    }

    /// Replaces the default research configuration.
    #[inline]
    pub fn with_config(mut self, config: ResearchConfig) -> Self {
        self.graph_builder = self.graph_builder.with_config(config);
        self
    }

    /// Sets the effort level, overriding the query and loop counts of the
    /// configuration.
    #[inline]
    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.effort = Some(effort);
        self
    }

    /// Attaches a callback to be invoked on every research step.
    #[inline]
    pub fn on_progress(
        mut self,
        on_progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.graph_builder = self.graph_builder.on_progress(on_progress);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            graph: self.graph_builder.build(),
            effort: self.effort,
            history: vec![],
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// Every question is researched from scratch, but with the whole
/// conversation as context, so follow-up questions work as expected.
pub struct Session {
    graph: ResearchGraph,
    effort: Option<Effort>,
    history: Vec<ChatMessage>,
}

impl Session {
    /// Researches `message` and returns the answer.
    ///
    /// The question stays in the history even if the research fails, the
    /// answer is only added on success.
    pub async fn ask(&mut self, message: &str) -> Result<FinalAnswer, Error> {
        self.history.push(ChatMessage::user(message));
        let state = self.initial_state();
        info!(
            turns = self.history.len(),
            queries = state.initial_search_query_count(),
            loops = state.max_research_loops(),
            "starting research"
        );

        let outcome = self.graph.run(state).await?;
        self.history
            .push(ChatMessage::assistant(outcome.answer.text.clone()));
        Ok(outcome.answer)
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Returns the effort level, if one is set.
    #[inline]
    pub fn effort(&self) -> Option<Effort> {
        self.effort
    }

    /// Changes the effort level of the following questions.
    #[inline]
    pub fn set_effort(&mut self, effort: Effort) {
        self.effort = Some(effort);
    }

    /// Forgets the conversation.
    #[inline]
    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn initial_state(&self) -> ResearchState {
        let messages = self.history.clone();
        match self.effort {
            Some(effort) => ResearchState::new(
                messages,
                effort.initial_queries(),
                effort.max_loops(),
            ),
            None => self.graph.initial_state(messages),
        }
    }
}
