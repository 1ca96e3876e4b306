use std::sync::Arc;

use super::ResearchGraph;
use crate::config::ResearchConfig;
use crate::credential::CredentialPool;
use crate::event::ProgressEvent;
use crate::invoker::ResilientInvoker;
use crate::node::{Finalizer, QueryPlanner, Reflector, WebResearcher};

/// [`ResearchGraph`] builder.
pub struct ResearchGraphBuilder {
    pool: Arc<CredentialPool>,
    config: ResearchConfig,
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl ResearchGraphBuilder {
    /// Creates a new builder whose graph calls the model through `pool`.
    #[inline]
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self {
            pool,
            config: Default::default(),
            on_progress: None,
        }
    }

    /// Replaces the default configuration.
    #[inline]
    pub fn with_config(mut self, config: ResearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a callback to be invoked on every step of a session.
    #[inline]
    pub fn on_progress(
        mut self,
        on_progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Builds the graph.
    pub fn build(self) -> ResearchGraph {
        let ResearchGraphBuilder {
            pool,
            config,
            on_progress,
        } = self;

        let invoker = ResilientInvoker::new(pool.clone(), config.retry_policy);
        ResearchGraph {
            planner: QueryPlanner::new(pool.clone(), config.query_model.clone()),
            researcher: WebResearcher::new(invoker, config.query_model.clone()),
            reflector: Reflector::new(
                pool.clone(),
                config.reflection_model.clone(),
            ),
            finalizer: Finalizer::new(pool, config.answer_model.clone()),
            config,
            on_progress,
        }
    }
}
