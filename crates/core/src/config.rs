use std::fmt::{self, Display};
use std::str::FromStr;

use rand::seq::SliceRandom;

use crate::error::Error;
use crate::invoker::RetryPolicy;

/// Models every node may run on when no model is pinned.
pub const SUPPORTED_MODELS: [&str; 3] =
    ["gemini-2.0-flash", "gemini-2.5-flash", "gemini-2.5-flash-lite"];

/// Chooses the model id for each call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSelector {
    /// Always the same model.
    Fixed(String),
    /// A uniformly random pick on every call.
    Random(Vec<String>),
}

impl ModelSelector {
    /// Returns the model id for the next call.
    pub fn select(&self) -> &str {
        match self {
            ModelSelector::Fixed(model) => model,
            ModelSelector::Random(models) => models
                .choose(&mut rand::thread_rng())
                .map(String::as_str)
                .unwrap_or(SUPPORTED_MODELS[0]),
        }
    }
}

impl Default for ModelSelector {
    #[inline]
    fn default() -> Self {
        ModelSelector::Random(
            SUPPORTED_MODELS.iter().map(|m| (*m).to_owned()).collect(),
        )
    }
}

/// How much research a question gets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Effort {
    /// One query, one loop.
    #[default]
    Low,
    /// Three queries, three loops.
    Medium,
    /// Five queries, ten loops.
    High,
}

impl Effort {
    /// Returns the number of queries the planner generates.
    #[inline]
    pub fn initial_queries(self) -> usize {
        match self {
            Effort::Low => 1,
            Effort::Medium => 3,
            Effort::High => 5,
        }
    }

    /// Returns the maximum number of reflection rounds.
    #[inline]
    pub fn max_loops(self) -> usize {
        match self {
            Effort::Low => 1,
            Effort::Medium => 3,
            Effort::High => 10,
        }
    }
}

impl Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effort::Low => write!(f, "low"),
            Effort::Medium => write!(f, "medium"),
            Effort::High => write!(f, "high"),
        }
    }
}

impl FromStr for Effort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            other => Err(Error::configuration()
                .with_reason(format!("unknown effort level: {other}"))),
        }
    }
}

/// Configuration of a research session.
#[derive(Clone, Debug, PartialEq)]
pub struct ResearchConfig {
    pub(crate) initial_queries: usize,
    pub(crate) max_loops: usize,
    pub(crate) query_model: ModelSelector,
    pub(crate) reflection_model: ModelSelector,
    pub(crate) answer_model: ModelSelector,
    pub(crate) retry_policy: RetryPolicy,
}

impl ResearchConfig {
    /// Returns the number of queries the planner generates.
    #[inline]
    pub fn initial_queries(&self) -> usize {
        self.initial_queries
    }

    /// Returns the maximum number of reflection rounds.
    #[inline]
    pub fn max_loops(&self) -> usize {
        self.max_loops
    }

    /// Returns the retry policy of the web researcher.
    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

impl Default for ResearchConfig {
    #[inline]
    fn default() -> Self {
        ResearchConfigBuilder::default().build()
    }
}

/// [`ResearchConfig`] builder.
#[derive(Clone, Debug, Default)]
pub struct ResearchConfigBuilder {
    initial_queries: Option<usize>,
    max_loops: Option<usize>,
    query_model: Option<ModelSelector>,
    reflection_model: Option<ModelSelector>,
    answer_model: Option<ModelSelector>,
    retry_policy: Option<RetryPolicy>,
}

impl ResearchConfigBuilder {
    /// Sets the number of queries the planner generates. At least one query
    /// is always planned.
    #[inline]
    pub fn with_initial_queries(mut self, count: usize) -> Self {
        self.initial_queries = Some(count);
        self
    }

    /// Sets the maximum number of reflection rounds.
    #[inline]
    pub fn with_max_loops(mut self, count: usize) -> Self {
        self.max_loops = Some(count);
        self
    }

    /// Applies the query and loop counts of an effort level.
    #[inline]
    pub fn with_effort(self, effort: Effort) -> Self {
        self.with_initial_queries(effort.initial_queries())
            .with_max_loops(effort.max_loops())
    }

    /// Pins every node to one model.
    pub fn with_model<S: Into<String>>(self, model: S) -> Self {
        let selector = ModelSelector::Fixed(model.into());
        self.with_query_model(selector.clone())
            .with_reflection_model(selector.clone())
            .with_answer_model(selector)
    }

    /// Sets the model selector of the query planner.
    #[inline]
    pub fn with_query_model(mut self, selector: ModelSelector) -> Self {
        self.query_model = Some(selector);
        self
    }

    /// Sets the model selector of the reflector.
    #[inline]
    pub fn with_reflection_model(mut self, selector: ModelSelector) -> Self {
        self.reflection_model = Some(selector);
        self
    }

    /// Sets the model selector of the finalizer.
    #[inline]
    pub fn with_answer_model(mut self, selector: ModelSelector) -> Self {
        self.answer_model = Some(selector);
        self
    }

    /// Sets the retry policy of the web researcher.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ResearchConfig {
        ResearchConfig {
            initial_queries: self.initial_queries.unwrap_or(3).max(1),
            max_loops: self.max_loops.unwrap_or(2),
            query_model: self.query_model.unwrap_or_default(),
            reflection_model: self.reflection_model.unwrap_or_default(),
            answer_model: self.answer_model.unwrap_or_default(),
            retry_policy: self.retry_policy.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResearchConfig::default();
        assert_eq!(config.initial_queries(), 3);
        assert_eq!(config.max_loops(), 2);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.answer_model, ModelSelector::default());
    }

    #[test]
    fn test_effort_presets() {
        let config = ResearchConfigBuilder::default()
            .with_effort("High".parse().unwrap())
            .with_initial_queries(0)
            .build();
        assert_eq!(config.initial_queries(), 1);
        assert_eq!(config.max_loops(), 10);

        let err = "extreme".parse::<Effort>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert_eq!(Effort::Medium.to_string(), "medium");
    }

    #[test]
    fn test_model_selector() {
        let config = ResearchConfigBuilder::default()
            .with_model("gemini-2.5-flash")
            .build();
        assert_eq!(config.query_model.select(), "gemini-2.5-flash");
        assert_eq!(config.reflection_model.select(), "gemini-2.5-flash");

        let selector = ModelSelector::default();
        for _ in 0..20 {
            assert!(SUPPORTED_MODELS.contains(&selector.select()));
        }
    }
}
