//! Core logic of the research agent: credential pool, retrying invoker,
//! research graph and its nodes, citations, configurations, etc.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod citation;
mod config;
mod credential;
mod error;
mod event;
mod graph;
mod invoker;
mod model_client;
mod node;
mod prompts;
mod state;

pub use config::{
    Effort, ModelSelector, ResearchConfig, ResearchConfigBuilder,
    SUPPORTED_MODELS,
};
pub use credential::{Credential, CredentialPool};
pub use error::{Error, ErrorKind};
pub use event::ProgressEvent;
pub use graph::{
    ResearchGraph, ResearchGraphBuilder, ResearchOutcome, should_continue,
};
pub use invoker::{
    DIRECT_CALL_RETRIES, ResilientInvoker, RetryPolicy, call_with_retries,
    is_transient,
};
pub use model_client::{ClientError, ModelClient, ModelClientResponse};
pub use node::{
    FinalAnswer, Finalizer, PlannedQuery, QueryPlanner, ReflectionVerdict,
    Reflector, ResearchOutput, WebResearcher,
};
pub use state::{ChatMessage, ResearchState, Role, SearchQuery, research_topic};
