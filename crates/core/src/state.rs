use serde::{Deserialize, Serialize};

use crate::citation::ResolvedSource;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The research agent.
    Assistant,
}

/// One turn of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Plain text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A search query issued during a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Unique within the session, in issue order.
    pub id: usize,
    /// The query text.
    pub text: String,
}

/// The accumulated state of one research session.
///
/// All lists only ever grow. Only the research graph changes the state, one
/// [`StateUpdate`] at a time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    messages: Vec<ChatMessage>,
    search_query: Vec<SearchQuery>,
    web_research_result: Vec<String>,
    sources_gathered: Vec<ResolvedSource>,
    research_loop_count: usize,
    initial_search_query_count: usize,
    max_research_loops: usize,
}

impl ResearchState {
    /// Creates the state of a new session about `messages`.
    pub fn new(
        messages: Vec<ChatMessage>,
        initial_search_query_count: usize,
        max_research_loops: usize,
    ) -> Self {
        Self {
            messages,
            initial_search_query_count,
            max_research_loops,
            ..Default::default()
        }
    }

    /// Returns the conversation the session researches.
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns every query issued so far.
    #[inline]
    pub fn search_query(&self) -> &[SearchQuery] {
        &self.search_query
    }

    /// Returns the cited summaries, one per query.
    #[inline]
    pub fn web_research_result(&self) -> &[String] {
        &self.web_research_result
    }

    /// Returns every source cited by the summaries.
    #[inline]
    pub fn sources_gathered(&self) -> &[ResolvedSource] {
        &self.sources_gathered
    }

    /// Returns the number of reflection rounds so far.
    #[inline]
    pub fn research_loop_count(&self) -> usize {
        self.research_loop_count
    }

    /// Returns the number of queries the planner generates.
    #[inline]
    pub fn initial_search_query_count(&self) -> usize {
        self.initial_search_query_count
    }

    /// Returns the maximum number of reflection rounds.
    #[inline]
    pub fn max_research_loops(&self) -> usize {
        self.max_research_loops
    }

    /// Returns the id the next issued query gets.
    #[inline]
    pub fn next_query_id(&self) -> usize {
        self.search_query.len()
    }

    /// Returns the topic under research.
    ///
    /// A single message is the topic itself. Longer conversations are
    /// flattened into a transcript.
    pub fn research_topic(&self) -> String {
        research_topic(&self.messages)
    }

    pub(crate) fn merge(&mut self, update: StateUpdate) {
        self.search_query.extend(update.search_query);
        self.web_research_result.extend(update.web_research_result);
        self.sources_gathered.extend(update.sources_gathered);
        self.research_loop_count += update.loops_completed;
    }
}

/// Renders a conversation into the topic handed to the prompts.
pub fn research_topic(messages: &[ChatMessage]) -> String {
    if let [message] = messages {
        return message.content.clone();
    }
    let mut topic = String::new();
    for message in messages {
        let speaker = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        topic.push_str(speaker);
        topic.push_str(": ");
        topic.push_str(&message.content);
        topic.push('\n');
    }
    topic
}

/// Additions a graph node makes to the [`ResearchState`].
#[derive(Clone, Debug, Default)]
pub(crate) struct StateUpdate {
    pub search_query: Vec<SearchQuery>,
    pub web_research_result: Vec<String>,
    pub sources_gathered: Vec<ResolvedSource>,
    pub loops_completed: usize,
}
