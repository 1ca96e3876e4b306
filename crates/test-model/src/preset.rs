use research_chat_model::{
    ErrorKind, GroundingChunk, GroundingMetadata, GroundingSupport,
};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "text_delta")]
    TextDelta(String),
    #[serde(rename = "grounding")]
    Grounding(GroundingMetadata),
}

/// A failure the provider reports instead of a response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetFailure {
    /// The kind reported by the error.
    pub kind: ErrorKind,
    /// The message of the error.
    pub message: String,
    /// How many requests fail before the response goes through. `0` means
    /// the request will fail infinitely.
    pub times: u64,
}

/// The preset response for a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail according to the failure setup.
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a `PresetResponse` that streams `text` in one delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::TextDelta(text.into())])
    }

    /// Creates a `PresetResponse` whose requests always fail.
    #[inline]
    pub fn failing<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self::default().with_failures(kind, message, 0)
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures<S: Into<String>>(
        mut self,
        kind: ErrorKind,
        message: S,
        times: u64,
    ) -> Self {
        self.failure = Some(PresetFailure {
            kind,
            message: message.into(),
            times,
        });
        self
    }

    /// Appends grounding metadata citing `sources` (pairs of URI and title).
    ///
    /// Each entry of `supports` is a segment given as byte range plus the
    /// indices into `sources` that back it.
    pub fn with_grounding(
        mut self,
        sources: &[(&str, &str)],
        supports: &[(usize, usize, &[usize])],
    ) -> Self {
        let chunks = sources
            .iter()
            .map(|(uri, title)| GroundingChunk {
                uri: (!uri.is_empty()).then(|| (*uri).to_owned()),
                title: Some((*title).to_owned()),
            })
            .collect();
        let supports = supports
            .iter()
            .map(|(start_index, end_index, chunk_indices)| GroundingSupport {
                start_index: *start_index,
                end_index: *end_index,
                chunk_indices: chunk_indices.to_vec(),
            })
            .collect();
        self.events
            .push(PresetEvent::Grounding(GroundingMetadata { chunks, supports }));
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_grounding_builder() {
        let response = PresetResponse::with_text("Rust is fast.")
            .with_grounding(
                &[("https://rust-lang.org", "rust-lang.org"), ("", "void")],
                &[(0, 13, &[0, 1])],
            );

        let PresetEvent::Grounding(metadata) = &response.events[1] else {
            unreachable!("unexpected event: {:?}", response.events[1]);
        };
        assert_eq!(metadata.chunks[1].uri, None);
        assert_eq!(metadata.supports[0].chunk_indices, vec![0, 1]);
    }

    #[test]
    fn test_deserialize_script() {
        let response: PresetResponse = serde_json::from_value(json!({
            "events": [
                { "type": "text_delta", "data": "Hello" }
            ],
            "failure": {
                "kind": "RateLimitExceeded",
                "message": "429 Too Many Requests",
                "times": 2
            }
        }))
        .unwrap();

        assert_eq!(
            response,
            PresetResponse::with_text("Hello").with_failures(
                ErrorKind::RateLimitExceeded,
                "429 Too Many Requests",
                2
            )
        );
    }
}
