//! The steps of a research session.

mod finalizer;
mod planner;
mod reflector;
mod researcher;

use serde::de::DeserializeOwned;

pub use finalizer::{FinalAnswer, Finalizer};
pub use planner::{PlannedQuery, QueryPlanner};
pub use reflector::{ReflectionVerdict, Reflector};
pub use researcher::{ResearchOutput, WebResearcher};

use crate::error::Error;

/// Parses a structured model answer, tolerating a surrounding markdown
/// code fence.
fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    let text = text.trim();
    let body = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|body| body.strip_suffix("```"))
        .unwrap_or(text);
    serde_json::from_str(body.trim()).map_err(|err| {
        Error::invalid_response()
            .with_reason(format!("malformed structured output: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn test_parse_structured() {
        let parsed: Answer = parse_structured(r#" {"value": 1} "#).unwrap();
        assert_eq!(parsed, Answer { value: 1 });

        let parsed: Answer =
            parse_structured("```json\n{\"value\": 2}\n```").unwrap();
        assert_eq!(parsed, Answer { value: 2 });

        let err = parse_structured::<Answer>("not json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidResponse);
    }
}
