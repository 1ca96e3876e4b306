use research_chat_model::{
    self as model, ModelFinishReason, ModelRequest, ResponseFormat,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    pub segment: Segment,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

// ------------------------------------
// Types shared by requests and replies
// ------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on parts carrying the model's reasoning rather than output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct GoogleSearch {}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<Value>,
}

// -----------
// Conversions
// -----------

pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    let (response_mime_type, response_json_schema) = match &req.format {
        ResponseFormat::Text => (None, None),
        ResponseFormat::Json { schema } => {
            (Some("application/json"), Some(schema.clone()))
        }
    };
    let tools = if req.grounded_search {
        vec![Tool {
            google_search: GoogleSearch {},
        }]
    } else {
        vec![]
    };
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_owned()),
            parts: vec![Part {
                text: Some(req.prompt.clone()),
                thought: None,
            }],
        }],
        tools,
        generation_config: GenerationConfig {
            temperature: req.temperature,
            response_mime_type,
            response_json_schema,
        },
    }
}

pub fn convert_grounding(metadata: GroundingMetadata) -> model::GroundingMetadata {
    model::GroundingMetadata {
        chunks: metadata
            .grounding_chunks
            .into_iter()
            .map(|chunk| {
                let web = chunk.web;
                model::GroundingChunk {
                    uri: web.as_ref().and_then(|w| w.uri.clone()),
                    title: web.and_then(|w| w.title),
                }
            })
            .collect(),
        supports: metadata
            .grounding_supports
            .into_iter()
            .map(|support| model::GroundingSupport {
                start_index: support.segment.start_index,
                end_index: support.segment.end_index,
                chunk_indices: support.grounding_chunk_indices,
            })
            .collect(),
    }
}

pub fn convert_finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "MAX_TOKENS" => ModelFinishReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"
        | "SPII" => ModelFinishReason::Filtered,
        _ => ModelFinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_grounded_request() {
        let req = ModelRequest::text("gemini-2.0-flash", "Who won?")
            .with_grounded_search();
        let body = serde_json::to_value(create_request(&req)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "Who won?" }] }
                ],
                "tools": [{ "googleSearch": {} }],
                "generationConfig": { "temperature": 0.0 }
            })
        );
    }

    #[test]
    fn test_create_structured_request() {
        let schema = json!({ "type": "object" });
        let req = ModelRequest::text("gemini-2.0-flash", "Plan")
            .with_temperature(1.0)
            .with_json_schema(schema.clone());
        let body = serde_json::to_value(create_request(&req)).unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(
            body["generationConfig"],
            json!({
                "temperature": 1.0,
                "responseMimeType": "application/json",
                "responseJsonSchema": schema
            })
        );
    }

    #[test]
    fn test_convert_grounding() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "groundingChunks": [
                { "web": { "uri": "https://a.example/x", "title": "a.example" } },
                { "retrievedContext": {} }
            ],
            "groundingSupports": [
                {
                    "segment": { "endIndex": 12, "text": "Rust is fast" },
                    "groundingChunkIndices": [0, 1]
                }
            ]
        }))
        .unwrap();

        let converted = convert_grounding(metadata);
        assert_eq!(converted.chunks[0].uri.as_deref(), Some("https://a.example/x"));
        assert_eq!(converted.chunks[1].uri, None);
        assert_eq!(converted.supports[0].start_index, 0);
        assert_eq!(converted.supports[0].end_index, 12);
        assert_eq!(converted.supports[0].chunk_indices, vec![0, 1]);
    }
}
