use serde_json::Value;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    /// Identifier of the model to sample from.
    pub model: String,
    /// The complete prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// The expected shape of the output.
    pub format: ResponseFormat,
    /// Whether the model may ground its answer with a web search. Grounded
    /// responses carry [`GroundingMetadata`](crate::GroundingMetadata).
    pub grounded_search: bool,
}

impl ModelRequest {
    /// Creates a plain text request with temperature `0`.
    #[inline]
    pub fn text<M: Into<String>, P: Into<String>>(model: M, prompt: P) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            format: ResponseFormat::Text,
            grounded_search: false,
        }
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Asks for a JSON document matching `schema`.
    #[inline]
    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.format = ResponseFormat::Json { schema };
        self
    }

    /// Enables search grounding.
    #[inline]
    pub fn with_grounded_search(mut self) -> Self {
        self.grounded_search = true;
        self
    }
}

/// The expected shape of a model output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free text.
    #[default]
    Text,
    /// A JSON document.
    Json {
        /// The [JSON schema](https://json-schema.org/) the output must
        /// conform to.
        schema: Value,
    },
}
