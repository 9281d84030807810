mod client;
pub(crate) mod types;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ExtractError;
use crate::schema::ResponseSchema;
use crate::util::strip_code_blocks;

use client::GeminiClient;
use types::*;

/// A web source cited by the grounding tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

/// A structured value together with the citations that ground it.
#[derive(Debug, Clone)]
pub struct Grounded<T> {
    pub value: T,
    pub citations: Vec<Citation>,
}

// =============================================================================
// Gemini Agent
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Request output conforming to `schema` for `document`.
    ///
    /// Temperature is pinned at zero; identical inputs should classify
    /// identically up to backend drift. No retries happen here.
    pub async fn extract_value(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value, ExtractError> {
        let request = self.request(system_prompt, document, schema, false);
        let response = self.client().generate(&self.model, &request).await?;
        parse_candidate(&response)
    }

    /// Like [`extract_value`], but with the search-grounding tool enabled.
    /// Returns the cited web sources alongside the value.
    pub async fn extract_grounded_value(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
    ) -> Result<(serde_json::Value, Vec<Citation>), ExtractError> {
        let request = self.request(system_prompt, document, schema, true);
        let response = self.client().generate(&self.model, &request).await?;
        let value = parse_candidate(&response)?;

        let citations = response
            .web_sources()
            .into_iter()
            .map(|w| Citation {
                uri: w.uri,
                title: w.title,
            })
            .collect();

        Ok((value, citations))
    }

    /// Typed extraction through a `ResponseSchema` type.
    pub async fn extract<T: ResponseSchema>(
        &self,
        system_prompt: &str,
        document: &str,
    ) -> Result<T, ExtractError> {
        debug!(type_name = T::type_name(), "Gemini structured extraction");
        let value = self
            .extract_value(system_prompt, document, T::response_schema())
            .await?;
        deserialize(value)
    }

    /// Typed grounded extraction through a `ResponseSchema` type.
    pub async fn extract_grounded<T: ResponseSchema>(
        &self,
        system_prompt: &str,
        document: &str,
    ) -> Result<Grounded<T>, ExtractError> {
        debug!(type_name = T::type_name(), "Gemini grounded extraction");
        let (value, citations) = self
            .extract_grounded_value(system_prompt, document, T::response_schema())
            .await?;
        Ok(Grounded {
            value: deserialize(value)?,
            citations,
        })
    }

    fn request(
        &self,
        system_prompt: &str,
        document: &str,
        schema: serde_json::Value,
        grounded: bool,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(document)],
            system_instruction: Some(SystemInstruction::new(system_prompt)),
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
            tools: grounded.then(|| vec![ToolWire::google_search()]),
        }
    }
}

fn parse_candidate(response: &GenerateContentResponse) -> Result<serde_json::Value, ExtractError> {
    let text = response
        .text()
        .ok_or_else(|| ExtractError::MalformedOutput("no text candidate in response".to_string()))?;

    serde_json::from_str(strip_code_blocks(text))
        .map_err(|e| ExtractError::MalformedOutput(format!("invalid JSON payload: {e}")))
}

fn deserialize<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ExtractError> {
    serde_json::from_value(value)
        .map_err(|e| ExtractError::MalformedOutput(format!("schema mismatch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_new() {
        let ai = Gemini::new("test-key", "gemini-2.5-flash");
        assert_eq!(ai.model(), "gemini-2.5-flash");
        assert_eq!(ai.api_key, "test-key");
    }

    #[test]
    fn test_gemini_with_base_url() {
        let ai = Gemini::new("test-key", "gemini-2.5-flash")
            .with_base_url("https://custom.api.example");
        assert_eq!(ai.base_url, Some("https://custom.api.example".to_string()));
    }

    #[test]
    fn test_parse_candidate_rejects_non_json() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "not json"}]}}]
        }))
        .unwrap();

        let err = parse_candidate(&response).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_candidate_strips_code_fences() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "```json\n{\"a\": 1}\n```"}]}}]
        }))
        .unwrap();

        let value = parse_candidate(&response).unwrap();
        assert_eq!(value["a"], 1);
    }
}
