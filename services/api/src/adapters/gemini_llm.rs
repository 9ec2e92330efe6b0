//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the adapter for Google's Gemini `generateContent` API.
//! It implements the `TextGenerationService` port from the `core` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use study_notes_core::ports::{GenerationConfig, PortError, PortResult, TextGenerationService};
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` over the Gemini REST API.
#[derive(Clone)]
pub struct GeminiGenerationAdapter {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiGenerationAdapter {
    /// Creates a new `GeminiGenerationAdapter`.
    ///
    /// `timeout` bounds the whole HTTP exchange; the pipeline applies its own
    /// per-call timeout on top of this.
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn build_request<'a>(prompt: &'a str, config: &GenerationConfig) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: RequestGenerationConfig {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        },
    }
}

/// Concatenates the text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> PortResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(PortError::Unexpected(format!(
            "Gemini blocked the prompt: {}",
            reason
        )));
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        PortError::Unexpected("Gemini returned no candidates in its response.".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(PortError::Unexpected(format!(
            "Gemini response contained no text content (finish reason: {}).",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for GeminiGenerationAdapter {
    async fn generate_content(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> PortResult<String> {
        debug!(
            "Sending {} prompt characters to Gemini model {}",
            prompt.chars().count(),
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(prompt, config))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse Gemini response: {}", e)))?;

        response_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_body_uses_gemini_field_names() {
        let body = serde_json::to_value(build_request("hello", &GenerationConfig::quiz())).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let adapter = GeminiGenerationAdapter::new(
            "https://example.test/v1beta/",
            "key".into(),
            "gemini-1.5-flash".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            adapter.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn text_parts_of_the_first_candidate_are_joined() {
        let response = parse(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"title\":" }, { "text": " \"x\"}" }] },
                  "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(response_text(response).unwrap(), "{\"title\": \"x\"}");
    }

    #[test]
    fn blocked_or_empty_responses_are_errors() {
        let blocked = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(matches!(response_text(blocked), Err(PortError::Unexpected(m)) if m.contains("SAFETY")));

        let empty = parse(json!({ "candidates": [] }));
        assert!(response_text(empty).is_err());

        let no_text = parse(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        }));
        assert!(matches!(response_text(no_text), Err(PortError::Unexpected(m)) if m.contains("MAX_TOKENS")));
    }
}
