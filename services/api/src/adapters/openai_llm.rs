//! services/api/src/adapters/openai_llm.rs
//!
//! This module contains the adapter for an OpenAI-compatible chat model.
//! It implements the `TextGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use study_notes_core::ports::{GenerationConfig, PortError, PortResult, TextGenerationService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiGenerationAdapter {
    /// Sends the whole prompt as a single user message.
    async fn generate_content(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> PortResult<String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(config.max_output_tokens)
            .temperature(config.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortError::Unexpected("Generation LLM returned no choices in its response.".to_string())
            })?
            .message
            .content
            .ok_or_else(|| {
                PortError::Unexpected("Generation LLM response contained no text content.".to_string())
            })
    }
}
