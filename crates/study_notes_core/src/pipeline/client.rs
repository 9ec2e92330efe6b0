//! crates/study_notes_core/src/pipeline/client.rs
//!
//! A thin wrapper over the `TextGenerationService` port that pins the model
//! settings for one content kind and bounds every call with a timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::GenerationError;
use crate::ports::{GenerationConfig, TextGenerationService};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Makes exactly one upstream call per `generate`. Retrying is the caller's job.
#[derive(Clone)]
pub struct GenerationClient {
    service: Arc<dyn TextGenerationService>,
    config: GenerationConfig,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(
        service: Arc<dyn TextGenerationService>,
        config: GenerationConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            config,
            timeout,
        }
    }

    /// Sends `prompt` upstream and returns the raw, non-empty reply text.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(
            "Calling text generation service (max_output_tokens: {}, temperature: {})",
            self.config.max_output_tokens, self.config.temperature
        );

        let reply = tokio::time::timeout(
            self.timeout,
            self.service.generate_content(prompt, &self.config),
        )
        .await
        .map_err(|_| {
            GenerationError::Upstream(format!(
                "request timed out after {}s",
                self.timeout.as_secs_f64()
            ))
        })?
        .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        if reply.trim().is_empty() {
            return Err(GenerationError::Upstream(
                "model returned an empty response".to_string(),
            ));
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;

    struct Fixed(PortResult<String>);

    #[async_trait]
    impl TextGenerationService for Fixed {
        async fn generate_content(&self, _: &str, _: &GenerationConfig) -> PortResult<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(PortError::Unexpected(e.to_string())),
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl TextGenerationService for Hangs {
        async fn generate_content(&self, _: &str, _: &GenerationConfig) -> PortResult<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn client(service: impl TextGenerationService + 'static) -> GenerationClient {
        GenerationClient::new(
            Arc::new(service),
            GenerationConfig::notes(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn returns_raw_text_untouched() {
        let c = client(Fixed(Ok("  {\"a\": 1} trailing".to_string())));
        assert_eq!(c.generate("p").await.unwrap(), "  {\"a\": 1} trailing");
    }

    #[tokio::test]
    async fn empty_reply_is_an_upstream_error() {
        let c = client(Fixed(Ok(" \n ".to_string())));
        assert!(matches!(
            c.generate("p").await,
            Err(GenerationError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn port_failure_is_an_upstream_error() {
        let c = client(Fixed(Err(PortError::Unexpected("503".to_string()))));
        match c.generate("p").await {
            Err(GenerationError::Upstream(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reply_times_out_as_upstream_error() {
        let c = client(Hangs);
        match c.generate("p").await {
            Err(GenerationError::Upstream(msg)) => assert!(msg.contains("timed out after 30s")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
