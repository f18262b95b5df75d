//! AI collaborator used for invoice OCR and conformity analysis.

mod http;

pub use http::HttpAiClient;

use async_trait::async_trait;

use crate::config::AiConfig;
use crate::error::{ExternalService, ExternalServiceUnavailable};

/// Text and vision completions returning raw (possibly fenced) JSON text.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn analyze_text(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable>;

    async fn extract_document(
        &self,
        document: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable>;
}

/// Stand-in used when no API key is configured; every call takes the fallback path.
#[derive(Debug, Clone, Default)]
pub struct DisabledAiClient;

#[async_trait]
impl AiClient for DisabledAiClient {
    async fn analyze_text(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        Err(disabled())
    }

    async fn extract_document(
        &self,
        _document: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        Err(disabled())
    }
}

fn disabled() -> ExternalServiceUnavailable {
    ExternalServiceUnavailable::new(ExternalService::Ai, "AI_API_KEY is not configured")
}

/// Either the HTTP client or the disabled stand-in, depending on configuration.
pub enum ConfiguredAiClient {
    Http(HttpAiClient),
    Disabled(DisabledAiClient),
}

impl ConfiguredAiClient {
    pub fn from_config(config: &AiConfig) -> Result<Self, ExternalServiceUnavailable> {
        match &config.api_key {
            Some(_) => HttpAiClient::from_config(config).map(Self::Http),
            None => Ok(Self::Disabled(DisabledAiClient)),
        }
    }
}

#[async_trait]
impl AiClient for ConfiguredAiClient {
    async fn analyze_text(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        match self {
            Self::Http(client) => client.analyze_text(system, prompt).await,
            Self::Disabled(client) => client.analyze_text(system, prompt).await,
        }
    }

    async fn extract_document(
        &self,
        document: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        match self {
            Self::Http(client) => client.extract_document(document, mime_type, prompt).await,
            Self::Disabled(client) => client.extract_document(document, mime_type, prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn missing_key_selects_disabled_client() {
        let config = AiConfig {
            api_key: None,
            base_url: "http://localhost:1".to_string(),
            model: "test".to_string(),
            timeout: Duration::from_secs(1),
        };
        let client = ConfiguredAiClient::from_config(&config).expect("client builds");
        assert!(matches!(client, ConfiguredAiClient::Disabled(_)));

        let err = client
            .analyze_text("system", "prompt")
            .await
            .expect_err("disabled client never answers");
        assert_eq!(err.service, ExternalService::Ai);
    }
}
