use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::AiClient;
use crate::config::AiConfig;
use crate::error::{ExternalService, ExternalServiceUnavailable};

/// OpenAI-compatible chat-completions client.
pub struct HttpAiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl HttpAiClient {
    pub fn from_config(config: &AiConfig) -> Result<Self, ExternalServiceUnavailable> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| unavailable("AI_API_KEY is not configured"))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| unavailable(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    async fn complete(&self, messages: Value) -> Result<String, ExternalServiceUnavailable> {
        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| unavailable(format!("request failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| unavailable(format!("failed to read response: {err}")))?;

        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}: {}", truncate(&text))));
        }

        let payload: Value = serde_json::from_str(&text)
            .map_err(|err| unavailable(format!("unreadable completion envelope: {err}")))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| unavailable("completion has no content"))?;

        debug!(model = %self.model, chars = content.len(), "AI completion received");
        Ok(content.to_string())
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn analyze_text(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        self.complete(json!([
            { "role": "system", "content": system },
            { "role": "user", "content": prompt },
        ]))
        .await
    }

    async fn extract_document(
        &self,
        document: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExternalServiceUnavailable> {
        let data_url = format!("data:{mime_type};base64,{}", STANDARD.encode(document));
        self.complete(json!([{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url } },
            ],
        }]))
        .await
    }
}

fn unavailable(reason: impl Into<String>) -> ExternalServiceUnavailable {
    ExternalServiceUnavailable::new(ExternalService::Ai, reason)
}

fn truncate(text: &str) -> String {
    text.chars().take(200).collect()
}
