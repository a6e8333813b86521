use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Client for OpenAI-compatible `chat/completions` endpoints (OpenAI,
/// OpenRouter, local servers).
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    fn api_key(config: &LLMConfig) -> Result<Option<String>> {
        match (&config.provider, &config.api_key) {
            (LLMProvider::Local, key) => Ok(key.clone()),
            (_, Some(key)) => Ok(Some(key.clone())),
            (provider, None) => Err(AppError::LLMError(format!(
                "Missing API key for {:?}",
                provider
            ))),
        }
    }
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let url = config.endpoint("chat/completions");

        let body = json!({
            "model": config.model,
            "messages": [
                {
                    "role": "system",
                    "content": system
                },
                {
                    "role": "user",
                    "content": user
                }
            ],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::LLMError("Invalid response format".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_required_for_hosted_providers() {
        let config = LLMConfig {
            provider: LLMProvider::OpenRouter,
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            OpenAIClient::api_key(&config),
            Err(AppError::LLMError(_))
        ));

        let local = LLMConfig::default();
        assert_eq!(OpenAIClient::api_key(&local).unwrap(), None);
    }
}
