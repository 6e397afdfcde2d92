/// OpenAI chat-completions text generator
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{error::GenerationError, services::providers::TextGenerator};

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletion {
    fn into_text(self) -> Result<String, GenerationError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[derive(Clone)]
pub struct OpenAiGenerator {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: Option<String>,
        api_url: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_url,
            model,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        completion.into_text()
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(api_key: Option<&str>) -> OpenAiGenerator {
        OpenAiGenerator::new(
            api_key.map(str::to_string),
            "http://test.local/v1".to_string(),
            "gpt-3.5-turbo".to_string(),
            100,
            0.7,
        )
    }

    #[test]
    fn test_is_configured() {
        assert!(generator(Some("sk-test")).is_configured());
        assert!(!generator(None).is_configured());
        assert!(!generator(Some("  ")).is_configured());
    }

    #[test]
    fn test_completion_text_is_trimmed() {
        let json = r#"{
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  A rainy-day gem.\n"}}]
        }"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(completion.into_text().unwrap(), "A rainy-day gem.");
    }

    #[test]
    fn test_empty_completion_is_error() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            completion.into_text(),
            Err(GenerationError::EmptyResponse)
        ));

        let json = r#"{"choices": [{"message": {"content": null}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert!(matches!(
            completion.into_text(),
            Err(GenerationError::EmptyResponse)
        ));
    }
}
