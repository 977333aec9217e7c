use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::NarrativeGenerator;
use crate::errors::NarrativeError;
use crate::utils::config::NarrativeConfig;

const TEMPERATURE: f32 = 0.3;

/// Narrative generator backed by an OpenAI-compatible chat completions API.
#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(http: Client, config: &NarrativeConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, NarrativeError> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let body = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            messages,
        };

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Narrative API error ({}): {}", status, body);
            return Err(NarrativeError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(NarrativeError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http_client::create_http_client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> ChatCompletionsClient {
        let config = NarrativeConfig {
            api_key: api_key.map(str::to_string),
            api_url: format!("{}/openai/v1/", server.uri()),
            model: "test-model".to_string(),
            timeout_secs: 5,
        };
        ChatCompletionsClient::new(create_http_client(Duration::from_secs(5)).unwrap(), &config)
    }

    #[tokio::test]
    async fn test_generate_sends_messages_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server, Some("secret"))
            .generate("be brief", "hello")
            .await
            .unwrap();

        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_generate_maps_error_status_and_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(body_partial_json(json!({"messages": [{"role": "user", "content": "fail"}]})))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(body_partial_json(json!({"messages": [{"role": "user", "content": "empty"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, None);

        let err = client.generate("", "fail").await.unwrap_err();
        assert!(matches!(err, NarrativeError::Upstream { status: 500, .. }));

        let err = client.generate("", "empty").await.unwrap_err();
        assert!(matches!(err, NarrativeError::Empty));
    }
}
