//! OpenAI-compatible provider implementation.
//!
//! Works with: Gemini (via its OpenAI endpoint), OpenAI, OpenRouter, Ollama,
//! vLLM, and any OpenAI-compatible `/chat/completions` endpoint.
//!
//! Supports:
//! - Chat completions with mixed text + image user messages
//! - Tool use / function calling
//! - JSON-schema constrained output (`response_format`)
//! - Health checks

use async_trait::async_trait;
use dentassist_core::error::ProviderError;
use dentassist_core::message::{ContentPart, Message, MessageToolCall, Role};
use dentassist_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create a Gemini provider (convenience constructor).
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai/",
            api_key,
        )
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(Self::to_api_content(m)),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_content(message: &Message) -> ApiContent {
        if message.parts.is_empty() || message.role != Role::User {
            return ApiContent::Text(message.content.clone());
        }

        ApiContent::Parts(
            message
                .parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => ApiContentPart::Text { text: text.clone() },
                    ContentPart::Image(image) => ApiContentPart::ImageUrl {
                        image_url: ApiImageUrl {
                            url: image.url.clone(),
                        },
                    },
                })
                .collect(),
        )
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn to_api_response_format(format: &ResponseFormat) -> serde_json::Value {
        match format {
            ResponseFormat::JsonSchema { name, schema } => serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": name,
                    "schema": schema,
                    "strict": true,
                }
            }),
        }
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if let Some(format) = &request.response_format {
            body["response_format"] = Self::to_api_response_format(format);
        }

        body
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let mut message = Message::assistant(
            choice
                .message
                .content
                .map(ApiContent::into_text)
                .unwrap_or_default(),
        );
        message.tool_calls = tool_calls;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model.unwrap_or_default(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = request.response_format.is_some(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        Self::parse_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ApiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Message content: a plain string, or a list of typed parts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

impl ApiContent {
    fn into_text(self) -> String {
        match self {
            ApiContent::Text(text) => text,
            ApiContent::Parts(parts) => parts
                .into_iter()
                .filter_map(|p| match p {
                    ApiContentPart::Text { text } => Some(text),
                    ApiContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use dentassist_core::image::ImagePart;

    const TEST_KEY: &str = "test-key";

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
            == Some(format!("Bearer {TEST_KEY}").as_str())
    }

    /// Answers according to the requested model name.
    async fn mock_completions(
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
        }
        match body["model"].as_str().unwrap_or_default() {
            "overloaded" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response(),
            "busy" => StatusCode::TOO_MANY_REQUESTS.into_response(),
            "forbidden" => StatusCode::FORBIDDEN.into_response(),
            "garbled" => (StatusCode::OK, "not json").into_response(),
            _ if body["response_format"]["type"] != "json_schema" => {
                (StatusCode::BAD_REQUEST, "missing response_format").into_response()
            }
            model => Json(serde_json::json!({
                "model": model,
                "choices": [{"message": {
                    "role": "assistant",
                    "content": "{\"response\":\"hi\"}"
                }}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7},
            }))
            .into_response(),
        }
    }

    async fn mock_models(headers: HeaderMap) -> StatusCode {
        if authorized(&headers) {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    /// Serve a fake chat-completions API on an ephemeral port and return
    /// its base URL.
    async fn spawn_mock_api() -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_completions))
            .route("/v1/models", get(mock_models));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1/")
    }

    fn structured_request(model: &str) -> ProviderRequest {
        let mut request = ProviderRequest::new(model, vec![Message::user("hi")]);
        request.response_format = Some(ResponseFormat::JsonSchema {
            name: "MessageOutput".into(),
            schema: serde_json::json!({"type": "object"}),
        });
        request
    }

    #[test]
    fn gemini_constructor() {
        let provider = OpenAiCompatProvider::gemini("key");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(
            provider.base_url,
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert!(matches!(api_messages[1].content, Some(ApiContent::Text(ref t)) if t == "Hello"));
    }

    #[test]
    fn image_message_becomes_parts() {
        let msg = Message::user_with_images(
            "Patient symptoms: swelling",
            vec![ImagePart::inline(b"abc", Some("image/png"))],
        );
        let api = OpenAiCompatProvider::to_api_messages(&[msg]);
        let json = serde_json::to_value(&api[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Patient symptoms: swelling");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "get_overview".into(),
            description: "Overview".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "get_overview");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn body_includes_response_format_and_tools() {
        let mut request = ProviderRequest::new("gemini-2.0-flash", vec![Message::user("hi")]);
        request.max_tokens = Some(256);
        request.tools = vec![ToolDefinition {
            name: "list_conditions".into(),
            description: "List".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        request.response_format = Some(ResponseFormat::JsonSchema {
            name: "MessageOutput".into(),
            schema: serde_json::json!({"type": "object"}),
        });

        let body = OpenAiCompatProvider::build_body(&request);
        assert_eq!(body["model"], "gemini-2.0-flash");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["function"]["name"], "list_conditions");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "MessageOutput");
    }

    #[test]
    fn plain_body_omits_optional_fields() {
        let request = ProviderRequest::new("m", vec![Message::user("hi")]);
        let body = OpenAiCompatProvider::build_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{
            "model": "gemini-2.0-flash",
            "choices": [{"message": {"role": "assistant", "content": "{\"response\": \"hi\"}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "{\"response\": \"hi\"}");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_tool_call_response_with_null_content() {
        let data = r#"{
            "model": "gemini-2.0-flash",
            "choices": [{"message": {"role": "assistant", "content": null,
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "get_condition_info", "arguments": "{\"condition_name\":\"tooth decay\"}"}}]}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert!(response.message.content.is_empty());
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].name, "get_condition_info");
    }

    #[test]
    fn parse_empty_choices_is_malformed() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = OpenAiCompatProvider::parse_response(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "answer_faq".into(),
            arguments: r#"{"question":"what is this app"}"#.into(),
        }];
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc.len(), 1);
        assert_eq!(tc[0].function.name, "answer_faq");
    }

    #[tokio::test]
    async fn completes_against_local_endpoint() {
        let base_url = spawn_mock_api().await;
        let provider = OpenAiCompatProvider::new("local", base_url, TEST_KEY);

        let response = provider
            .complete(structured_request("gemini-2.0-flash"))
            .await
            .unwrap();
        assert_eq!(response.message.content, "{\"response\":\"hi\"}");
        assert_eq!(response.model, "gemini-2.0-flash");
        assert_eq!(response.usage.unwrap().total_tokens, 7);
    }

    #[tokio::test]
    async fn http_statuses_map_to_provider_errors() {
        let base_url = spawn_mock_api().await;
        let provider = OpenAiCompatProvider::new("local", base_url, TEST_KEY);

        let err = provider.complete(structured_request("overloaded")).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ApiError { status_code: 500, ref message }
                if message == "upstream failure"
        ));
        assert_eq!(err.kind(), "api");

        let err = provider.complete(structured_request("busy")).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert_eq!(err.kind(), "rate_limited");

        let err = provider.complete(structured_request("forbidden")).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));

        let err = provider.complete(structured_request("garbled")).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
        assert_eq!(err.kind(), "malformed_response");
    }

    #[tokio::test]
    async fn wrong_api_key_is_an_authentication_failure() {
        let base_url = spawn_mock_api().await;
        let provider = OpenAiCompatProvider::new("local", base_url, "wrong-key");

        let err = provider.complete(structured_request("gemini-2.0-flash")).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(err.kind(), "auth");
        assert!(!provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn health_check_sends_bearer_key() {
        let base_url = spawn_mock_api().await;
        let provider = OpenAiCompatProvider::new("local", base_url, TEST_KEY);
        assert!(provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = OpenAiCompatProvider::new("local", format!("http://{addr}/v1"), TEST_KEY);
        let err = provider.complete(structured_request("m")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(err.kind(), "network");
        assert!(provider.health_check().await.is_err());
    }
}
