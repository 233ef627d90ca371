//! The dispatcher: one query in, one answer string out.
//!
//! A dispatch runs the tool-calling loop against the provider until the
//! model produces a final `MessageOutput` document. Whatever goes wrong
//! (transport, status, schema, iteration limit, timeout) the caller still
//! gets text: the app overview. Outcomes are reported on the event bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dentassist_config::AppConfig;
use dentassist_core::error::{ProviderError, ToolError};
use dentassist_core::event::{DispatchOutcome, DomainEvent, EventBus};
use dentassist_core::message::Message;
use dentassist_core::provider::{Provider, ProviderRequest, ResponseFormat};
use dentassist_core::session::{SessionId, Turn};
use dentassist_core::tool::{ToolCall, ToolRegistry};
use dentassist_tools::{KnowledgeBase, get_overview};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// System instructions for the conversational agent.
pub const INSTRUCTIONS: &str = "You are a dental AI assistant.
Analyze user text and uploaded dental photos for possible issues.
Never give final medical advice; always recommend seeing a dentist for confirmation.
Stick to gum infection, tooth decay, and sensitivity.
Use dot or numbered list style for clarity.";

const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// The required shape of the model's final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOutput {
    pub response: String,
}

impl MessageOutput {
    /// JSON schema sent to the provider as the response format.
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "response": { "type": "string" }
            },
            "required": ["response"],
            "additionalProperties": false
        })
    }

    pub fn response_format() -> ResponseFormat {
        ResponseFormat::JsonSchema {
            name: "MessageOutput".into(),
            schema: Self::schema(),
        }
    }

    /// Parse a final model message. Surrounding whitespace and a Markdown
    /// code fence are tolerated.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let body = strip_code_fence(raw.trim());
        serde_json::from_str(body).map_err(|e| AgentError::MalformedOutput(e.to_string()))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest).trim();
    // Drop an info string ("json") ahead of the object, on its own line or not.
    let body_start = rest.find('{').unwrap_or(0);
    let info = &rest[..body_start];
    if info.chars().all(|c| c.is_ascii_alphanumeric() || c.is_whitespace()) {
        rest[body_start..].trim()
    } else {
        rest
    }
}

/// Why a run did not produce a usable answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Final answer did not match MessageOutput: {0}")]
    MalformedOutput(String),

    #[error("Exceeded {0} tool iterations without a final answer")]
    MaxIterations(u32),

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),
}

impl AgentError {
    /// Short label used in diagnostics events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.kind(),
            Self::MalformedOutput(_) => "schema",
            Self::MaxIterations(_) => "max_iterations",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// The result of one dispatch, for internal callers and tests.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub text: String,
    pub outcome: DispatchOutcome,
    pub latency: Duration,
}

/// The session-scoped conversational agent.
pub struct DentalAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    timeout: Option<Duration>,
    replay_history: bool,
    event_bus: Arc<EventBus>,
    fallback: String,
}

impl DentalAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: None,
            replay_history: false,
            event_bus,
            fallback: get_overview(&KnowledgeBase::builtin()),
        }
    }

    /// Build an agent over the full dental tool set using `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let agent = Self::new(
            provider,
            &config.model,
            config.temperature,
            Arc::new(dentassist_tools::default_registry()),
            event_bus,
        )
        .with_max_iterations(config.agent.max_tool_iterations)
        .with_max_tokens(config.max_tokens)
        .with_replay_history(config.agent.replay_history);

        match config.agent.timeout_secs {
            0 => agent,
            secs => agent.with_timeout(Duration::from_secs(secs)),
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Bound the whole run (all model calls and tool executions).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send prior session turns to the model before the new query.
    pub fn with_replay_history(mut self, enabled: bool) -> Self {
        self.replay_history = enabled;
        self
    }

    /// The text returned whenever a run fails or comes back empty.
    pub fn fallback_text(&self) -> &str {
        &self.fallback
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer `query` with no session context.
    pub async fn respond(&self, query: &str) -> String {
        self.dispatch(None, query, &[]).await.text
    }

    /// Answer `query` for `session`. Never fails: errors and empty answers
    /// turn into the overview text.
    pub async fn dispatch(
        &self,
        session: Option<&SessionId>,
        query: &str,
        history: &[Turn],
    ) -> Dispatch {
        let start = Instant::now();
        info!(
            session_id = session.map(SessionId::as_str).unwrap_or("-"),
            query_len = query.len(),
            history = history.len(),
            "Dispatching query"
        );

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(query, history)).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout(limit)),
            },
            None => self.run(query, history).await,
        };

        let (text, outcome, error_kind) = match result {
            Ok(output) if !output.response.trim().is_empty() => {
                (output.response, DispatchOutcome::Succeeded, None)
            }
            Ok(_) => {
                warn!("Model returned an empty response, using overview");
                (self.fallback.clone(), DispatchOutcome::EmptyFallback, None)
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Dispatch failed, using overview");
                (
                    self.fallback.clone(),
                    DispatchOutcome::ErrorFallback,
                    Some(e.kind().to_string()),
                )
            }
        };

        let latency = start.elapsed();
        self.event_bus.publish(DomainEvent::DispatchCompleted {
            session_id: session.map(|s| s.to_string()),
            outcome,
            error_kind,
            latency_ms: latency.as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        Dispatch {
            text,
            outcome,
            latency,
        }
    }

    fn initial_messages(&self, query: &str, history: &[Turn]) -> Vec<Message> {
        let mut messages = vec![Message::system(INSTRUCTIONS)];
        if self.replay_history {
            messages.extend(history.iter().map(Turn::to_message));
        }
        messages.push(Message::user(query));
        messages
    }

    /// The tool-calling loop. Ends with a parsed final answer or an error.
    async fn run(&self, query: &str, history: &[Turn]) -> Result<MessageOutput, AgentError> {
        let mut messages = self.initial_messages(query, history);
        let tool_definitions = self.tools.definitions();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                return Err(AgentError::MaxIterations(self.max_iterations));
            }

            debug!(iteration, messages = messages.len(), "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                response_format: Some(MessageOutput::response_format()),
            };

            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                return MessageOutput::parse(&response.message.content);
            }

            let tool_calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for tc in &tool_calls {
                let started = Instant::now();
                let result = match parse_arguments(&tc.arguments) {
                    Ok(arguments) => {
                        let call = ToolCall {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            arguments,
                        };
                        self.tools.execute(&call).await
                    }
                    Err(e) => Err(e),
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                let (success, output) = match result {
                    Ok(tool_result) => (tool_result.success, tool_result.output),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        (false, format!("Error: {e}"))
                    }
                };
                debug!(tool = %tc.name, success, duration_ms, "Tool executed");

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });

                messages.push(Message::tool_result(&tc.id, output));
            }
        }
    }
}

/// Tool arguments arrive as a JSON string; an empty string means no arguments.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| {
        debug!(error = %e, "Tool arguments are not valid JSON");
        ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use dentassist_core::message::Role;

    fn agent(provider: Arc<dyn Provider>) -> DentalAgent {
        DentalAgent::new(
            provider,
            "mock-model",
            0.7,
            Arc::new(dentassist_tools::default_registry()),
            Arc::new(EventBus::default()),
        )
    }

    fn overview() -> String {
        get_overview(&KnowledgeBase::builtin())
    }

    #[tokio::test]
    async fn returns_structured_response_verbatim() {
        let provider = Arc::new(ScriptedProvider::answers(&["- Brush twice daily."]));
        let dispatch = agent(provider).dispatch(None, "How do I prevent decay?", &[]).await;
        assert_eq!(dispatch.text, "- Brush twice daily.");
        assert_eq!(dispatch.outcome, DispatchOutcome::Succeeded);
    }

    #[tokio::test]
    async fn empty_query_is_accepted() {
        let provider = Arc::new(ScriptedProvider::answers(&["Hello!"]));
        assert_eq!(agent(provider).respond("").await, "Hello!");
    }

    #[tokio::test]
    async fn empty_response_falls_back_to_overview() {
        let provider = Arc::new(ScriptedProvider::answers(&[""]));
        let dispatch = agent(provider).dispatch(None, "hi", &[]).await;
        assert_eq!(dispatch.text, overview());
        assert_eq!(dispatch.outcome, DispatchOutcome::EmptyFallback);
    }

    #[tokio::test]
    async fn whitespace_response_falls_back_to_overview() {
        let provider = Arc::new(ScriptedProvider::answers(&["  \n\t "]));
        assert_eq!(agent(provider).respond("hi").await, overview());
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_overview() {
        let provider = Arc::new(FailingProvider::network());
        let dispatch = agent(provider.clone()).dispatch(None, "hi", &[]).await;
        assert_eq!(dispatch.text, overview());
        assert_eq!(dispatch.outcome, DispatchOutcome::ErrorFallback);
        // No retry.
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_final_answer_falls_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_raw_response(
            "Sure! Gum infection is...",
        )]));
        let dispatch = agent(provider).dispatch(None, "gums?", &[]).await;
        assert_eq!(dispatch.text, overview());
        assert_eq!(dispatch.outcome, DispatchOutcome::ErrorFallback);
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_raw_response(
            "```json\n{\"response\": \"1. **See a dentist**\"}\n```",
        )]));
        assert_eq!(agent(provider).respond("q").await, "1. **See a dentist**");
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call(
                "get_condition_info",
                serde_json::json!({"condition_name": "Tooth Decay"}),
            )]),
            make_answer("Tooth decay: see a dentist."),
        ]));
        let text = agent(provider.clone()).respond("Tell me about tooth decay").await;
        assert_eq!(text, "Tooth decay: see a dentist.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let tool_msg = requests[1].messages.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_get_condition_info"));
        assert!(tool_msg.content.contains("Identify cavities or decay"));
    }

    #[tokio::test]
    async fn tool_errors_are_reported_to_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("answer_faq", serde_json::json!({}))]),
            make_answer("ok"),
        ]));
        let text = agent(provider.clone()).respond("faq").await;
        assert_eq!(text, "ok");
        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(tool_msg.content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn malformed_tool_arguments_are_reported_to_the_model() {
        let mut call = make_tool_call("get_overview", serde_json::json!({}));
        call.arguments = "{not json".into();
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![call]),
            make_answer("ok"),
        ]));
        let text = agent(provider.clone()).respond("overview").await;
        assert_eq!(text, "ok");

        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert!(tool_msg.content.starts_with("Error: "));
        assert!(tool_msg.content.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn empty_tool_arguments_mean_no_arguments() {
        let mut call = make_tool_call("list_conditions", serde_json::json!({}));
        call.arguments = String::new();
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![call]),
            make_answer("ok"),
        ]));
        agent(provider.clone()).respond("conditions").await;

        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(tool_msg.content.contains("**tooth decay**"));
    }

    #[tokio::test]
    async fn request_carries_tools_schema_and_instructions() {
        let provider = Arc::new(ScriptedProvider::answers(&["x"]));
        agent(provider.clone()).respond("q").await;

        let requests = provider.requests();
        let request = &requests[0];
        assert_eq!(request.tools.len(), 4);
        assert!(matches!(
            request.response_format,
            Some(ResponseFormat::JsonSchema { ref name, .. }) if name == "MessageOutput"
        ));
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("recommend seeing a dentist"));
        assert_eq!(request.messages.last().unwrap().content, "q");
    }

    #[tokio::test]
    async fn exceeding_iterations_falls_back() {
        let looping = make_tool_call_response(vec![make_tool_call(
            "get_overview",
            serde_json::json!({}),
        )]);
        let provider = Arc::new(ScriptedProvider::new(vec![looping]));
        let agent = agent(provider.clone()).with_max_iterations(3);

        let dispatch = agent.dispatch(None, "loop", &[]).await;
        assert_eq!(dispatch.outcome, DispatchOutcome::ErrorFallback);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let provider = Arc::new(SlowProvider::new(Duration::from_secs(60)));
        let agent = agent(provider).with_timeout(Duration::from_secs(1));
        let dispatch = agent.dispatch(None, "slow", &[]).await;
        assert_eq!(dispatch.text, overview());
        assert_eq!(dispatch.outcome, DispatchOutcome::ErrorFallback);
    }

    #[tokio::test]
    async fn history_is_not_replayed_by_default() {
        let provider = Arc::new(ScriptedProvider::answers(&["a"]));
        let history = vec![Turn::user("earlier"), Turn::assistant("reply")];
        agent(provider.clone()).dispatch(None, "now", &history).await;
        assert_eq!(provider.requests()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn history_replay_when_enabled() {
        let provider = Arc::new(ScriptedProvider::answers(&["a"]));
        let history = vec![Turn::user("earlier"), Turn::assistant("reply")];
        agent(provider.clone())
            .with_replay_history(true)
            .dispatch(None, "now", &history)
            .await;

        let requests = provider.requests();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn every_dispatch_publishes_an_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let agent = DentalAgent::new(
            Arc::new(FailingProvider::network()),
            "mock-model",
            0.7,
            Arc::new(dentassist_tools::default_registry()),
            bus,
        );

        let session = SessionId::from("s-1");
        agent.dispatch(Some(&session), "hi", &[]).await;

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::DispatchCompleted {
                session_id,
                outcome,
                error_kind,
                ..
            } => {
                assert_eq!(session_id.as_deref(), Some("s-1"));
                assert_eq!(*outcome, DispatchOutcome::ErrorFallback);
                assert_eq!(error_kind.as_deref(), Some("network"));
            }
            other => panic!("Expected DispatchCompleted, got {other:?}"),
        }
    }

    #[test]
    fn fence_with_inline_info_string_is_stripped() {
        for raw in [
            "```{\"response\": \"x\"}```",
            "```json {\"response\": \"x\"}```",
            "```json{\"response\": \"x\"}```",
            " ```JSON\n  {\"response\": \"x\"}  \n``` ",
        ] {
            assert_eq!(MessageOutput::parse(raw).unwrap().response, "x", "input: {raw:?}");
        }
        assert!(MessageOutput::parse("```yaml\nresponse: x\n```").is_err());
    }

    #[test]
    fn parse_rejects_missing_field() {
        assert!(MessageOutput::parse(r#"{"answer": "x"}"#).is_err());
        assert_eq!(
            MessageOutput::parse("  {\"response\": \"x\"}\n").unwrap().response,
            "x"
        );
    }

    #[test]
    fn from_config_applies_agent_settings() {
        let mut config = AppConfig::default();
        config.agent.max_tool_iterations = 4;
        config.agent.timeout_secs = 30;
        let agent = DentalAgent::from_config(
            &config,
            Arc::new(FailingProvider::network()),
            Arc::new(EventBus::default()),
        );
        assert_eq!(agent.max_iterations, 4);
        assert_eq!(agent.timeout, Some(Duration::from_secs(30)));
        assert_eq!(agent.max_tokens, Some(config.max_tokens));
        assert_eq!(agent.model(), "gemini-2.0-flash");
    }
}
