//! Brain module: LLM provider abstraction and the completion service.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions and the
//! `CompletionService` the research phases talk to. The service adds
//! schema-constrained generation on top of plain text completion and hands
//! every prompt/response pair to the session recorder.

use crate::error::LlmError;
use crate::research::recorder::RecorderHandle;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Whether the provider can natively constrain output to a JSON object.
    fn supports_structured_output(&self) -> bool {
        false
    }
}

/// A named JSON Schema describing the object a structured completion must return.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

impl StructuredSchema {
    pub fn new(name: &'static str, schema: serde_json::Value) -> Self {
        Self { name, schema }
    }

    /// Instructions appended to a prompt so the model answers with a conforming object.
    fn instructions(&self) -> String {
        let rendered =
            serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string());
        format!(
            "\n\nRespond with a single JSON object named `{}` that conforms to this JSON Schema. \
             Do not include any text outside the JSON object.\n<schema>\n{}\n</schema>",
            self.name, rendered
        )
    }
}

/// Locate the outermost JSON object in a model reply.
///
/// Models sometimes wrap JSON in markdown fences or add a sentence around it,
/// so everything between the first `{` and the last `}` is taken. Both are
/// single-byte ASCII, so slicing at their byte offsets is always valid UTF-8.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// The completion service injected into every research phase.
///
/// Cheap to clone; all clones share the same provider and recorder.
#[derive(Clone)]
pub struct CompletionService {
    provider: Arc<dyn LlmProvider>,
    recorder: RecorderHandle,
    temperature: f32,
    max_tokens: Option<usize>,
}

impl CompletionService {
    /// Create a service over `provider` that records nothing.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            recorder: RecorderHandle::disabled(),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    /// Route prompt/response pairs to `recorder`.
    pub fn with_recorder(mut self, recorder: RecorderHandle) -> Self {
        self.recorder = recorder;
        self
    }

    /// Override generation parameters.
    pub fn with_generation(mut self, temperature: f32, max_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Generate free text for `prompt`.
    pub async fn complete_text(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        self.send(session_id, tag, prompt.to_string(), false).await
    }

    /// Generate an object matching `schema` and deserialize it into `T`.
    ///
    /// A reply that contains no JSON object, or one that does not deserialize
    /// into `T`, is reported as [`LlmError::StructuredOutput`].
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt: &str,
        schema: &StructuredSchema,
    ) -> Result<T, LlmError> {
        let full_prompt = format!("{prompt}{}", schema.instructions());
        let json_mode = self.provider.supports_structured_output();
        let reply = self.send(session_id, tag, full_prompt, json_mode).await?;

        let json = extract_json_object(&reply).ok_or_else(|| LlmError::StructuredOutput {
            tag: tag.to_string(),
            message: "response contains no JSON object".to_string(),
        })?;
        serde_json::from_str(json).map_err(|e| LlmError::StructuredOutput {
            tag: tag.to_string(),
            message: e.to_string(),
        })
    }

    async fn send(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt: String,
        json_mode: bool,
    ) -> Result<String, LlmError> {
        let prompt_id = self.recorder.prompt(session_id, tag, &prompt);
        debug!(
            session_id = %session_id,
            tag,
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let request = CompletionRequest {
            messages: vec![Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode,
            model: None,
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                debug!(
                    session_id = %session_id,
                    tag,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion received"
                );
                if let Some(prompt_id) = prompt_id {
                    self.recorder
                        .response(session_id, tag, prompt_id, &response.message.content);
                }
                Ok(response.message.content)
            }
            Err(e) => {
                warn!(session_id = %session_id, tag, error = %e, "Completion request failed");
                Err(e)
            }
        }
    }
}

/// What a [`MockLlmProvider`] rule answers with.
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockRule {
    needles: Vec<String>,
    reply: MockReply,
}

/// A mock LLM provider for testing and development.
///
/// A request is answered by the most recently registered rule whose substrings
/// all occur in the prompt, then by the FIFO queue, then by a fixed
/// placeholder. Rules are not consumed, so concurrent fan-out calls resolve
/// independently of arrival order.
pub struct MockLlmProvider {
    model: String,
    rules: Mutex<Vec<MockRule>>,
    responses: Mutex<Vec<CompletionResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            rules: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that answers every prompt with `text`.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        provider.respond_when(&[], text);
        provider
    }

    /// Answer prompts containing every one of `needles` with `reply`.
    pub fn respond_when(&self, needles: &[&str], reply: &str) {
        self.push_rule(needles, MockReply::Text(reply.to_string()));
    }

    /// Fail prompts containing every one of `needles`.
    pub fn fail_when(&self, needles: &[&str], message: &str) {
        self.push_rule(needles, MockReply::Fail(message.to_string()));
    }

    fn push_rule(&self, needles: &[&str], reply: MockReply) {
        self.rules.lock().unwrap().push(MockRule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            reply,
        });
    }

    /// Queue a response to be returned when no rule matches.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Every prompt received so far, in arrival order.
    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of received prompts containing `needle`.
    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.user_text();
        self.prompts.lock().unwrap().push(prompt.clone());

        let matched = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|rule| rule.needles.iter().all(|n| prompt.contains(n.as_str())))
            .map(|rule| rule.reply.clone());

        match matched {
            Some(MockReply::Text(text)) => Ok(Self::text_response(&text)),
            Some(MockReply::Fail(message)) => Err(LlmError::ApiRequest { message }),
            None => {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    Ok(Self::text_response(
                        "I'm a mock LLM. No queued responses available.",
                    ))
                } else {
                    Ok(responses.remove(0))
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::recorder::MemorySessionRecorder;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        relevant: bool,
    }

    fn verdict_schema() -> StructuredSchema {
        StructuredSchema::new(
            "verdict",
            serde_json::json!({
                "type": "object",
                "properties": { "relevant": { "type": "boolean" } },
                "required": ["relevant"]
            }),
        )
    }

    #[test]
    fn test_extract_json_object_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"relevant\": true}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"relevant\": true}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_mock_rules_take_precedence_over_queue() {
        let provider = MockLlmProvider::new();
        provider.queue_response(MockLlmProvider::text_response("queued"));
        provider.respond_when(&["alpha", "beta"], "both");

        let both = provider
            .complete(CompletionRequest::from_prompt("alpha and beta"))
            .await
            .unwrap();
        assert_eq!(both.message.content, "both");

        let queued = provider
            .complete(CompletionRequest::from_prompt("only alpha"))
            .await
            .unwrap();
        assert_eq!(queued.message.content, "queued");
        assert_eq!(provider.prompts_containing("alpha"), 2);
    }

    #[tokio::test]
    async fn test_mock_later_rules_override_earlier() {
        let provider = MockLlmProvider::with_response("generic");
        provider.respond_when(&["special"], "specific");
        let reply = provider
            .complete(CompletionRequest::from_prompt("a special prompt"))
            .await
            .unwrap();
        assert_eq!(reply.message.content, "specific");
        let reply = provider
            .complete(CompletionRequest::from_prompt("anything else"))
            .await
            .unwrap();
        assert_eq!(reply.message.content, "generic");
    }

    #[tokio::test]
    async fn test_mock_fail_rule() {
        let provider = MockLlmProvider::new();
        provider.fail_when(&["boom"], "simulated outage");
        let err = provider
            .complete(CompletionRequest::from_prompt("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ApiRequest { .. }));
    }

    #[tokio::test]
    async fn test_complete_structured_parses_object() {
        let provider = Arc::new(MockLlmProvider::with_response(
            "```json\n{\"relevant\": true}\n```",
        ));
        let service = CompletionService::new(provider.clone());
        let verdict: Verdict = service
            .complete_structured(Uuid::new_v4(), "relevance", "Is it?", &verdict_schema())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict { relevant: true });
        // The schema is appended to the prompt.
        assert_eq!(provider.prompts_containing("<schema>"), 1);
    }

    #[tokio::test]
    async fn test_complete_structured_rejects_malformed_reply() {
        let provider = Arc::new(MockLlmProvider::with_response("certainly not json"));
        let service = CompletionService::new(provider);
        let err = service
            .complete_structured::<Verdict>(Uuid::new_v4(), "relevance", "Is it?", &verdict_schema())
            .await
            .unwrap_err();
        match err {
            LlmError::StructuredOutput { tag, .. } => assert_eq!(tag, "relevance"),
            other => panic!("Expected StructuredOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_structured_rejects_wrong_shape() {
        let provider = Arc::new(MockLlmProvider::with_response("{\"relevant\": \"maybe\"}"));
        let service = CompletionService::new(provider);
        let result = service
            .complete_structured::<Verdict>(Uuid::new_v4(), "relevance", "Is it?", &verdict_schema())
            .await;
        assert!(matches!(result, Err(LlmError::StructuredOutput { .. })));
    }

    #[tokio::test]
    async fn test_prompt_and_response_are_recorded() {
        let recorder = Arc::new(MemorySessionRecorder::new());
        let provider = Arc::new(MockLlmProvider::with_response("plain answer"));
        let service = CompletionService::new(provider)
            .with_recorder(RecorderHandle::new(recorder.clone()));
        let session_id = Uuid::new_v4();

        let text = service
            .complete_text(session_id, "knowledge_gaps", "What is missing?")
            .await
            .unwrap();
        assert_eq!(text, "plain answer");

        let prompts = recorder.prompts();
        let responses = recorder.responses();
        assert_eq!(prompts.len(), 1);
        assert_eq!(responses.len(), 1);
        assert_eq!(prompts[0].tag, "knowledge_gaps");
        assert_eq!(responses[0].prompt_id, prompts[0].prompt_id);
        assert_eq!(responses[0].text, "plain answer");
    }
}
