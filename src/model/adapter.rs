use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ChatMessage, ChatRequest, ChatResponse, GenerateRequest, GenerateResponse},
    upstream::{Completion, CompletionBackend, CompletionPayload},
};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
const GENERATE_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant focused on generating high-quality text content.";

pub const MAX_TOKENS_LIMIT: u32 = 4000;

/// Translates service requests into vendor calls and vendor completions back
/// into service responses. Holds no per-request state.
#[derive(Clone)]
pub struct ChatAdapter {
    backend: Arc<dyn CompletionBackend>,
}

/// Sampling parameters after defaults have been applied. `model` is echoed
/// back exactly as the caller sent it; `deployment` is its trimmed form.
struct Sampling {
    deployment: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stop: Option<Vec<String>>,
}

impl ChatAdapter {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn chat(
        &self,
        request: ChatRequest,
        config: &AppConfig,
    ) -> Result<ChatResponse, ServiceError> {
        let messages = conversation_for(&request)?;
        let sampling = resolve_sampling(
            config,
            request.model,
            request.max_tokens,
            request.temperature,
            request.top_p,
            request.stop,
        )?;

        let (completion, model) = self.forward(messages, sampling).await?;
        let (text, finish_reason) = extract_text(&completion)?;

        Ok(ChatResponse {
            response: text,
            model,
            timestamp: Utc::now(),
            tokens_used: completion.usage.map(|u| u.total_tokens),
            finish_reason,
        })
    }

    pub async fn generate(
        &self,
        request: GenerateRequest,
        config: &AppConfig,
    ) -> Result<GenerateResponse, ServiceError> {
        if request.prompt.trim().is_empty() {
            return Err(ServiceError::BadRequest("prompt must not be empty".into()));
        }

        let messages = vec![
            ChatMessage::system(GENERATE_SYSTEM_PROMPT),
            ChatMessage::user(request.prompt),
        ];
        let sampling = resolve_sampling(
            config,
            request.model,
            request.max_tokens,
            request.temperature,
            None,
            None,
        )?;

        let (completion, model) = self.forward(messages, sampling).await?;
        let (text, finish_reason) = extract_text(&completion)?;

        Ok(GenerateResponse {
            generated_text: text,
            model,
            timestamp: Utc::now(),
            tokens_used: completion.usage.map(|u| u.total_tokens),
            finish_reason,
            generation_type: "text_completion".to_string(),
        })
    }

    async fn forward(
        &self,
        messages: Vec<ChatMessage>,
        sampling: Sampling,
    ) -> Result<(Completion, String), ServiceError> {
        let payload = CompletionPayload {
            messages,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: sampling.stop,
            stream: false,
        };

        let completion = self.backend.complete(&sampling.deployment, &payload).await?;
        info!(
            deployment = %sampling.deployment,
            completion_id = completion.id.as_deref(),
            tokens = completion.usage.map(|u| u.total_tokens),
            "completion served"
        );
        Ok((completion, sampling.model))
    }
}

fn conversation_for(request: &ChatRequest) -> Result<Vec<ChatMessage>, ServiceError> {
    if !request.messages.is_empty() {
        if let Some(idx) = request
            .messages
            .iter()
            .position(|m| m.content.trim().is_empty())
        {
            return Err(ServiceError::BadRequest(format!("message {idx} has empty content")));
        }
        return Ok(request.messages.clone());
    }

    match request.message.as_deref() {
        Some(message) if !message.trim().is_empty() => Ok(vec![
            ChatMessage::system(CHAT_SYSTEM_PROMPT),
            ChatMessage::user(message),
        ]),
        _ => Err(ServiceError::BadRequest("either 'messages' or 'message' is required".into())),
    }
}

fn resolve_sampling(
    config: &AppConfig,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    stop: Option<Vec<String>>,
) -> Result<Sampling, ServiceError> {
    let (deployment, model) = match model.filter(|m| !m.trim().is_empty()) {
        Some(model) => {
            let deployment = model.trim().to_string();
            validate_deployment_name(&deployment)?;
            (deployment, model)
        }
        None => (config.deployment.clone(), config.deployment.clone()),
    };

    let max_tokens = max_tokens.unwrap_or(config.default_max_tokens);
    if !(1..=MAX_TOKENS_LIMIT).contains(&max_tokens) {
        return Err(ServiceError::BadRequest(format!(
            "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}"
        )));
    }

    let temperature = temperature.unwrap_or(config.default_temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ServiceError::BadRequest("temperature must be between 0.0 and 2.0".into()));
    }

    let top_p = top_p.unwrap_or(config.default_top_p);
    if !(0.0..=1.0).contains(&top_p) {
        return Err(ServiceError::BadRequest("top_p must be between 0.0 and 1.0".into()));
    }

    let stop = stop.filter(|s| !s.is_empty());
    debug!(%deployment, max_tokens, temperature, top_p, "resolved sampling parameters");

    Ok(Sampling {
        deployment,
        model,
        max_tokens,
        temperature,
        top_p,
        stop,
    })
}

// Deployment names end up in the vendor URL path.
fn validate_deployment_name(name: &str) -> Result<(), ServiceError> {
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("invalid model name {name:?}")))
    }
}

fn extract_text(completion: &Completion) -> Result<(String, Option<String>), ServiceError> {
    let (text, finish_reason) = completion.first_text().ok_or_else(|| {
        ServiceError::MalformedUpstream("completion contained no message content".into())
    })?;
    Ok((text.to_string(), finish_reason.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;
    use crate::model::ChatRole;
    use crate::upstream::{CompletionChoice, CompletionMessage, CompletionUsage};

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, CompletionPayload)>>,
        reply: Option<Completion>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(
            &self,
            deployment: &str,
            payload: &CompletionPayload,
        ) -> Result<Completion, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push((deployment.to_string(), payload.clone()));
            if self.fail {
                return Err(ServiceError::Upstream("connection refused".into()));
            }
            Ok(self.reply.clone().unwrap_or_else(|| reply("ok", 42)))
        }
    }

    fn reply(text: &str, total_tokens: u32) -> Completion {
        Completion {
            id: Some("chatcmpl-1".into()),
            choices: vec![CompletionChoice {
                index: 0,
                message: Some(CompletionMessage {
                    role: Some("assistant".into()),
                    content: Some(text.into()),
                }),
                finish_reason: Some("stop".into()),
            }],
            usage: Some(CompletionUsage {
                prompt_tokens: 10,
                completion_tokens: total_tokens.saturating_sub(10),
                total_tokens,
            }),
        }
    }

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "AZURE_FOUNDRY_ENDPOINT" => Some("https://example.openai.azure.com".into()),
            "AZURE_FOUNDRY_API_KEY" => Some("k".into()),
            _ => None,
        })
        .unwrap()
    }

    fn adapter(backend: RecordingBackend) -> (ChatAdapter, Arc<RecordingBackend>) {
        let backend = Arc::new(backend);
        (ChatAdapter::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn chat_defaults_model_and_sampling_from_config() {
        let (adapter, backend) = adapter(RecordingBackend::default());
        let config = config();
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hello")],
            ..Default::default()
        };

        let response = adapter.chat(request, &config).await.unwrap();

        assert_eq!(response.model, config.deployment);
        assert_eq!(response.response, "ok");
        assert_eq!(response.tokens_used, Some(42));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));

        let calls = backend.calls.lock().unwrap();
        let (deployment, payload) = &calls[0];
        assert_eq!(deployment, &config.deployment);
        assert_eq!(payload.max_tokens, config.default_max_tokens);
        assert_eq!(payload.temperature, config.default_temperature);
        assert_eq!(payload.top_p, config.default_top_p);
        assert_eq!(payload.messages, vec![ChatMessage::user("hello")]);
    }

    #[tokio::test]
    async fn chat_echoes_requested_model() {
        let (adapter, backend) = adapter(RecordingBackend::default());
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hello")],
            model: Some("gpt-35-turbo".into()),
            max_tokens: Some(64),
            temperature: Some(0.0),
            ..Default::default()
        };

        let response = adapter.chat(request, &config()).await.unwrap();

        assert_eq!(response.model, "gpt-35-turbo");
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "gpt-35-turbo");
        assert_eq!(calls[0].1.max_tokens, 64);
        assert_eq!(calls[0].1.temperature, 0.0);
    }

    #[tokio::test]
    async fn single_message_shorthand_gets_system_prompt() {
        let (adapter, backend) = adapter(RecordingBackend::default());
        let request = ChatRequest {
            message: Some("How are you?".into()),
            ..Default::default()
        };

        adapter.chat(request, &config()).await.unwrap();

        let calls = backend.calls.lock().unwrap();
        let roles: Vec<ChatRole> = calls[0].1.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User]);
        assert_eq!(calls[0].1.messages[1].content, "How are you?");
    }

    #[tokio::test]
    async fn shorthand_message_and_padded_model_are_kept_verbatim() {
        let (adapter, backend) = adapter(RecordingBackend::default());
        let request = ChatRequest {
            message: Some("  indented code:\n    x = 1\n".into()),
            model: Some(" gpt-4o ".into()),
            ..Default::default()
        };

        let response = adapter.chat(request, &config()).await.unwrap();

        assert_eq!(response.model, " gpt-4o ");
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "gpt-4o");
        assert_eq!(calls[0].1.messages[1].content, "  indented code:\n    x = 1\n");
    }

    #[tokio::test]
    async fn whitespace_only_message_is_rejected() {
        let (adapter, backend) = adapter(RecordingBackend::default());
        let request = ChatRequest {
            message: Some(" \n\t ".into()),
            ..Default::default()
        };

        let err = adapter.chat(request, &config()).await.unwrap_err();

        assert!(matches!(err, ServiceError::BadRequest(_)));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_chat_request_is_rejected_before_vendor_call() {
        let (adapter, backend) = adapter(RecordingBackend::default());

        let err = adapter
            .chat(ChatRequest::default(), &config())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::BadRequest(_)));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_sampling_is_rejected() {
        let (adapter, _) = adapter(RecordingBackend::default());
        let config = config();
        let base = ChatRequest {
            messages: vec![ChatMessage::user("hello")],
            ..Default::default()
        };

        for request in [
            ChatRequest {
                max_tokens: Some(0),
                ..base.clone()
            },
            ChatRequest {
                max_tokens: Some(MAX_TOKENS_LIMIT + 1),
                ..base.clone()
            },
            ChatRequest {
                temperature: Some(2.5),
                ..base.clone()
            },
            ChatRequest {
                top_p: Some(-0.1),
                ..base.clone()
            },
            ChatRequest {
                model: Some("../admin".into()),
                ..base.clone()
            },
        ] {
            let err = adapter.chat(request, &config).await.unwrap_err();
            assert!(matches!(err, ServiceError::BadRequest(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn generate_wraps_prompt_and_reports_usage() {
        let (adapter, backend) = adapter(RecordingBackend {
            reply: Some(reply("Hi there", 23)),
            ..Default::default()
        });
        let request = GenerateRequest {
            prompt: "Hello".into(),
            model: None,
            max_tokens: Some(50),
            temperature: None,
        };

        let response = adapter.generate(request, &config()).await.unwrap();

        assert_eq!(response.generated_text, "Hi there");
        assert_eq!(response.generation_type, "text_completion");
        let tokens = response.tokens_used.unwrap();
        assert!(tokens <= 23);

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].1.max_tokens, 50);
        assert_eq!(calls[0].1.messages[0].content, GENERATE_SYSTEM_PROMPT);
        assert_eq!(calls[0].1.messages[1], ChatMessage::user("Hello"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let (adapter, _) = adapter(RecordingBackend::default());
        let request = GenerateRequest {
            prompt: "   ".into(),
            model: None,
            max_tokens: None,
            temperature: None,
        };

        let err = adapter.generate(request, &config()).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn vendor_failure_is_propagated_without_retry() {
        let (adapter, backend) = adapter(RecordingBackend {
            fail: true,
            ..Default::default()
        });
        let request = ChatRequest {
            message: Some("hi".into()),
            ..Default::default()
        };

        let err = adapter.chat(request, &config()).await.unwrap_err();

        assert!(matches!(err, ServiceError::Upstream(_)));
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_choices_are_a_malformed_response() {
        let (adapter, _) = adapter(RecordingBackend {
            reply: Some(Completion::default()),
            ..Default::default()
        });
        let request = ChatRequest {
            message: Some("hi".into()),
            ..Default::default()
        };

        let err = adapter.chat(request, &config()).await.unwrap_err();
        assert!(matches!(err, ServiceError::MalformedUpstream(_)));
    }
}
