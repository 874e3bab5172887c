use serde::Deserialize;
use serde_json::{Value, json};

use crate::conversation::Conversation;
use crate::service::{BoundedClient, ServiceFailure, ServiceRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    Disabled,
    MissingKey,
    EmptyMessage,
    Service(ServiceFailure),
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Disabled => write!(f, "chat is disabled"),
            ChatError::MissingKey => write!(f, "no API key set"),
            ChatError::EmptyMessage => write!(f, "message is empty"),
            ChatError::Service(failure) => write!(f, "{failure}"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<ServiceFailure> for ChatError {
    fn from(failure: ServiceFailure) -> Self {
        ChatError::Service(failure)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    id: Option<String>,
    object: Option<String>,
    created: Option<i64>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

/// One chat completion. Named fields cover what the shell reads; anything
/// else stays reachable through `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub raw: Value,
}

impl ChatCompletion {
    pub fn from_value(raw: Value) -> Result<Self, ServiceFailure> {
        let wire: WireCompletion = serde_json::from_value(raw.clone())
            .map_err(|err| ServiceFailure::Malformed(format!("unexpected completion shape: {err}")))?;
        let first = wire.choices.into_iter().next();
        let finish_reason = first.as_ref().and_then(|choice| choice.finish_reason.clone());
        let content = first
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| {
                ServiceFailure::Malformed("missing choices[0].message.content".to_string())
            })?;

        Ok(Self {
            id: wire.id,
            object: wire.object,
            created: wire.created,
            model: wire.model,
            content,
            finish_reason,
            usage: wire.usage,
            raw,
        })
    }

    pub fn get(&self, field: &str) -> Option<String> {
        let usage = self.usage.as_ref();
        let typed = match field {
            "id" => self.id.clone(),
            "object" => self.object.clone(),
            "created" => self.created.map(|ts| ts.to_string()),
            "model" => self.model.clone(),
            "content" => Some(self.content.clone()),
            "finish_reason" => self.finish_reason.clone(),
            "prompt_tokens" => usage.map(|u| u.prompt_tokens.to_string()),
            "completion_tokens" => usage.map(|u| u.completion_tokens.to_string()),
            "total_tokens" => usage.map(|u| u.total_tokens.to_string()),
            _ => None,
        };
        typed.or_else(|| self.raw.get(field).map(render_value))
    }
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Chat integration: credential state, last exchange, and the bounded call.
#[derive(Debug)]
pub struct ChatService {
    client: BoundedClient,
    base_url: String,
    model: String,
    api_key: Option<String>,
    enabled: bool,
    last_prompt: Option<String>,
    last_response: Option<ChatCompletion>,
}

impl ChatService {
    pub fn new(client: BoundedClient, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            enabled: false,
            last_prompt: None,
            last_response: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn last_response(&self) -> Option<&ChatCompletion> {
        self.last_response.as_ref()
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    fn probe_request(&self, key: &str) -> ServiceRequest {
        ServiceRequest::get(format!("{}/models", self.base_url)).with_bearer(key)
    }

    /// Store `key` and validate it. The key stays stored when the probe fails.
    pub fn set_api_key(&mut self, key: &str) -> bool {
        self.api_key = Some(key.trim().to_string());
        self.enable()
    }

    /// Re-validate the stored key; chat is usable only after a passing probe.
    pub fn enable(&mut self) -> bool {
        self.enabled = match self.api_key.as_deref() {
            Some(key) => self.client.probe(self.probe_request(key)),
            None => false,
        };
        tracing::info!(enabled = self.enabled, "chat credential validated");
        self.enabled
    }

    /// Send one message. Any service failure disables chat for the session
    /// and leaves the transcript untouched.
    pub fn send(&mut self, conversation: &mut Conversation, message: &str) -> Result<String, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.enabled {
            return Err(ChatError::Disabled);
        }
        let Some(key) = self.api_key.clone() else {
            return Err(ChatError::MissingKey);
        };

        let prompt = conversation.build_prompt(message);
        let request = ServiceRequest::post_json(
            format!("{}/chat/completions", self.base_url),
            json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
            }),
        )
        .with_bearer(key);

        let completion = self
            .client
            .invoke(request)
            .and_then(ChatCompletion::from_value);
        match completion {
            Ok(completion) => {
                let content = completion.content.clone();
                conversation.record(message, &content);
                self.last_prompt = Some(prompt);
                self.last_response = Some(completion);
                Ok(content)
            }
            Err(failure) => {
                self.enabled = false;
                tracing::warn!(failure = failure.kind(), error = %failure, "chat request failed");
                Err(ChatError::Service(failure))
            }
        }
    }

    pub fn dump(&self) -> Option<String> {
        let response = self.last_response.as_ref()?;
        Some(format!(
            "prompt:\n{}\n\nresponse:\n{}",
            self.last_prompt.as_deref().unwrap_or_default(),
            render_value(&response.raw)
        ))
    }
}
