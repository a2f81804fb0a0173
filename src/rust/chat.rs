//! Pass-through proxy to an OpenAI-compatible chat-completions API.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

pub const GREETING: &str = "Hello! I'm your Neuro Assistant from NeuroPath your trusted companion for brain health and neurological care. \
Whether you're experiencing symptoms, curious about conditions, or just want to try a brain exercise, I'm here to help. \
How can I support you today?";

pub const SYSTEM_PROMPT: &str = "A simple hello should yield a simple hello: I am your Neuro Assistant. \
You are a leading neurologist known for diagnostic precision and compassionate care, acting as the medical assistant of NeuroPath, \
a company working on AI-driven neurological care. \
Give users clear, medically accurate and empathetic guidance on neurological symptoms, conditions, treatments and brain health, \
and explain complex concepts in plain language. \
When appropriate, suggest cognitive exercises, breathing techniques, mindfulness drills or lifestyle tips suited to the user. \
Always include this disclaimer: 'This information is for educational purposes only and does not constitute medical advice. \
Please consult a licensed healthcare provider for diagnosis or treatment.' \
End each response with a follow-up question such as 'Would you like to explore a brain exercise today?'";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Chat request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Chat upstream sent an unexpected response: {0}")]
    MalformedResponse(String),
}

#[derive(Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model_id: String,
    pub system_prompt: String,
    pub greeting: String,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_URL.to_string(),
            api_key: String::new(),
            model_id: DEFAULT_CHAT_MODEL.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            greeting: GREETING.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Forwards user messages, with a fixed system prompt, to the chat upstream.
#[derive(Debug, Clone)]
pub struct ChatProxy {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatProxy {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the assistant's reply. A blank message gets the canned greeting
    /// without contacting the upstream. Failures are not retried.
    pub async fn reply(&self, user_message: &str) -> Result<String, ChatError> {
        if user_message.trim().is_empty() {
            return Ok(self.config.greeting.clone());
        }

        let request = CompletionRequest {
            model: &self.config.model_id,
            messages: [
                Message {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                Message {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        debug!("Forwarding chat message to {}", self.config.endpoint);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Chat upstream returned {}", status);
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::MalformedResponse("no choices in response".to_string()))
    }
}
