//! Talks to an OpenAI-compatible chat completion endpoint.
//! Disabled when no key is configured, see LlmConfig::from_env().

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::AlgoError;
use crate::prompt::{ChatMessage, PromptPlan};

fn llm_err(msg: impl Into<String>) -> AlgoError {
    AlgoError::LlmBackend(msg.into())
}

pub const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

pub const NO_RESPONSE: &str = "Error: No response generated. Please try again.";

/// Bounded retry: `max_attempts` tries, sleeping `base_delay * 2^(n-1)` after
/// the n-th failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub url: String,
    pub key: String,
    pub model: String,
    pub client: reqwest::Client,
    pub retry: RetryPolicy,
}

impl LlmConfig {
    pub fn new(
        url: impl Into<String>,
        key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AlgoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlgoError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            key: key.into(),
            model: model.into(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns `None` if neither `ALGOAI_LLM_KEY` nor `GROQ_API_KEY` is set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("ALGOAI_LLM_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let url = std::env::var("ALGOAI_LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.into());
        let model = std::env::var("ALGOAI_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.into());
        let timeout = std::env::var("ALGOAI_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(LLM_TIMEOUT);

        match Self::new(url, key, model, timeout) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(error = %e, "completion client disabled");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResult {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub duration_ms: u64,
    pub attempts: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of a completion with retries.
#[derive(Debug, Clone)]
pub enum Completion {
    Ok(LlmResult),
    /// The endpoint answered but produced no text. Not retried.
    Empty,
    Failed { attempts: u32, reason: String },
}

impl Completion {
    /// Text for the user: the completion itself or a displayable error.
    pub fn into_reply(self) -> String {
        match self {
            Completion::Ok(r) => r.content,
            Completion::Empty => NO_RESPONSE.to_string(),
            Completion::Failed { attempts, reason } => format!(
                "Error: completion API failed after {attempts} attempts ({reason}). Please try again later."
            ),
        }
    }
}

/// Reply used when no completion endpoint is configured.
pub fn not_configured_reply() -> String {
    format!("Error: {}. Please try again later.", AlgoError::LlmNotConfigured)
}

/// One request to the endpoint. Returns the (trimmed) text, possibly empty.
pub async fn chat_completion(cfg: &LlmConfig, plan: &PromptPlan) -> Result<LlmResult, AlgoError> {
    let req = ChatRequest {
        model: &cfg.model,
        messages: &plan.messages,
        max_tokens: plan.max_tokens,
        temperature: plan.temperature,
    };

    let mut builder = cfg.client.post(&cfg.url).json(&req);
    if !cfg.key.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {}", cfg.key));
    }

    let start = Instant::now();
    let resp = builder
        .send()
        .await
        .map_err(|e| llm_err(format!("request failed: {e}")))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(llm_err(format!("endpoint returned {status}: {}", crate::util::truncate_chars(&body, 200))));
    }

    let chat: ChatResponse = resp
        .json()
        .await
        .map_err(|e| llm_err(format!("response parse failed: {e}")))?;
    let duration_ms = start.elapsed().as_millis() as u64;
    let content = chat
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(LlmResult {
        content,
        usage: chat.usage,
        model: chat.model.unwrap_or_else(|| cfg.model.clone()),
        duration_ms,
        attempts: 1,
    })
}

/// Call the endpoint under the configured retry policy. Never fails: errors
/// come back as `Completion::Failed` / `Completion::Empty`.
pub async fn complete(cfg: &LlmConfig, plan: &PromptPlan) -> Completion {
    let max_attempts = cfg.retry.max_attempts.max(1);
    let prompt_chars = plan.prompt_chars();
    let mut attempt = 0;
    loop {
        attempt += 1;
        debug!(attempt, intent = %plan.intent, prompt_chars, "sending completion request");
        match chat_completion(cfg, plan).await {
            Ok(r) if r.content.is_empty() => {
                warn!(attempt, intent = %plan.intent, "completion was empty");
                return Completion::Empty;
            }
            Ok(r) => {
                info!(
                    attempt,
                    intent = %plan.intent,
                    response_chars = r.content.chars().count(),
                    duration_ms = r.duration_ms,
                    "completion received"
                );
                return Completion::Ok(LlmResult { attempts: attempt, ..r });
            }
            Err(e) if attempt < max_attempts => {
                let delay = cfg.retry.delay_after(attempt);
                warn!(error = %e, attempt, retry_in_ms = delay.as_millis() as u64, "completion failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(error = %e, attempts = attempt, "completion failed, giving up");
                return Completion::Failed { attempts: attempt, reason: e.to_string() };
            }
        }
    }
}
