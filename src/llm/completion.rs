use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::{Completion, CompletionRequest};
use crate::config::LlmConfig;

/// Non-streaming chat completion against Ollama or an OpenAI-compatible API.
pub struct ChatCompletion {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletion {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Completion for ChatCompletion {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        let text = match self.config.provider.as_str() {
            "ollama" => call_ollama(&self.client, &self.config, req).await?,
            "openai" => call_openai(&self.client, &self.config, req).await?,
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        };
        Ok(text.trim().to_string())
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn messages(req: &CompletionRequest) -> Vec<Message> {
    vec![
        Message {
            role: "system".to_string(),
            content: req.system.clone(),
        },
        Message {
            role: "user".to_string(),
            content: req.user.clone(),
        },
    ]
}

/// Model output, or its reasoning trace when the content is empty.
fn pick_output(content: Option<String>, reasoning: Option<String>) -> String {
    match content {
        Some(c) if !c.trim().is_empty() => c,
        _ => reasoning.unwrap_or_default(),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    req: &CompletionRequest,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let body = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: messages(req),
        stream: false,
        options: OllamaOptions {
            temperature: req.temperature,
            num_predict: req.max_tokens,
        },
    };

    let resp = client
        .post(&url)
        .timeout(req.timeout)
        .json(&body)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    Ok(pick_output(body.message.content, body.message.thinking))
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    req: &CompletionRequest,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let body = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: messages(req),
        temperature: req.temperature,
        max_tokens: req.max_tokens,
    };

    let resp = client
        .post(&url)
        .timeout(req.timeout)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;

    let choice = body
        .choices
        .into_iter()
        .next()
        .context("OpenAI chat API returned no choices")?;
    Ok(pick_output(choice.message.content, choice.message.reasoning))
}
