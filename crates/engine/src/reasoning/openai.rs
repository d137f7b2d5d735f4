//! OpenAI-compatible chat completions backend

use super::{ClaimScorer, Decomposer, Evidence, SourceJudgement, Verdict};
use async_trait::async_trait;
use factcheck_common::config::ReasoningConfig;
use factcheck_common::errors::{AppError, ReasoningError, Result};
use factcheck_common::Claim;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const DECOMPOSE_SYSTEM_PROMPT: &str = "You are a fact-checking assistant for news editors. \
Break the user's text into a list of concise, self-contained factual claims that can be checked \
against public sources. Skip opinions, advice and rhetorical statements. Keep the order in which \
the claims appear. Respond with a JSON array of strings and nothing else.";

const SCORE_SYSTEM_PROMPT: &str = "You are a meticulous fact checker. Judge the claim ONLY using \
the provided sources. Respond with JSON: {\"score\": number between 0 and 1 giving the confidence \
that the claim is true, \"reasoning\": short explanation that states any limitation clearly, \
\"sources\": [{\"url\": string, \"judgement\": number between 0 and 1 for how strongly that \
source supports the claim}]}.";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Chat model client used for both decomposition and scoring
pub struct ChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl ChatModel {
    /// Create a new chat model client
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }

    /// Call the chat completions API and return the first choice's text
    async fn complete(&self, system: &str, user: String) -> std::result::Result<String, ReasoningError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ReasoningError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }
            } else {
                ReasoningError::Transport(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::Malformed(format!("Failed to parse LLM response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ReasoningError::Malformed("Empty response from LLM".to_string()))
    }
}

#[async_trait]
impl Decomposer for ChatModel {
    async fn decompose(&self, text: &str) -> std::result::Result<Vec<String>, ReasoningError> {
        let content = self.complete(DECOMPOSE_SYSTEM_PROMPT, format!("Text:\n{text}")).await?;
        parse_claim_list(&content)
    }
}

#[async_trait]
impl ClaimScorer for ChatModel {
    async fn score(
        &self,
        claim: &Claim,
        evidence: &[Evidence],
    ) -> std::result::Result<Verdict, ReasoningError> {
        let content = self
            .complete(SCORE_SYSTEM_PROMPT, build_score_prompt(claim, evidence))
            .await?;
        parse_verdict(&content)
    }
}

fn build_score_prompt(claim: &Claim, evidence: &[Evidence]) -> String {
    let mut prompt = format!("Claim:\n{}\n\nSources:\n", claim.text);

    if evidence.is_empty() {
        prompt.push_str("(no usable sources were found)\n");
    }

    for (i, e) in evidence.iter().enumerate() {
        let published = e
            .published
            .map(|d| format!(" published {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        let trust = if e.trusted { " [trusted domain]" } else { "" };
        prompt.push_str(&format!(
            "\n[{}] {} <{}>{}{}\n{}\n",
            i + 1,
            e.title,
            e.url,
            published,
            trust,
            e.excerpt
        ));
    }

    prompt
}

/// Pull the JSON payload out of a reply that may wrap it in a code fence
fn json_payload(content: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence pattern")
    });

    fence
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content)
        .trim()
}

fn parse_claim_list(content: &str) -> std::result::Result<Vec<String>, ReasoningError> {
    let value: Value = serde_json::from_str(json_payload(content))
        .map_err(|e| ReasoningError::Malformed(format!("claim list is not JSON: {e}")))?;

    // Accept a bare array or an object wrapping one under "claims"
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("claims") {
            Some(Value::Array(items)) => items,
            _ => return Err(ReasoningError::Malformed("expected a JSON array of claims".to_string())),
        },
        _ => return Err(ReasoningError::Malformed("expected a JSON array of claims".to_string())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s),
            other => Err(ReasoningError::Malformed(format!(
                "claim {i} is not a string: {other}"
            ))),
        })
        .collect()
}

fn parse_verdict(content: &str) -> std::result::Result<Verdict, ReasoningError> {
    let value: Value = serde_json::from_str(json_payload(content))
        .map_err(|e| ReasoningError::Malformed(format!("verdict is not JSON: {e}")))?;

    let Value::Object(map) = value else {
        return Err(ReasoningError::Malformed("verdict is not a JSON object".to_string()));
    };

    let score = map.get("score").and_then(number_of);
    let reasoning = map
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);
    let judgements = map
        .get("sources")
        .and_then(Value::as_array)
        .map(|sources| {
            sources
                .iter()
                .filter_map(|s| {
                    Some(SourceJudgement {
                        url: s.get("url")?.as_str()?.to_string(),
                        judgement: s.get("judgement").and_then(number_of)?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Verdict {
        score,
        reasoning,
        judgements,
    })
}

/// Models sometimes quote numbers
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
