//! Completion (language model) provider abstraction
//!
//! The pipeline owns all conversation state; providers are stateless and
//! receive the full turn list plus a system instruction on every call.

use crate::chat::{Role, Turn, CONTEXT_HEADER, FALLBACK_ANSWER};
use crate::config::CompletionConfig;
use crate::embeddings::tokenize;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Trait for single-shot text generation over a conversation
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate the next model message for `turns` under `system_instruction`
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Gemini `generateContent` client
pub struct GeminiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    system_instruction: SystemInstruction<'a>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: Role,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Map conversation turns and the instruction onto a `generateContent` body
fn build_request<'a>(turns: &'a [Turn], system_instruction: &'a str) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: turns
            .iter()
            .map(|turn| RequestContent {
                role: turn.role,
                parts: [RequestPart { text: &turn.text }],
            })
            .collect(),
        system_instruction: SystemInstruction {
            parts: [RequestPart {
                text: system_instruction,
            }],
        },
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiCompletion {
    /// Create a new Gemini completion client
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "completion.api_key is required for the gemini provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
        })
    }

    async fn call(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = build_request(turns, system_instruction);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Completion {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Completion {
                message: format!("API error {}: {}", status, body),
            });
        }

        let body: GenerateContentResponse =
            response.json().await.map_err(|e| AppError::Completion {
                message: format!("Failed to parse response: {}", e),
            })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AppError::Completion {
                message: "Empty response from model".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionProvider for GeminiCompletion {
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.call(turns, system_instruction).await;
        metrics::record_completion(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline stand-in for a language model
///
/// Without a context section in the system instruction it echoes the latest
/// user turn (a rewrite that keeps the question as-is). With one, it answers
/// with the context sentence sharing the most keywords with the question, or
/// the fallback sentence when nothing matches.
#[derive(Debug, Default, Clone)]
pub struct ExtractiveCompletion;

impl ExtractiveCompletion {
    pub fn new() -> Self {
        Self
    }

    fn best_sentence<'a>(context: &'a str, question: &str) -> Option<&'a str> {
        let keywords: HashSet<String> = tokenize(question)
            .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
            .collect();
        if keywords.is_empty() {
            return None;
        }

        let mut best: Option<(usize, &str)> = None;
        for sentence in context.split_inclusive(['.', '!', '?', '\n']) {
            let sentence = sentence.trim();
            if sentence.is_empty() || sentence == "---" {
                continue;
            }
            let hits = tokenize(sentence)
                .collect::<HashSet<_>>()
                .intersection(&keywords)
                .count();
            if hits > 0 && best.map_or(true, |(score, _)| hits > score) {
                best = Some((hits, sentence));
            }
        }
        best.map(|(_, sentence)| sentence)
    }
}

const STOPWORDS: &[&str] = &[
    "what", "which", "where", "when", "does", "about", "that", "this", "with", "from", "have",
    "there", "their", "they", "would", "could", "should", "into", "your", "explain", "tell",
];

#[async_trait]
impl CompletionProvider for ExtractiveCompletion {
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
        let question = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .ok_or_else(|| AppError::Completion {
                message: "No user turn to respond to".to_string(),
            })?;

        match system_instruction.split_once(CONTEXT_HEADER) {
            None => Ok(question.to_string()),
            Some((_, context)) => Ok(Self::best_sentence(context, question)
                .map(str::to_string)
                .unwrap_or_else(|| FALLBACK_ANSWER.to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "extractive"
    }
}

/// Create a completion provider based on configuration
pub fn create_completion_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiCompletion::new(config)?)),
        "mock" => Ok(Arc::new(ExtractiveCompletion::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown completion provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grounded(context: &str) -> String {
        format!("Answer from context only.\n\n{}\n{}", CONTEXT_HEADER, context)
    }

    #[tokio::test]
    async fn test_extractive_rewrite_echoes_question() {
        let model = ExtractiveCompletion::new();
        let turns = vec![
            Turn::user("What is a stack?"),
            Turn::model("A stack is LIFO."),
            Turn::user("And a queue?"),
        ];
        let out = model.generate(&turns, "Rewrite the question.").await.unwrap();
        assert_eq!(out, "And a queue?");
    }

    #[tokio::test]
    async fn test_extractive_answers_from_context() {
        let model = ExtractiveCompletion::new();
        let turns = vec![Turn::user("What order does a stack use?")];
        let context = "Queues are FIFO.\n\n---\n\nA stack follows LIFO order.";
        let out = model.generate(&turns, &grounded(context)).await.unwrap();
        assert_eq!(out, "A stack follows LIFO order.");
    }

    #[tokio::test]
    async fn test_extractive_falls_back_without_match() {
        let model = ExtractiveCompletion::new();
        let turns = vec![Turn::user("What about a queue?")];
        let out = model
            .generate(&turns, &grounded("A stack follows LIFO order."))
            .await
            .unwrap();
        assert_eq!(out, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_extractive_requires_user_turn() {
        let model = ExtractiveCompletion::new();
        tokio_test::assert_err!(model.generate(&[], "Rewrite.").await);
    }

    #[test]
    fn test_gemini_request_shape() {
        let turns = [Turn::user("hi"), Turn::model("hello")];
        let json = serde_json::to_value(build_request(&turns, "be brief")).unwrap();
        assert_eq!(json["contents"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
    }
}
