//! Concrete [`Generator`] backends for answer synthesis.
//!
//! Generation is optional. [`create_generator`] returns `None` when the
//! provider is `"disabled"` or when its API key is missing, and the answer
//! path falls back to extractive snippets.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use corpus_rag_core::generate::Generator;

use crate::config::GenerationConfig;
use crate::http;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Build the configured generator, or `None` for degraded (retrieval-only) mode.
///
/// A missing API key is not an error: it is logged and generation is
/// turned off. Unknown providers and HTTP client failures are errors.
pub fn create_generator(config: &GenerationConfig) -> Result<Option<Arc<dyn Generator>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "gemini" => {
            let Some(api_key) = api_key(config, "GEMINI_API_KEY") else {
                return Ok(None);
            };
            Ok(Some(Arc::new(GeminiGenerator::new(config, api_key)?)))
        }
        "openai" => {
            let Some(api_key) = api_key(config, "OPENAI_API_KEY") else {
                return Ok(None);
            };
            Ok(Some(Arc::new(OpenAIGenerator::new(config, api_key)?)))
        }
        "ollama" => Ok(Some(Arc::new(OllamaGenerator::new(config)?))),
        other => Err(anyhow!("Unknown generation provider: {}", other)),
    }
}

fn api_key(config: &GenerationConfig, default_env: &str) -> Option<String> {
    let var = config.api_key_env.as_deref().unwrap_or(default_env);
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            warn!(
                provider = %config.provider,
                env = var,
                "API key not set; answer generation disabled"
            );
            None
        }
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    label: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let base = config.url.as_deref().unwrap_or(GEMINI_BASE_URL);
        Ok(Self {
            label: format!("gemini:{}", model),
            endpoint: format!(
                "{}/models/{}:generateContent",
                base.trim_end_matches('/'),
                model
            ),
            api_key,
            client: http::client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let json = http::post_json_with_retry("Gemini", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;
        parse_gemini_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates[0].content.parts"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(anyhow!("Gemini returned an empty answer"));
    }
    Ok(text)
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    label: String,
    model: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Ok(Self {
            label: format!("openai:{}", model),
            model,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            client: http::client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }]
        });
        let json = http::post_json_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    label: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for Ollama provider"))?;
        let base = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            label: format!("ollama:{}", model),
            model,
            endpoint: format!("{}/api/generate", base.trim_end_matches('/')),
            client: http::client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });
        let json = http::post_json_with_retry("Ollama", self.max_retries, || {
            self.client.post(&self.endpoint).json(&body)
        })
        .await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_yields_none() {
        let cfg = GenerationConfig {
            provider: "disabled".into(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&cfg).unwrap().is_none());
    }

    #[test]
    fn test_missing_key_degrades_instead_of_failing() {
        let cfg = GenerationConfig {
            provider: "gemini".into(),
            api_key_env: Some("CRAG_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&cfg).unwrap().is_none());
    }

    #[test]
    fn test_ollama_generator_named_by_model() {
        let cfg = GenerationConfig {
            provider: "ollama".into(),
            model: Some("llama3".into()),
            ..GenerationConfig::default()
        };
        let g = create_generator(&cfg).unwrap().unwrap();
        assert_eq!(g.name(), "ollama:llama3");
    }

    #[test]
    fn test_unknown_provider_is_error() {
        let cfg = GenerationConfig {
            provider: "oracle".into(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&cfg).is_err());
    }

    #[test]
    fn test_gemini_parts_concatenated() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "there" }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Hello there");
        assert!(parse_gemini_response(&serde_json::json!({ "candidates": [] })).is_err());
    }
}
