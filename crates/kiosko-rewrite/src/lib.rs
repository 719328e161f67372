//! # kiosko-rewrite
//!
//! Rewrites fetched articles through an OpenAI-compatible chat API
//! (DeepSeek by default). One request per article, no streaming.

pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use kiosko_core::config::RewriteConfig;
use kiosko_core::error::{KioskoError, Result};
use kiosko_core::traits::Rewriter;
use kiosko_core::types::{Style, TextLength};

use crate::prompt::{SYSTEM_PROMPT, build_prompt};

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct ChatRewriter {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatRewriter {
    pub fn new(config: &RewriteConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(KioskoError::ApiKeyMissing("rewrite API".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KioskoError::Rewrite(format!("http client: {e}")))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Rewriter for ChatRewriter {
    async fn rewrite(
        &self,
        title: &str,
        text: &str,
        style: Style,
        length: TextLength,
    ) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(title, text, style, length) },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false,
        });

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, style = style.as_str(), "rewrite request");
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| KioskoError::Rewrite(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(KioskoError::Rewrite(format!(
                "API error {status}: {detail}"
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| KioskoError::Rewrite(format!("bad response body: {e}")))?;
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| KioskoError::Rewrite("no choices in response".into()))?
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(KioskoError::Rewrite("empty completion".into()));
        }
        info!(title, "✍️ article rewritten ({} chars)", content.chars().count());
        Ok(content)
    }
}
