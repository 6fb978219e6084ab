// ============================================
// gemini.rs - Google Gemini API Client
// ============================================
// Direct REST API calls to generateContent.
// Implements Diagnostician on top of prompts.rs.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::analysis::Diagnostician;
use crate::chat::ChatReply;
use crate::config::Config;
use crate::forecast::ForecastRequest;
use crate::prompts;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    retry_count: usize,
    retry_delay: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

/// One request part: a prompt or an inline image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(Blob),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Standard base64.
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(bytes: &[u8], mime_type: &str) -> Self {
        Part::InlineData(Blob {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Generated text with the token counts reported by the API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationOutput {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl GeminiResponse {
    fn into_output(self) -> Result<GenerationOutput> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => anyhow::bail!("Gemini blocked the request: {}", reason),
                None => anyhow::bail!("Gemini returned an empty response"),
            }
        }

        let usage = self.usage_metadata.unwrap_or_default();
        Ok(GenerationOutput {
            text,
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        })
    }
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(api_key: String, model: String, temperature: f32, max_tokens: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
            temperature,
            max_tokens,
            retry_count: 1,
            retry_delay: 0,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let mut client = Self::new(
            api_key,
            config.gemini.model.clone(),
            config.gemini.temperature,
            config.gemini.max_tokens,
        )?;
        client.retry_count = config.gemini.retry_count.max(1);
        client.retry_delay = config.gemini.retry_delay;
        Ok(client)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, parts: Vec<Part>) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }

    /// Generate text from request parts
    pub async fn generate(&self, parts: Vec<Part>) -> Result<GenerationOutput> {
        let request = self.build_request(parts);

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE_URL, self.model, self.api_key
        );

        debug!("Sending request to Gemini API ({})", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini API error ({}): {}", status, error_text);
            anyhow::bail!("Gemini API returned error: {} - {}", status, error_text);
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        let output = gemini_response.into_output()?;
        info!(
            "Received response from Gemini API ({} chars, {} in / {} out tokens)",
            output.text.len(),
            output.input_tokens,
            output.output_tokens
        );

        Ok(output)
    }

    /// Generate with retry logic
    pub async fn generate_with_retry(
        &self,
        parts: &[Part],
        max_retries: usize,
        retry_delay: u64,
    ) -> Result<GenerationOutput> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_retries {
            match self.generate(parts.to_vec()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempts += 1;
                    last_error = Some(e);

                    if attempts < max_retries {
                        debug!(
                            "Gemini API call failed (attempt {}/{}), retrying in {}s...",
                            attempts, max_retries, retry_delay
                        );
                        tokio::time::sleep(Duration::from_secs(retry_delay)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Failed after {} retries", max_retries)))
    }

    async fn ask(&self, parts: Vec<Part>) -> Result<GenerationOutput> {
        self.generate_with_retry(&parts, self.retry_count, self.retry_delay)
            .await
    }

    async fn ask_text(&self, prompt: String) -> Result<String> {
        Ok(self.ask(vec![Part::Text(prompt)]).await?.text)
    }
}

#[async_trait]
impl Diagnostician for GeminiClient {
    async fn identify_disease(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let parts = vec![
            Part::text(prompts::diagnosis_prompt()),
            Part::image(image, mime_type),
        ];
        Ok(self.ask(parts).await?.text)
    }

    async fn weather_recommendations(
        &self,
        plant_type: &str,
        disease: &str,
        location: &str,
    ) -> Result<String> {
        let prompt = prompts::weather_recommendations_prompt(plant_type, disease, location)?;
        self.ask_text(prompt).await
    }

    async fn generic_recommendations(&self, plant_type: &str, disease: &str) -> Result<String> {
        let prompt = prompts::generic_recommendations_prompt(plant_type, disease)?;
        self.ask_text(prompt).await
    }

    async fn disease_info(&self, disease: &str) -> Result<String> {
        let prompt = prompts::disease_info_prompt(disease)?;
        self.ask_text(prompt).await
    }

    async fn disease_forecast(&self, request: &ForecastRequest) -> Result<String> {
        let prompt = prompts::forecast_prompt(request)?;
        self.ask_text(prompt).await
    }

    async fn chat(&self, prompt: &str) -> Result<ChatReply> {
        let started = Instant::now();
        let output = self.ask(vec![Part::text(prompt)]).await?;

        Ok(ChatReply {
            answer: output.text,
            input_tokens: output.input_tokens,
            output_tokens: output.output_tokens,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}
