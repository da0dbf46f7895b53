//! Gemini `generateContent` client for the people-count prompt.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;

use crate::error::{AnalysisError, InferenceError};
use crate::models::{AnalysisResult, EncodedImage};
use crate::settings::{api_key_from_env, InferenceSettings, PromptLanguage};

use super::parse::parse_analysis;
use super::prompt::{response_schema, system_instruction, user_instruction};
use super::wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use super::PeopleCounter;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    language: PromptLanguage,
}

impl GeminiClient {
    /// A missing key is accepted here and reported on the first `analyze`.
    pub fn new(settings: &InferenceSettings, api_key: Option<String>) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            language: settings.language,
        })
    }

    pub fn from_env(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let api_key = api_key_from_env();
        if api_key.is_none() {
            warn!("No inference credential in the environment; analysis will fail until one is set");
        }
        Self::new(settings, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, image: &EncodedImage) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::inline(image.content_type(), image.payload()),
                    Part::text(user_instruction(self.language)),
                ],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system_instruction(self.language))],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(self.language),
            },
        }
    }

    /// One round trip; returns the model's raw answer text.
    async fn request_text(&self, image: &EncodedImage) -> Result<Option<String>, InferenceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(InferenceError::MissingCredential)?;

        debug!(
            "Sending {} image ({} base64 chars) to model {}",
            image.content_type(),
            image.payload().len(),
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&self.build_request(image))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|err| InferenceError::Envelope(err.to_string()))?;

        if let Some(reason) = envelope.block_reason() {
            warn!("Inference prompt blocked: {reason}");
        }
        if let Some(finish) = envelope
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| *reason != "STOP")
        {
            warn!("Inference finished with reason {finish}");
        }

        Ok(envelope.text())
    }
}

#[async_trait]
impl PeopleCounter for GeminiClient {
    async fn analyze(&self, image: &EncodedImage) -> Result<AnalysisResult, AnalysisError> {
        let text = match self.request_text(image).await {
            Ok(text) => text.unwrap_or_default(),
            Err(err) => {
                error!("Inference request failed: {err}");
                return Err(err.into());
            }
        };

        let result = parse_analysis(&text).map_err(|err| {
            error!("Inference answer rejected: {err}; raw answer: {text:?}");
            AnalysisError::from(err)
        })?;

        info!(
            "Counted {} people (confidence {:?})",
            result.count,
            result.confidence_level.map(|level| level.as_str())
        );
        Ok(result)
    }
}
