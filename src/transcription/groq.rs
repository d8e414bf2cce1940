use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::Settings;
use crate::media::runner::stderr_tail;
use crate::transcription::client::{
    RemoteError, RemoteTranscript, SpeechToText, TranscriptionRequest,
};

const DEFAULT_GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_GROQ_MODEL: &str = "whisper-large-v3-turbo";
const DEFAULT_OPENAI_MODEL: &str = "whisper-1";

/// Longest error body kept from a failed response
const ERROR_BODY_CHARS: usize = 300;

/// Client for OpenAI-compatible `audio/transcriptions` endpoints (Groq by default)
pub struct GroqClient {
    http: Client,
    provider: String,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GroqClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = settings.transcription.provider.trim().to_lowercase();
        let is_openai = provider == "openai";

        let api_key = settings.transcription.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "Transcription API key is missing. Set transcription.api_key in config, LONGSCRIBE_API_KEY or GROQ_API_KEY."
            );
        }

        let model = match settings.transcription.model.trim() {
            "" if is_openai => DEFAULT_OPENAI_MODEL.to_string(),
            "" => DEFAULT_GROQ_MODEL.to_string(),
            model => model.to_string(),
        };

        let endpoint = match settings.transcription.endpoint.trim() {
            "" if is_openai => DEFAULT_OPENAI_ENDPOINT.to_string(),
            "" => DEFAULT_GROQ_ENDPOINT.to_string(),
            endpoint => endpoint.trim_end_matches('/').to_string(),
        };

        Ok(Self {
            http: Client::builder()
                .timeout(settings.timeouts.request())
                .build()
                .context("Failed to build transcription HTTP client")?,
            provider,
            api_key,
            model,
            endpoint,
        })
    }

    fn request_url(&self) -> String {
        format!("{}/audio/transcriptions", self.endpoint)
    }
}

#[async_trait]
impl SpeechToText for GroqClient {
    fn name(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn transcribe(
        &self,
        request: TranscriptionRequest<'_>,
    ) -> std::result::Result<RemoteTranscript, RemoteError> {
        let file = Part::bytes(request.audio.to_vec())
            .file_name(request.file_name.to_string())
            .mime_str(mime_for(request.file_name))
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("temperature", "0");

        if let Some(language) = request.language {
            form = form.text("language", language.to_string());
        }
        if let Some(prompt) = request.prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .http
            .post(self.request_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read>"));
            return Err(RemoteError::from_status(
                status.as_u16(),
                stderr_tail(&body, ERROR_BODY_CHARS),
            ));
        }

        let payload: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        Ok(RemoteTranscript {
            text: payload.text,
            language: payload.language,
            duration_secs: payload.duration,
        })
    }
}

/// Upload content type by file extension
fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "ogg" | "opus" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" | "mp4" => "audio/mp4",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}
