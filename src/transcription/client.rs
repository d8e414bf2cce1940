use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;
use crate::media::display_name;
use crate::transcription::groq::GroqClient;
use crate::transcription::retry::RetryPolicy;
use crate::{PipelineError, Result};

/// One speech-to-text request payload.
pub struct TranscriptionRequest<'a> {
    pub file_name: &'a str,
    pub audio: &'a [u8],
    /// ISO-639-1 language hint
    pub language: Option<&'a str>,
    /// Best-effort steering text, usually the tail of the previous chunk
    pub prompt: Option<&'a str>,
}

/// What the remote service recognised in one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTranscript {
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Failure classes of the remote service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("payload rejected as too large: {0}")]
    PayloadTooLarge(String),

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            413 => Self::PayloadTooLarge(message),
            401 | 403 => Self::Unauthorized(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Server { .. } | Self::Network(_)
        )
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Model used for requests
    fn model(&self) -> &str;

    async fn transcribe(
        &self,
        request: TranscriptionRequest<'_>,
    ) -> std::result::Result<RemoteTranscript, RemoteError>;
}

/// Build a speech-to-text provider from runtime settings.
pub fn build_provider(settings: &Settings) -> anyhow::Result<Arc<dyn SpeechToText>> {
    match settings.transcription.provider.to_lowercase().as_str() {
        "groq" | "openai" => Ok(Arc::new(GroqClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported transcription.provider '{}'. Supported providers: groq, openai",
            other
        ),
    }
}

/// Transcript of one audio file
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
    /// Remote calls it took, including the successful one
    pub attempts: u32,
}

impl TranscriptSegment {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Remote transcription of single audio files under a [`RetryPolicy`].
#[derive(Clone)]
pub struct TranscriptionClient {
    provider: Arc<dyn SpeechToText>,
    retry: RetryPolicy,
}

impl TranscriptionClient {
    pub fn new(provider: Arc<dyn SpeechToText>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Transcribe `audio_path`, retrying transient failures.
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<TranscriptSegment> {
        let audio = tokio::fs::read(audio_path).await?;
        let file_name = display_name(audio_path);

        tracing::debug!(
            "Sending to {} ({}): {} ({:.2}MB)",
            self.provider.name(),
            self.provider.model(),
            file_name,
            audio.len() as f64 / (1024.0 * 1024.0)
        );

        let outcome = self
            .retry
            .run(
                |_| {
                    self.provider.transcribe(TranscriptionRequest {
                        file_name: &file_name,
                        audio: &audio,
                        language,
                        prompt,
                    })
                },
                RemoteError::is_retryable,
            )
            .await
            .map_err(|failure| PipelineError::TranscriptionFailed {
                attempts: failure.attempts,
                cause: failure.error.to_string(),
            })?;

        let transcript = outcome.value;
        let language = transcript
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        Ok(TranscriptSegment {
            text: transcript.text.trim().to_string(),
            language,
            duration_secs: transcript.duration_secs,
            attempts: outcome.attempts,
        })
    }
}

/// ISO-639-1 code for a detected language usable as a request hint.
///
/// Services report either codes ("en") or names ("english"); names outside
/// the table yield `None` so they are never sent back as a hint.
pub fn language_code(detected: &str) -> Option<String> {
    let detected = detected.trim().to_lowercase();
    if detected.len() == 2 && detected.chars().all(|c| c.is_ascii_lowercase()) {
        return Some(detected);
    }

    let code = match detected.as_str() {
        "english" => "en",
        "spanish" => "es",
        "french" => "fr",
        "german" => "de",
        "italian" => "it",
        "portuguese" => "pt",
        "dutch" => "nl",
        "russian" => "ru",
        "chinese" => "zh",
        "japanese" => "ja",
        "korean" => "ko",
        "hindi" => "hi",
        "arabic" => "ar",
        "turkish" => "tr",
        "polish" => "pl",
        _ => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FlakyProvider {
        failures: Mutex<Vec<RemoteError>>,
        seen_prompts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl SpeechToText for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "test-model"
        }

        async fn transcribe(
            &self,
            request: TranscriptionRequest<'_>,
        ) -> std::result::Result<RemoteTranscript, RemoteError> {
            self.seen_prompts
                .lock()
                .unwrap()
                .push(request.prompt.map(str::to_string));

            if let Some(err) = self.failures.lock().unwrap().pop() {
                return Err(err);
            }
            Ok(RemoteTranscript {
                text: format!("  {} bytes heard  ", request.audio.len()),
                language: Some(" en ".to_string()),
                duration_secs: Some(1.5),
            })
        }
    }

    fn audio_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_000.ogg");
        std::fs::write(&path, vec![1u8; 64]).unwrap();
        (dir, path)
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            RemoteError::from_status(413, "too big".into()),
            RemoteError::PayloadTooLarge("too big".into())
        );
        assert!(matches!(
            RemoteError::from_status(401, String::new()),
            RemoteError::Unauthorized(_)
        ));
        assert!(RemoteError::from_status(429, String::new()).is_retryable());
        assert!(RemoteError::from_status(503, String::new()).is_retryable());
        assert!(!RemoteError::from_status(413, String::new()).is_retryable());
        assert!(!RemoteError::from_status(403, String::new()).is_retryable());
        assert!(!RemoteError::from_status(400, String::new()).is_retryable());
    }

    #[test]
    fn unsupported_provider_returns_error() {
        let mut settings = Settings::default();
        settings.transcription.provider = "unknown".to_string();

        let err = match build_provider(&settings) {
            Ok(_) => panic!("expected provider creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Unsupported transcription.provider"));
    }

    #[test]
    fn language_names_map_to_codes() {
        assert_eq!(language_code("en"), Some("en".to_string()));
        assert_eq!(language_code("English"), Some("en".to_string()));
        assert_eq!(language_code(" german "), Some("de".to_string()));
        assert_eq!(language_code("klingon"), None);
        assert_eq!(language_code(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let (_dir, path) = audio_file();
        let provider = Arc::new(FlakyProvider {
            failures: Mutex::new(vec![
                RemoteError::Network("connection reset".into()),
                RemoteError::RateLimited("slow down".into()),
            ]),
            seen_prompts: Mutex::new(Vec::new()),
        });
        let client = TranscriptionClient::new(provider.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let segment = client
            .transcribe(&path, Some("en"), Some("previous words"))
            .await
            .unwrap();

        assert_eq!(segment.attempts, 3);
        assert_eq!(segment.text, "64 bytes heard");
        assert_eq!(segment.language.as_deref(), Some("en"));
        assert_eq!(segment.word_count(), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));

        let prompts = provider.seen_prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts
            .iter()
            .all(|p| p.as_deref() == Some("previous words")));
    }

    #[tokio::test]
    async fn oversized_payload_is_not_retried() {
        let (_dir, path) = audio_file();
        let provider = Arc::new(FlakyProvider {
            failures: Mutex::new(vec![RemoteError::PayloadTooLarge("413".into())]),
            seen_prompts: Mutex::new(Vec::new()),
        });
        let client = TranscriptionClient::new(provider.clone(), RetryPolicy::default());

        let err = client.transcribe(&path, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TranscriptionFailed { attempts: 1, .. }
        ));
        assert_eq!(provider.seen_prompts.lock().unwrap().len(), 1);
    }
}
