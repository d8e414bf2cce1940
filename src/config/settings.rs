//! Application settings management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::transcription::MIN_CHUNK_SECONDS;
use crate::PipelineError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,

    /// External encoder/prober settings
    #[serde(default)]
    pub encoder: EncoderSettings,

    /// Process and request timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Chunk sizing and pacing
    #[serde(default)]
    pub chunking: ChunkingSettings,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Remote speech-to-text settings
    #[serde(default)]
    pub transcription: TranscriptionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for per-run scratch files (empty = system temp dir)
    #[serde(default)]
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,

    /// Output sample rate (Whisper expects 16kHz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Output channel count (1 = mono)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// ffmpeg audio codec name
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Target bitrate, in ffmpeg notation
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Opus application mode (voip = speech optimized)
    #[serde(default = "default_application")]
    pub application: String,

    /// Output container extension
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// ffprobe timeout
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,

    /// Minimum timeout for a full transcode
    #[serde(default = "default_transcode_base_secs")]
    pub transcode_base_secs: u64,

    /// Extra transcode time per GB of input
    #[serde(default = "default_transcode_secs_per_gb")]
    pub transcode_secs_per_gb: u64,

    /// Upper bound for the transcode timeout
    #[serde(default = "default_transcode_cap_secs")]
    pub transcode_cap_secs: u64,

    /// Per-chunk extraction timeout
    #[serde(default = "default_chunk_secs")]
    pub chunk_secs: u64,

    /// Per-attempt HTTP request timeout
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Hard payload ceiling of the remote service
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Size each chunk aims for (leaves headroom under the ceiling)
    #[serde(default = "default_target_chunk_bytes")]
    pub target_chunk_bytes: u64,

    /// Longest allowed chunk
    #[serde(default = "default_max_chunk_seconds")]
    pub max_chunk_seconds: f64,

    /// Pause between chunk requests
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,

    /// Trailing characters of the previous chunk passed as prompt
    #[serde(default = "default_prompt_chars")]
    pub prompt_chars: usize,

    /// Previous chunk must be longer than this to be used as prompt
    #[serde(default = "default_min_prompt_chars")]
    pub min_prompt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Speech-to-text provider (groq, openai)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API endpoint (empty = provider default)
    #[serde(default)]
    pub endpoint: String,

    /// Language hint (empty = auto-detect)
    #[serde(default)]
    pub language: String,

    /// Language reported when no chunk detected one
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_codec() -> String {
    "libopus".to_string()
}

fn default_bitrate() -> String {
    "32k".to_string()
}

fn default_application() -> String {
    "voip".to_string()
}

fn default_extension() -> String {
    "ogg".to_string()
}

fn default_probe_secs() -> u64 {
    30
}

fn default_transcode_base_secs() -> u64 {
    300
}

fn default_transcode_secs_per_gb() -> u64 {
    180
}

fn default_transcode_cap_secs() -> u64 {
    3600
}

fn default_chunk_secs() -> u64 {
    120
}

fn default_request_secs() -> u64 {
    120
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_target_chunk_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_max_chunk_seconds() -> f64 {
    600.0
}

fn default_inter_chunk_delay_ms() -> u64 {
    500
}

fn default_prompt_chars() -> usize {
    200
}

fn default_min_prompt_chars() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

fn default_fallback_language() -> String {
    "en".to_string()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            temp_dir: PathBuf::new(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            codec: default_codec(),
            bitrate: default_bitrate(),
            application: default_application(),
            extension: default_extension(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            transcode_base_secs: default_transcode_base_secs(),
            transcode_secs_per_gb: default_transcode_secs_per_gb(),
            transcode_cap_secs: default_transcode_cap_secs(),
            chunk_secs: default_chunk_secs(),
            request_secs: default_request_secs(),
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            target_chunk_bytes: default_target_chunk_bytes(),
            max_chunk_seconds: default_max_chunk_seconds(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
            prompt_chars: default_prompt_chars(),
            min_prompt_chars: default_min_prompt_chars(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
            endpoint: String::new(),
            language: String::new(),
            fallback_language: default_fallback_language(),
        }
    }
}

impl TimeoutSettings {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn chunk(&self) -> Duration {
        Duration::from_secs(self.chunk_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::debug!("No config file found, using defaults");
            let mut settings = Self::default();
            settings.apply_env_overrides();
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut settings = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Parse settings from TOML text; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if !self.transcription.api_key.trim().is_empty() {
            return;
        }

        for var in ["LONGSCRIBE_API_KEY", "GROQ_API_KEY"] {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    self.transcription.api_key = key;
                    return;
                }
            }
        }
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "longscribe", "longscribe")
            .context("Could not determine config directory")?;

        let config_dir = dirs.config_dir();
        Ok(config_dir.join("config.toml"))
    }

    /// Write default configuration to a file
    pub fn write_default(path: &PathBuf) -> Result<()> {
        let settings = Self::default();
        let content = toml::to_string_pretty(&settings)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject limits the chunk planner cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let chunking = &self.chunking;
        if chunking.max_upload_bytes == 0 {
            return Err(PipelineError::Config(
                "chunking.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if chunking.target_chunk_bytes == 0
            || chunking.target_chunk_bytes > chunking.max_upload_bytes
        {
            return Err(PipelineError::Config(
                "chunking.target_chunk_bytes must be between 1 and chunking.max_upload_bytes"
                    .to_string(),
            ));
        }
        let max_secs = chunking.max_chunk_seconds;
        let too_short = max_secs > 0.0 && max_secs < MIN_CHUNK_SECONDS;
        if !max_secs.is_finite() || max_secs < 0.0 || too_short {
            return Err(PipelineError::Config(format!(
                "chunking.max_chunk_seconds must be zero (no limit) or at least {}",
                MIN_CHUNK_SECONDS
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory that holds per-run scratch directories
    pub fn scratch_root(&self) -> PathBuf {
        if self.general.temp_dir.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            self.general.temp_dir.clone()
        }
    }

    /// Configured language hint, if any
    pub fn language_hint(&self) -> Option<String> {
        let language = self.transcription.language.trim();
        if language.is_empty() {
            None
        } else {
            Some(language.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_remote_limits() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(settings.chunking.target_chunk_bytes, 20 * 1024 * 1024);
        assert_eq!(settings.chunking.max_chunk_seconds, 600.0);
        assert_eq!(settings.encoder.sample_rate, 16000);
        assert_eq!(settings.encoder.channels, 1);
        assert_eq!(settings.transcription.model, "whisper-large-v3-turbo");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [chunking]
            max_chunk_seconds = 300.0

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.chunking.max_chunk_seconds, 300.0);
        assert_eq!(settings.chunking.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_backoff_ms, 2000);
        assert_eq!(settings.timeouts.transcode_cap_secs, 3600);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let content = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(content.contains("[transcription]"));

        let parsed = Settings::from_toml(&content).unwrap();
        assert_eq!(parsed.encoder.codec, "libopus");
        assert_eq!(parsed.chunking.prompt_chars, 200);
    }

    #[test]
    fn validate_rejects_target_above_ceiling() {
        assert!(Settings::default().validate().is_ok());

        let mut settings = Settings::default();
        settings.chunking.target_chunk_bytes = settings.chunking.max_upload_bytes + 1;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let mut settings = Settings::default();
        settings.retry.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_sub_second_chunk_duration() {
        let mut settings = Settings::default();
        settings.chunking.max_chunk_seconds = 1e-9;
        assert!(matches!(settings.validate(), Err(PipelineError::Config(_))));

        settings.chunking.max_chunk_seconds = 0.0;
        assert!(settings.validate().is_ok());

        settings.chunking.max_chunk_seconds = 1.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn empty_temp_dir_uses_system_temp() {
        let settings = Settings::default();
        assert_eq!(settings.scratch_root(), std::env::temp_dir());
    }

    #[test]
    fn blank_language_means_auto_detect() {
        let mut settings = Settings::default();
        assert_eq!(settings.language_hint(), None);

        settings.transcription.language = " de ".to_string();
        assert_eq!(settings.language_hint(), Some("de".to_string()));
    }
}
