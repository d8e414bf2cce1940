//! longscribe - Transcribe arbitrarily large media files through a size-limited
//! speech-to-text API
//!
//! Media is probed, transcoded to compact speech audio, split into time-bounded
//! chunks when it still exceeds the upload ceiling, transcribed chunk by chunk
//! and merged into a single transcript.

pub mod cli;
pub mod config;
pub mod media;
pub mod transcription;

use thiserror::Error;

/// Main error type for longscribe
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input media not found: {0}")]
    AssetNotFound(String),

    /// Duration could not be read; callers fall back to size-only planning.
    #[error("Media probe degraded: {0}")]
    ProbeDegraded(String),

    #[error("Audio extraction failed: {message}{}", format_diagnostics(.diagnostics))]
    ExtractionFailed {
        message: String,
        diagnostics: String,
    },

    #[error("{stage} timed out after {timeout_secs}s. Media may be too large or corrupted.")]
    ExtractionTimeout { stage: String, timeout_secs: u64 },

    #[error("Chunk {} extraction failed{}", .index + 1, format_diagnostics(.diagnostics))]
    ChunkExtractionFailed { index: usize, diagnostics: String },

    #[error(
        "Chunk {} still too large ({:.1}MB, limit {:.1}MB). Audio may have unusually high bitrate.",
        .index + 1,
        megabytes(.size_bytes),
        megabytes(.limit_bytes)
    )]
    ChunkTooLarge {
        index: usize,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("Transcription failed after {attempts} attempt(s): {cause}")]
    TranscriptionFailed { attempts: u32, cause: String },

    #[error(
        "Transcription produced empty result. The audio may be silent, corrupted, or in an unsupported language."
    )]
    EmptyTranscript,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

fn format_diagnostics(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(": {}", diagnostics)
    }
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}
