//! Media handling for longscribe
//!
//! Wraps the external ffprobe/ffmpeg tools: probing, full transcoding to
//! speech audio and per-chunk extraction.

pub mod extractor;
pub mod probe;
pub mod runner;
pub mod transcoder;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::EncoderSettings;

pub use extractor::ChunkExtractor;
pub use probe::{MediaInfo, MediaProbe, StreamInfo};
pub use transcoder::{transcode_timeout, AudioTranscoder, TranscodeTimeouts};

/// A probed media file. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Zero when the duration could not be determined
    pub duration_secs: f64,
}

impl MediaAsset {
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Fixed speech-optimised encoding parameters shared by the transcoder and
/// the chunk extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: String,
    pub bitrate: String,
    /// Opus application mode; ignored for other codecs
    pub application: String,
    pub extension: String,
}

impl TranscodeSpec {
    pub fn from_settings(settings: &EncoderSettings) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            codec: settings.codec.clone(),
            bitrate: settings.bitrate.clone(),
            application: settings.application.clone(),
            extension: settings.extension.clone(),
        }
    }

    /// Output flags appended after the input, before the output path.
    pub fn output_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-vn".into(),
            "-c:a".into(),
            self.codec.as_str().into(),
            "-b:a".into(),
            self.bitrate.as_str().into(),
        ];

        if self.codec.contains("opus") && !self.application.is_empty() {
            args.push("-application".into());
            args.push(self.application.as_str().into());
        }

        args.push("-ar".into());
        args.push(self.sample_rate.to_string().into());
        args.push("-ac".into());
        args.push(self.channels.to_string().into());
        args
    }
}

impl Default for TranscodeSpec {
    fn default() -> Self {
        Self::from_settings(&EncoderSettings::default())
    }
}

/// A scratch file deleted exactly once: either through [`TempAsset::remove`]
/// or when the guard is dropped.
#[derive(Debug)]
pub struct TempAsset {
    path: PathBuf,
    removed: bool,
}

impl TempAsset {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the backing file, 0 if it does not exist
    pub fn len(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete the backing file now.
    pub fn remove(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Cleaned up: {}", display_name(&self.path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to clean up {}: {}", display_name(&self.path), e),
        }
    }
}

impl Drop for TempAsset {
    fn drop(&mut self) {
        self.delete();
    }
}

/// File name without its directory, for logs and user-facing messages
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
