//! Media metadata via ffprobe

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::media::runner::run_with_timeout;
use crate::media::MediaAsset;
use crate::{PipelineError, Result};

/// Reads size and duration of media files.
///
/// Duration probing never fails: if ffprobe is missing, times out or prints
/// something unparsable the duration is reported as 0.0 and planning falls
/// back to a size-only split.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(ffprobe: PathBuf, timeout: Duration) -> Self {
        Self { ffprobe, timeout }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.encoder.ffprobe_path.clone(),
            settings.timeouts.probe(),
        )
    }

    /// Probe a file, reusing any properties the caller already knows.
    pub async fn probe(
        &self,
        path: &Path,
        known_size: Option<u64>,
        known_duration: Option<f64>,
    ) -> Result<MediaAsset> {
        let size_bytes = match known_size {
            Some(size) => size,
            None => self.size(path)?,
        };

        let duration_secs = match known_duration {
            Some(duration) if duration.is_finite() && duration > 0.0 => duration,
            _ => self.duration(path).await,
        };

        Ok(MediaAsset {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
        })
    }

    /// File size in bytes. A missing file is fatal.
    pub fn size(&self, path: &Path) -> Result<u64> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(PipelineError::AssetNotFound(path.display().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::AssetNotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Duration in seconds, or 0.0 when it cannot be determined.
    pub async fn duration(&self, path: &Path) -> f64 {
        match self.try_duration(path).await {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!("{}; planning will use file size only", e);
                0.0
            }
        }
    }

    /// Duration in seconds, reporting why it could not be read.
    pub async fn try_duration(&self, path: &Path) -> Result<f64> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            path.as_os_str().to_owned(),
        ];

        let output = run_with_timeout(&self.ffprobe, &args, self.timeout)
            .await
            .map_err(|e| PipelineError::ProbeDegraded(e.to_string()))?;

        if !output.success() {
            return Err(PipelineError::ProbeDegraded(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        parse_duration(&output.stdout).ok_or_else(|| {
            PipelineError::ProbeDegraded(format!(
                "unparsable duration {:?}",
                output.stdout.trim()
            ))
        })
    }

    /// Container and stream details. Empty when probing fails.
    pub async fn inspect(&self, path: &Path) -> MediaInfo {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=format_name,duration,size,bit_rate".into(),
            "-show_entries".into(),
            "stream=codec_type,codec_name,width,height,sample_rate,channels".into(),
            "-of".into(),
            "json".into(),
            path.as_os_str().to_owned(),
        ];

        match run_with_timeout(&self.ffprobe, &args, self.timeout).await {
            Ok(output) if output.success() => {
                serde_json::from_str(&output.stdout).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse ffprobe output: {}", e);
                    MediaInfo::default()
                })
            }
            Ok(output) => {
                tracing::warn!("ffprobe exited with {}", output.status);
                MediaInfo::default()
            }
            Err(e) => {
                tracing::warn!("Media inspection failed: {}", e);
                MediaInfo::default()
            }
        }
    }
}

/// Parse ffprobe's bare `format=duration` output
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// ffprobe `-of json` output. ffprobe prints numbers as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub format: FormatInfo,

    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
}

impl MediaInfo {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.format.format_name.is_none()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.format.duration.as_deref().and_then(parse_duration)
    }

    pub fn bit_rate(&self) -> Option<u64> {
        self.format.bit_rate.as_deref()?.parse().ok()
    }

    pub fn has_audio(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"))
    }
}
