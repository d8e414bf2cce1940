//! Full-file transcoding to compact speech audio
//!
//! Source video/audio of any size is re-encoded to mono 16kHz Opus, which
//! shrinks an hour of speech to a few megabytes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Settings;
use crate::media::runner::{run_with_timeout, RunError};
use crate::media::{display_name, MediaAsset, TempAsset, TranscodeSpec};
use crate::{PipelineError, Result};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Timeout for the codec availability check
const CODEC_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Size-scaled transcode timeout parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeTimeouts {
    pub base: Duration,
    pub per_gb: Duration,
    pub cap: Duration,
}

impl TranscodeTimeouts {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base: Duration::from_secs(settings.timeouts.transcode_base_secs),
            per_gb: Duration::from_secs(settings.timeouts.transcode_secs_per_gb),
            cap: Duration::from_secs(settings.timeouts.transcode_cap_secs),
        }
    }
}

impl Default for TranscodeTimeouts {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(300),
            per_gb: Duration::from_secs(180),
            cap: Duration::from_secs(3600),
        }
    }
}

/// `min(cap, base + per_gb * size_in_GB)`
pub fn transcode_timeout(size_bytes: u64, timeouts: &TranscodeTimeouts) -> Duration {
    let size_gb = size_bytes as f64 / BYTES_PER_GB;
    let scaled = timeouts.base.as_secs_f64() + timeouts.per_gb.as_secs_f64() * size_gb;
    Duration::from_secs_f64(scaled).min(timeouts.cap)
}

/// Invokes ffmpeg to produce the compressed speech track of a media file
#[derive(Debug)]
pub struct AudioTranscoder {
    ffmpeg: PathBuf,
    spec: TranscodeSpec,
    timeouts: TranscodeTimeouts,
    codec_available: Option<bool>,
}

impl AudioTranscoder {
    /// Create a transcoder, checking once whether ffmpeg has the codec.
    ///
    /// A missing ffmpeg or codec is only logged; the real failure surfaces
    /// when [`AudioTranscoder::transcode`] runs.
    pub async fn new(ffmpeg: PathBuf, spec: TranscodeSpec, timeouts: TranscodeTimeouts) -> Self {
        let codec_available = check_encoder(&ffmpeg, &spec.codec).await;

        match codec_available {
            Some(true) => tracing::debug!("ffmpeg encoder {} available", spec.codec),
            Some(false) => tracing::warn!(
                "{} encoder not found in ffmpeg. Install an ffmpeg build with {} support.",
                spec.codec,
                spec.codec
            ),
            None => tracing::warn!(
                "Could not run {}. Install ffmpeg: sudo apt install ffmpeg (Ubuntu) or brew install ffmpeg (Mac)",
                ffmpeg.display()
            ),
        }

        Self {
            ffmpeg,
            spec,
            timeouts,
            codec_available,
        }
    }

    pub async fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.encoder.ffmpeg_path.clone(),
            TranscodeSpec::from_settings(&settings.encoder),
            TranscodeTimeouts::from_settings(settings),
        )
        .await
    }

    /// Result of the construction-time codec check; `None` if ffmpeg could not run
    pub fn codec_available(&self) -> Option<bool> {
        self.codec_available
    }

    pub fn spec(&self) -> &TranscodeSpec {
        &self.spec
    }

    /// Transcode `asset` into `output`.
    ///
    /// The returned guard owns the output file. On any failure the partial
    /// output is removed before returning.
    pub async fn transcode(&self, asset: &MediaAsset, output: &Path) -> Result<TempAsset> {
        let timeout = transcode_timeout(asset.size_bytes, &self.timeouts);
        let target = TempAsset::new(output.to_path_buf());

        tracing::info!(
            "Extracting audio from {} ({:.2}GB) -> {} (timeout: {}s)",
            asset.file_name(),
            asset.size_gb(),
            self.spec.extension,
            timeout.as_secs()
        );

        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-i".into(),
            asset.path.as_os_str().to_owned(),
        ];
        args.extend(self.spec.output_args());
        args.push("-y".into());
        args.push(output.as_os_str().to_owned());

        let result = run_with_timeout(&self.ffmpeg, &args, timeout)
            .await
            .map_err(|e| match e {
                RunError::TimedOut { timeout, .. } => PipelineError::ExtractionTimeout {
                    stage: "Audio extraction".to_string(),
                    timeout_secs: timeout.as_secs(),
                },
                other => PipelineError::ExtractionFailed {
                    message: other.to_string(),
                    diagnostics: String::new(),
                },
            })?;

        let diagnostics = || result.diagnostics(&[asset.path.as_path(), output]);

        if !result.success() {
            return Err(PipelineError::ExtractionFailed {
                message: format!("ffmpeg exited with {}", result.status),
                diagnostics: diagnostics(),
            });
        }

        if target.is_empty() {
            return Err(PipelineError::ExtractionFailed {
                message: "Output audio file was not created".to_string(),
                diagnostics: diagnostics(),
            });
        }

        tracing::info!(
            "Audio extracted: {} ({:.2}MB)",
            display_name(output),
            target.len() as f64 / (1024.0 * 1024.0)
        );

        Ok(target)
    }
}

/// `Some(true)` if `ffmpeg -encoders` lists `codec`, `None` if ffmpeg did not run
async fn check_encoder(ffmpeg: &Path, codec: &str) -> Option<bool> {
    let args: Vec<OsString> = vec!["-hide_banner".into(), "-encoders".into()];
    match run_with_timeout(ffmpeg, &args, CODEC_CHECK_TIMEOUT).await {
        Ok(output) if output.success() => Some(output.stdout.contains(codec)),
        Ok(_) => Some(false),
        Err(_) => None,
    }
}
