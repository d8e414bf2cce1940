//! Cutting one time interval of the compressed audio into its own file

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Settings;
use crate::media::runner::{run_with_timeout, RunError};
use crate::media::{TempAsset, TranscodeSpec};
use crate::transcription::ChunkInterval;
use crate::{PipelineError, Result};

/// Re-encodes single chunks and enforces the remote payload ceiling
#[derive(Debug, Clone)]
pub struct ChunkExtractor {
    ffmpeg: PathBuf,
    spec: TranscodeSpec,
    timeout: Duration,
    max_chunk_bytes: u64,
}

impl ChunkExtractor {
    pub fn new(
        ffmpeg: PathBuf,
        spec: TranscodeSpec,
        timeout: Duration,
        max_chunk_bytes: u64,
    ) -> Self {
        Self {
            ffmpeg,
            spec,
            timeout,
            max_chunk_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.encoder.ffmpeg_path.clone(),
            TranscodeSpec::from_settings(&settings.encoder),
            settings.timeouts.chunk(),
            settings.chunking.max_upload_bytes,
        )
    }

    /// Path of chunk `index` inside `out_dir`
    pub fn chunk_path(&self, out_dir: &Path, index: usize) -> PathBuf {
        out_dir.join(format!("chunk_{:03}.{}", index, self.spec.extension))
    }

    /// Extract chunk `index` (0-based) of `source` into `out_dir`.
    ///
    /// An interval with zero duration means "until the end of the input".
    /// A chunk larger than the remote ceiling is rejected with
    /// [`PipelineError::ChunkTooLarge`] and deleted.
    pub async fn extract(
        &self,
        source: &Path,
        index: usize,
        interval: &ChunkInterval,
        out_dir: &Path,
    ) -> Result<TempAsset> {
        let output = self.chunk_path(out_dir, index);
        let chunk = TempAsset::new(output.clone());

        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-ss".into(),
            format!("{:.3}", interval.start_secs).into(),
        ];
        if interval.duration_secs > 0.0 {
            args.push("-t".into());
            args.push(format!("{:.3}", interval.duration_secs).into());
        }
        args.extend(self.spec.output_args());
        args.push("-y".into());
        args.push(output.as_os_str().to_owned());

        let result = run_with_timeout(&self.ffmpeg, &args, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::TimedOut { timeout, .. } => PipelineError::ExtractionTimeout {
                    stage: format!("Chunk {} extraction", index + 1),
                    timeout_secs: timeout.as_secs(),
                },
                other => PipelineError::ChunkExtractionFailed {
                    index,
                    diagnostics: other.to_string(),
                },
            })?;

        if !result.success() || chunk.is_empty() {
            return Err(PipelineError::ChunkExtractionFailed {
                index,
                diagnostics: result.diagnostics(&[source, output.as_path()]),
            });
        }

        let size_bytes = chunk.len();
        if size_bytes > self.max_chunk_bytes {
            return Err(PipelineError::ChunkTooLarge {
                index,
                size_bytes,
                limit_bytes: self.max_chunk_bytes,
            });
        }

        tracing::debug!(
            "Chunk {} extracted ({:.2}MB)",
            index + 1,
            size_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(chunk)
    }
}
