//! Transcription pipeline orchestration

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::Settings;
use crate::media::{AudioTranscoder, ChunkExtractor, MediaProbe};
use crate::transcription::client::{
    language_code, SpeechToText, TranscriptSegment, TranscriptionClient,
};
use crate::transcription::merger::{TranscriptMerger, TranscriptResult};
use crate::transcription::planner::{plan_chunks, ChunkLimits, ChunkPlan};
use crate::transcription::retry::RetryPolicy;
use crate::{PipelineError, Result};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(PipelineStage) + Send + Sync>;

/// Where an invocation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Planning,
    Transcoding,
    Chunking { chunks: usize },
    Transcribing { index: usize, total: usize },
    Merging,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Transcoding => write!(f, "transcoding"),
            Self::Chunking { chunks } => write!(f, "chunking into {}", chunks),
            Self::Transcribing { index, total } => write!(f, "transcribing {}/{}", index, total),
            Self::Merging => write!(f, "merging"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One media file to transcribe
#[derive(Debug, Clone, Default)]
pub struct TranscriptionJob {
    pub input: PathBuf,
    /// Language hint; detected from the first chunk when absent
    pub language: Option<String>,
    pub known_size: Option<u64>,
    pub known_duration: Option<f64>,
}

impl TranscriptionJob {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }
}

/// Trailing text of the previous chunk passed as a continuity prompt
#[derive(Debug, Clone, Copy)]
struct ContinuityPrompt {
    max_chars: usize,
    min_chars: usize,
}

impl ContinuityPrompt {
    fn from_previous<'a>(&self, previous: &'a str) -> Option<&'a str> {
        let previous = previous.trim();
        let count = previous.chars().count();
        if self.max_chars == 0 || count <= self.min_chars {
            return None;
        }

        let skip = count.saturating_sub(self.max_chars);
        let start = previous
            .char_indices()
            .nth(skip)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Some(&previous[start..])
    }
}

/// Media file in, transcript out.
///
/// Every invocation owns a private scratch directory; the pipeline itself
/// holds no per-invocation state, so one instance can serve concurrent
/// invocations on independent files.
pub struct TranscriptionPipeline {
    probe: MediaProbe,
    transcoder: AudioTranscoder,
    extractor: ChunkExtractor,
    client: TranscriptionClient,
    merger: TranscriptMerger,
    limits: ChunkLimits,
    continuity: ContinuityPrompt,
    inter_chunk_delay: Duration,
    scratch_root: PathBuf,
    progress: Option<ProgressCallback>,
}

impl TranscriptionPipeline {
    /// Create a new transcription pipeline around an already-built provider
    pub async fn new(settings: &Settings, provider: Arc<dyn SpeechToText>) -> Self {
        Self {
            probe: MediaProbe::from_settings(settings),
            transcoder: AudioTranscoder::from_settings(settings).await,
            extractor: ChunkExtractor::from_settings(settings),
            client: TranscriptionClient::new(
                provider,
                RetryPolicy::from_settings(&settings.retry),
            ),
            merger: TranscriptMerger::new(settings.transcription.fallback_language.clone()),
            limits: ChunkLimits::from_settings(settings),
            continuity: ContinuityPrompt {
                max_chars: settings.chunking.prompt_chars,
                min_chars: settings.chunking.min_prompt_chars,
            },
            inter_chunk_delay: Duration::from_millis(settings.chunking.inter_chunk_delay_ms),
            scratch_root: settings.scratch_root(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, stage: PipelineStage) {
        tracing::debug!("Pipeline stage: {}", stage);
        if let Some(callback) = &self.progress {
            callback(stage);
        }
    }

    /// Transcribe a media file.
    ///
    /// Any failure aborts the whole invocation; no partial transcript is
    /// returned. All scratch files are gone when this returns, and also when
    /// the returned future is dropped early.
    pub async fn transcribe(&self, job: &TranscriptionJob) -> Result<TranscriptResult> {
        match self.run(job).await {
            Ok(result) => {
                self.report(PipelineStage::Done);
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Transcription failed: {}", e);
                self.report(PipelineStage::Failed);
                Err(e)
            }
        }
    }

    async fn run(&self, job: &TranscriptionJob) -> Result<TranscriptResult> {
        self.report(PipelineStage::Planning);
        let source = self
            .probe
            .probe(&job.input, job.known_size, job.known_duration)
            .await?;

        tracing::info!(
            "Starting transcription: {} ({:.2}MB, {:.1}s)",
            source.file_name(),
            source.size_mb(),
            source.duration_secs
        );

        let workspace = tempfile::Builder::new()
            .prefix("longscribe_")
            .tempdir_in(&self.scratch_root)?;

        self.report(PipelineStage::Transcoding);
        let audio_path = workspace
            .path()
            .join(format!("audio.{}", self.transcoder.spec().extension));
        let audio = self.transcoder.transcode(&source, &audio_path).await?;

        let audio_size = self.probe.size(audio.path())?;
        let mut duration = self.probe.duration(audio.path()).await;
        if duration <= 0.0 {
            duration = source.duration_secs;
        }

        let plan = plan_chunks(audio_size, duration, &self.limits);

        let segments = if plan.requires_split() {
            self.report(PipelineStage::Chunking { chunks: plan.len() });
            self.transcribe_chunks(audio.path(), &plan, workspace.path(), job)
                .await?
        } else {
            self.report(PipelineStage::Transcribing { index: 1, total: 1 });
            vec![
                self.client
                    .transcribe(audio.path(), job.language.as_deref(), None)
                    .await?,
            ]
        };
        audio.remove();

        self.report(PipelineStage::Merging);
        let result = self.merger.merge(&segments, duration);
        if result.text.is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }

        close_dir(workspace);

        tracing::info!(
            "Transcription complete: {} chunk(s), {} words, {:.1}s",
            plan.len(),
            result.word_count,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Extract and transcribe every chunk, strictly in order
    async fn transcribe_chunks(
        &self,
        audio: &Path,
        plan: &ChunkPlan,
        workdir: &Path,
        job: &TranscriptionJob,
    ) -> Result<Vec<TranscriptSegment>> {
        let chunk_dir = tempfile::Builder::new()
            .prefix("chunks_")
            .tempdir_in(workdir)?;

        let total = plan.len();
        let mut segments: Vec<TranscriptSegment> = Vec::with_capacity(total);
        let mut language = job.language.clone();

        tracing::info!("Processing {} chunks for large audio file", total);

        for (index, interval) in plan.intervals().iter().enumerate() {
            tracing::info!(
                "Processing chunk {}/{} ({:.1}s - {:.1}s)",
                index + 1,
                total,
                interval.start_secs,
                interval.end_secs()
            );

            let chunk = self
                .extractor
                .extract(audio, index, interval, chunk_dir.path())
                .await?;

            let prompt = segments
                .last()
                .and_then(|previous| self.continuity.from_previous(&previous.text));

            self.report(PipelineStage::Transcribing {
                index: index + 1,
                total,
            });
            let segment = self
                .client
                .transcribe(chunk.path(), language.as_deref(), prompt)
                .await?;
            chunk.remove();

            if language.is_none() {
                language = segment.language.as_deref().and_then(language_code);
            }
            segments.push(segment);

            if index + 1 < total && !self.inter_chunk_delay.is_zero() {
                tokio::time::sleep(self.inter_chunk_delay).await;
            }
        }

        close_dir(chunk_dir);
        Ok(segments)
    }
}

/// Remove a scratch directory now, logging instead of failing
fn close_dir(dir: TempDir) {
    if let Err(e) = dir.close() {
        tracing::warn!("Failed to remove scratch directory: {}", e);
    }
}
