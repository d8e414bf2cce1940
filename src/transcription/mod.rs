//! Transcription module for longscribe
//!
//! Plans chunks, talks to the remote speech-to-text service and merges the
//! per-chunk transcripts.

pub mod client;
pub mod groq;
pub mod merger;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod retry;

pub use client::{
    build_provider, language_code, RemoteError, RemoteTranscript, SpeechToText,
    TranscriptSegment, TranscriptionClient, TranscriptionRequest,
};
pub use merger::{TranscriptMerger, TranscriptResult};
pub use models::{find_model, ModelInfo, KNOWN_MODELS};
pub use pipeline::{PipelineStage, ProgressCallback, TranscriptionJob, TranscriptionPipeline};
pub use planner::{plan_chunks, ChunkInterval, ChunkLimits, ChunkPlan, MIN_CHUNK_SECONDS};
pub use retry::{Retried, RetryFailure, RetryPolicy};
