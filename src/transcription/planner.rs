//! Chunk planning: partitioning the audio timeline into uploadable pieces

use serde::Serialize;

use crate::config::Settings;

/// Shortest interval a plan will produce
pub const MIN_CHUNK_SECONDS: f64 = 1.0;

/// One time slice of the audio
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkInterval {
    pub start_secs: f64,
    /// Zero only for the single chunk of a plan with unknown duration
    pub duration_secs: f64,
}

impl ChunkInterval {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Size and duration bounds a plan must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkLimits {
    /// Remote payload ceiling
    pub max_size_bytes: u64,
    pub target_chunk_bytes: u64,
    pub max_chunk_seconds: f64,
}

impl ChunkLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_size_bytes: settings.chunking.max_upload_bytes,
            target_chunk_bytes: settings.chunking.target_chunk_bytes,
            max_chunk_seconds: settings.chunking.max_chunk_seconds,
        }
    }
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Ordered, gap-free partition of `[0, total_secs]`. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkPlan {
    intervals: Vec<ChunkInterval>,
    total_secs: f64,
    requires_split: bool,
}

impl ChunkPlan {
    pub fn intervals(&self) -> &[ChunkInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    /// Whether the audio exceeds the ceiling and every interval must be
    /// extracted into its own file, even if the plan has one chunk.
    pub fn requires_split(&self) -> bool {
        self.requires_split
    }
}

/// Plan how to split audio of `size_bytes`/`duration_secs`.
///
/// Audio within the ceiling is sent whole. Otherwise the chunk count is the
/// larger of the size-based and duration-based estimates and the timeline is
/// divided evenly, the last chunk absorbing the rounding remainder. With an
/// unknown duration (degraded probe) a single open-ended chunk is planned and
/// the post-extraction size check decides whether it can be sent.
pub fn plan_chunks(size_bytes: u64, duration_secs: f64, limits: &ChunkLimits) -> ChunkPlan {
    let duration_secs = if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        0.0
    };

    let whole = ChunkInterval {
        start_secs: 0.0,
        duration_secs,
    };

    if size_bytes <= limits.max_size_bytes {
        return ChunkPlan {
            intervals: vec![whole],
            total_secs: duration_secs,
            requires_split: false,
        };
    }

    if duration_secs == 0.0 {
        tracing::warn!("Duration unknown, extracting a single chunk and relying on the size check");
        return ChunkPlan {
            intervals: vec![whole],
            total_secs: 0.0,
            requires_split: true,
        };
    }

    let chunks_by_size = size_bytes.div_ceil(limits.target_chunk_bytes.max(1));
    let chunks_by_duration = if limits.max_chunk_seconds > 0.0 {
        (duration_secs / limits.max_chunk_seconds.max(MIN_CHUNK_SECONDS)).ceil() as u64
    } else {
        1
    };
    // No interval shorter than MIN_CHUNK_SECONDS, whatever the limits say.
    let max_count = (duration_secs / MIN_CHUNK_SECONDS).ceil().max(1.0) as u64;
    let count = chunks_by_size
        .max(chunks_by_duration)
        .min(max_count)
        .max(1) as usize;

    let chunk_secs = duration_secs / count as f64;
    let intervals = (0..count)
        .map(|i| {
            let start_secs = i as f64 * chunk_secs;
            let duration = if i == count - 1 {
                duration_secs - start_secs
            } else {
                chunk_secs
            };
            ChunkInterval {
                start_secs,
                duration_secs: duration,
            }
        })
        .collect();

    tracing::info!(
        "Splitting audio into {} chunks (~{:.1}s each, total: {:.1}s)",
        count,
        chunk_secs,
        duration_secs
    );

    ChunkPlan {
        intervals,
        total_secs: duration_secs,
        requires_split: true,
    }
}
