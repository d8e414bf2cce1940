//! Merging ordered chunk transcripts into one result

use serde::{Deserialize, Serialize};

use crate::transcription::client::TranscriptSegment;

/// Final transcript of one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub language: String,
    pub duration_seconds: f64,
    pub word_count: usize,
}

/// Joins segment texts and aggregates their metadata
#[derive(Debug, Clone)]
pub struct TranscriptMerger {
    fallback_language: String,
}

impl TranscriptMerger {
    pub fn new(fallback_language: impl Into<String>) -> Self {
        Self {
            fallback_language: fallback_language.into(),
        }
    }

    /// Merge `segments` (in chunk order).
    ///
    /// The reported duration is the probed duration of the whole audio; only
    /// when that is unknown are the segment-reported durations summed.
    pub fn merge(&self, segments: &[TranscriptSegment], probed_duration: f64) -> TranscriptResult {
        let joined = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let text = collapse_whitespace(&joined);

        let word_count = segments.iter().map(TranscriptSegment::word_count).sum();

        let language = segments
            .iter()
            .filter_map(|s| s.language.as_deref())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(self.fallback_language.as_str())
            .to_string();

        let duration_seconds = if probed_duration > 0.0 {
            probed_duration
        } else {
            segments.iter().filter_map(|s| s.duration_secs).sum()
        };

        TranscriptResult {
            text,
            language,
            duration_seconds,
            word_count,
        }
    }
}

impl Default for TranscriptMerger {
    fn default() -> Self {
        Self::new("en")
    }
}

/// Replace every run of whitespace with a single space
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, language: Option<&str>, duration: Option<f64>) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            language: language.map(str::to_string),
            duration_secs: duration,
            attempts: 1,
        }
    }

    #[test]
    fn joins_chunks_with_single_spaces() {
        let segments = [
            segment("Hello world.", Some("en"), Some(600.2)),
            segment("This is chunk two.", Some("en"), Some(600.1)),
            segment("Final chunk text.", Some("en"), Some(12.0)),
        ];

        let result = TranscriptMerger::default().merge(&segments, 1212.0);
        assert_eq!(result.text, "Hello world. This is chunk two. Final chunk text.");
        assert_eq!(result.word_count, 10);
        assert_eq!(result.duration_seconds, 1212.0);
        assert_eq!(result.language, "en");
    }

    #[test]
    fn collapses_repeated_whitespace_and_skips_empty_chunks() {
        let segments = [
            segment("First  part ", None, None),
            segment("   ", None, None),
            segment(" second\tpart", None, None),
        ];

        let result = TranscriptMerger::default().merge(&segments, 30.0);
        assert_eq!(result.text, "First part second part");
        assert_eq!(result.word_count, 4);
    }

    #[test]
    fn first_detected_language_wins() {
        let segments = [
            segment("hola", Some(""), None),
            segment("hola", Some("spanish"), None),
            segment("hello", Some("english"), None),
        ];
        let result = TranscriptMerger::default().merge(&segments, 5.0);
        assert_eq!(result.language, "spanish");
    }

    #[test]
    fn falls_back_when_no_language_detected() {
        let segments = [segment("bonjour", None, None)];
        let result = TranscriptMerger::new("fr").merge(&segments, 5.0);
        assert_eq!(result.language, "fr");
    }

    #[test]
    fn unknown_probed_duration_uses_segment_durations() {
        let segments = [
            segment("a", None, Some(10.5)),
            segment("b", None, None),
            segment("c", None, Some(4.5)),
        ];
        let result = TranscriptMerger::default().merge(&segments, 0.0);
        assert_eq!(result.duration_seconds, 15.0);
    }
}
