//! Per-request transcription pipeline.
//!
//! Every request runs the same linear flow: load the model for the
//! requested size and precision tier, decode the staged audio, transcribe,
//! and shape the segment stream into the response form. Nothing is cached
//! between requests; each one gets a freshly loaded model.

use crate::audio;
use crate::transcription::model::{ComputeType, DecodedSegment, ModelSize, WhisperModel};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// A contiguous span of audio with its transcribed text. Ids are sequential
/// and unique within one response; segments appear in chronological order.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub id: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Shaped transcription output, ready for the response payload.
#[derive(Debug)]
pub struct TranscriptionOutcome {
    pub language: String,
    pub text: String,
    pub segments: Vec<Segment>,
}

/// Run the whole pipeline against a staged audio file. Blocking; callers on
/// the async side dispatch this through `web::block`.
pub fn transcribe_file(
    audio_path: &Path,
    size: ModelSize,
    download_root: &Path,
    language_hint: Option<&str>,
) -> Result<TranscriptionOutcome> {
    let compute = ComputeType::for_model(size);
    let mut model = WhisperModel::load(size, compute, download_root)?;

    let pcm = audio::load_audio(audio_path).context("failed to decode staged audio")?;
    info!(
        samples = pcm.len(),
        audio_seconds = pcm.len() as f64 / audio::TARGET_SAMPLE_RATE as f64,
        "Starting transcription"
    );

    let transcription = model.transcribe(&pcm, language_hint)?;
    let segments = number_segments(transcription.segments);
    let text = join_segment_text(&segments);

    info!(
        language = %transcription.language,
        segments = segments.len(),
        "Transcription finished"
    );

    Ok(TranscriptionOutcome {
        language: transcription.language,
        text,
        segments,
    })
}

/// Assign sequential ids in the order the model produced the segments.
fn number_segments(decoded: Vec<DecodedSegment>) -> Vec<Segment> {
    decoded
        .into_iter()
        .enumerate()
        .map(|(id, segment)| Segment {
            id,
            start: segment.start,
            end: segment.end,
            text: segment.text,
        })
        .collect()
}

/// Whole-transcript text: segment texts joined with single spaces, with
/// leading and trailing whitespace trimmed.
fn join_segment_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(start: f64, end: f64, text: &str) -> DecodedSegment {
        DecodedSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_number_segments_ids_are_sequential() {
        let segments = number_segments(vec![
            decoded(0.0, 30.0, "first window"),
            decoded(30.0, 60.0, "second window"),
            decoded(60.0, 72.5, "last window"),
        ]);

        let ids: Vec<usize> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(segments.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(segments.iter().all(|s| s.end >= s.start));
    }

    #[test]
    fn test_join_segment_text_is_space_joined_and_trimmed() {
        let segments = number_segments(vec![
            decoded(0.0, 30.0, "hello there"),
            decoded(30.0, 60.0, "general audience"),
        ]);
        assert_eq!(join_segment_text(&segments), "hello there general audience");
    }

    #[test]
    fn test_join_segment_text_handles_empty_cases() {
        assert_eq!(join_segment_text(&[]), "");

        let segments = number_segments(vec![decoded(0.0, 1.0, "")]);
        assert_eq!(join_segment_text(&segments), "");

        let segments = number_segments(vec![decoded(0.0, 1.0, "only"), decoded(1.0, 2.0, "")]);
        assert_eq!(join_segment_text(&segments), "only");
    }
}
