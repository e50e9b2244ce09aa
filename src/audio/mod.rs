//! # Audio Decoding
//!
//! Converts a staged upload into the input form the Whisper model expects:
//! 16 kHz, mono, 32-bit float PCM in `[-1.0, 1.0]`. Anything that cannot be
//! decoded surfaces as a processing failure for the request.

pub mod processor;

pub use processor::{load_audio, TARGET_SAMPLE_RATE};
