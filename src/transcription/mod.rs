//! # Transcription Module
//!
//! Speech-to-text transcription using Whisper models via the Candle
//! framework. Pure Rust inference, no FFI bindings to whisper.cpp.
//!
//! ## Key Components:
//! - **Model loading**: resolving provisioned weights and building the model
//!   at the precision tier for the requested size
//! - **Decoding**: beam search / best-of sampling over 30-second windows
//! - **Pipeline**: the per-request load → decode → shape flow

pub mod engine;
pub mod languages;
pub mod model;

pub use engine::{transcribe_file, Segment, TranscriptionOutcome};
pub use model::{ComputeType, ModelSize};
