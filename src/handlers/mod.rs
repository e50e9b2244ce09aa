pub mod transcribe;

pub use transcribe::transcribe_audio;
