//! Kokoro Speak
//!
//! Text-to-speech client for a locally running Kokoro server: type or import
//! text, synthesize it over HTTP, and play or save the resulting WAV.

pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod session;
pub mod tts;

pub use config::{SynthesisConfig, Voice};
pub use error::SessionError;
pub use session::{RequestState, SpeechSession};
