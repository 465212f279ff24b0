//! User-facing errors
//!
//! The `Display` text of [`SessionError`] is what the user sees; every new
//! error replaces the previous message.

use crate::config::ConfigError;
use crate::document::InputError;
use crate::tts::{AudioError, ClientError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Please enter some text")]
    EmptyInput,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("Error playing audio: {0}")]
    Playback(#[from] AudioError),
    #[error("Error playing audio: {0}")]
    PlayerReported(String),
    #[error("Failed to save audio: {0}")]
    Save(String),
}

impl SessionError {
    /// Validation failures never reach the network
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyInput
                | SessionError::Config(_)
                | SessionError::Input(InputError::FileTooLarge { .. })
                | SessionError::Input(InputError::UnsupportedFormat(_))
        )
    }
}
