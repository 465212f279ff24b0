//! HTTP client for the Kokoro speech endpoint

use crate::config::{SynthesisConfig, Voice};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Synthesis engine identifier expected by the server
pub const MODEL: &str = "kokoro";
pub const RESPONSE_FORMAT: &str = "wav";

/// Long texts can take a while to synthesize on CPU
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Server error: {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to read audio response: {0}")]
    Body(String),
    #[error("Failed to generate speech")]
    Other(String),
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'static str,
    input: &'a str,
    voice: Voice,
    response_format: &'static str,
    speed: f32,
}

/// Posts text to `<server>/v1/audio/speech` and returns WAV bytes
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
}

impl SpeechClient {
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Other(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Synthesize `text` with the voice and speed in `config`
    pub async fn synthesize(&self, config: &SynthesisConfig, text: &str) -> Result<Vec<u8>, ClientError> {
        let endpoint = config.speech_endpoint();
        let body = SpeechRequest {
            model: MODEL,
            input: text,
            voice: config.voice(),
            response_format: RESPONSE_FORMAT,
            speed: config.speed(),
        };

        log::info!(
            "Requesting speech for {} chars from {} (voice {}, speed {:.1})",
            text.chars().count(),
            endpoint,
            body.voice,
            body.speed
        );

        let res = self
            .http
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = res.status();
        if !status.is_success() {
            log::warn!("Speech request failed with status {}", status);
            return Err(ClientError::Status(status.as_u16()));
        }

        let audio = res
            .bytes()
            .await
            .map_err(|e| ClientError::Body(e.to_string()))?;

        log::debug!("Received {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}

fn classify_send_error(e: reqwest::Error) -> ClientError {
    // A malformed server URL surfaces as a builder error
    if e.is_builder() {
        ClientError::Other(e.to_string())
    } else {
        ClientError::Network(e.to_string())
    }
}
