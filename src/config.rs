//! Synthesis settings: server location, voice and speed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8880";
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const SPEED_STEP: f32 = 0.1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown voice: {0}")]
    UnknownVoice(String),
    #[error("Invalid speed: {0}")]
    InvalidSpeed(String),
    #[error("Server URL cannot be empty")]
    EmptyServerUrl,
}

/// Kokoro voices served by the speech endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    #[default]
    AfSky,
    AfBella,
    AfSarah,
    AmAdam,
    AmMichael,
    BfEmma,
    BmGeorge,
}

/// Display information for a voice
#[derive(Debug, Clone, Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub gender: &'static str,
    pub accent: &'static str,
}

impl Voice {
    pub const ALL: [Voice; 7] = [
        Voice::AfSky,
        Voice::AfBella,
        Voice::AfSarah,
        Voice::AmAdam,
        Voice::AmMichael,
        Voice::BfEmma,
        Voice::BmGeorge,
    ];

    /// Identifier sent to the server
    pub fn id(self) -> &'static str {
        match self {
            Voice::AfSky => "af_sky",
            Voice::AfBella => "af_bella",
            Voice::AfSarah => "af_sarah",
            Voice::AmAdam => "am_adam",
            Voice::AmMichael => "am_michael",
            Voice::BfEmma => "bf_emma",
            Voice::BmGeorge => "bm_george",
        }
    }

    pub fn info(self) -> VoiceInfo {
        let (name, gender, accent) = match self {
            Voice::AfSky => ("Sky", "female", "american"),
            Voice::AfBella => ("Bella", "female", "american"),
            Voice::AfSarah => ("Sarah", "female", "american"),
            Voice::AmAdam => ("Adam", "male", "american"),
            Voice::AmMichael => ("Michael", "male", "american"),
            Voice::BfEmma => ("Emma", "female", "british"),
            Voice::BmGeorge => ("George", "male", "british"),
        };
        VoiceInfo {
            id: self.id(),
            name,
            gender,
            accent,
        }
    }

    /// Label shown in voice listings, e.g. "Emma (British Female)"
    pub fn label(self) -> String {
        let info = self.info();
        let gender = if info.gender == "female" { "Female" } else { "Male" };
        if info.accent == "british" {
            format!("{} (British {})", info.name, gender)
        } else {
            format!("{} ({})", info.name, gender)
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Voice::ALL
            .into_iter()
            .find(|v| v.id() == wanted)
            .ok_or_else(|| ConfigError::UnknownVoice(s.to_string()))
    }
}

/// Settings sent with every synthesis request. Held in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    server_url: String,
    voice: Voice,
    speed: f32,
}

impl SynthesisConfig {
    pub fn new(server_url: impl Into<String>, voice: Voice, speed: f32) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.set_server_url(server_url)?;
        config.set_voice(voice);
        config.set_speed(speed)?;
        Ok(config)
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn voice(&self) -> Voice {
        self.voice
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Full URL of the speech endpoint. A trailing slash on the base is ignored.
    pub fn speech_endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.server_url.trim_end_matches('/'))
    }

    pub fn set_server_url(&mut self, url: impl Into<String>) -> Result<(), ConfigError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(ConfigError::EmptyServerUrl);
        }
        self.server_url = url;
        Ok(())
    }

    pub fn set_voice(&mut self, voice: Voice) {
        self.voice = voice;
    }

    /// Set playback speed (0.5 - 2.0), snapped to the 0.1 step
    pub fn set_speed(&mut self, speed: f32) -> Result<(), ConfigError> {
        if !speed.is_finite() {
            return Err(ConfigError::InvalidSpeed(speed.to_string()));
        }
        let steps_per_unit = (1.0 / SPEED_STEP).round();
        let snapped = (speed * steps_per_unit).round() / steps_per_unit;
        self.speed = snapped.clamp(MIN_SPEED, MAX_SPEED);
        Ok(())
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            voice: Voice::default(),
            speed: 1.0,
        }
    }
}
