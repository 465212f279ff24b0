//! Playback state machine mirrored from player events

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// No audio
    #[default]
    Idle,
    /// Waiting for the server
    Loading,
    Playing,
    Paused,
    /// At position zero, either after stop or after the track ended
    Stopped,
    /// The player reported an error
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    /// Seconds
    pub current_time: f64,
    /// Seconds, 0 until the player reports metadata
    pub duration: f64,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    pub fn begin_loading(&mut self) {
        *self = Self {
            phase: PlaybackPhase::Loading,
            ..Self::default()
        };
    }

    /// Back to Idle with nothing loaded
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn on_play(&mut self) {
        self.phase = PlaybackPhase::Playing;
    }

    pub fn on_pause(&mut self) {
        if self.phase == PlaybackPhase::Playing {
            self.phase = PlaybackPhase::Paused;
        }
    }

    pub fn on_stop(&mut self) {
        self.phase = PlaybackPhase::Stopped;
        self.current_time = 0.0;
    }

    pub fn on_metadata(&mut self, duration: f64) {
        if duration.is_finite() && duration >= 0.0 {
            self.duration = duration;
        }
    }

    pub fn on_time_update(&mut self, position: f64) {
        if position.is_finite() && position >= 0.0 {
            self.current_time = position;
        }
    }

    pub fn on_ended(&mut self) {
        self.phase = PlaybackPhase::Stopped;
        self.current_time = 0.0;
    }

    pub fn on_error(&mut self) {
        self.phase = PlaybackPhase::Errored;
    }

    /// Clamp a requested position into `[0, duration]`
    pub fn clamp_position(&self, target: f64) -> f64 {
        if !target.is_finite() {
            return 0.0;
        }
        target.clamp(0.0, self.duration.max(0.0))
    }
}

/// Render seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
