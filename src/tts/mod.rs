//! Speech synthesis over HTTP and local playback of the result

mod audio;
mod client;
mod playback;
mod state;

pub use audio::{wav_duration, AudioError, AudioResource, AudioSlot, BlobHandle, BlobStore};
pub use client::{ClientError, SpeechClient, MODEL, RESPONSE_FORMAT};
pub use playback::{Player, PlayerEvent, PlayerEventKind, PlayerFactory, RodioPlayer, RodioPlayerFactory};
pub use state::{format_time, PlaybackPhase, PlaybackState};
