//! Fakes standing in for the audio device and the PDF library.

#![allow(dead_code)]

use crossbeam_channel::Sender;
use kokoro_speak_lib::document::{PageTextExtractor, PdfExtractError};
use kokoro_speak_lib::tts::{AudioError, Player, PlayerEvent, PlayerEventKind, PlayerFactory, SpeechClient};
use kokoro_speak_lib::{SpeechSession, SynthesisConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Duration reported by every fake player
pub const FAKE_DURATION: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Play,
    Pause,
    Seek(Duration),
}

/// One opened player: what it was given and what it was told to do
pub struct Opened {
    pub handle_id: u64,
    pub audio: Vec<u8>,
    pub events: Sender<PlayerEvent>,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl Opened {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, kind: PlayerEventKind) {
        self.events
            .send(PlayerEvent {
                handle_id: self.handle_id,
                kind,
            })
            .unwrap();
    }
}

#[derive(Default)]
pub struct FakePlayers {
    pub opened: Mutex<Vec<Opened>>,
    pub fail_open: bool,
    pub fail_play: bool,
}

impl FakePlayers {
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn failing_play() -> Self {
        Self {
            fail_play: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn with_last<R>(&self, f: impl FnOnce(&Opened) -> R) -> R {
        let opened = self.opened.lock().unwrap();
        f(opened.last().expect("no player opened"))
    }

    pub fn with_nth<R>(&self, n: usize, f: impl FnOnce(&Opened) -> R) -> R {
        let opened = self.opened.lock().unwrap();
        f(&opened[n])
    }
}

struct FakePlayer {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_play: bool,
}

impl Player for FakePlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        self.calls.lock().unwrap().push(Call::Play);
        if self.fail_play {
            return Err(AudioError::PlaybackError("device busy".to_string()));
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.lock().unwrap().push(Call::Pause);
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        self.calls.lock().unwrap().push(Call::Seek(position));
        Ok(())
    }
}

impl PlayerFactory for FakePlayers {
    fn open(
        &self,
        handle_id: u64,
        audio: Arc<[u8]>,
        events: Sender<PlayerEvent>,
    ) -> Result<Box<dyn Player>, AudioError> {
        if self.fail_open {
            return Err(AudioError::DecodeError("not a wav file".to_string()));
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let _ = events.send(PlayerEvent {
            handle_id,
            kind: PlayerEventKind::Metadata {
                duration: FAKE_DURATION,
            },
        });
        self.opened.lock().unwrap().push(Opened {
            handle_id,
            audio: audio.to_vec(),
            events,
            calls: Arc::clone(&calls),
        });

        Ok(Box::new(FakePlayer {
            calls,
            fail_play: self.fail_play,
        }))
    }
}

/// Returns fixed page texts for any input
pub struct FakePages(pub Vec<&'static str>);

impl PageTextExtractor for FakePages {
    fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfExtractError> {
        Ok(self.0.iter().map(|p| p.to_string()).collect())
    }
}

pub struct BrokenPdf;

impl PageTextExtractor for BrokenPdf {
    fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfExtractError> {
        Err(PdfExtractError::Extraction("invalid xref table".to_string()))
    }
}

pub fn session_with(
    server_url: &str,
    players: Arc<FakePlayers>,
    extractor: Arc<dyn PageTextExtractor>,
) -> SpeechSession {
    let mut config = SynthesisConfig::default();
    config.set_server_url(server_url).unwrap();
    SpeechSession::with_backends(config, SpeechClient::new().unwrap(), players, extractor)
}

pub fn session(server_url: &str, players: Arc<FakePlayers>) -> SpeechSession {
    session_with(server_url, players, Arc::new(FakePages(vec![])))
}

/// Minimal 16-bit mono WAV of silence
pub fn wav_bytes(num_samples: usize) -> Vec<u8> {
    let sample_rate: u32 = 24_000;
    let data_size = num_samples * 2;
    let mut buffer = Vec::with_capacity(44 + data_size);
    buffer.extend_from_slice(b"RIFF");
    buffer.extend_from_slice(&((36 + data_size) as u32).to_le_bytes());
    buffer.extend_from_slice(b"WAVEfmt ");
    buffer.extend_from_slice(&16u32.to_le_bytes());
    buffer.extend_from_slice(&1u16.to_le_bytes());
    buffer.extend_from_slice(&1u16.to_le_bytes());
    buffer.extend_from_slice(&sample_rate.to_le_bytes());
    buffer.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    buffer.extend_from_slice(&2u16.to_le_bytes());
    buffer.extend_from_slice(&16u16.to_le_bytes());
    buffer.extend_from_slice(b"data");
    buffer.extend_from_slice(&(data_size as u32).to_le_bytes());
    buffer.resize(44 + data_size, 0);
    buffer
}
