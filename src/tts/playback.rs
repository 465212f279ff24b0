//! Players for generated audio
//!
//! [`RodioPlayer`] runs a dedicated audio thread that owns the rodio
//! OutputStream/Sink (the stream is not Send) and takes commands over a
//! channel. Progress is reported back as [`PlayerEvent`]s.

use super::audio::{wav_duration, AudioError};
use crossbeam_channel::Sender;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the audio thread reports the playback position
const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEventKind {
    /// Duration in seconds is known
    Metadata { duration: f64 },
    /// Current position in seconds
    TimeUpdate { position: f64 },
    Ended,
    Error(String),
}

/// Event from the player bound to the blob `handle_id`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub handle_id: u64,
    pub kind: PlayerEventKind,
}

/// Controls for one loaded piece of audio
pub trait Player: Send {
    /// Start or resume. Restarts from the beginning after the track ended.
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn seek(&mut self, position: Duration) -> Result<(), AudioError>;
}

/// Creates players bound to audio bytes
pub trait PlayerFactory: Send + Sync {
    fn open(
        &self,
        handle_id: u64,
        audio: Arc<[u8]>,
        events: Sender<PlayerEvent>,
    ) -> Result<Box<dyn Player>, AudioError>;
}

#[derive(Debug)]
enum PlayerCmd {
    Play,
    Pause,
    Seek(Duration),
    Shutdown,
}

/// Opens [`RodioPlayer`]s on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlayerFactory;

impl PlayerFactory for RodioPlayerFactory {
    fn open(
        &self,
        handle_id: u64,
        audio: Arc<[u8]>,
        events: Sender<PlayerEvent>,
    ) -> Result<Box<dyn Player>, AudioError> {
        Ok(Box::new(RodioPlayer::open(handle_id, audio, events)?))
    }
}

pub struct RodioPlayer {
    tx: mpsc::Sender<PlayerCmd>,
    thread: Option<JoinHandle<()>>,
}

impl RodioPlayer {
    /// Spawn the audio thread and wait until the audio is decoded and queued
    /// (paused) on the output device.
    pub fn open(handle_id: u64, audio: Arc<[u8]>, events: Sender<PlayerEvent>) -> Result<Self, AudioError> {
        let (tx, rx) = mpsc::channel::<PlayerCmd>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name(format!("audio-{}", handle_id))
            .spawn(move || audio_thread_main(handle_id, audio, rx, events, ready_tx))
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::PlaybackError("audio thread exited during setup".to_string()))
            }
        }
    }

    fn send(&self, cmd: PlayerCmd) -> Result<(), AudioError> {
        self.tx
            .send(cmd)
            .map_err(|_| AudioError::PlaybackError("audio thread is gone".to_string()))
    }
}

impl Player for RodioPlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        self.send(PlayerCmd::Play)
    }

    fn pause(&mut self) {
        let _ = self.send(PlayerCmd::Pause);
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioError> {
        self.send(PlayerCmd::Seek(position))
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        let _ = self.tx.send(PlayerCmd::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Decode the audio and append it to the sink. Returns the duration in seconds.
fn append_source(sink: &Sink, audio: &Arc<[u8]>) -> Result<f64, AudioError> {
    let source = Decoder::new(Cursor::new(Arc::clone(audio)))
        .map_err(|e| AudioError::DecodeError(e.to_string()))?;
    let duration = wav_duration(audio)
        .or_else(|| source.total_duration().map(|d| d.as_secs_f64()))
        .unwrap_or(0.0);
    sink.append(source);
    Ok(duration)
}

fn emit(events: &Sender<PlayerEvent>, handle_id: u64, kind: PlayerEventKind) {
    let _ = events.send(PlayerEvent { handle_id, kind });
}

fn audio_thread_main(
    handle_id: u64,
    audio: Arc<[u8]>,
    rx: mpsc::Receiver<PlayerCmd>,
    events: Sender<PlayerEvent>,
    ready: mpsc::Sender<Result<(), AudioError>>,
) {
    // Create the output stream once for the lifetime of the thread
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(v) => v,
        Err(e) => {
            let _ = ready.send(Err(AudioError::StreamError(e.to_string())));
            return;
        }
    };

    let sink = match Sink::try_new(&stream_handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = ready.send(Err(AudioError::StreamError(e.to_string())));
            return;
        }
    };
    sink.pause();

    let duration = match append_source(&sink, &audio) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    emit(&events, handle_id, PlayerEventKind::Metadata { duration });

    // Set once the sink has drained, so Ended is reported a single time
    let mut finished = false;
    let mut last_pos: Option<Duration> = None;

    loop {
        let cmd = match rx.recv_timeout(TICK) {
            Ok(cmd) => Some(cmd),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if let Some(cmd) = cmd {
            match cmd {
                PlayerCmd::Play => {
                    if sink.empty() {
                        // Track ended earlier; queue it again from the start
                        if let Err(e) = append_source(&sink, &audio) {
                            emit(&events, handle_id, PlayerEventKind::Error(e.to_string()));
                            continue;
                        }
                    }
                    finished = false;
                    sink.play();
                }
                PlayerCmd::Pause => sink.pause(),
                PlayerCmd::Seek(position) => {
                    if sink.empty() {
                        if let Err(e) = append_source(&sink, &audio) {
                            emit(&events, handle_id, PlayerEventKind::Error(e.to_string()));
                            continue;
                        }
                        sink.pause();
                    }
                    finished = false;
                    match sink.try_seek(position) {
                        Ok(()) => {
                            last_pos = Some(position);
                            emit(
                                &events,
                                handle_id,
                                PlayerEventKind::TimeUpdate {
                                    position: position.as_secs_f64(),
                                },
                            );
                        }
                        Err(e) => {
                            emit(
                                &events,
                                handle_id,
                                PlayerEventKind::Error(format!("Seek failed: {}", e)),
                            );
                        }
                    }
                }
                PlayerCmd::Shutdown => break,
            }
        }

        if finished {
            continue;
        }

        if sink.empty() {
            finished = true;
            last_pos = None;
            emit(&events, handle_id, PlayerEventKind::Ended);
            continue;
        }

        if !sink.is_paused() {
            let pos = sink.get_pos();
            if last_pos != Some(pos) {
                last_pos = Some(pos);
                emit(
                    &events,
                    handle_id,
                    PlayerEventKind::TimeUpdate {
                        position: pos.as_secs_f64(),
                    },
                );
            }
        }
    }

    sink.stop();
}
