//! The speech session: document, settings, request lifecycle and playback
//!
//! Every operation takes `&mut self`, so a second `generate_speech` cannot
//! start while one is still awaiting the server.

use crate::config::{SynthesisConfig, Voice};
use crate::document::{Document, FileKind, FileParser, InputError, PageTextExtractor, PdfTextExtractor, UploadedFile};
use crate::error::SessionError;
use crate::tts::{
    AudioResource, AudioSlot, BlobStore, PlaybackState, PlayerEvent, PlayerEventKind, PlayerFactory,
    RodioPlayerFactory, SpeechClient,
};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default file name for saved audio
pub const DOWNLOAD_FILE_NAME: &str = "speech.wav";

/// Progress of the current request or file import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestState {
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Marks a request as loading for as long as it lives, including when the
/// owning future is dropped before completion.
struct LoadingGuard<'a> {
    request: &'a mut RequestState,
}

impl<'a> LoadingGuard<'a> {
    fn begin(request: &'a mut RequestState) -> Self {
        request.is_loading = true;
        request.error = None;
        Self { request }
    }

    fn fail(&mut self, err: &SessionError) {
        self.request.error = Some(err.to_string());
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.request.is_loading = false;
    }
}

pub struct SpeechSession {
    document: Document,
    config: SynthesisConfig,
    request: RequestState,
    playback: PlaybackState,
    audio: AudioSlot,
    client: SpeechClient,
    parser: FileParser,
    players: Arc<dyn PlayerFactory>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
}

impl SpeechSession {
    /// Session using the default audio device and PDF extractor
    pub fn new(config: SynthesisConfig) -> Result<Self, SessionError> {
        Ok(Self::with_backends(
            config,
            SpeechClient::new()?,
            Arc::new(RodioPlayerFactory),
            Arc::new(PdfTextExtractor),
        ))
    }

    pub fn with_backends(
        config: SynthesisConfig,
        client: SpeechClient,
        players: Arc<dyn PlayerFactory>,
        extractor: Arc<dyn PageTextExtractor>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            document: Document::new(),
            config,
            request: RequestState::default(),
            playback: PlaybackState::default(),
            audio: AudioSlot::new(BlobStore::new()),
            client,
            parser: FileParser::new(extractor),
            players,
            events_tx,
            events_rx,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Number of audio handles not yet released
    pub fn live_audio_handles(&self) -> usize {
        self.audio.store().live_count()
    }

    fn record(&mut self, err: SessionError) -> SessionError {
        log::warn!("{}", err);
        self.request.error = Some(err.to_string());
        err
    }

    // ---- Input -------------------------------------------------------------

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.document.set_text(text);
    }

    pub fn append_text(&mut self, text: &str) {
        self.document.push_str(text);
    }

    pub fn clear_document(&mut self) {
        self.document.clear();
    }

    /// Replace the document with the text of `file`.
    ///
    /// Oversized and unsupported files are rejected without touching the
    /// document. PDF extraction marks the session as loading.
    pub async fn load_file(&mut self, file: UploadedFile) -> Result<(), SessionError> {
        let kind = match FileParser::validate(&file) {
            Ok(kind) => kind,
            Err(e) => return Err(self.record(e.into())),
        };

        let name = file.name().to_string();
        let parser = self.parser.clone();
        let loading = if kind == FileKind::Pdf {
            Some(LoadingGuard::begin(&mut self.request))
        } else {
            None
        };

        log::info!("Importing {} as {:?}", name, kind);
        let parsed = tokio::task::spawn_blocking(move || parser.parse(&file, &kind)).await;
        drop(loading);

        let text = match parsed {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(self.record(e.into())),
            Err(e) => {
                return Err(self.record(InputError::FileError(format!("Task error: {}", e)).into()));
            }
        };

        self.document.load(text, name);
        self.request.error = None;
        Ok(())
    }

    // ---- Settings ----------------------------------------------------------

    pub fn set_server_url(&mut self, url: &str) -> Result<(), SessionError> {
        match self.config.set_server_url(url) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e.into())),
        }
    }

    pub fn set_voice(&mut self, voice: Voice) {
        self.config.set_voice(voice);
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), SessionError> {
        match self.config.set_speed(speed) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e.into())),
        }
    }

    // ---- Synthesis ---------------------------------------------------------

    /// Send the document to the server and start playing the result.
    ///
    /// The previous audio is released before the request goes out.
    pub async fn generate_speech(&mut self) -> Result<(), SessionError> {
        if self.document.is_blank() {
            return Err(self.record(SessionError::EmptyInput));
        }

        let mut loading = LoadingGuard::begin(&mut self.request);
        self.audio.release();
        self.playback.begin_loading();

        let store = self.audio.store().clone();
        let opened = open_speech(
            &self.client,
            &self.config,
            self.document.text(),
            &store,
            self.players.as_ref(),
            &self.events_tx,
        )
        .await;

        let resource = match opened {
            Ok(resource) => resource,
            Err(e) => {
                log::warn!("{}", e);
                self.playback.reset();
                loading.fail(&e);
                return Err(e);
            }
        };

        self.audio.replace(resource);
        let started = match self.audio.current_mut() {
            Some(resource) => resource.player_mut().play(),
            None => Ok(()),
        };

        match started {
            Ok(()) => {
                self.playback.on_play();
                Ok(())
            }
            Err(e) => {
                let e = SessionError::from(e);
                log::warn!("{}", e);
                self.playback.on_error();
                loading.fail(&e);
                Err(e)
            }
        }
    }

    // ---- Playback ----------------------------------------------------------

    pub fn toggle_play_pause(&mut self) -> Result<(), SessionError> {
        let Some(resource) = self.audio.current_mut() else {
            return Ok(());
        };

        if self.playback.is_playing() {
            resource.player_mut().pause();
            self.playback.on_pause();
            return Ok(());
        }

        match resource.player_mut().play() {
            Ok(()) => {
                self.playback.on_play();
                Ok(())
            }
            Err(e) => {
                self.playback.on_error();
                Err(self.record(e.into()))
            }
        }
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        let Some(resource) = self.audio.current_mut() else {
            return;
        };
        let player = resource.player_mut();
        player.pause();
        if let Err(e) = player.seek(Duration::ZERO) {
            log::warn!("Rewind failed: {}", e);
        }
        self.playback.on_stop();
    }

    /// Jump to `target` seconds, clamped to the track
    pub fn seek(&mut self, target: f64) -> Result<(), SessionError> {
        let position = self.playback.clamp_position(target);
        let Some(resource) = self.audio.current_mut() else {
            return Ok(());
        };

        if let Err(e) = resource.player_mut().seek(Duration::from_secs_f64(position)) {
            return Err(self.record(e.into()));
        }
        self.playback.on_time_update(position);
        Ok(())
    }

    /// Write the current audio to disk as `speech.wav`.
    ///
    /// `target` may be a directory or a full file path; without it the
    /// user's download directory is used. Returns `None` when there is no
    /// audio to save.
    pub fn download(&mut self, target: Option<&Path>) -> Result<Option<PathBuf>, SessionError> {
        let Some(bytes) = self.audio.bytes() else {
            return Ok(None);
        };

        let path = download_path(target);
        if let Err(e) = std::fs::write(&path, &bytes[..]) {
            return Err(self.record(SessionError::Save(format!("{}: {}", path.display(), e))));
        }
        log::info!("Saved {} bytes of audio to {}", bytes.len(), path.display());
        Ok(Some(path))
    }

    /// Apply pending player events to the playback state and return them.
    ///
    /// Events from audio that has since been released are discarded.
    pub fn pump_events(&mut self) -> Vec<PlayerEventKind> {
        let mut applied = Vec::new();

        while let Ok(event) = self.events_rx.try_recv() {
            let live = self.audio.current().map(|r| r.handle().id());
            if live != Some(event.handle_id) {
                log::trace!("Dropping event from released audio {}", event.handle_id);
                continue;
            }

            match &event.kind {
                PlayerEventKind::Metadata { duration } => self.playback.on_metadata(*duration),
                PlayerEventKind::TimeUpdate { position } => {
                    // Ticks queued before a pause or stop are stale
                    if self.playback.is_playing() {
                        self.playback.on_time_update(*position);
                    }
                }
                PlayerEventKind::Ended => self.playback.on_ended(),
                PlayerEventKind::Error(message) => {
                    self.playback.on_error();
                    self.record(SessionError::PlayerReported(message.clone()));
                }
            }
            applied.push(event.kind);
        }

        applied
    }
}

/// Fetch audio for `text` and bind a paused player to it
async fn open_speech(
    client: &SpeechClient,
    config: &SynthesisConfig,
    text: &str,
    store: &BlobStore,
    players: &dyn PlayerFactory,
    events: &Sender<PlayerEvent>,
) -> Result<AudioResource, SessionError> {
    let wav = client.synthesize(config, text).await?;

    let handle = store.create(wav);
    let Some(bytes) = store.get(&handle) else {
        return Err(SessionError::PlayerReported("audio was released before playback".to_string()));
    };

    match players.open(handle.id(), bytes, events.clone()) {
        Ok(player) => Ok(AudioResource::new(handle, player)),
        Err(e) => {
            store.revoke(&handle);
            Err(e.into())
        }
    }
}

fn download_path(target: Option<&Path>) -> PathBuf {
    match target {
        Some(path) if path.is_dir() => path.join(DOWNLOAD_FILE_NAME),
        Some(path) => path.to_path_buf(),
        None => dirs::download_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DOWNLOAD_FILE_NAME),
    }
}
