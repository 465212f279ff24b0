//! Audio handles and the single live audio resource
//!
//! Synthesized audio is registered in a [`BlobStore`] and addressed through a
//! [`BlobHandle`]. Handles must be revoked explicitly; the [`AudioSlot`] makes
//! sure there is never more than one live handle per session.

use super::playback::Player;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to create audio output stream: {0}")]
    StreamError(String),
    #[error("Failed to decode audio: {0}")]
    DecodeError(String),
    #[error("Playback error: {0}")]
    PlaybackError(String),
}

/// Reference to audio bytes held in a [`BlobStore`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BlobHandle {
    id: u64,
}

impl BlobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
struct BlobTable {
    next_id: u64,
    blobs: HashMap<u64, Arc<[u8]>>,
}

/// In-memory store of audio bytes addressed by handle
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    inner: Arc<Mutex<BlobTable>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, BlobTable> {
        // The table stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, bytes: Vec<u8>) -> BlobHandle {
        let mut table = self.table();
        table.next_id += 1;
        let id = table.next_id;
        table.blobs.insert(id, Arc::from(bytes));
        log::debug!("Created audio blob {} ({} live)", id, table.blobs.len());
        BlobHandle { id }
    }

    pub fn get(&self, handle: &BlobHandle) -> Option<Arc<[u8]>> {
        self.table().blobs.get(&handle.id).cloned()
    }

    /// Release the bytes behind a handle. Returns false if already released.
    pub fn revoke(&self, handle: &BlobHandle) -> bool {
        let mut table = self.table();
        let removed = table.blobs.remove(&handle.id).is_some();
        if removed {
            log::debug!("Revoked audio blob {} ({} live)", handle.id, table.blobs.len());
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.table().blobs.len()
    }
}

/// Generated audio: its handle plus the player bound to it
pub struct AudioResource {
    handle: BlobHandle,
    player: Box<dyn Player>,
}

impl AudioResource {
    pub fn new(handle: BlobHandle, player: Box<dyn Player>) -> Self {
        Self { handle, player }
    }

    pub fn handle(&self) -> &BlobHandle {
        &self.handle
    }

    pub fn player_mut(&mut self) -> &mut dyn Player {
        self.player.as_mut()
    }
}

/// Owner of the one live [`AudioResource`]
pub struct AudioSlot {
    store: BlobStore,
    current: Option<AudioResource>,
}

impl AudioSlot {
    pub fn new(store: BlobStore) -> Self {
        Self { store, current: None }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn current(&self) -> Option<&AudioResource> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AudioResource> {
        self.current.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Stop the current player and revoke its handle. Returns true if a
    /// resource was live.
    pub fn release(&mut self) -> bool {
        let Some(mut resource) = self.current.take() else {
            return false;
        };
        resource.player.pause();
        // Player goes first so nothing reads the bytes after revocation
        drop(resource.player);
        self.store.revoke(&resource.handle);
        true
    }

    /// Release whatever is live, then install `resource`
    pub fn replace(&mut self, resource: AudioResource) {
        self.release();
        self.current = Some(resource);
    }

    /// Bytes of the current audio, if any
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.current.as_ref().and_then(|r| self.store.get(&r.handle))
    }
}

impl Drop for AudioSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Duration in seconds of a PCM WAV file, read from its header.
///
/// Streaming servers sometimes write a placeholder data size; the bytes
/// actually present are used in that case.
pub fn wav_duration(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().ok()?) as usize;
        let body = offset + 8;

        match id {
            b"fmt " => {
                if body + 12 > bytes.len() {
                    return None;
                }
                byte_rate = Some(u32::from_le_bytes(bytes[body + 8..body + 12].try_into().ok()?));
            }
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)?;
                let available = bytes.len() - body;
                let data_len = if size == 0 || size > available { available } else { size };
                return Some(data_len as f64 / rate as f64);
            }
            _ => {}
        }

        // Chunks are padded to even sizes
        offset = body.checked_add(size)?.checked_add(size % 2)?;
    }
    None
}
