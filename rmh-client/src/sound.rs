//! Sound channel
//!
//! At most one notification sound plays per client. Starting a new sound
//! stops the tracked one first; a failed stop is logged and never blocks the
//! new sound.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use rmh_common::events::{ClientEvent, EventBus};
use rmh_common::{SignalMessage, SoundRequest, UserId};

use crate::dispatch::Dispatcher;
use crate::Result;

/// A playing (or finished) local sound
#[async_trait]
pub trait SoundHandle: Send + Sync {
    fn id(&self) -> Uuid;

    fn is_playing(&self) -> bool;

    /// Stop playback; stopping a finished sound is a no-op
    async fn stop(&self) -> Result<()>;
}

/// Local audio playback primitive
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn play(&self, request: &SoundRequest) -> Result<Arc<dyn SoundHandle>>;
}

/// Who hears a sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client
    All,
    /// Only these clients
    Users(BTreeSet<UserId>),
}

impl Audience {
    pub fn includes(&self, id: &UserId) -> bool {
        match self {
            Audience::All => true,
            Audience::Users(ids) => ids.contains(id),
        }
    }
}

/// Per-client sound slot
pub struct SoundChannel {
    local_id: UserId,
    output: Arc<dyn AudioOutput>,
    dispatcher: Arc<Dispatcher>,
    /// Held across stop/start so replacements never interleave
    active: Mutex<Option<Arc<dyn SoundHandle>>>,
}

impl SoundChannel {
    pub fn new(local_id: UserId, output: Arc<dyn AudioOutput>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            local_id,
            output,
            dispatcher,
            active: Mutex::new(None),
        }
    }

    /// Play `request` for `audience`, replacing this client's current sound
    ///
    /// Other clients in the audience receive a `PlaySound` message and play it
    /// through their own channel. Returns the local sound id when the audience
    /// includes this client.
    pub async fn play_replacing(
        &self,
        request: SoundRequest,
        audience: Audience,
    ) -> Result<Option<Uuid>> {
        let mut active = self.active.lock().await;
        self.stop_tracked(&mut active).await;

        self.send_remote(&request, &audience).await;

        if !audience.includes(&self.local_id) {
            return Ok(None);
        }
        self.start(&mut active, &request).await.map(Some)
    }

    /// Play a sound requested by another client, local output only
    pub async fn play_local(&self, request: SoundRequest) -> Result<Uuid> {
        let mut active = self.active.lock().await;
        self.stop_tracked(&mut active).await;
        self.start(&mut active, &request).await
    }

    /// Stop the tracked sound, if any
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        self.stop_tracked(&mut active).await;
    }

    /// Id of the tracked sound, if one is still playing
    pub async fn active_sound(&self) -> Option<Uuid> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|handle| handle.is_playing())
            .map(|handle| handle.id())
    }

    async fn stop_tracked(&self, active: &mut Option<Arc<dyn SoundHandle>>) {
        if let Some(previous) = active.take() {
            if previous.is_playing() {
                if let Err(e) = previous.stop().await {
                    warn!(sound_id = %previous.id(), error = %e, "Error stopping previous sound");
                }
            }
        }
    }

    async fn start(
        &self,
        active: &mut Option<Arc<dyn SoundHandle>>,
        request: &SoundRequest,
    ) -> Result<Uuid> {
        let handle = self.output.play(request).await?;
        let id = handle.id();
        debug!(sound_id = %id, src = %request.src, "Sound started");
        *active = Some(handle);
        Ok(id)
    }

    async fn send_remote(&self, request: &SoundRequest, audience: &Audience) {
        let message = SignalMessage::PlaySound {
            origin: self.local_id.clone(),
            request: request.clone(),
        };
        match audience {
            // Our own echo is ignored on receipt
            Audience::All => {
                self.dispatcher.broadcast(message).await;
            }
            Audience::Users(ids) => {
                for id in ids.iter().filter(|id| **id != self.local_id) {
                    self.dispatcher.send_to(id, message.clone()).await;
                }
            }
        }
    }
}

/// Sound handle that reports through the client event bus
pub struct BusSoundHandle {
    id: Uuid,
    playing: AtomicBool,
    events: EventBus,
}

#[async_trait]
impl SoundHandle for BusSoundHandle {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> Result<()> {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.events.emit_lossy(ClientEvent::SoundStopped {
                sound_id: self.id,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }
}

/// Audio output that publishes `SoundStarted`/`SoundStopped` for a renderer
#[derive(Clone)]
pub struct BusAudioOutput {
    events: EventBus,
}

impl BusAudioOutput {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl AudioOutput for BusAudioOutput {
    async fn play(&self, request: &SoundRequest) -> Result<Arc<dyn SoundHandle>> {
        let handle = BusSoundHandle {
            id: Uuid::new_v4(),
            playing: AtomicBool::new(true),
            events: self.events.clone(),
        };
        self.events.emit_lossy(ClientEvent::SoundStarted {
            sound_id: handle.id,
            src: request.src.clone(),
            volume: request.volume.percent(),
            timestamp: chrono::Utc::now(),
        });
        Ok(Arc::new(handle))
    }
}
