//! Session client
//!
//! Wires one participant's state, orchestrators and background tasks
//! together. A client is inert until [`SessionClient::join`] (or
//! [`SessionClient::start`] with a custom transport) hands it an inbox.

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rmh_common::events::{ClientEvent, EventBus};
use rmh_common::{ConfigChange, ConfigStore, IdentityRegistry, UserId};

use crate::dispatch::RemoteTransport;
use crate::hand::HandOrchestrator;
use crate::hub::{Inbox, LocalHub};
use crate::popout::{BusOverlayFactory, OverlayFactory};
use crate::router::MessageRouter;
use crate::sound::{AudioOutput, BusAudioOutput};
use crate::state::ClientState;
use crate::xcard::SafetyOrchestrator;

/// Default event bus capacity per client
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

pub struct SessionClientBuilder {
    local_id: UserId,
    identity: Arc<dyn IdentityRegistry>,
    config: Arc<dyn ConfigStore>,
    event_capacity: usize,
    audio: Option<Arc<dyn AudioOutput>>,
    overlays: Option<Arc<dyn OverlayFactory>>,
}

impl SessionClientBuilder {
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Replace the default bus-backed audio output
    pub fn audio_output(mut self, audio: Arc<dyn AudioOutput>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Replace the default bus-backed overlay factory
    pub fn overlay_factory(mut self, overlays: Arc<dyn OverlayFactory>) -> Self {
        self.overlays = Some(overlays);
        self
    }

    pub fn build(self) -> SessionClient {
        let events = EventBus::new(self.event_capacity);
        let audio = self
            .audio
            .unwrap_or_else(|| Arc::new(BusAudioOutput::new(events.clone())));
        let overlays = self
            .overlays
            .unwrap_or_else(|| Arc::new(BusOverlayFactory::new(events.clone())));

        let state = Arc::new(ClientState::new(
            self.local_id,
            self.identity,
            self.config,
            events,
            audio,
            overlays,
        ));

        SessionClient {
            hand: HandOrchestrator::new(state.clone()),
            safety: SafetyOrchestrator::new(state.clone()),
            state,
            hub: None,
            tasks: Vec::new(),
        }
    }
}

/// One participant's client
pub struct SessionClient {
    state: Arc<ClientState>,
    hand: HandOrchestrator,
    safety: SafetyOrchestrator,
    hub: Option<Arc<LocalHub>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionClient {
    pub fn builder(
        local_id: impl Into<UserId>,
        identity: Arc<dyn IdentityRegistry>,
        config: Arc<dyn ConfigStore>,
    ) -> SessionClientBuilder {
        SessionClientBuilder {
            local_id: local_id.into(),
            identity,
            config,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            audio: None,
            overlays: None,
        }
    }

    pub fn local_id(&self) -> &UserId {
        &self.state.local_id
    }

    pub fn hand(&self) -> &HandOrchestrator {
        &self.hand
    }

    pub fn safety(&self) -> &SafetyOrchestrator {
        &self.safety
    }

    pub fn state(&self) -> &Arc<ClientState> {
        &self.state
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.state.events.subscribe()
    }

    /// Install the transport used for outbound messages
    pub fn attach_transport(&self, transport: Arc<dyn RemoteTransport>) {
        self.state.dispatcher.attach(transport);
    }

    /// Connect to an in-process hub and start processing
    pub fn join(&mut self, hub: &Arc<LocalHub>) {
        let inbox = hub.connect(&self.state.local_id);
        self.attach_transport(hub.clone());
        self.hub = Some(hub.clone());
        self.start(inbox);
    }

    /// Spawn the inbox listener and the configuration watcher
    pub fn start(&mut self, inbox: Inbox) {
        self.abort_tasks();

        let router = MessageRouter::new(self.state.clone());
        self.tasks.push(tokio::spawn(run_listener(router, inbox)));

        let changes = self.state.config.subscribe();
        self.tasks
            .push(tokio::spawn(run_config_watcher(self.state.clone(), changes)));

        info!(user_id = %self.state.local_id, "Client started");
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Leave the session
    ///
    /// Stops background tasks, silences any sound this client started and
    /// drops local indicators.
    pub async fn shutdown(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.disconnect(&self.state.local_id);
        }
        self.state.dispatcher.detach();
        self.abort_tasks();
        self.state.sound.stop().await;
        self.state.indicators.clear_all();
        info!(user_id = %self.state.local_id, "Client stopped");
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.disconnect(&self.state.local_id);
        }
        self.abort_tasks();
    }
}

/// Handle inbound messages one at a time, in arrival order
async fn run_listener(router: MessageRouter, mut inbox: Inbox) {
    while let Some(message) = inbox.recv().await {
        let kind = message.kind();
        if let Err(e) = router.handle(message).await {
            warn!(kind, error = %e, "Message handler failed");
        }
    }
    debug!("Inbox closed, listener stopped");
}

/// React to replicated configuration changes
async fn run_config_watcher(state: Arc<ClientState>, mut changes: broadcast::Receiver<ConfigChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if change.leaves_toggle_mode() {
                    info!("Raise control switched to momentary, clearing indicators");
                    state.indicators.clear_all();
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Config watcher lagged, re-reading hand settings");
                match state.config.hand().await {
                    Ok(hand) if !hand.is_toggle => state.indicators.clear_all(),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to read hand settings"),
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("Config store closed, watcher stopped");
}
