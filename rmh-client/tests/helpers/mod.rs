//! Shared session fixture for integration tests
//!
//! Three participants on one in-process hub sharing one in-memory store:
//! `gm` (privileged), `alice` and `bob`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use rmh_client::{LocalHub, SessionClient};
use rmh_common::events::ClientEvent;
use rmh_common::settings::HoldTime;
use rmh_common::store::MemoryConfigStore;
use rmh_common::{HandConfig, SessionRoster, UserId, UserInfo, XCardConfig};

pub const GM: &str = "gm";
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub const EVERYONE: [&str; 3] = [GM, ALICE, BOB];

pub fn uid(id: &str) -> UserId {
    UserId::from(id)
}

pub struct TestSession {
    pub roster: Arc<SessionRoster>,
    pub hub: Arc<LocalHub>,
    pub store: Arc<MemoryConfigStore>,
    clients: HashMap<String, SessionClient>,
    events: HashMap<String, broadcast::Receiver<ClientEvent>>,
}

impl TestSession {
    /// Build and connect all three clients; must run inside a tokio runtime
    pub fn start(hand: HandConfig, xcard: XCardConfig, notification_timeout: u32) -> Self {
        let roster = Arc::new(SessionRoster::new());
        roster.upsert(
            UserInfo::new(GM, "Game Master")
                .with_avatar("avatars/gm.png")
                .privileged(),
        );
        roster.upsert(UserInfo::new(ALICE, "Alice").with_avatar("avatars/alice.png"));
        roster.upsert(UserInfo::new(BOB, "Bob"));

        let hub = Arc::new(LocalHub::new(roster.clone()));
        let store = Arc::new(MemoryConfigStore::with_values(
            hand,
            xcard,
            notification_timeout,
        ));

        let mut clients = HashMap::new();
        let mut events = HashMap::new();
        for id in EVERYONE {
            let mut client = SessionClient::builder(id, roster.clone(), store.clone()).build();
            events.insert(id.to_string(), client.subscribe_events());
            client.join(&hub);
            clients.insert(id.to_string(), client);
        }

        Self {
            roster,
            hub,
            store,
            clients,
            events,
        }
    }

    pub fn with_defaults() -> Self {
        Self::start(HandConfig::default(), XCardConfig::default(), 0)
    }

    pub fn client(&self, id: &str) -> &SessionClient {
        &self.clients[id]
    }

    pub fn client_mut(&mut self, id: &str) -> &mut SessionClient {
        self.clients.get_mut(id).expect("unknown test participant")
    }

    /// Everything published on `id`'s event bus since the last call
    pub fn events(&mut self, id: &str) -> Vec<ClientEvent> {
        let rx = self.events.get_mut(id).expect("unknown test participant");
        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Drop pending events on every client
    pub fn clear_events(&mut self) {
        for id in EVERYONE {
            self.events(id);
        }
    }
}

/// Let listener tasks drain their inboxes without moving the clock
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

pub fn count<F>(events: &[ClientEvent], predicate: F) -> usize
where
    F: Fn(&ClientEvent) -> bool,
{
    events.iter().filter(|event| predicate(event)).count()
}

pub fn momentary(hold_secs: u32) -> HandConfig {
    let mut hand = HandConfig::default();
    hand.is_toggle = false;
    hand.indicator.hold_time_seconds = HoldTime::new(hold_secs.into());
    hand
}
