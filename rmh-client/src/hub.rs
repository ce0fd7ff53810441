//! In-process session hub
//!
//! Stands in for the host session's socket layer: each connected client owns
//! an unbounded inbox, and the hub routes broadcasts and direct sends into
//! those inboxes. Connection state is mirrored into the shared roster so the
//! privileged audience always reflects who is actually connected.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use rmh_common::{IdentityRegistry, SessionRoster, SignalMessage, UserId};

use crate::dispatch::RemoteTransport;
use crate::Result;

/// Inbound message queue for one client
pub type Inbox = mpsc::UnboundedReceiver<SignalMessage>;

pub struct LocalHub {
    roster: Arc<SessionRoster>,
    peers: RwLock<HashMap<UserId, mpsc::UnboundedSender<SignalMessage>>>,
}

impl LocalHub {
    pub fn new(roster: Arc<SessionRoster>) -> Self {
        Self {
            roster,
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn roster(&self) -> &Arc<SessionRoster> {
        &self.roster
    }

    /// Register a client and hand back its inbox
    ///
    /// Reconnecting replaces the previous inbox; the old receiver sees its
    /// channel close.
    pub fn connect(&self, user_id: &UserId) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.clone(), tx);
        self.roster.set_active(user_id, true);
        debug!(user_id = %user_id, "Client connected");
        rx
    }

    pub fn disconnect(&self, user_id: &UserId) {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
        self.roster.set_active(user_id, false);
        if removed.is_some() {
            debug!(user_id = %user_id, "Client disconnected");
        }
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.peers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(user_id)
    }

    pub fn connected_count(&self) -> usize {
        self.peers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn deliver(&self, target: &UserId, message: SignalMessage) {
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        match peers.get(target) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    trace!(target = %target, "Inbox closed, message dropped");
                }
            }
            None => trace!(target = %target, "Peer not connected, message dropped"),
        }
    }

    fn deliver_where(&self, message: SignalMessage, include: impl Fn(&UserId) -> bool) {
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        for (user_id, tx) in peers.iter().filter(|(id, _)| include(id)) {
            if tx.send(message.clone()).is_err() {
                trace!(target = %user_id, "Inbox closed, message dropped");
            }
        }
    }
}

#[async_trait]
impl RemoteTransport for LocalHub {
    async fn broadcast_to_all(&self, message: SignalMessage) -> Result<()> {
        self.deliver_where(message, |_| true);
        Ok(())
    }

    async fn broadcast_to_privileged(&self, message: SignalMessage) -> Result<()> {
        let privileged = self.roster.list_active_privileged_ids();
        self.deliver_where(message, |id| privileged.contains(id));
        Ok(())
    }

    async fn send_to_user(&self, target: &UserId, message: SignalMessage) -> Result<()> {
        self.deliver(target, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmh_common::UserInfo;

    fn hub() -> LocalHub {
        let roster = Arc::new(SessionRoster::new());
        roster.upsert(UserInfo::new("gm", "Game Master").privileged());
        roster.upsert(UserInfo::new("p1", "Player One"));
        LocalHub::new(roster)
    }

    #[tokio::test]
    async fn test_privileged_broadcast_skips_players() {
        let hub = hub();
        let mut gm = hub.connect(&UserId::from("gm"));
        let mut p1 = hub.connect(&UserId::from("p1"));

        hub.broadcast_to_privileged(SignalMessage::ClearIndicators)
            .await
            .unwrap();

        assert_eq!(gm.try_recv().unwrap(), SignalMessage::ClearIndicators);
        assert!(p1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnected_peer_is_dropped_silently() {
        let hub = hub();
        let gm_id = UserId::from("gm");
        let _inbox = hub.connect(&gm_id);
        hub.disconnect(&gm_id);

        assert!(hub.roster().list_active_privileged_ids().is_empty());
        hub.send_to_user(&gm_id, SignalMessage::ClearIndicators)
            .await
            .unwrap();
        hub.broadcast_to_all(SignalMessage::ClearIndicators)
            .await
            .unwrap();
        assert_eq!(hub.connected_count(), 0);
    }
}
