//! Scope resolver and remote transport seam
//!
//! All cross-client traffic goes through [`Dispatcher`]; orchestration code
//! never calls the transport directly.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use rmh_common::{IdentityRegistry, Scope, SignalMessage, UserId};

use crate::Result;

/// Remote invocation transport
///
/// Every call is fire-and-forget and at most once: delivery to a disconnected
/// peer is silently dropped, nothing is acknowledged, and there is no ordering
/// across peers. Broadcasts include the sender's own client.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Deliver to every connected client
    async fn broadcast_to_all(&self, message: SignalMessage) -> Result<()>;

    /// Deliver to every connected privileged client
    async fn broadcast_to_privileged(&self, message: SignalMessage) -> Result<()>;

    /// Deliver to one client
    async fn send_to_user(&self, target: &UserId, message: SignalMessage) -> Result<()>;
}

/// Maps audience scopes onto transport calls
pub struct Dispatcher {
    local_id: UserId,
    identity: Arc<dyn IdentityRegistry>,
    /// `None` until the host session hands over a transport
    transport: RwLock<Option<Arc<dyn RemoteTransport>>>,
}

impl Dispatcher {
    pub fn new(local_id: UserId, identity: Arc<dyn IdentityRegistry>) -> Self {
        Self {
            local_id,
            identity,
            transport: RwLock::new(None),
        }
    }

    /// Install the transport once the host session is ready
    pub fn attach(&self, transport: Arc<dyn RemoteTransport>) {
        *self.transport.write().unwrap_or_else(|e| e.into_inner()) = Some(transport);
    }

    pub fn detach(&self) {
        *self.transport.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn local_id(&self) -> &UserId {
        &self.local_id
    }

    fn transport(&self, message: &SignalMessage) -> Option<Arc<dyn RemoteTransport>> {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if transport.is_none() {
            warn!(
                kind = message.kind(),
                "Transport not initialized, cannot dispatch"
            );
        }
        transport
    }

    /// Send `message` to the audience described by `scope`
    ///
    /// `PrivilegedOnly` goes to every connected privileged client. A
    /// non-privileged caller additionally gets a separate copy so the
    /// initiator always sees their own action. Returns false when nothing
    /// could be sent.
    pub async fn dispatch(&self, scope: Scope, message: SignalMessage) -> bool {
        let Some(transport) = self.transport(&message) else {
            return false;
        };
        let kind = message.kind();
        debug!(kind, scope = ?scope, "Dispatching");

        match scope {
            Scope::Everyone => report(kind, transport.broadcast_to_all(message).await),
            Scope::PrivilegedOnly => {
                let local_is_privileged = self
                    .identity
                    .get_user(&self.local_id)
                    .is_some_and(|user| user.is_privileged);

                if local_is_privileged {
                    report(kind, transport.broadcast_to_privileged(message).await)
                } else {
                    let privileged =
                        report(kind, transport.broadcast_to_privileged(message.clone()).await);
                    let own = report(
                        kind,
                        transport.send_to_user(&self.local_id, message).await,
                    );
                    privileged && own
                }
            }
        }
    }

    /// Send to every connected client
    pub async fn broadcast(&self, message: SignalMessage) -> bool {
        self.dispatch(Scope::Everyone, message).await
    }

    /// Send to one client
    pub async fn send_to(&self, target: &UserId, message: SignalMessage) -> bool {
        let Some(transport) = self.transport(&message) else {
            return false;
        };
        let kind = message.kind();
        debug!(kind, target = %target, "Sending");
        report(kind, transport.send_to_user(target, message).await)
    }
}

fn report(kind: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(kind, error = %e, "Remote dispatch failed");
            false
        }
    }
}
