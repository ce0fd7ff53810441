//! Transient indicator registry
//!
//! Tracks at most one hand-raised indicator per participant:
//!
//! ```text
//! toggle:     absent -> shown(persistent) ------------------> fading -> absent
//!                                              hide()
//! momentary:  absent -> shown(timed) --[fade+wave+hold]--> fading -> absent
//!                                                  [fade]
//! ```
//!
//! Every indicator instance carries a generation number. Timers only act on
//! the instance they were scheduled for, so a `show` that restarts an
//! indicator can never be undone by the previous instance's timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

use rmh_common::events::{ClientEvent, EventBus, IndicatorPhase};
use rmh_common::settings::IndicatorMode;
use rmh_common::timing::{expiry_delay, FADE_DURATION};
use rmh_common::UserId;

struct Entry {
    generation: u64,
    mode: IndicatorMode,
    phase: IndicatorPhase,
    /// Pending expiry or removal timer
    timer: Option<AbortHandle>,
}

impl Entry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<UserId, Entry>,
    next_generation: u64,
}

/// Per-client indicator state with cancellable auto-expiry
pub struct IndicatorRegistry {
    inner: Arc<Mutex<Inner>>,
    events: EventBus,
}

impl IndicatorRegistry {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Show the indicator for `user_id`, restarting it if one is live
    ///
    /// Timed indicators fade out on their own; persistent ones wait for
    /// [`hide`](Self::hide).
    pub fn show(&self, user_id: &UserId, mode: IndicatorMode) {
        let mut inner = self.lock();

        if let Some(mut previous) = inner.entries.remove(user_id) {
            previous.cancel_timer();
            debug!(user_id = %user_id, "Restarting indicator");
            emit_removed(&self.events, user_id);
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;

        let timer = mode.hold().map(|hold| {
            spawn_expiry(
                self.inner.clone(),
                self.events.clone(),
                user_id.clone(),
                generation,
                expiry_delay(hold),
            )
        });

        inner.entries.insert(
            user_id.clone(),
            Entry {
                generation,
                mode,
                phase: IndicatorPhase::Shown,
                timer,
            },
        );
        drop(inner);

        debug!(user_id = %user_id, mode = ?mode, "Indicator shown");
        self.events.emit_lossy(ClientEvent::IndicatorShown {
            user_id: user_id.clone(),
            mode,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Fade out and remove the indicator for `user_id`
    ///
    /// No-op when there is no indicator or it is already fading.
    pub fn hide(&self, user_id: &UserId) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(user_id) else {
            return;
        };
        if entry.phase == IndicatorPhase::Fading {
            return;
        }

        entry.cancel_timer();
        entry.phase = IndicatorPhase::Fading;
        entry.timer = Some(spawn_removal(
            self.inner.clone(),
            self.events.clone(),
            user_id.clone(),
            entry.generation,
        ));
        drop(inner);

        debug!(user_id = %user_id, "Indicator hidden");
        emit_fading(&self.events, user_id);
    }

    /// Hide every shown indicator regardless of mode
    pub fn clear_all(&self) {
        let shown: Vec<UserId> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.phase == IndicatorPhase::Shown)
            .map(|(id, _)| id.clone())
            .collect();

        debug!(count = shown.len(), "Clearing all indicators");
        for user_id in shown {
            self.hide(&user_id);
        }
    }

    /// Visible phase of the indicator for `user_id`
    pub fn phase(&self, user_id: &UserId) -> Option<IndicatorPhase> {
        self.lock().entries.get(user_id).map(|entry| entry.phase)
    }

    /// Lifetime the live indicator was created with
    pub fn mode(&self, user_id: &UserId) -> Option<IndicatorMode> {
        self.lock().entries.get(user_id).map(|entry| entry.mode)
    }

    /// An indicator (shown or fading) exists for `user_id`
    pub fn is_live(&self, user_id: &UserId) -> bool {
        self.lock().entries.contains_key(user_id)
    }

    /// Number of live indicators
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of timers that have not fired yet
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.timer.as_ref().is_some_and(|t| !t.is_finished()))
            .count()
    }
}

impl Drop for IndicatorRegistry {
    fn drop(&mut self) {
        let mut inner = self.lock();
        for entry in inner.entries.values_mut() {
            entry.cancel_timer();
        }
    }
}

/// Fade a timed indicator after `delay`, then remove it
fn spawn_expiry(
    inner: Arc<Mutex<Inner>>,
    events: EventBus,
    user_id: UserId,
    generation: u64,
    delay: Duration,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        {
            let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
            match guard.entries.get_mut(&user_id) {
                Some(entry)
                    if entry.generation == generation
                        && entry.phase == IndicatorPhase::Shown =>
                {
                    entry.phase = IndicatorPhase::Fading;
                }
                _ => return,
            }
        }
        debug!(user_id = %user_id, "Indicator expired");
        emit_fading(&events, &user_id);

        tokio::time::sleep(FADE_DURATION).await;
        remove_if_current(&inner, &events, &user_id, generation);
    })
    .abort_handle()
}

/// Remove a fading indicator once the fade-out finishes
fn spawn_removal(
    inner: Arc<Mutex<Inner>>,
    events: EventBus,
    user_id: UserId,
    generation: u64,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(FADE_DURATION).await;
        remove_if_current(&inner, &events, &user_id, generation);
    })
    .abort_handle()
}

fn remove_if_current(inner: &Mutex<Inner>, events: &EventBus, user_id: &UserId, generation: u64) {
    let removed = {
        let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
        let current = guard
            .entries
            .get(user_id)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            guard.entries.remove(user_id);
        }
        current
    };
    if removed {
        emit_removed(events, user_id);
    }
}

fn emit_fading(events: &EventBus, user_id: &UserId) {
    events.emit_lossy(ClientEvent::IndicatorFading {
        user_id: user_id.clone(),
        timestamp: chrono::Utc::now(),
    });
}

fn emit_removed(events: &EventBus, user_id: &UserId) {
    events.emit_lossy(ClientEvent::IndicatorRemoved {
        user_id: user_id.clone(),
        timestamp: chrono::Utc::now(),
    });
}
