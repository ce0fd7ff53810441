//! Signal outcomes
//!
//! Throttling, disabled features, unknown identities and refused requests are
//! ordinary results of a signal, not errors.

use futures::future::join_all;
use std::future::Future;
use tracing::warn;

use crate::Result;

/// What happened to a local signal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Channel handlers ran; see the report for per-channel results
    Dispatched(DispatchReport),
    /// Rejected by the debounce gate
    Throttled,
    /// Feature switched off in the session configuration
    Disabled,
    /// The acting participant is unknown to the host registry
    IdentityMissing,
    /// The caller may not perform this action
    NotPermitted,
}

impl SignalOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, SignalOutcome::Dispatched(_))
    }

    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            SignalOutcome::Dispatched(report) => Some(report),
            _ => None,
        }
    }
}

/// A channel handler that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: &'static str,
    pub reason: String,
}

/// Per-channel results of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub completed: Vec<&'static str>,
    pub failed: Vec<ChannelFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, channel: &'static str, result: Result<bool>) {
        match result {
            Ok(true) => self.completed.push(channel),
            Ok(false) => self.failed.push(ChannelFailure {
                channel,
                reason: "not dispatched".to_string(),
            }),
            Err(e) => {
                warn!(channel, error = %e, "Notification handler failed");
                self.failed.push(ChannelFailure {
                    channel,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Run channel handlers concurrently and collect every result
///
/// A failing handler never cancels its siblings. Each handler yields `true`
/// when its work was carried out, `false` when it was skipped (for example
/// because no transport is attached).
pub async fn fan_out<I, F>(handlers: I) -> DispatchReport
where
    I: IntoIterator<Item = (&'static str, F)>,
    F: Future<Output = Result<bool>>,
{
    let (channels, futures): (Vec<_>, Vec<_>) = handlers.into_iter().unzip();
    let results = join_all(futures).await;

    let mut report = DispatchReport::default();
    for (channel, result) in channels.into_iter().zip(results) {
        report.record(channel, result);
    }
    report
}
