//! Counters shared between the background tasks and the client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A point-in-time health report for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDiagnostics {
    pub running: bool,
    pub gateway_count: usize,
    /// Gateways silent for longer than the liveness window
    pub stale_gateway_count: usize,
    pub bulb_count: usize,
    pub visible_bulb_count: usize,
    pub subscriber_count: usize,
    /// Events discarded because a subscriber fell behind
    pub dropped_events: u64,
    pub datagrams_received: u64,
    /// Datagrams that failed to decode
    pub datagrams_rejected: u64,
    pub failed_sends: u64,
    pub time_since_last_broadcast: Option<f64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    running: AtomicBool,
    received: AtomicU64,
    rejected: AtomicU64,
    failed_sends: AtomicU64,
    last_broadcast: Mutex<Option<Instant>>,
    last_error: Mutex<Option<String>>,
}

impl Telemetry {
    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn datagram_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn datagram_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn broadcast_sent(&self) {
        *self
            .last_broadcast
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    pub(crate) fn send_failed(&self, err: &impl ToString) {
        self.failed_sends.fetch_add(1, Ordering::Relaxed);
        self.record_error(err);
    }

    pub(crate) fn record_error(&self, err: &impl ToString) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    /// Fill in the task-side fields of a report.
    pub(crate) fn fill(&self, report: &mut ClientDiagnostics) {
        report.running = self.is_running();
        report.datagrams_received = self.received.load(Ordering::Relaxed);
        report.datagrams_rejected = self.rejected.load(Ordering::Relaxed);
        report.failed_sends = self.failed_sends.load(Ordering::Relaxed);
        report.time_since_last_broadcast = self
            .last_broadcast
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed().as_secs_f64());
        report.last_error = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
    }
}
