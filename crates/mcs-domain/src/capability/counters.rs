//! Per-capability invocation counters
//!
//! Lock-free counters updated by the dispatcher on every terminal state.
//! The handle survives `replace`, so counts are continuous across hot swaps.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters attached to a registered capability
#[derive(Debug, Default)]
pub struct CapabilityCounters {
    invocations: AtomicU64,
    failures: AtomicU64,
    cumulative_latency_ms: AtomicU64,
    last_invoked_unix_ms: AtomicU64,
}

impl CapabilityCounters {
    /// Record a completed invocation
    pub fn record(&self, success: bool, latency_ms: u64, now_unix_ms: u64) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.cumulative_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.last_invoked_unix_ms
            .store(now_unix_ms, Ordering::Relaxed);
    }

    /// Total invocations observed
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Total failed invocations observed
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> CounterSnapshot {
        let last = self.last_invoked_unix_ms.load(Ordering::Relaxed);
        CounterSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cumulative_latency_ms: self.cumulative_latency_ms.load(Ordering::Relaxed),
            last_invoked_unix_ms: if last == 0 { None } else { Some(last) },
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Total invocations
    pub invocations: u64,
    /// Total failures
    pub failures: u64,
    /// Sum of invocation latencies in milliseconds
    pub cumulative_latency_ms: u64,
    /// Unix milliseconds of the most recent invocation, if any
    pub last_invoked_unix_ms: Option<u64>,
}
