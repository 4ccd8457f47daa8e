//! Invocation records
//!
//! The dispatcher's view of one capability call, from receipt to terminal
//! state. Terminal records feed the telemetry pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;
use crate::error::ErrorKind;

/// Terminal outcome of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Handler returned a value
    Ok,
    /// Handler returned an error
    Failed,
    /// Deadline expired before completion
    TimedOut,
    /// Cancelled by the caller, session close, or shutdown
    Cancelled,
    /// Authorization check failed before the handler ran
    Denied,
}

impl InvocationOutcome {
    /// Stable snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Denied => "denied",
        }
    }
}

/// Billing attribution for one upstream model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    /// Input tokens consumed
    pub input_tokens: u64,
    /// Output tokens produced
    pub output_tokens: u64,
    /// Model identifier
    pub model: String,
    /// Estimated cost in USD
    pub cost_estimate_usd: f64,
}

/// Record of one capability invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Request correlation ID
    pub request_id: String,
    /// Session the request arrived on
    pub session_id: String,
    /// Caller identity
    pub subject_id: String,
    /// Capability kind
    pub kind: CapabilityKind,
    /// Capability name
    pub name: String,
    /// Invocation arguments as received
    pub arguments: serde_json::Value,
    /// Dispatch entry time
    pub started_at: DateTime<Utc>,
    /// Terminal time, once reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal outcome, once reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<InvocationOutcome>,
    /// Error kind when the outcome is not ok
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Billing attribution accumulated during the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingInfo>,
}

impl Invocation {
    /// Latency in milliseconds, once terminal
    pub fn latency_ms(&self) -> Option<u64> {
        self.finished_at.map(|finished| {
            (finished - self.started_at)
                .num_milliseconds()
                .max(0) as u64
        })
    }
}
