//! Dispatcher
//!
//! Validates an invocation against its capability's schema, enforces the
//! security class, executes the handler with a deadline and cancellation
//! signal, and records telemetry. Per invocation the state machine is
//!
//! ```text
//! RECEIVED -> VALIDATED -> AUTHORIZED -> RUNNING
//!     -> (COMPLETED | FAILED | TIMED_OUT | CANCELLED)
//! ```
//!
//! Invocations are independent. A per-capability cap and a global cap bound
//! concurrency; excess invocations wait in a bounded queue and overflow
//! fails fast as `overloaded`. Handlers are resolved by value capture at
//! dispatch entry, so a concurrent replace never affects a running call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use mcs_domain::capability::{Capability, CapabilityKind, template};
use mcs_domain::constants::{
    DEFAULT_CANCEL_GRACE_MS, DEFAULT_GLOBAL_CONCURRENCY, DEFAULT_PER_CAPABILITY_CONCURRENCY,
    DEFAULT_TOOL_TIMEOUT_MS,
};
use mcs_domain::error::{Error, ErrorKind, Result};
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::{InvocationContext, ResourceBody};
use mcs_domain::value_objects::{Claims, Invocation, InvocationOutcome};

use crate::handlers::HandlerRegistry;
use crate::registry::CatalogRegistry;
use crate::telemetry::TelemetryPipeline;

/// Dispatcher tuning knobs
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Concurrent invocations allowed per capability
    pub per_capability_concurrency: usize,
    /// Concurrent invocations allowed process-wide
    pub global_concurrency: usize,
    /// Invocations allowed to wait for a slot before overload kicks in
    pub max_queued: usize,
    /// Default tool runtime cap when the tool declares none
    pub default_timeout: Duration,
    /// Grace window granted to a handler after cancellation
    pub cancel_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            per_capability_concurrency: DEFAULT_PER_CAPABILITY_CONCURRENCY,
            global_concurrency: DEFAULT_GLOBAL_CONCURRENCY,
            max_queued: 256,
            default_timeout: Duration::from_millis(DEFAULT_TOOL_TIMEOUT_MS),
            cancel_grace: Duration::from_millis(DEFAULT_CANCEL_GRACE_MS),
        }
    }
}

/// Correlation and deadline metadata for one request
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Request correlation ID
    pub request_id: String,
    /// Session correlation ID
    pub session_id: String,
    /// Caller-supplied deadline override
    pub deadline: Option<Duration>,
    /// Session-level cancellation parent; cancelled when the session closes
    pub parent_cancel: Option<CancellationToken>,
    /// Caller identity; filled from claims at dispatch entry when unset
    pub subject: Option<String>,
}

impl RequestMeta {
    /// Fresh metadata for a session, with a generated request ID
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            deadline: None,
            parent_cancel: None,
            subject: None,
        }
    }

    /// Set the request ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set a deadline override
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a session cancellation parent
    pub fn with_parent_cancel(mut self, token: CancellationToken) -> Self {
        self.parent_cancel = Some(token);
        self
    }
}

/// Terminal result of one invocation
#[derive(Debug)]
pub struct InvocationResult {
    /// Request correlation ID
    pub request_id: String,
    /// Terminal outcome
    pub outcome: InvocationOutcome,
    /// Handler value on success
    pub value: Option<Value>,
    /// Error on any non-ok outcome
    pub error: Option<Error>,
    /// Wall latency in milliseconds
    pub latency_ms: u64,
    /// Output failed its declared schema but was returned anyway
    pub output_schema_mismatch: bool,
}

impl InvocationResult {
    /// Collapse into a plain result, dropping the telemetry details
    pub fn into_value(self) -> Result<Value> {
        match self.outcome {
            InvocationOutcome::Ok => Ok(self.value.unwrap_or(Value::Null)),
            _ => Err(self
                .error
                .unwrap_or_else(|| Error::internal("invocation failed without an error"))),
        }
    }
}

/// Outcome of one handler execution attempt
enum ExecOutcome<T = Value> {
    Completed(T),
    Failed(Error),
    TimedOut,
    Cancelled,
}

impl<T> ExecOutcome<T> {
    /// Map the completed value, keeping other outcomes intact
    fn map<U>(self, f: impl FnOnce(T) -> U) -> ExecOutcome<U> {
        match self {
            Self::Completed(value) => ExecOutcome::Completed(f(value)),
            Self::Failed(e) => ExecOutcome::Failed(e),
            Self::TimedOut => ExecOutcome::TimedOut,
            Self::Cancelled => ExecOutcome::Cancelled,
        }
    }
}

/// Terminal invocation records retained for the admin surface
const RECENT_INVOCATIONS: usize = 128;

/// Invocation dispatcher
pub struct Dispatcher {
    registry: Arc<CatalogRegistry>,
    handlers: Arc<HandlerRegistry>,
    telemetry: TelemetryPipeline,
    config: DispatcherConfig,
    global_slots: Arc<Semaphore>,
    capability_slots: DashMap<String, Arc<Semaphore>>,
    queued: AtomicUsize,
    validators: DashMap<String, Arc<jsonschema::Validator>>,
    live: DashMap<String, CancellationToken>,
    recent: std::sync::RwLock<std::collections::VecDeque<Invocation>>,
}

impl Dispatcher {
    /// Create a dispatcher over the registry and handler registry
    pub fn new(
        registry: Arc<CatalogRegistry>,
        handlers: Arc<HandlerRegistry>,
        telemetry: TelemetryPipeline,
        config: DispatcherConfig,
    ) -> Self {
        let global_slots = Arc::new(Semaphore::new(config.global_concurrency));
        Self {
            registry,
            handlers,
            telemetry,
            config,
            global_slots,
            capability_slots: DashMap::new(),
            queued: AtomicUsize::new(0),
            validators: DashMap::new(),
            live: DashMap::new(),
            recent: std::sync::RwLock::new(std::collections::VecDeque::new()),
        }
    }

    /// Most recent terminal invocation records, newest first
    pub fn recent_invocations(&self, limit: usize) -> Vec<Invocation> {
        self.recent
            .read()
            .expect("recent lock poisoned")
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Cancel a live invocation by request ID
    ///
    /// Returns whether a matching invocation was found. The invocation
    /// reaches a terminal state within the grace window regardless of
    /// handler cooperation.
    pub fn cancel(&self, request_id: &str) -> bool {
        if let Some(token) = self.live.get(request_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Number of invocations currently waiting for a slot
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Invoke a tool through the full state machine
    pub async fn invoke_tool(
        &self,
        name: &str,
        arguments: Value,
        claims: &Claims,
        meta: RequestMeta,
    ) -> InvocationResult {
        let started = Instant::now();
        let meta = Self::with_subject(meta, claims);
        self.emit_received(&meta, CapabilityKind::Tool, name).await;

        // RECEIVED -> VALIDATED
        let capability = match self.registry.get(CapabilityKind::Tool, name) {
            Ok(capability) => capability,
            Err(e) => return self.finish(None, &meta, started, ExecOutcome::Failed(e), false).await,
        };
        let tool = match capability.as_tool() {
            Ok(tool) => tool.clone(),
            Err(e) => {
                return self
                    .finish(Some(&capability), &meta, started, ExecOutcome::Failed(e), false)
                    .await
            }
        };
        if let Err(e) = self.validate_arguments(&capability, &arguments) {
            return self
                .finish(Some(&capability), &meta, started, ExecOutcome::Failed(e), false)
                .await;
        }

        // VALIDATED -> AUTHORIZED
        if !capability.security_class.permits(claims) {
            let e = Error::denied(format!(
                "caller '{}' lacks the claims required by tool '{}'",
                claims.subject_label(),
                name
            ));
            return self
                .finish(Some(&capability), &meta, started, ExecOutcome::Failed(e), false)
                .await;
        }

        // AUTHORIZED -> RUNNING: resolve by value capture
        let handler = match self.handlers.resolve_handler(&tool.handler_ref) {
            Ok(handler) => handler,
            Err(e) => {
                let e = Error::internal(format!("unresolvable handler: {e}"));
                return self
                    .finish(Some(&capability), &meta, started, ExecOutcome::Failed(e), false)
                    .await;
            }
        };

        let timeout = self.effective_timeout(tool.max_runtime_ms, meta.deadline);
        let permits = match self.acquire_slots(&capability, timeout).await {
            Ok(permits) => permits,
            Err(e) => {
                return self
                    .finish(Some(&capability), &meta, started, ExecOutcome::Failed(e), false)
                    .await
            }
        };

        let ctx = self.context(&meta, claims, timeout);
        self.live.insert(meta.request_id.clone(), ctx.cancel.clone());

        let args_for_retry = arguments.clone();
        let run = {
            let handler = Arc::clone(&handler);
            let ctx = ctx.clone();
            tokio::spawn(async move { handler.invoke(&ctx, arguments).await })
        };
        let mut outcome = self.supervise(run, &ctx, timeout).await;

        // Idempotent tools get one retry on a transient handler failure,
        // within whatever deadline remains.
        if tool.idempotent {
            if let ExecOutcome::Failed(e) = &outcome {
                let remaining = ctx.remaining();
                if e.kind().is_transient() && !ctx.is_cancelled() && remaining > Duration::ZERO {
                    debug!(tool = name, error = %e, "retrying idempotent tool once");
                    let retry = {
                        let handler = Arc::clone(&handler);
                        let ctx = ctx.clone();
                        tokio::spawn(async move { handler.invoke(&ctx, args_for_retry).await })
                    };
                    outcome = self.supervise(retry, &ctx, remaining).await;
                }
            }
        }

        // Output schema is advisory: a mismatch is flagged, not failed
        let mut mismatch = false;
        if let (ExecOutcome::Completed(value), Some(schema)) = (&outcome, &tool.output_schema) {
            if let Ok(validator) = jsonschema::validator_for(schema) {
                if !validator.is_valid(value) {
                    mismatch = true;
                    warn!(tool = name, "tool output does not match its declared schema");
                }
            }
        }

        self.live.remove(&meta.request_id);
        drop(permits);
        self.finish(Some(&capability), &meta, started, outcome, mismatch)
            .await
    }

    /// Render a prompt capability with arguments
    pub async fn render_prompt(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
        claims: &Claims,
        meta: RequestMeta,
    ) -> Result<String> {
        let started = Instant::now();
        let meta = Self::with_subject(meta, claims);
        self.emit_received(&meta, CapabilityKind::Prompt, name).await;

        let rendered = self.render_prompt_inner(name, arguments, claims);
        let (capability, result) = match rendered {
            Ok((capability, text)) => (Some(capability), ExecOutcome::Completed(Value::String(text.clone()))),
            Err((capability, e)) => (capability, ExecOutcome::Failed(e)),
        };
        let outcome = self
            .finish(capability.as_deref(), &meta, started, result, false)
            .await;
        outcome.into_value().map(|value| match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    #[allow(clippy::type_complexity)]
    fn render_prompt_inner(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, Value>,
        claims: &Claims,
    ) -> std::result::Result<(Arc<Capability>, String), (Option<Arc<Capability>>, Error)> {
        let capability = self
            .registry
            .get(CapabilityKind::Prompt, name)
            .map_err(|e| (None, e))?;
        if !capability.security_class.permits(claims) {
            return Err((
                Some(Arc::clone(&capability)),
                Error::denied(format!(
                    "caller '{}' lacks the claims required by prompt '{name}'",
                    claims.subject_label()
                )),
            ));
        }
        let prompt = capability
            .as_prompt()
            .map_err(|e| (Some(Arc::clone(&capability)), e))?;
        let text = template::render(prompt, arguments)
            .map_err(|e| (Some(Arc::clone(&capability)), e))?;
        Ok((Arc::clone(&capability), text))
    }

    /// Read a resource capability by URI
    pub async fn read_resource(
        &self,
        uri: &str,
        claims: &Claims,
        meta: RequestMeta,
    ) -> std::result::Result<(Arc<Capability>, ResourceBody), Error> {
        let started = Instant::now();
        let meta = Self::with_subject(meta, claims);
        self.emit_received(&meta, CapabilityKind::Resource, uri).await;

        let capability = match self.find_resource(uri) {
            Ok(capability) => capability,
            Err(e) => return Err(self.fail_terminal(None, &meta, started, e).await),
        };
        if !capability.security_class.permits(claims) {
            let e = Error::denied(format!(
                "caller '{}' lacks the claims required by resource '{uri}'",
                claims.subject_label()
            ));
            return Err(self.fail_terminal(Some(&capability), &meta, started, e).await);
        }

        let resource = match capability.as_resource() {
            Ok(resource) => resource.clone(),
            Err(e) => return Err(self.fail_terminal(Some(&capability), &meta, started, e).await),
        };
        let reader = match self.handlers.resolve_reader(&resource.reader_ref) {
            Ok(reader) => reader,
            Err(e) => {
                let e = Error::internal(format!("unresolvable reader: {e}"));
                return Err(self.fail_terminal(Some(&capability), &meta, started, e).await);
            }
        };

        let timeout = self.effective_timeout(None, meta.deadline);
        let ctx = self.context(&meta, claims, timeout);
        self.live.insert(meta.request_id.clone(), ctx.cancel.clone());

        let uri_owned = uri.to_string();
        let run = {
            let reader = Arc::clone(&reader);
            let ctx = ctx.clone();
            tokio::spawn(async move { reader.read(&ctx, &uri_owned).await })
        };
        let outcome = self.supervise(run, &ctx, timeout).await;
        self.live.remove(&meta.request_id);

        let mut body = None;
        let summarized = outcome.map(|value: ResourceBody| {
            let summary = serde_json::json!({ "byte_size": value.bytes.len() });
            body = Some(value);
            summary
        });
        let result = self
            .finish(Some(&capability), &meta, started, summarized, false)
            .await;
        match result.into_value() {
            Ok(_) => {
                let body = body.ok_or_else(|| Error::internal("resource body missing"))?;
                Ok((capability, body))
            }
            Err(e) => Err(e),
        }
    }

    /// Reach a failed terminal state and hand back the reported error
    async fn fail_terminal(
        &self,
        capability: Option<&Capability>,
        meta: &RequestMeta,
        started: Instant,
        error: Error,
    ) -> Error {
        let result = self
            .finish(capability, meta, started, ExecOutcome::Failed(error), false)
            .await;
        result
            .error
            .unwrap_or_else(|| Error::internal("invocation failed without an error"))
    }

    /// Find a resource capability by URI
    fn find_resource(&self, uri: &str) -> Result<Arc<Capability>> {
        self.registry
            .list(Some(CapabilityKind::Resource), &Default::default())
            .into_iter()
            .find(|capability| {
                capability
                    .as_resource()
                    .map(|resource| resource.uri == uri)
                    .unwrap_or(false)
            })
            .ok_or_else(|| Error::not_found(format!("resource '{uri}'")))
    }

    /// Supervise a running handler against deadline and cancellation
    async fn supervise<T: Send + 'static>(
        &self,
        mut run: JoinHandle<Result<T>>,
        ctx: &InvocationContext,
        timeout: Duration,
    ) -> ExecOutcome<T> {
        let external_cancel = ctx.cancel.clone();
        tokio::select! {
            joined = &mut run => Self::map_join(joined),
            () = external_cancel.cancelled() => {
                self.await_grace(run, "cancellation").await;
                ExecOutcome::Cancelled
            }
            () = tokio::time::sleep(timeout) => {
                // Deadline reached: signal cancellation, then grant grace
                ctx.cancel.cancel();
                self.await_grace(run, "deadline").await;
                ExecOutcome::TimedOut
            }
        }
    }

    /// Wait out the grace window for a signalled handler
    ///
    /// A handler that ignores the signal past the grace window is
    /// abandoned and reported as a potential resource leak.
    async fn await_grace<T: Send + 'static>(&self, run: JoinHandle<Result<T>>, reason: &str) {
        match tokio::time::timeout(self.config.cancel_grace, run).await {
            Ok(_) => {}
            Err(_) => {
                warn!(
                    reason,
                    grace_ms = self.config.cancel_grace.as_millis() as u64,
                    "handler did not honor cancellation within grace; abandoning invocation (possible resource leak)"
                );
            }
        }
    }

    /// Map a join result onto an execution outcome
    fn map_join<T>(
        joined: std::result::Result<Result<T>, tokio::task::JoinError>,
    ) -> ExecOutcome<T> {
        match joined {
            Ok(Ok(value)) => ExecOutcome::Completed(value),
            Ok(Err(e)) => match e.kind() {
                ErrorKind::Cancelled => ExecOutcome::Cancelled,
                ErrorKind::TimedOut => ExecOutcome::TimedOut,
                _ => ExecOutcome::Failed(e),
            },
            Err(join_error) => ExecOutcome::Failed(Error::internal(format!(
                "handler task failed: {join_error}"
            ))),
        }
    }

    /// Stamp the caller identity onto the request metadata
    fn with_subject(mut meta: RequestMeta, claims: &Claims) -> RequestMeta {
        if meta.subject.is_none() {
            meta.subject = Some(claims.subject_label().to_string());
        }
        meta
    }

    /// Effective timeout from the tool cap and the caller's deadline
    fn effective_timeout(&self, max_runtime_ms: Option<u64>, requested: Option<Duration>) -> Duration {
        let cap = max_runtime_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);
        match requested {
            Some(deadline) => deadline.min(cap),
            None => cap,
        }
    }

    /// Build the invocation context handed to the handler
    fn context(&self, meta: &RequestMeta, claims: &Claims, timeout: Duration) -> InvocationContext {
        let cancel = match &meta.parent_cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        InvocationContext {
            request_id: meta.request_id.clone(),
            session_id: meta.session_id.clone(),
            claims: claims.clone(),
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    /// Acquire the global slot, then the per-capability slot
    async fn acquire_slots(
        &self,
        capability: &Capability,
        timeout: Duration,
    ) -> Result<(OwnedSemaphorePermit, OwnedSemaphorePermit)> {
        let global = Arc::clone(&self.global_slots);
        let per_capability = self
            .capability_slots
            .entry(capability.id.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_capability_concurrency)))
            .clone();

        let global_permit = self.acquire_one(global, timeout).await?;
        let capability_permit = self.acquire_one(per_capability, timeout).await?;
        Ok((global_permit, capability_permit))
    }

    /// Acquire one semaphore with bounded queueing
    async fn acquire_one(
        &self,
        semaphore: Arc<Semaphore>,
        timeout: Duration,
    ) -> Result<OwnedSemaphorePermit> {
        match Arc::clone(&semaphore).try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::Closed) => Err(Error::internal("dispatch semaphore closed")),
            Err(TryAcquireError::NoPermits) => {
                let queued = self.queued.fetch_add(1, Ordering::SeqCst);
                if queued >= self.config.max_queued {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    return Err(Error::overloaded_with_hint(
                        "dispatch queue full",
                        self.config.default_timeout.as_millis() as u64 / 4,
                    ));
                }
                let acquired = tokio::time::timeout(timeout, semaphore.acquire_owned()).await;
                self.queued.fetch_sub(1, Ordering::SeqCst);
                match acquired {
                    Ok(Ok(permit)) => Ok(permit),
                    Ok(Err(_)) => Err(Error::internal("dispatch semaphore closed")),
                    Err(_) => Err(Error::timed_out("timed out waiting for a dispatch slot")),
                }
            }
        }
    }

    /// Validate arguments against the tool's compiled input schema
    fn validate_arguments(&self, capability: &Capability, arguments: &Value) -> Result<()> {
        let tool = capability.as_tool()?;
        let validator = match self.validators.get(&capability.definition_hash) {
            Some(validator) => Arc::clone(&validator),
            None => {
                let compiled = jsonschema::validator_for(&tool.input_schema).map_err(|e| {
                    Error::internal(format!(
                        "input schema for '{}' stopped compiling: {e}",
                        capability.name
                    ))
                })?;
                let compiled = Arc::new(compiled);
                self.validators
                    .insert(capability.definition_hash.clone(), Arc::clone(&compiled));
                compiled
            }
        };

        let mut errors = validator.iter_errors(arguments).peekable();
        if errors.peek().is_some() {
            let detail = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::invalid_argument(format!(
                "arguments for '{}' failed validation: {detail}",
                capability.name
            )));
        }
        Ok(())
    }

    /// Emit the request-received event
    async fn emit_received(&self, meta: &RequestMeta, kind: CapabilityKind, name: &str) {
        self.telemetry
            .emit(
                TelemetryEvent::new(TelemetryEventKind::RequestReceived)
                    .with_request_id(meta.request_id.clone())
                    .with_session_id(meta.session_id.clone())
                    .with_field("kind", kind.as_str())
                    .with_field("name", name),
            )
            .await;
    }

    /// Reach a terminal state: record counters, emit exactly one
    /// request-completed event, and build the result
    async fn finish(
        &self,
        capability: Option<&Capability>,
        meta: &RequestMeta,
        started: Instant,
        outcome: ExecOutcome,
        output_schema_mismatch: bool,
    ) -> InvocationResult {
        let latency_ms = started.elapsed().as_millis() as u64;
        let (outcome_kind, value, error) = match outcome {
            ExecOutcome::Completed(value) => (InvocationOutcome::Ok, Some(value), None),
            ExecOutcome::TimedOut => (
                InvocationOutcome::TimedOut,
                None,
                Some(Error::timed_out("invocation deadline exceeded")),
            ),
            ExecOutcome::Cancelled => (
                InvocationOutcome::Cancelled,
                None,
                Some(Error::cancelled("invocation cancelled")),
            ),
            ExecOutcome::Failed(e) if e.kind() == ErrorKind::Denied => {
                (InvocationOutcome::Denied, None, Some(e))
            }
            ExecOutcome::Failed(e) if e.kind() == ErrorKind::TimedOut => {
                (InvocationOutcome::TimedOut, None, Some(e))
            }
            ExecOutcome::Failed(e) if e.kind() == ErrorKind::Cancelled => {
                (InvocationOutcome::Cancelled, None, Some(e))
            }
            ExecOutcome::Failed(e) => (InvocationOutcome::Failed, None, Some(e)),
        };

        if let Some(capability) = capability {
            capability.counters.record(
                outcome_kind == InvocationOutcome::Ok,
                latency_ms,
                Utc::now().timestamp_millis().max(0) as u64,
            );

            // Keep a bounded audit ring for the admin surface; argument
            // payloads are not retained
            let finished_at = Utc::now();
            let record = Invocation {
                request_id: meta.request_id.clone(),
                session_id: meta.session_id.clone(),
                subject_id: meta
                    .subject
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string()),
                kind: capability.kind(),
                name: capability.name.clone(),
                arguments: Value::Null,
                started_at: finished_at - chrono::Duration::milliseconds(latency_ms as i64),
                finished_at: Some(finished_at),
                outcome: Some(outcome_kind),
                error_kind: error.as_ref().map(|e| e.kind()),
                billing: None,
            };
            let mut recent = self.recent.write().expect("recent lock poisoned");
            if recent.len() == RECENT_INVOCATIONS {
                recent.pop_front();
            }
            recent.push_back(record);
        }

        let mut event = TelemetryEvent::new(TelemetryEventKind::RequestCompleted)
            .with_request_id(meta.request_id.clone())
            .with_session_id(meta.session_id.clone())
            .with_field("outcome", outcome_kind.as_str())
            .with_field("latency_ms", latency_ms);
        if let Some(capability) = capability {
            event = event
                .with_field("kind", capability.kind().as_str())
                .with_field("name", capability.name.as_str());
        }
        if let Some(e) = &error {
            event = event.with_field("error_kind", e.kind().as_str());
        }
        if output_schema_mismatch {
            event = event.with_field("output_schema_mismatch", true);
        }
        self.telemetry.emit(event).await;

        InvocationResult {
            request_id: meta.request_id.clone(),
            outcome: outcome_kind,
            value,
            error,
            latency_ms,
            output_schema_mismatch,
        }
    }
}
