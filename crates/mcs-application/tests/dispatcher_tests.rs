//! Dispatcher tests: the invocation state machine, authorization,
//! timeouts, cancellation, value-captured hot replace, and overload.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use mcs_application::dispatcher::RequestMeta;
use mcs_application::{
    CatalogRegistry, Dispatcher, DispatcherConfig, HandlerRegistry, TelemetryPipeline,
};
use mcs_application::handlers::EchoHandler;
use mcs_domain::capability::{Capability, CapabilityDescriptor};
use mcs_domain::error::{Error, Result};
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::{CapabilityHandler, InvocationContext, TelemetrySink};
use mcs_domain::value_objects::{Claims, InvocationOutcome};

/// Sink that counts request_completed events
struct CompletionCounter {
    completed: AtomicUsize,
}

#[async_trait]
impl TelemetrySink for CompletionCounter {
    async fn emit(&self, event: &TelemetryEvent) -> Result<()> {
        if event.kind == TelemetryEventKind::RequestCompleted {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "completion-counter"
    }
}

/// Handler that sleeps until cancelled, honoring the signal
struct SleepyHandler {
    handler_ref: String,
    sleep: Duration,
    reply: String,
    invoked: AtomicU32,
}

impl SleepyHandler {
    fn new(handler_ref: &str, sleep: Duration, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            handler_ref: handler_ref.to_string(),
            sleep,
            reply: reply.to_string(),
            invoked: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl CapabilityHandler for SleepyHandler {
    async fn invoke(&self, ctx: &InvocationContext, _arguments: Value) -> Result<Value> {
        self.invoked.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            () = tokio::time::sleep(self.sleep) => Ok(Value::String(self.reply.clone())),
            () = ctx.cancel.cancelled() => Err(Error::cancelled("handler observed cancellation")),
        }
    }

    fn handler_ref(&self) -> &str {
        &self.handler_ref
    }
}

/// Handler that fails transiently before succeeding
struct FlakyHandler {
    calls: AtomicU32,
    failures_before_success: u32,
}

#[async_trait]
impl CapabilityHandler for FlakyHandler {
    async fn invoke(&self, _ctx: &InvocationContext, _arguments: Value) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(Error::upstream("flaky dependency"))
        } else {
            Ok(json!("recovered"))
        }
    }

    fn handler_ref(&self) -> &str {
        "test.flaky"
    }
}

fn echo_capability() -> Capability {
    let descriptor: CapabilityDescriptor = serde_json::from_value(json!({
        "kind": "tool",
        "name": "echo",
        "description": "Echo the message back",
        "tool": {
            "input_schema": {
                "type": "object",
                "properties": {"msg": {"type": "string"}},
                "required": ["msg"]
            },
            "handler_ref": "builtin.echo"
        }
    }))
    .unwrap();
    Capability::from_descriptor(descriptor).unwrap()
}

fn tool_capability(name: &str, handler_ref: &str, extra: Value) -> Capability {
    let mut base = json!({
        "kind": "tool",
        "name": name,
        "tool": {
            "input_schema": {"type": "object"},
            "handler_ref": handler_ref
        }
    });
    if let (Some(base_tool), Some(extra_map)) = (
        base.get_mut("tool").and_then(Value::as_object_mut),
        extra.as_object(),
    ) {
        for (key, value) in extra_map {
            base_tool.insert(key.clone(), value.clone());
        }
    }
    let descriptor: CapabilityDescriptor = serde_json::from_value(base).unwrap();
    Capability::from_descriptor(descriptor).unwrap()
}

struct Fixture {
    registry: Arc<CatalogRegistry>,
    dispatcher: Dispatcher,
    completed: Arc<CompletionCounter>,
}

fn fixture(config: DispatcherConfig, extra_handlers: Vec<Arc<dyn CapabilityHandler>>) -> Fixture {
    let registry = Arc::new(CatalogRegistry::new());
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler(Arc::new(EchoHandler));
    for handler in extra_handlers {
        handlers.register_handler(handler);
    }

    let completed = Arc::new(CompletionCounter {
        completed: AtomicUsize::new(0),
    });
    let telemetry = TelemetryPipeline::new(vec![completed.clone()]);
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::new(handlers),
        telemetry,
        config,
    );
    Fixture {
        registry,
        dispatcher,
        completed,
    }
}

#[tokio::test]
async fn echo_invocation_completes() {
    let f = fixture(DispatcherConfig::default(), vec![]);
    f.registry.register(echo_capability()).unwrap();

    let result = f
        .dispatcher
        .invoke_tool(
            "echo",
            json!({"msg": "hi"}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::Ok);
    assert_eq!(result.value, Some(Value::String("hi".to_string())));
    assert_eq!(f.completed.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn schema_violation_is_invalid_argument() {
    let f = fixture(DispatcherConfig::default(), vec![]);
    f.registry.register(echo_capability()).unwrap();

    let result = f
        .dispatcher
        .invoke_tool(
            "echo",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::Failed);
    assert_eq!(
        result.error.unwrap().kind(),
        mcs_domain::ErrorKind::InvalidArgument
    );
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let f = fixture(DispatcherConfig::default(), vec![]);
    let result = f
        .dispatcher
        .invoke_tool(
            "ghost",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;
    assert_eq!(result.outcome, InvocationOutcome::Failed);
    assert_eq!(result.error.unwrap().kind(), mcs_domain::ErrorKind::NotFound);
}

#[tokio::test]
async fn privileged_tool_denies_anonymous_without_running_handler() {
    let handler = SleepyHandler::new("test.sleepy", Duration::from_millis(10), "done");
    let f = fixture(DispatcherConfig::default(), vec![handler.clone()]);

    let capability = tool_capability("secret", "test.sleepy", json!({}));
    let mut descriptor = capability.to_descriptor();
    descriptor.security_class = mcs_domain::capability::SecurityClass::Privileged;
    f.registry
        .register(Capability::from_descriptor(descriptor).unwrap())
        .unwrap();

    let result = f
        .dispatcher
        .invoke_tool(
            "secret",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::Denied);
    assert_eq!(handler.invoked.load(Ordering::SeqCst), 0);

    // The privileged caller goes through
    let result = f
        .dispatcher
        .invoke_tool(
            "secret",
            json!({}),
            &Claims::privileged(),
            RequestMeta::for_session("s1"),
        )
        .await;
    assert_eq!(result.outcome, InvocationOutcome::Ok);
    assert_eq!(handler.invoked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deadline_expiry_times_out_within_grace() {
    let handler = SleepyHandler::new("test.sleepy", Duration::from_secs(10), "done");
    let f = fixture(DispatcherConfig::default(), vec![handler]);
    f.registry
        .register(tool_capability("slow", "test.sleepy", json!({})))
        .unwrap();

    let started = Instant::now();
    let result = f
        .dispatcher
        .invoke_tool(
            "slow",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1").with_deadline(Duration::from_millis(500)),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::TimedOut);
    assert!(
        started.elapsed() < Duration::from_millis(2_500),
        "terminal state must arrive within deadline + grace"
    );
    // Exactly one terminal telemetry event
    assert_eq!(f.completed.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_by_request_id_reaches_terminal_state() {
    let handler = SleepyHandler::new("test.sleepy", Duration::from_secs(10), "done");
    let f = Arc::new(fixture(DispatcherConfig::default(), vec![handler]));
    f.registry
        .register(tool_capability("slow", "test.sleepy", json!({})))
        .unwrap();

    let meta = RequestMeta::for_session("s1").with_request_id("req-42");
    let invocation = {
        let f = Arc::clone(&f);
        tokio::spawn(async move {
            f.dispatcher
                .invoke_tool("slow", json!({}), &Claims::anonymous(), meta)
                .await
        })
    };

    // Let the invocation enter RUNNING before cancelling
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.dispatcher.cancel("req-42"));

    let result = invocation.await.unwrap();
    assert_eq!(result.outcome, InvocationOutcome::Cancelled);
    assert_eq!(f.completed.completed.load(Ordering::SeqCst), 1);
    assert!(!f.dispatcher.cancel("req-42"), "token is gone after terminal state");
}

#[tokio::test]
async fn in_flight_invocation_keeps_replaced_handler() {
    let v1 = SleepyHandler::new("test.v1", Duration::from_millis(300), "from v1");
    let v2 = SleepyHandler::new("test.v2", Duration::from_millis(10), "from v2");
    let f = Arc::new(fixture(DispatcherConfig::default(), vec![v1, v2]));
    f.registry
        .register(tool_capability("swap", "test.v1", json!({})))
        .unwrap();

    let in_flight = {
        let f = Arc::clone(&f);
        tokio::spawn(async move {
            f.dispatcher
                .invoke_tool(
                    "swap",
                    json!({}),
                    &Claims::anonymous(),
                    RequestMeta::for_session("s1"),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    f.registry
        .replace(tool_capability("swap", "test.v2", json!({})))
        .unwrap();

    // The in-flight call captured v1 at dispatch entry
    let result = in_flight.await.unwrap();
    assert_eq!(result.value, Some(Value::String("from v1".to_string())));

    // New invocations use v2
    let result = f
        .dispatcher
        .invoke_tool(
            "swap",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;
    assert_eq!(result.value, Some(Value::String("from v2".to_string())));

    // Counters are continuous across the swap
    let current = f
        .registry
        .get(mcs_domain::capability::CapabilityKind::Tool, "swap")
        .unwrap();
    assert_eq!(current.counters.invocations(), 2);
}

#[tokio::test]
async fn idempotent_tool_retries_transient_failure_once() {
    let flaky = Arc::new(FlakyHandler {
        calls: AtomicU32::new(0),
        failures_before_success: 1,
    });
    let f = fixture(DispatcherConfig::default(), vec![flaky.clone()]);
    f.registry
        .register(tool_capability("flaky", "test.flaky", json!({"idempotent": true})))
        .unwrap();

    let result = f
        .dispatcher
        .invoke_tool(
            "flaky",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::Ok);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_idempotent_tool_is_never_retried() {
    let flaky = Arc::new(FlakyHandler {
        calls: AtomicU32::new(0),
        failures_before_success: 1,
    });
    let f = fixture(DispatcherConfig::default(), vec![flaky.clone()]);
    f.registry
        .register(tool_capability("flaky", "test.flaky", json!({})))
        .unwrap();

    let result = f
        .dispatcher
        .invoke_tool(
            "flaky",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await;

    assert_eq!(result.outcome, InvocationOutcome::Failed);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn saturated_queue_fails_fast_with_overloaded() {
    let handler = SleepyHandler::new("test.sleepy", Duration::from_millis(500), "done");
    let config = DispatcherConfig {
        per_capability_concurrency: 1,
        global_concurrency: 1,
        max_queued: 0,
        ..DispatcherConfig::default()
    };
    let f = Arc::new(fixture(config, vec![handler]));
    f.registry
        .register(tool_capability("slow", "test.sleepy", json!({})))
        .unwrap();

    let first = {
        let f = Arc::clone(&f);
        tokio::spawn(async move {
            f.dispatcher
                .invoke_tool(
                    "slow",
                    json!({}),
                    &Claims::anonymous(),
                    RequestMeta::for_session("s1"),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = f
        .dispatcher
        .invoke_tool(
            "slow",
            json!({}),
            &Claims::anonymous(),
            RequestMeta::for_session("s2"),
        )
        .await;
    assert_eq!(second.outcome, InvocationOutcome::Failed);
    match second.error.unwrap() {
        Error::Overloaded { retry_after_ms, .. } => assert!(retry_after_ms.is_some()),
        other => panic!("expected overloaded, got {other:?}"),
    }

    assert_eq!(first.await.unwrap().outcome, InvocationOutcome::Ok);
}

#[tokio::test]
async fn render_prompt_substitutes_arguments() {
    let f = fixture(DispatcherConfig::default(), vec![]);
    let descriptor: CapabilityDescriptor = serde_json::from_value(json!({
        "kind": "prompt",
        "name": "summarize",
        "prompt": {
            "template": "Summarize {topic}",
            "arguments": [{"name": "topic", "required": true}]
        }
    }))
    .unwrap();
    f.registry
        .register(Capability::from_descriptor(descriptor).unwrap())
        .unwrap();

    let mut arguments = serde_json::Map::new();
    arguments.insert("topic".to_string(), json!("the catalog"));
    let text = f
        .dispatcher
        .render_prompt(
            "summarize",
            &arguments,
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await
        .unwrap();
    assert_eq!(text, "Summarize the catalog");

    let err = f
        .dispatcher
        .render_prompt(
            "summarize",
            &serde_json::Map::new(),
            &Claims::anonymous(),
            RequestMeta::for_session("s1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), mcs_domain::ErrorKind::InvalidArgument);
}
