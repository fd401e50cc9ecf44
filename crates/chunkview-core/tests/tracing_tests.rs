#![forbid(unsafe_code)]

//! Tracing integration tests.
//!
//! Verifies that the chunk-management pass runs inside its span with the
//! viewport fields attached, and that the warn-level events fire where
//! operators will look for them.
//!
//!   cargo test -p chunkview-core --test tracing_tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chunkview_core::{
    ChunkRequest, DataSourceError, Effect, Navigation, QueryParams, ViewportConfig, ViewportEngine,
};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Test Infrastructure
// ============================================================================

/// A captured span with its fields and parent.
#[derive(Debug, Clone)]
#[allow(dead_code)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
    parent_name: Option<String>,
}

/// A captured event with its level and enclosing span.
#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    fields: HashMap<String, String>,
    span_name: Option<String>,
}

/// A tracing Layer that records spans and events.
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Handle to read what was captured.
struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl Capture {
    fn new() -> (Self, CaptureHandle) {
        let spans = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let handle = CaptureHandle {
            spans: spans.clone(),
            events: events.clone(),
        };
        (Self { spans, events }, handle)
    }
}

impl CaptureHandle {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    fn events_at(&self, level: tracing::Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

/// Visitor that extracts fields as strings.
struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let parent_name = ctx
            .current_span()
            .id()
            .and_then(|id| ctx.span(id))
            .map(|span_ref| span_ref.name().to_string());
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
            parent_name,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.remove("message").unwrap_or_default();
        let span_name = ctx
            .event_span(event)
            .map(|span_ref| span_ref.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
            span_name,
        });
    }
}

/// Run `f` with a capturing subscriber installed for this thread.
fn with_captured<F>(f: F) -> CaptureHandle
where
    F: FnOnce(),
{
    let (layer, handle) = Capture::new();
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    handle
}

fn config() -> ViewportConfig {
    ViewportConfig::new(10, 25).with_thresholds(3, 7)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn chunk_management_span_carries_viewport_fields() {
    let handle = with_captured(|| {
        let mut engine: ViewportEngine<u32> = ViewportEngine::new(config());
        engine.set_total_items(10_000);
        engine.navigate(Navigation::JumpTo(5_000));
    });

    let spans: Vec<_> = handle
        .spans()
        .into_iter()
        .filter(|span| span.name == "chunk_management")
        .collect();
    assert_eq!(spans.len(), 2, "one pass per state change");
    let last = &spans[1];
    assert_eq!(last.fields.get("viewport_start").map(String::as_str), Some("4995"));
    assert_eq!(last.fields.get("cursor").map(String::as_str), Some("5000"));
    assert_eq!(last.fields.get("total").map(String::as_str), Some("10000"));
}

#[test]
fn dispatch_and_eviction_logged_inside_span() {
    let handle = with_captured(|| {
        let mut engine: ViewportEngine<u32> = ViewportEngine::new(config());
        let effects = engine.set_total_items(10_000);
        for effect in effects {
            if let Effect::LoadChunk(request) = effect {
                let items = (request.start as u32..request.start as u32 + 25).collect();
                engine.on_chunk_loaded(chunkview_core::ChunkResponse::new(request, items));
            }
        }
        engine.navigate(Navigation::JumpTo(9_000));
    });

    let debug = handle.events_at(tracing::Level::DEBUG);
    let dispatched: Vec<_> = debug
        .iter()
        .filter(|event| event.message == "dispatching chunk load")
        .collect();
    assert!(!dispatched.is_empty());
    assert!(
        dispatched
            .iter()
            .all(|event| event.span_name.as_deref() == Some("chunk_management"))
    );

    let evicted: Vec<_> = debug
        .iter()
        .filter(|event| event.message == "chunk evicted")
        .collect();
    assert_eq!(evicted.len(), 2);
    assert_eq!(
        evicted[0].fields.get("chunk_start").map(String::as_str),
        Some("0")
    );
}

#[test]
fn config_correction_warns() {
    let handle = with_captured(|| {
        let _engine: ViewportEngine<u32> =
            ViewportEngine::new(ViewportConfig::default().with_thresholds(8, 3));
    });
    let warnings = handle.events_at(tracing::Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "viewport config auto-corrected");
}

#[test]
fn valid_config_is_silent() {
    let handle = with_captured(|| {
        let _engine: ViewportEngine<u32> = ViewportEngine::new(config());
    });
    assert!(handle.events_at(tracing::Level::WARN).is_empty());
}

#[test]
fn chunk_failure_warns_with_start() {
    let handle = with_captured(|| {
        let mut engine: ViewportEngine<u32> = ViewportEngine::new(config());
        engine.set_total_items(100);
        let request = ChunkRequest {
            start: 25,
            count: 25,
            query: QueryParams::default(),
        };
        engine.on_chunk_failed(request, DataSourceError::Backend("disk".into()));
    });
    let warnings = handle.events_at(tracing::Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "chunk load failed");
    assert_eq!(
        warnings[0].fields.get("chunk_start").map(String::as_str),
        Some("25")
    );
    assert_eq!(
        warnings[0].fields.get("error").map(String::as_str),
        Some("data source error: disk")
    );
}

#[test]
fn blocked_navigation_traced() {
    let handle = with_captured(|| {
        let mut engine: ViewportEngine<u32> = ViewportEngine::new(config());
        engine.set_total_items(1_000);
        engine.navigate(Navigation::CursorDown);
    });
    let traced: Vec<_> = handle
        .events_at(tracing::Level::TRACE)
        .into_iter()
        .filter(|event| event.message == "navigation blocked by pending chunk")
        .collect();
    assert_eq!(traced.len(), 1);
}
