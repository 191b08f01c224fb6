//! Event sink system for observability.
//!
//! Stage lifecycle events (`stage.started`, `stage.completed`,
//! `stage.skipped`, `stage.failed`, `key.failed`) are emitted through an
//! [`EventSink`] held by the pipeline context. Sinks are purely
//! observational; a sink must never affect correctness-path execution.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
