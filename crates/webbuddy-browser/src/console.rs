//! Page event observers: console output and uncaught page exceptions.
//!
//! A [`Page`](crate::page::Page) delivers its events to every subscribed
//! [`PageObserver`] for as long as the page is open. Two observers ship with
//! the crate: [`ConsoleCapture`] accumulates events for later queries, and
//! [`LogForwarder`] re-emits them as `tracing` events for triage.

use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{error, info};

/// The severity level of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log()`
    Log,
    /// `console.info()`
    Info,
    /// `console.warn()`
    Warning,
    /// `console.error()`
    Error,
    /// `console.debug()`
    Debug,
    /// Catch-all for other console APIs
    Other,
}

impl ConsoleLevel {
    /// Returns true if this is an error-level message.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleLevel::Error)
    }

    /// Short lowercase name, as the page's console would print it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warning => "warning",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Other => "other",
        }
    }
}

impl From<&ConsoleApiCalledType> for ConsoleLevel {
    fn from(kind: &ConsoleApiCalledType) -> Self {
        match kind {
            ConsoleApiCalledType::Log => ConsoleLevel::Log,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Error => ConsoleLevel::Error,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Other,
        }
    }
}

/// A captured console message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity level (log, warn, error, etc.)
    pub level: ConsoleLevel,

    /// Arguments rendered as text and joined with spaces.
    pub text: String,

    /// When the message was captured (system time, not page time).
    pub timestamp: SystemTime,

    /// Source location if available (e.g., "content.js:42:10").
    pub source: Option<String>,
}

impl ConsoleMessage {
    /// Creates a new console message.
    #[must_use]
    pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            timestamp: SystemTime::now(),
            source: None,
        }
    }

    /// Creates a message with source location.
    #[must_use]
    pub fn with_source(mut self, source: String) -> Self {
        self.source = Some(source);
        self
    }
}

/// An uncaught exception raised in the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageError {
    /// Exception description, falling back to the protocol's summary text.
    pub message: String,

    /// Script URL the exception was thrown from, if known.
    pub url: Option<String>,
}

/// Receives events from a page for the lifetime of that page.
///
/// Observers run on the page's event task and must not block.
pub trait PageObserver: Send + Sync {
    /// Called for every `console.*` call in the page.
    fn on_console(&self, message: &ConsoleMessage);

    /// Called for every uncaught exception in the page.
    fn on_page_error(&self, error: &PageError);
}

/// Thread-safe accumulator of a page's console messages and exceptions.
///
/// Cheaply cloneable; clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    messages: Arc<Mutex<Vec<ConsoleMessage>>>,
    errors: Arc<Mutex<Vec<PageError>>>,
}

impl ConsoleCapture {
    /// Creates a new, empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured console messages as a snapshot.
    #[must_use]
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns all captured uncaught exceptions as a snapshot.
    #[must_use]
    pub fn page_errors(&self) -> Vec<PageError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the count of `console.error` messages.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.level.is_error())
            .count()
    }

    /// Returns the total number of console messages captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no console messages have been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageObserver for ConsoleCapture {
    fn on_console(&self, message: &ConsoleMessage) {
        // A poisoned lock means a test already panicked; dropping the message is fine.
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
    }

    fn on_page_error(&self, error: &PageError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.clone());
        }
    }
}

/// Forwards page events to the `tracing` sink.
#[derive(Debug, Clone)]
pub struct LogForwarder {
    label: String,
}

impl LogForwarder {
    /// Creates a forwarder that tags every event with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl PageObserver for LogForwarder {
    fn on_console(&self, message: &ConsoleMessage) {
        info!(
            page = %self.label,
            level = message.level.as_str(),
            source = message.source.as_deref().unwrap_or(""),
            "page.console: {}",
            message.text
        );
    }

    fn on_page_error(&self, err: &PageError) {
        error!(
            page = %self.label,
            url = err.url.as_deref().unwrap_or(""),
            "page.pageerror: {}",
            err.message
        );
    }
}

fn render_remote_object(arg: &RemoteObject) -> String {
    match &arg.value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) => "null".to_string(),
        Some(other) => other.to_string(),
        None => arg
            .description
            .clone()
            .unwrap_or_else(|| "<object>".to_string()),
    }
}

/// Converts a CDP `Runtime.consoleAPICalled` event into a `ConsoleMessage`.
pub(crate) fn parse_console_event(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let text = event
        .args
        .iter()
        .map(render_remote_object)
        .collect::<Vec<_>>()
        .join(" ");

    let mut message = ConsoleMessage::new(ConsoleLevel::from(&event.r#type), text);

    if let Some(frame) = event
        .stack_trace
        .as_ref()
        .and_then(|trace| trace.call_frames.first())
    {
        message = message.with_source(format!(
            "{}:{}:{}",
            frame.url, frame.line_number, frame.column_number
        ));
    }

    message
}

/// Converts a CDP `Runtime.exceptionThrown` event into a `PageError`.
pub(crate) fn parse_exception_event(event: &EventExceptionThrown) -> PageError {
    let details = &event.exception_details;
    let message = details
        .exception
        .as_ref()
        .and_then(|exception| exception.description.clone())
        .unwrap_or_else(|| details.text.clone());

    PageError {
        message,
        url: details.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_match_console_types() {
        assert_eq!(ConsoleLevel::Warning.as_str(), "warning");
        assert!(ConsoleLevel::Error.is_error());
        assert!(!ConsoleLevel::Log.is_error());
        assert_eq!(
            ConsoleLevel::from(&ConsoleApiCalledType::Info),
            ConsoleLevel::Info
        );
    }

    #[test]
    fn capture_accumulates_both_streams() {
        let capture = ConsoleCapture::new();
        let shared = capture.clone();

        shared.on_console(&ConsoleMessage::new(ConsoleLevel::Log, "loaded"));
        shared.on_console(&ConsoleMessage::new(ConsoleLevel::Error, "boom"));
        shared.on_page_error(&PageError {
            message: "ReferenceError: chrome is not defined".into(),
            url: None,
        });

        assert_eq!(capture.len(), 2);
        assert_eq!(capture.error_count(), 1);
        assert_eq!(capture.page_errors().len(), 1);
        assert!(capture.page_errors()[0].message.contains("chrome"));
    }

    #[test]
    fn forwarder_accepts_events_without_subscriber() {
        let forwarder = LogForwarder::new("probe");
        forwarder.on_console(&ConsoleMessage::new(ConsoleLevel::Info, "hello"));
        forwarder.on_page_error(&PageError {
            message: "oops".into(),
            url: Some("http://127.0.0.1/".into()),
        });
    }

    #[test]
    fn remote_objects_render_as_text() {
        let string_arg: RemoteObject = serde_json::from_value(serde_json::json!({
            "type": "string",
            "value": "hi"
        }))
        .unwrap();
        let number_arg: RemoteObject = serde_json::from_value(serde_json::json!({
            "type": "number",
            "value": 42
        }))
        .unwrap();
        let object_arg: RemoteObject = serde_json::from_value(serde_json::json!({
            "type": "object",
            "description": "Object"
        }))
        .unwrap();

        assert_eq!(render_remote_object(&string_arg), "hi");
        assert_eq!(render_remote_object(&number_arg), "42");
        assert_eq!(render_remote_object(&object_arg), "Object");
    }
}
