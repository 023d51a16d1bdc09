use super::Check;
use crate::outcome::CheckOutcome;
use crate::session::ExtensionSession;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;
use webbuddy_browser::resolve_extension_id;

/// Key the probe script uses to report a thrown exception.
const ERROR_KEY: &str = "__harnessError";

/// How a `chrome.runtime.sendMessage` round trip ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageReply {
    /// The callback fired without a response: nothing listened.
    NoListener,
    /// The background answered.
    Response(Value),
    /// Sending threw in the page.
    Error(String),
}

/// Script that sends `message` from the page and resolves with the reply.
///
/// With a known extension id the id is passed explicitly, which is what a
/// web page needs to address an extension.
pub fn message_script(message: &Value, extension_id: Option<&str>) -> String {
    let id = extension_id.map_or(Value::Null, |id| Value::String(id.to_string()));
    format!(
        r"new Promise((resolve) => {{
  try {{
    const message = {message};
    const id = {id};
    const done = (reply) => resolve(reply === undefined ? null : reply);
    if (id) {{
      chrome.runtime.sendMessage(id, message, done);
    }} else {{
      chrome.runtime.sendMessage(message, done);
    }}
  }} catch (e) {{
    resolve({{ {ERROR_KEY}: String(e) }});
  }}
}})"
    )
}

/// Interprets the value the probe script resolved with.
pub fn classify_reply(raw: Option<Value>) -> MessageReply {
    match raw {
        None | Some(Value::Null) => MessageReply::NoListener,
        Some(Value::Object(map)) if map.contains_key(ERROR_KEY) => MessageReply::Error(
            map.get(ERROR_KEY)
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ),
        Some(value) => MessageReply::Response(value),
    }
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

async fn send(session: &ExtensionSession, message: &Value) -> anyhow::Result<MessageReply> {
    let id = resolve_extension_id(session.browser()).await;
    let page = session.probe_page().await.context("opening probe page")?;

    let raw = page
        .evaluate_async(
            &message_script(message, id.as_deref()),
            session.config().message_timeout(),
        )
        .await
        .with_context(|| format!("sending {message}"))?;

    Ok(classify_reply(raw))
}

/// Primary round trip: `{operation: "echo_test", payload: "ping"}`.
///
/// Passes on any structured response, and on `null` (no listener).
pub struct RuntimeMessage;

impl RuntimeMessage {
    pub fn evaluate(name: &str, reply: MessageReply) -> CheckOutcome {
        match reply {
            MessageReply::NoListener => {
                info!("runtime message got no response; treating missing listener as pass");
                CheckOutcome::pass(name).with_payload(Value::Null)
            }
            MessageReply::Response(value) if value.is_object() || value.is_array() => {
                let echoed = value.get("payload") == Some(&json!("ping"));
                info!(echoed, "runtime message answered");
                CheckOutcome::pass(name).with_payload(value)
            }
            MessageReply::Response(value) => {
                CheckOutcome::fail(name, format!("response is not a structured object: {value}"))
                    .with_payload(value)
            }
            MessageReply::Error(error) => CheckOutcome::fail(name, error),
        }
    }
}

#[async_trait]
impl Check<ExtensionSession> for RuntimeMessage {
    fn name(&self) -> &'static str {
        "runtime-sendMessage"
    }

    async fn run(&self, session: &ExtensionSession) -> anyhow::Result<Vec<CheckOutcome>> {
        let reply = send(session, &json!({ "operation": "echo_test", "payload": "ping" })).await?;
        Ok(vec![Self::evaluate(self.name(), reply)])
    }
}

/// Secondary round trip: `{operation: "ping_storage"}` must get a truthy
/// answer.
pub struct StoragePing;

impl StoragePing {
    pub fn evaluate(name: &str, reply: MessageReply) -> CheckOutcome {
        match reply {
            MessageReply::Response(value) if is_truthy(&value) => {
                CheckOutcome::pass(name).with_payload(value)
            }
            MessageReply::Response(value) => {
                CheckOutcome::fail(name, format!("falsy response: {value}")).with_payload(value)
            }
            MessageReply::NoListener => CheckOutcome::fail(name, "no response from background"),
            MessageReply::Error(error) => CheckOutcome::fail(name, error),
        }
    }
}

#[async_trait]
impl Check<ExtensionSession> for StoragePing {
    fn name(&self) -> &'static str {
        "background-storage-ping"
    }

    async fn run(&self, session: &ExtensionSession) -> anyhow::Result<Vec<CheckOutcome>> {
        let reply = send(session, &json!({ "operation": "ping_storage" })).await?;
        Ok(vec![Self::evaluate(self.name(), reply)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_embeds_message_and_optional_id() {
        let message = json!({ "operation": "echo_test", "payload": "ping" });

        let anonymous = message_script(&message, None);
        assert!(anonymous.contains(r#"const message = {"operation":"echo_test","payload":"ping"};"#));
        assert!(anonymous.contains("const id = null;"));

        let addressed = message_script(&message, Some("abc"));
        assert!(addressed.contains(r#"const id = "abc";"#));
        assert!(addressed.contains("__harnessError: String(e)"));
    }

    #[test]
    fn replies_are_classified() {
        assert_eq!(classify_reply(None), MessageReply::NoListener);
        assert_eq!(classify_reply(Some(Value::Null)), MessageReply::NoListener);
        assert_eq!(
            classify_reply(Some(json!({ "__harnessError": "ReferenceError: chrome is not defined" }))),
            MessageReply::Error("ReferenceError: chrome is not defined".into())
        );
        assert_eq!(
            classify_reply(Some(json!({ "payload": "ping" }))),
            MessageReply::Response(json!({ "payload": "ping" }))
        );
    }

    #[test]
    fn echo_response_passes_primary() {
        let outcome = RuntimeMessage::evaluate(
            "runtime-sendMessage",
            MessageReply::Response(json!({ "operation": "echo_test", "payload": "ping" })),
        );
        assert!(outcome.ok);
        assert_eq!(outcome.payload.unwrap()["payload"], "ping");
    }

    #[test]
    fn missing_listener_passes_primary() {
        let outcome = RuntimeMessage::evaluate("runtime-sendMessage", MessageReply::NoListener);
        assert!(outcome.ok);
        assert_eq!(outcome.payload, Some(Value::Null));
    }

    #[test]
    fn non_echo_object_still_passes_primary() {
        let outcome =
            RuntimeMessage::evaluate("runtime-sendMessage", MessageReply::Response(json!({ "ok": 1 })));
        assert!(outcome.ok);
    }

    #[test]
    fn primitive_or_error_fails_primary() {
        assert!(
            RuntimeMessage::evaluate("m", MessageReply::Response(json!("pong"))).is_failure()
        );
        let errored = RuntimeMessage::evaluate("m", MessageReply::Error("boom".into()));
        assert_eq!(errored.error.as_deref(), Some("boom"));
    }

    #[test]
    fn storage_ping_requires_truthy_reply() {
        assert!(StoragePing::evaluate("s", MessageReply::Response(json!(true))).ok);
        assert!(StoragePing::evaluate("s", MessageReply::Response(json!({}))).ok);
        assert!(StoragePing::evaluate("s", MessageReply::Response(json!(0))).is_failure());
        assert!(StoragePing::evaluate("s", MessageReply::Response(json!(""))).is_failure());
        assert!(StoragePing::evaluate("s", MessageReply::NoListener).is_failure());
        assert!(StoragePing::evaluate("s", MessageReply::Error("x".into())).is_failure());
    }
}
