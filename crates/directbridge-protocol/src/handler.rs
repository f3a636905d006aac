// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Runtime-side command handler.
//
// This is the half of the bridge that lives next to the SDK: it takes a raw
// command string from the host, calls the matching SDK method, and answers
// with exactly one event.  Every failure becomes an `error` event; nothing
// here returns `Err` or panics.

use std::sync::Arc;

use async_trait::async_trait;
use directbridge_core::types::{Action, CommandId, ErrorRecord, Event};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::normalize::normalize_error;
use crate::thrown::Thrown;

/// Message for a command string that is not valid JSON.
pub const INVALID_JSON: &str = "Invalid JSON from native";
/// Message for a command without a (truthy) `action`.
pub const MISSING_ACTION: &str = "Missing action";
/// Message for a command without a (truthy) `key`.
pub const MISSING_KEY: &str = "Missing public key";

/// The SDK factory: `sdk(publicKey) -> client`.
///
/// Mirrors the global the SDK script installs in a web runtime.  Creating a
/// client may itself throw (bad key format, SDK not loaded).
pub trait RemoteSdk: Send + Sync {
    fn client(&self, key: &str) -> Result<Arc<dyn SdkClient>, Thrown>;
}

/// One SDK client bound to a public key.
///
/// Results are opaque and forwarded untouched.  Positional argument order is
/// a contract with the SDK and is not checked here:
/// `get_bin_information(bin, country)` and
/// `get_installments_plan(amount, currency, country, bin)`.
#[async_trait]
pub trait SdkClient: Send + Sync {
    async fn create_token(&self, payload: Value) -> Result<Value, Thrown>;

    async fn get_bin_information(&self, args: Vec<Value>) -> Result<Value, Thrown>;

    async fn get_installments_plan(&self, args: Vec<Value>) -> Result<Value, Thrown>;
}

/// Dispatches inbound command strings to a [`RemoteSdk`].
#[derive(Clone)]
pub struct CommandHandler {
    sdk: Arc<dyn RemoteSdk>,
}

impl CommandHandler {
    pub fn new(sdk: Arc<dyn RemoteSdk>) -> Self {
        Self { sdk }
    }

    /// Handle one raw command string and produce its event.
    #[instrument(skip_all, fields(len = raw.len()))]
    pub async fn on_inbound_message(&self, raw: &str) -> Event {
        match serde_json::from_str::<Value>(raw) {
            Ok(data) => self.handle(data).await,
            Err(e) => {
                debug!(error = %e, "command is not valid JSON");
                Event::error(ErrorRecord::new(INVALID_JSON).with_extra("raw", raw))
            }
        }
    }

    /// Handle an already-parsed command value.
    pub async fn handle(&self, data: Value) -> Event {
        let field = |name: &str| data.get(name).cloned().unwrap_or(Value::Null);
        let id = data
            .get("id")
            .and_then(|id| serde_json::from_value::<CommandId>(id.clone()).ok());
        let action = field("action");
        let key = field("key");

        if !is_truthy(&action) {
            return Event::error(ErrorRecord::new(MISSING_ACTION)).with_id(id);
        }
        if !is_truthy(&key) {
            return Event::error(ErrorRecord::new(MISSING_KEY)).with_id(id);
        }

        let key = match &key {
            Value::String(s) => s.clone(),
            other => Thrown::from(other).to_js_string(),
        };
        let client = match self.sdk.client(&key) {
            Ok(client) => client,
            Err(thrown) => {
                warn!("SDK factory threw");
                return Event::error(normalize_error(&thrown)).with_id(id);
            }
        };

        // Strict string match: `["createToken"]` stringifies the same but is
        // not an action.
        let known = match action.as_str().map(str::parse::<Action>) {
            Some(Ok(known)) => known,
            _ => {
                let name = Thrown::from(&action).to_js_string();
                return Event::error(ErrorRecord::new(format!("Unknown action: {name}")))
                    .with_id(id);
            }
        };

        let outcome = match known {
            Action::CreateToken => client.create_token(field("payload")).await,
            Action::GetBinInformation => client.get_bin_information(positional(&data)).await,
            Action::GetInstallmentsPlan => client.get_installments_plan(positional(&data)).await,
        };

        match outcome {
            Ok(result) => {
                debug!(action = %known, "SDK call fulfilled");
                Event::success(known, result).with_id(id)
            }
            Err(thrown) => {
                let record = normalize_error(&thrown);
                debug!(action = %known, message = %record.message, "SDK call rejected");
                Event::error(record).with_id(id)
            }
        }
    }
}

/// `Array.isArray(args) ? args : []`.
fn positional(data: &Value) -> Vec<Value> {
    match data.get("args") {
        Some(Value::Array(args)) => args.clone(),
        _ => Vec::new(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use directbridge_core::types::{EventBody, SuccessPayload};
    use serde_json::json;

    use super::*;

    /// Records every SDK call and answers from a fixed script.
    #[derive(Default)]
    struct ScriptedSdk {
        calls: Mutex<Vec<(String, String, Value)>>,
        reject_with: Option<Value>,
        factory_throws: bool,
    }

    struct ScriptedClient {
        sdk: Arc<ScriptedSdk>,
        key: String,
    }

    impl RemoteSdk for Arc<ScriptedSdk> {
        fn client(&self, key: &str) -> Result<Arc<dyn SdkClient>, Thrown> {
            if self.factory_throws {
                return Err(Thrown::error("Error", "invalid key"));
            }
            Ok(Arc::new(ScriptedClient {
                sdk: Arc::clone(self),
                key: key.to_string(),
            }))
        }
    }

    impl ScriptedClient {
        fn answer(&self, method: &str, input: Value, ok: Value) -> Result<Value, Thrown> {
            self.sdk
                .calls
                .lock()
                .unwrap()
                .push((method.to_string(), self.key.clone(), input));
            match &self.sdk.reject_with {
                Some(err) => Err(Thrown::from(err)),
                None => Ok(ok),
            }
        }
    }

    #[async_trait]
    impl SdkClient for ScriptedClient {
        async fn create_token(&self, payload: Value) -> Result<Value, Thrown> {
            self.answer("createToken", payload, json!({ "token": "tok_123" }))
        }

        async fn get_bin_information(&self, args: Vec<Value>) -> Result<Value, Thrown> {
            self.answer("getBinInformation", Value::Array(args), json!({ "brand": "VI" }))
        }

        async fn get_installments_plan(&self, args: Vec<Value>) -> Result<Value, Thrown> {
            self.answer("getInstallmentsPlan", Value::Array(args), json!({ "plans": [] }))
        }
    }

    fn scripted(sdk: ScriptedSdk) -> (CommandHandler, Arc<ScriptedSdk>) {
        let sdk = Arc::new(sdk);
        (CommandHandler::new(Arc::new(Arc::clone(&sdk))), sdk)
    }

    fn message_of(event: &Event) -> &str {
        &event.as_error().expect("expected an error event").message
    }

    #[tokio::test]
    async fn create_token_success_scenario() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        let raw = json!({
            "action": "createToken",
            "key": "pk_live_x",
            "payload": {
                "name": "JOHN DOE", "cvv": "123", "expirationMonth": "12",
                "expirationYear": "30", "pan": "4111111111111111", "country": "AR"
            }
        })
        .to_string();

        let event = handler.on_inbound_message(&raw).await;
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "success",
                "payload": { "action": "createToken", "result": { "token": "tok_123" } }
            })
        );

        let calls = sdk.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "createToken");
        assert_eq!(calls[0].1, "pk_live_x");
        assert_eq!(calls[0].2["pan"], "4111111111111111");
    }

    #[tokio::test]
    async fn bin_information_rejection_scenario() {
        let (handler, sdk) = scripted(ScriptedSdk {
            reject_with: Some(json!({ "message": "BIN not found", "code": 404 })),
            ..Default::default()
        });
        let raw = r#"{"action":"getBinInformation","key":"pk_live_x","args":["411111","AR"]}"#;

        let event = handler.on_inbound_message(raw).await;
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "error", "payload": { "message": "BIN not found", "code": 404 } })
        );
        assert_eq!(sdk.calls.lock().unwrap()[0].2, json!(["411111", "AR"]));
    }

    #[tokio::test]
    async fn every_known_action_answers_with_its_name() {
        for action in Action::ALL {
            let (handler, _) = scripted(ScriptedSdk::default());
            let body = if action.takes_payload() {
                json!({ "action": action.as_str(), "key": "pk", "payload": {} })
            } else {
                json!({ "action": action.as_str(), "key": "pk", "args": [] })
            };
            let event = handler.on_inbound_message(&body.to_string()).await;
            match event.body {
                EventBody::Success(SuccessPayload { action: echoed, .. }) => {
                    assert_eq!(echoed, action)
                }
                other => panic!("expected success, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn invalid_json_carries_the_raw_string() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        let event = handler.on_inbound_message("{not json").await;
        let record = event.as_error().unwrap();
        assert_eq!(record.message, INVALID_JSON);
        assert_eq!(record.extra.get("raw"), Some(&json!("{not json")));
        assert!(sdk.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_action_makes_no_call() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        for raw in [r#"{"key":"pk"}"#, r#"{"action":"","key":"pk"}"#, "null", "[]", "7"] {
            let event = handler.on_inbound_message(raw).await;
            assert_eq!(message_of(&event), MISSING_ACTION, "input {raw}");
        }
        assert!(sdk.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_key_makes_no_call() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        for raw in [
            r#"{"action":"createToken","payload":{}}"#,
            r#"{"action":"createToken","key":"","payload":{}}"#,
            r#"{"action":"createToken","key":null}"#,
        ] {
            let event = handler.on_inbound_message(raw).await;
            assert_eq!(message_of(&event), MISSING_KEY, "input {raw}");
        }
        assert!(sdk.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_reported_by_name() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        let event = handler.on_inbound_message(r#"{"action":"refund","key":"pk"}"#).await;
        assert_eq!(message_of(&event), "Unknown action: refund");

        let event = handler.on_inbound_message(r#"{"action":5,"key":"pk"}"#).await;
        assert_eq!(message_of(&event), "Unknown action: 5");

        let event = handler
            .on_inbound_message(r#"{"action":["createToken"],"key":"pk"}"#)
            .await;
        assert_eq!(message_of(&event), "Unknown action: createToken");
        assert!(sdk.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_array_args_are_spread_as_empty() {
        let (handler, sdk) = scripted(ScriptedSdk::default());
        let raw = r#"{"action":"getInstallmentsPlan","key":"pk","args":"100,USD"}"#;
        assert!(handler.on_inbound_message(raw).await.is_success());
        assert_eq!(sdk.calls.lock().unwrap()[0].2, json!([]));
    }

    #[tokio::test]
    async fn factory_errors_are_normalized() {
        let (handler, _) = scripted(ScriptedSdk {
            factory_throws: true,
            ..Default::default()
        });
        let event = handler
            .on_inbound_message(r#"{"action":"createToken","key":"bad","payload":{}}"#)
            .await;
        let record = event.as_error().unwrap();
        assert_eq!(record.message, "invalid key");
        assert_eq!(record.name, Some(json!("Error")));
    }

    #[tokio::test]
    async fn id_is_echoed_on_every_outcome() {
        let (handler, _) = scripted(ScriptedSdk::default());
        let id = CommandId::new();
        let ok = json!({ "action": "getBinInformation", "key": "pk", "args": [], "id": id });
        let missing = json!({ "key": "pk", "id": id });

        assert_eq!(handler.on_inbound_message(&ok.to_string()).await.id, Some(id));
        assert_eq!(handler.on_inbound_message(&missing.to_string()).await.id, Some(id));
    }
}
