// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the DirectBridge wire protocol.
//
// Host → runtime:  {"action", "key", "payload"?, "args"?, "id"?}
// Runtime → host:  {"type": "success"|"error", "payload", "id"?}

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::BridgeError;

/// Correlation id attached to a command and echoed on its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations exposed by the remote tokenization SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// `createToken(payload)`: tokenize card details.
    CreateToken,
    /// `getBinInformation(bin, country)`.
    GetBinInformation,
    /// `getInstallmentsPlan(amount, currency, country, bin)`.
    GetInstallmentsPlan,
}

impl Action {
    pub const ALL: [Action; 3] = [
        Action::CreateToken,
        Action::GetBinInformation,
        Action::GetInstallmentsPlan,
    ];

    /// Wire name, identical to the SDK method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateToken => "createToken",
            Self::GetBinInformation => "getBinInformation",
            Self::GetInstallmentsPlan => "getInstallmentsPlan",
        }
    }

    /// Whether the SDK method takes a single object rather than positional args.
    pub fn takes_payload(&self) -> bool {
        matches!(self, Self::CreateToken)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownAction(s.to_string()))
    }
}

/// Arguments of a command, in the calling convention of its action.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandBody {
    /// A single structured object (`createToken`).
    Payload(Value),
    /// Positional arguments, spread into the SDK call as-is.
    Args(Vec<Value>),
}

/// Card details accepted by `createToken`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    /// Card holder name as printed on the card.
    pub name: String,
    pub cvv: String,
    pub expiration_month: String,
    pub expiration_year: String,
    pub pan: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl std::fmt::Debug for CardPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last4 = self
            .pan
            .get(self.pan.len().saturating_sub(4)..)
            .unwrap_or_default();
        f.debug_struct("CardPayload")
            .field("name", &self.name)
            .field("cvv", &"***")
            .field("expiration_month", &self.expiration_month)
            .field("expiration_year", &self.expiration_year)
            .field("pan", &format_args!("****{last4}"))
            .field("country", &self.country)
            .finish()
    }
}

/// A request from the host to the embedded runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireCommand", try_from = "WireCommand")]
pub struct Command {
    pub id: Option<CommandId>,
    pub action: Action,
    /// Public key handed to the SDK factory.
    pub key: String,
    pub body: CommandBody,
}

impl Command {
    /// Build a command, checking the key and the calling convention.
    pub fn new(
        action: Action,
        key: impl Into<String>,
        body: CommandBody,
    ) -> Result<Self, BridgeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(BridgeError::MissingPublicKey);
        }
        match (&body, action.takes_payload()) {
            (CommandBody::Payload(value), true) if !value.is_object() => {
                return Err(BridgeError::InvalidCommand(format!(
                    "{action} payload must be an object"
                )));
            }
            (CommandBody::Payload(_), true) | (CommandBody::Args(_), false) => {}
            (CommandBody::Args(_), true) => {
                return Err(BridgeError::InvalidCommand(format!(
                    "{action} takes a payload, not positional args"
                )));
            }
            (CommandBody::Payload(_), false) => {
                return Err(BridgeError::InvalidCommand(format!(
                    "{action} takes positional args, not a payload"
                )));
            }
        }
        Ok(Self {
            id: None,
            action,
            key,
            body,
        })
    }

    /// `createToken` with typed card details.
    pub fn create_token(
        key: impl Into<String>,
        card: &CardPayload,
    ) -> Result<Self, BridgeError> {
        Self::new(
            Action::CreateToken,
            key,
            CommandBody::Payload(serde_json::to_value(card)?),
        )
    }

    /// `getBinInformation`, args `[bin, country]`.
    pub fn bin_information(
        key: impl Into<String>,
        bin: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        Self::new(
            Action::GetBinInformation,
            key,
            CommandBody::Args(vec![Value::String(bin.into()), Value::String(country.into())]),
        )
    }

    /// `getInstallmentsPlan`, args `[amount, currency, country, bin]`.
    ///
    /// The SDK expects `amount` as a number.
    pub fn installments_plan(
        key: impl Into<String>,
        amount: impl Into<Value>,
        currency: impl Into<String>,
        country: impl Into<String>,
        bin: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        Self::new(
            Action::GetInstallmentsPlan,
            key,
            CommandBody::Args(vec![
                amount.into(),
                Value::String(currency.into()),
                Value::String(country.into()),
                Value::String(bin.into()),
            ]),
        )
    }

    pub fn with_id(mut self, id: CommandId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Serde shape of a command on the wire.
#[derive(Serialize, Deserialize)]
struct WireCommand {
    action: Action,
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<CommandId>,
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        let (payload, args) = match command.body {
            CommandBody::Payload(payload) => (Some(payload), None),
            CommandBody::Args(args) => (None, Some(args)),
        };
        Self {
            action: command.action,
            key: command.key,
            payload,
            args,
            id: command.id,
        }
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = BridgeError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let body = match (wire.payload, wire.args) {
            (Some(_), Some(_)) => {
                return Err(BridgeError::InvalidCommand(
                    "payload and args are mutually exclusive".into(),
                ));
            }
            (Some(payload), None) => CommandBody::Payload(payload),
            (None, Some(args)) => CommandBody::Args(args),
            (None, None) if wire.action.takes_payload() => {
                return Err(BridgeError::InvalidCommand(format!(
                    "{} requires a payload",
                    wire.action
                )));
            }
            (None, None) => CommandBody::Args(Vec::new()),
        };
        let mut command = Command::new(wire.action, wire.key, body)?;
        command.id = wire.id;
        Ok(command)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Deserialize a field that may legitimately be `null`, keeping the `null`.
///
/// Plain `Option<Value>` would fold `null` into `None` and drop the key on
/// the way back out.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Flattened HTTP response attached to an SDK error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(
        rename = "statusText",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_text: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
}

/// Normalized error payload carried by `error` events.
///
/// Absent fields are omitted on the wire.  Own properties of the original
/// error that have no dedicated field land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stack: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorRecord {
    /// Record with only a message, as used for protocol errors.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Payload of a `success` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessPayload {
    pub action: Action,
    /// Opaque value the SDK resolved with.
    #[serde(default)]
    pub result: Value,
}

/// Outcome carried by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Success(SuccessPayload),
    Error(ErrorRecord),
}

/// A notification from the embedded runtime to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub struct Event {
    /// Echo of the originating command's id, when it had one.
    pub id: Option<CommandId>,
    pub body: EventBody,
}

impl Event {
    pub fn success(action: Action, result: Value) -> Self {
        Self {
            id: None,
            body: EventBody::Success(SuccessPayload { action, result }),
        }
    }

    pub fn error(record: ErrorRecord) -> Self {
        Self {
            id: None,
            body: EventBody::Error(record),
        }
    }

    pub fn with_id(mut self, id: Option<CommandId>) -> Self {
        self.id = id;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, EventBody::Success(_))
    }

    /// The error record, if this is an `error` event.
    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match &self.body {
            EventBody::Error(record) => Some(record),
            EventBody::Success(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EventType {
    Success,
    Error,
}

/// Serde shape of an event on the wire.
#[derive(Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: EventType,
    #[serde(default)]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<CommandId>,
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let (kind, payload) = match event.body {
            EventBody::Success(success) => (
                EventType::Success,
                serde_json::json!({ "action": success.action, "result": success.result }),
            ),
            // Serializing a record of plain JSON values cannot fail.
            EventBody::Error(record) => (
                EventType::Error,
                serde_json::to_value(record).unwrap_or(Value::Null),
            ),
        };
        Self {
            kind,
            payload,
            id: event.id,
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = serde_json::Error;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let body = match wire.kind {
            EventType::Success => EventBody::Success(serde_json::from_value(wire.payload)?),
            EventType::Error => EventBody::Error(serde_json::from_value(wire.payload)?),
        };
        Ok(Self { id: wire.id, body })
    }
}

/// Lifecycle of a bridge instance.
///
/// `Initializing → Ready` fires once, after the embedded page and SDK script
/// have loaded.  There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    /// Runtime still loading; outbound commands are not guaranteed delivered.
    Initializing,
    /// Runtime loaded and the SDK global is present.
    Ready,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => f.write_str("Initializing"),
            Self::Ready => f.write_str("Ready"),
        }
    }
}
