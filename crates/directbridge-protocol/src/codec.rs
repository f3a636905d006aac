// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-side wire codec.
//
// Commands go out as JSON strings; platforms that deliver by evaluating
// script additionally need the JSON embedded in a JS string literal.  Events
// come back as JSON strings and are decoded leniently: a malformed event is
// turned into an `error` event, never into an `Err`.

use directbridge_core::error::Result;
use directbridge_core::types::{Command, CommandId, ErrorRecord, Event};
use serde_json::Value;
use tracing::warn;

/// Name of the global function the bridge script exposes for inbound commands.
pub const INBOUND_FUNCTION: &str = "handleMessageFromNative";

/// Message used when an unparseable event arrives with an empty body.
pub const UNKNOWN_MESSAGE: &str = "Unknown message";

/// Serialize a command to its wire JSON.
pub fn encode_command(command: &Command) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}

/// Decode an event string from the runtime.
///
/// Anything that does not parse as an event becomes an `error` event whose
/// message is the raw text, so the host can still show what arrived.  If the
/// text is a JSON object with a readable `id`, the error keeps that id so the
/// waiting call still resolves.
pub fn decode_event(raw: &str) -> Event {
    match serde_json::from_str::<Event>(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unparseable event from runtime");
            let message = if raw.is_empty() { UNKNOWN_MESSAGE } else { raw };
            Event::error(ErrorRecord::new(message)).with_id(salvage_id(raw))
        }
    }
}

fn salvage_id(raw: &str) -> Option<CommandId> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    serde_json::from_value(value.get_mut("id")?.take()).ok()
}

/// Quote `text` as a double-quoted JS string literal.
///
/// Besides the usual escapes this covers U+2028/U+2029, which are legal in
/// JSON but terminate a line inside older JS string literals.
pub fn script_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Script that hands `command_json` to the bridge's inbound function.
pub fn inbound_call_script(command_json: &str) -> String {
    format!(
        "window.{INBOUND_FUNCTION}({});",
        script_literal(command_json)
    )
}
