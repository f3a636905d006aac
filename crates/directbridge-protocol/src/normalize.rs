// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error normalization.
//
// Turns whatever the SDK rejected with into an `ErrorRecord` that always
// serializes.  Normalization itself never fails.

use std::collections::HashSet;

use directbridge_core::types::{ErrorRecord, ResponseRecord};
use serde_json::Value;

use crate::thrown::Thrown;

/// Keys that have a dedicated `ErrorRecord` field and are never copied as
/// extras.
const RESERVED_KEYS: [&str; 10] = [
    "name", "message", "code", "status", "stack", "data", "details", "errors", "error",
    "response",
];

/// `JSON.stringify` with a visited-set replacer.
///
/// Objects seen twice are replaced by `"[Circular]"`.  `undefined` renders as
/// `"undefined"` rather than vanishing.
pub fn safe_stringify(value: &Thrown) -> String {
    let mut seen = HashSet::new();
    match value.to_json(&mut seen) {
        Some(json) => json.to_string(),
        None => "undefined".into(),
    }
}

/// Strings pass through, anything else is safe-stringified.
fn readable(value: &Thrown) -> String {
    match value {
        Thrown::String(s) => s.clone(),
        Thrown::Array(_) | Thrown::Object(_) => safe_stringify(value),
        other => other.to_js_string(),
    }
}

/// Normalize an arbitrary thrown value into an `ErrorRecord`.
pub fn normalize_error(err: &Thrown) -> ErrorRecord {
    let message = match err.get("message") {
        Thrown::Undefined => readable(err),
        Thrown::String(s) => s,
        other => safe_stringify(&other),
    };

    let Some(object) = err.as_object() else {
        return ErrorRecord::new(message);
    };

    // One visited set for the whole record, seeded with the error itself so
    // that `err.self = err` collapses to the marker.
    let mut seen = HashSet::new();
    err.mark_seen(&mut seen);
    let mut field = |key: &str| -> Option<Value> { object.get(key).to_json(&mut seen) };

    let status = match object.get("status") {
        s if s.is_truthy() => s,
        _ => object.get("statusCode"),
    };

    let mut record = ErrorRecord {
        name: field("name"),
        message,
        code: field("code"),
        status: None,
        stack: field("stack"),
        data: field("data"),
        details: field("details"),
        errors: field("errors"),
        error: field("error"),
        response: None,
        extra: Default::default(),
    };
    if status.is_truthy() {
        record.status = status.to_json(&mut seen);
    }

    let response = object.get("response");
    if response.is_truthy() {
        let mut member = |key: &str| response.get(key).to_json(&mut seen);
        record.response = Some(ResponseRecord {
            status: member("status"),
            status_text: member("statusText"),
            data: member("data"),
            headers: member("headers"),
            url: member("url"),
        });
    }

    for (key, value) in object.entries() {
        if RESERVED_KEYS.contains(&key.as_str()) || record.extra.contains_key(&key) {
            continue;
        }
        if let Some(json) = value.to_json(&mut seen) {
            record.extra.insert(key, json);
        }
    }

    record
}
