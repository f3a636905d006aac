// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DirectBridge Protocol — wire codec, error normalization, and the
// runtime-side command handler that sits next to the tokenization SDK.

pub mod codec;
pub mod handler;
pub mod normalize;
pub mod thrown;

pub use codec::{decode_event, encode_command, inbound_call_script, script_literal};
pub use handler::{CommandHandler, RemoteSdk, SdkClient};
pub use normalize::{normalize_error, safe_stringify};
pub use thrown::{ArrayRef, ObjectRef, Thrown};
