// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait for the embedded runtime a bridge talks to.
//
// A transport moves command strings into the runtime and hands event strings
// and the page-loaded signal back through the `InboundHandle` it was attached
// to.  Android and iOS evaluate script in a WebView; the in-process runtime
// runs the command handler on a tokio task.

use directbridge_core::config::BridgeConfig;
use directbridge_core::error::Result;

use crate::adapter::InboundHandle;

/// The host-to-runtime channel.
pub trait RuntimeTransport: Send + Sync {
    /// Human-readable platform name (e.g. "Android", "iOS", "in-process").
    fn platform_name(&self) -> &str;

    /// Connect the transport's callbacks to a bridge.
    ///
    /// Called exactly once, from `Bridge::new`.  Event strings the runtime
    /// posts go to `InboundHandle::post_message`; the one-time load signal
    /// goes to `InboundHandle::page_loaded`.
    fn attach(&self, inbound: InboundHandle);

    /// Hand one encoded command to the runtime.
    ///
    /// Fire-and-forget: `Ok` means the command was handed over, not that the
    /// runtime answered.
    fn deliver(&self, command_json: &str) -> Result<()>;

    /// Install the runtime-side handler.  Runs once, on the transition to
    /// Ready, before any queued command is delivered.
    fn install_bridge_script(&self, config: &BridgeConfig) -> Result<()>;
}
