// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for DirectBridge.
//
// These are host-side errors only.  Anything that goes wrong inside the
// embedded runtime travels back as an `error` Event instead.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all host-side bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Command validation --
    #[error("missing public key")]
    MissingPublicKey,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // -- Lifecycle --
    #[error("embedded runtime is not ready yet")]
    NotReady,

    #[error("pre-ready queue is full ({0} commands waiting)")]
    QueueFull(usize),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("bridge dropped before the response arrived")]
    Disconnected,

    // -- Transport --
    #[error("runtime transport error: {0}")]
    Transport(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
