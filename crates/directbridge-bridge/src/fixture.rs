// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted SDK for the in-process runtime.
//
// Answers every action from a JSON fixture instead of the network, so the
// whole bridge can run on a desktop, in CI, or behind the CLI.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use directbridge_core::error::Result;
use directbridge_core::types::Action;
use directbridge_protocol::{RemoteSdk, SdkClient, Thrown};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// How the scripted SDK answers one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Fulfil with this result.
    Resolve(Value),
    /// Reject with this value (normalized like any SDK rejection).
    Reject(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureResponse {
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Simulated network latency.
    #[serde(default)]
    pub delay_ms: u64,
}

/// Fixture file contents.
///
/// ```json
/// {
///   "rejected_keys": ["pk_revoked"],
///   "responses": {
///     "createToken": { "resolve": { "token": "tok_123" }, "delay_ms": 20 },
///     "getBinInformation": { "reject": { "message": "BIN not found", "code": 404 } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Keys the SDK factory refuses to build a client for.
    pub rejected_keys: Vec<String>,
    pub responses: HashMap<Action, FixtureResponse>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let fixture: Self = serde_json::from_str(&text)?;
        info!(path = %path.display(), actions = fixture.responses.len(), "fixture loaded");
        Ok(fixture)
    }

    pub fn resolve(mut self, action: Action, result: Value) -> Self {
        self.responses.insert(
            action,
            FixtureResponse {
                outcome: Outcome::Resolve(result),
                delay_ms: 0,
            },
        );
        self
    }

    pub fn reject(mut self, action: Action, error: Value) -> Self {
        self.responses.insert(
            action,
            FixtureResponse {
                outcome: Outcome::Reject(error),
                delay_ms: 0,
            },
        );
        self
    }

    /// Delay the answer for `action`; no effect if it has no response yet.
    pub fn delayed(mut self, action: Action, delay: Duration) -> Self {
        if let Some(response) = self.responses.get_mut(&action) {
            response.delay_ms = delay.as_millis() as u64;
        }
        self
    }
}

/// A [`RemoteSdk`] backed by a [`Fixture`].
#[derive(Debug, Clone)]
pub struct FixtureSdk {
    fixture: Arc<Fixture>,
}

impl FixtureSdk {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Arc::new(fixture),
        }
    }
}

impl RemoteSdk for FixtureSdk {
    fn client(&self, key: &str) -> std::result::Result<Arc<dyn SdkClient>, Thrown> {
        if self.fixture.rejected_keys.iter().any(|k| k == key) {
            return Err(Thrown::error("Error", &format!("Invalid public key: {key}")));
        }
        Ok(Arc::new(FixtureClient {
            fixture: self.fixture.clone(),
            key: key.to_owned(),
        }))
    }
}

struct FixtureClient {
    fixture: Arc<Fixture>,
    key: String,
}

impl FixtureClient {
    async fn answer(&self, action: Action, input: Value) -> std::result::Result<Value, Thrown> {
        debug!(%action, key = %self.key, %input, "fixture call");
        let Some(response) = self.fixture.responses.get(&action) else {
            return Err(Thrown::error("Error", &format!("No fixture for {action}")));
        };
        if response.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
        }
        match &response.outcome {
            Outcome::Resolve(result) => Ok(result.clone()),
            Outcome::Reject(error) => Err(Thrown::from(error)),
        }
    }
}

#[async_trait]
impl SdkClient for FixtureClient {
    async fn create_token(&self, payload: Value) -> std::result::Result<Value, Thrown> {
        self.answer(Action::CreateToken, payload).await
    }

    async fn get_bin_information(&self, args: Vec<Value>) -> std::result::Result<Value, Thrown> {
        self.answer(Action::GetBinInformation, Value::Array(args)).await
    }

    async fn get_installments_plan(&self, args: Vec<Value>) -> std::result::Result<Value, Thrown> {
        self.answer(Action::GetInstallmentsPlan, Value::Array(args)).await
    }
}
