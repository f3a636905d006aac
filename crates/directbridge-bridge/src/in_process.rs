// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process runtime for desktop and CI builds.
//
// Runs the command handler on the current tokio runtime instead of inside a
// WebView.  Each delivered command is handled on its own task, so answers
// come back in completion order, like promises settling in a page.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use directbridge_core::config::BridgeConfig;
use directbridge_core::error::{BridgeError, Result};
use directbridge_protocol::{CommandHandler, RemoteSdk};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::adapter::InboundHandle;
use crate::traits::RuntimeTransport;

pub struct InProcessRuntime {
    handler: CommandHandler,
    runtime: Handle,
    inbound: OnceLock<InboundHandle>,
    installs: AtomicUsize,
}

impl InProcessRuntime {
    /// Create a runtime over `sdk`.  Must be called inside a tokio runtime.
    pub fn new(sdk: Arc<dyn RemoteSdk>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| BridgeError::Transport(format!("no tokio runtime: {e}")))?;
        Ok(Self {
            handler: CommandHandler::new(sdk),
            runtime,
            inbound: OnceLock::new(),
            installs: AtomicUsize::new(0),
        })
    }

    /// Signal that the runtime has loaded, as a WebView does after its page
    /// and the SDK script finish loading.
    pub fn loaded(&self) -> Result<()> {
        self.attached()?.page_loaded()
    }

    /// How many times the bridge script was installed.
    pub fn scripts_installed(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    fn attached(&self) -> Result<&InboundHandle> {
        self.inbound
            .get()
            .ok_or_else(|| BridgeError::Transport("runtime is not attached to a bridge".into()))
    }
}

impl RuntimeTransport for InProcessRuntime {
    fn platform_name(&self) -> &str {
        "in-process"
    }

    fn attach(&self, inbound: InboundHandle) {
        if self.inbound.set(inbound).is_err() {
            warn!("runtime already attached; keeping the first bridge");
        }
    }

    fn deliver(&self, command_json: &str) -> Result<()> {
        let inbound = self.attached()?.clone();
        let handler = self.handler.clone();
        let raw = command_json.to_owned();
        self.runtime.spawn(async move {
            let event = handler.on_inbound_message(&raw).await;
            match serde_json::to_string(&event) {
                Ok(text) => inbound.post_message(&text),
                Err(e) => warn!(error = %e, "event could not be serialized"),
            }
        });
        Ok(())
    }

    fn install_bridge_script(&self, config: &BridgeConfig) -> Result<()> {
        let count = self.installs.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(sdk_global = %config.sdk_global, count, "in-process handler installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use directbridge_core::config::PreReadyPolicy;
    use directbridge_core::types::{Action, BridgeState, CardPayload, EventBody};
    use serde_json::json;

    use super::*;
    use crate::adapter::Bridge;
    use crate::fixture::{Fixture, FixtureSdk};

    fn card() -> CardPayload {
        CardPayload {
            name: "JOHN DOE".into(),
            cvv: "123".into(),
            expiration_month: "12".into(),
            expiration_year: "30".into(),
            pan: "4111111111111111".into(),
            country: "AR".into(),
        }
    }

    fn start(fixture: Fixture, config: BridgeConfig) -> (Bridge, Arc<InProcessRuntime>) {
        let runtime = Arc::new(InProcessRuntime::new(Arc::new(FixtureSdk::new(fixture))).unwrap());
        let bridge = Bridge::new(config, runtime.clone()).unwrap();
        (bridge, runtime)
    }

    #[test]
    fn requires_a_tokio_runtime() {
        let sdk = Arc::new(FixtureSdk::new(Fixture::default()));
        assert!(matches!(
            InProcessRuntime::new(sdk),
            Err(BridgeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn loaded_before_attach_fails() {
        let runtime = InProcessRuntime::new(Arc::new(FixtureSdk::new(Fixture::default()))).unwrap();
        assert!(runtime.loaded().is_err());
    }

    #[tokio::test]
    async fn token_round_trip() {
        let fixture = Fixture::default().resolve(Action::CreateToken, json!({ "token": "tok_123" }));
        let (bridge, runtime) = start(fixture, BridgeConfig::default());
        runtime.loaded().unwrap();
        assert_eq!(bridge.state(), BridgeState::Ready);
        assert_eq!(runtime.scripts_installed(), 1);

        let event = bridge.create_token("pk_test", &card()).await.unwrap();
        match event.body {
            EventBody::Success(success) => {
                assert_eq!(success.action, Action::CreateToken);
                assert_eq!(success.result, json!({ "token": "tok_123" }));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejection_is_normalized() {
        let fixture = Fixture::default().reject(
            Action::GetBinInformation,
            json!({ "message": "BIN not found", "code": 404 }),
        );
        let (bridge, runtime) = start(fixture, BridgeConfig::default());
        runtime.loaded().unwrap();

        let event = bridge.get_bin_information("pk", "000000", "AR").await.unwrap();
        let record = event.as_error().unwrap();
        assert_eq!(record.message, "BIN not found");
        assert_eq!(record.code, Some(json!(404)));
    }

    #[tokio::test]
    async fn factory_error_reaches_the_host() {
        let fixture = Fixture {
            rejected_keys: vec!["pk_revoked".into()],
            ..Fixture::default()
        };
        let (bridge, runtime) = start(fixture, BridgeConfig::default());
        runtime.loaded().unwrap();

        let event = bridge.create_token("pk_revoked", &card()).await.unwrap();
        let record = event.as_error().unwrap();
        assert_eq!(record.message, "Invalid public key: pk_revoked");
        assert_eq!(record.name, Some(json!("Error")));
    }

    #[tokio::test]
    async fn queued_commands_are_answered_after_load() {
        let fixture = Fixture::default()
            .resolve(Action::GetBinInformation, json!({ "brand": "VI" }))
            .resolve(Action::GetInstallmentsPlan, json!({ "installments": [] }));
        let config = BridgeConfig {
            pre_ready_policy: PreReadyPolicy::Queue,
            ..BridgeConfig::default()
        };
        let (bridge, runtime) = start(fixture, config);
        let mut events = bridge.subscribe();

        let bin = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.get_bin_information("pk", "411111", "AR").await }
        });
        let plan = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.get_installments_plan("pk", 1000, "ARS", "AR", "411111").await }
        });
        while bridge.queued() < 2 {
            tokio::task::yield_now().await;
        }

        runtime.loaded().unwrap();

        assert!(bin.await.unwrap().unwrap().is_success());
        assert!(plan.await.unwrap().unwrap().is_success());
        assert!(events.recv().await.unwrap().is_success());
        assert!(events.recv().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn slower_call_settles_last() {
        let fixture = Fixture::default()
            .resolve(Action::CreateToken, json!({ "token": "tok_slow" }))
            .delayed(Action::CreateToken, Duration::from_millis(200))
            .resolve(Action::GetBinInformation, json!({ "brand": "VI" }));
        let (bridge, runtime) = start(fixture, BridgeConfig::default());
        runtime.loaded().unwrap();
        let mut events = bridge.subscribe();

        let token = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.create_token("pk", &card()).await }
        });
        let bin = bridge.get_bin_information("pk", "411111", "AR").await.unwrap();
        assert!(bin.is_success());

        let token = token.await.unwrap().unwrap();
        assert!(token.is_success());

        let actions: Vec<_> = [events.recv().await.unwrap(), events.recv().await.unwrap()]
            .into_iter()
            .map(|event| match event.body {
                EventBody::Success(success) => success.action,
                other => panic!("expected success, got {other:?}"),
            })
            .collect();
        assert_eq!(actions, vec![Action::GetBinInformation, Action::CreateToken]);
    }

    #[tokio::test]
    async fn sends_without_call_arrive_as_events() {
        let fixture = Fixture::default().resolve(Action::GetBinInformation, json!({ "brand": "MC" }));
        let (bridge, runtime) = start(fixture, BridgeConfig::default());
        runtime.loaded().unwrap();
        let mut events = bridge.subscribe();

        let command =
            directbridge_core::types::Command::bin_information("pk", "522222", "BR").unwrap();
        bridge.send(&command).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.id, None);
        assert!(event.is_success());
    }
}
