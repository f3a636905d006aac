// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The host-side bridge.
//
// Owns the Initializing -> Ready state machine, the pre-ready queue, the
// table of in-flight calls and the event fan-out.  Every platform adapter
// is this struct plus a `RuntimeTransport`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use directbridge_core::config::{BridgeConfig, PreReadyPolicy};
use directbridge_core::error::{BridgeError, Result};
use directbridge_core::types::{BridgeState, CardPayload, Command, CommandId, Event};
use directbridge_protocol::{decode_event, encode_command};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::traits::RuntimeTransport;

type PendingCalls = HashMap<CommandId, oneshot::Sender<Result<Event>>>;

struct Inner {
    config: BridgeConfig,
    transport: Arc<dyn RuntimeTransport>,
    state: watch::Sender<BridgeState>,
    loaded: AtomicBool,
    /// Encoded commands waiting for Ready, with the id of the `call` that
    /// waits on each.  The lock also orders enqueueing against the Ready
    /// transition.
    queue: Mutex<VecDeque<(Option<CommandId>, String)>>,
    pending: Mutex<PendingCalls>,
    events: broadcast::Sender<Event>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host-side handle on one embedded runtime.
///
/// Cheap to clone; all clones drive the same runtime.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Create a bridge over `transport` and attach the transport to it.
    ///
    /// The bridge starts in `Initializing`.
    pub fn new(config: BridgeConfig, transport: Arc<dyn RuntimeTransport>) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(BridgeState::Initializing);
        let (events, _) = broadcast::channel(config.event_buffer);
        let bridge = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state,
                loaded: AtomicBool::new(false),
                queue: Mutex::new(VecDeque::new()),
                pending: Mutex::new(HashMap::new()),
                events,
            }),
        };
        bridge.inner.transport.attach(InboundHandle {
            inner: Arc::downgrade(&bridge.inner),
        });
        info!(platform = bridge.platform_name(), "bridge created");
        Ok(bridge)
    }

    pub fn platform_name(&self) -> &str {
        self.inner.transport.platform_name()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> BridgeState {
        *self.inner.state.borrow()
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Resolve once the bridge is Ready (immediately if it already is).
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state = self.inner.state.subscribe();
        state
            .wait_for(|s| *s == BridgeState::Ready)
            .await
            .map(|_| ())
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Subscribe to every event the runtime emits from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Number of commands waiting for Ready.
    pub fn queued(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Fire-and-forget send.  The outcome arrives as an event.
    ///
    /// Before Ready the configured `PreReadyPolicy` applies: `Drop` rejects
    /// with `NotReady`, `Queue` holds the command (up to `max_queued`) and
    /// delivers it in order once Ready.
    #[instrument(skip_all, fields(action = %command.action))]
    pub fn send(&self, command: &Command) -> Result<()> {
        if command.key.is_empty() {
            return Err(BridgeError::MissingPublicKey);
        }
        let json = encode_command(command)?;

        let mut queue = lock(&self.inner.queue);
        if self.state() == BridgeState::Ready {
            drop(queue);
            return self.inner.transport.deliver(&json);
        }
        match self.inner.config.pre_ready_policy {
            PreReadyPolicy::Drop => {
                warn!("runtime not ready, command dropped");
                Err(BridgeError::NotReady)
            }
            PreReadyPolicy::Queue => {
                if queue.len() >= self.inner.config.max_queued {
                    warn!(queued = queue.len(), "pre-ready queue full");
                    return Err(BridgeError::QueueFull(queue.len()));
                }
                queue.push_back((command.id, json));
                debug!(queued = queue.len(), "command queued until ready");
                Ok(())
            }
        }
    }

    /// Send and wait for the event answering this command.
    ///
    /// The command gets a fresh id unless it already has one.  Fails with
    /// `Timeout` when `call_timeout_ms` elapses first, with the transport's
    /// error if a queued command cannot be delivered, and with `Disconnected`
    /// if the bridge forgets the call without answering it.
    pub async fn call(&self, command: Command) -> Result<Event> {
        let id = command.id.unwrap_or_default();
        let command = command.with_id(id);

        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);
        let slot = PendingSlot {
            inner: &self.inner,
            id,
        };

        self.send(&command)?;

        let answer = match self.inner.config.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(answer) => answer,
                Err(_) => {
                    warn!(%id, action = %command.action, "call timed out");
                    return Err(BridgeError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        drop(slot);
        answer.map_err(|_| BridgeError::Disconnected)?
    }

    /// Tokenize a card.
    pub async fn create_token(&self, key: &str, card: &CardPayload) -> Result<Event> {
        self.call(Command::create_token(key, card)?).await
    }

    /// Look up issuer data for the first digits of a card number.
    pub async fn get_bin_information(&self, key: &str, bin: &str, country: &str) -> Result<Event> {
        self.call(Command::bin_information(key, bin, country)?).await
    }

    /// Fetch the installment options for an amount.
    pub async fn get_installments_plan(
        &self,
        key: &str,
        amount: impl Into<Value>,
        currency: &str,
        country: &str,
        bin: &str,
    ) -> Result<Event> {
        self.call(Command::installments_plan(key, amount, currency, country, bin)?)
            .await
    }

    /// Feed one raw event string from the runtime into the bridge.
    ///
    /// The decoded event completes the matching `call`, if any, and goes to
    /// every subscriber.  Malformed input becomes an `error` event.
    pub fn on_runtime_message(&self, raw: &str) -> Event {
        let event = decode_event(raw);
        if let Some(id) = event.id {
            match lock(&self.inner.pending).remove(&id) {
                Some(tx) => {
                    // The caller may have gone away; the event is still broadcast.
                    let _ = tx.send(Ok(event.clone()));
                }
                None => debug!(%id, "event for unknown or expired call"),
            }
        }
        if self.inner.events.send(event.clone()).is_err() {
            debug!("event emitted with no subscribers");
        }
        event
    }

    /// Handle the runtime's load signal.
    ///
    /// The first successful call installs the bridge script, flushes queued
    /// commands in send order and moves to Ready.  Later calls do nothing.
    ///
    /// If the script cannot be installed the bridge stays `Initializing`
    /// with its queue intact, and the next load signal tries again.
    pub fn on_page_loaded(&self) -> Result<()> {
        if self.inner.loaded.swap(true, Ordering::SeqCst) {
            debug!("duplicate load signal ignored");
            return Ok(());
        }
        if let Err(e) = self.inner.transport.install_bridge_script(&self.inner.config) {
            self.inner.loaded.store(false, Ordering::SeqCst);
            error!(error = %e, "bridge script install failed; still initializing");
            return Err(e);
        }

        let mut queue = lock(&self.inner.queue);
        let flushed = queue.len();
        for (id, json) in queue.drain(..) {
            if let Err(e) = self.inner.transport.deliver(&json) {
                warn!(error = %e, "queued command could not be delivered");
                self.fail_call(id, e);
            }
        }
        self.inner.state.send_replace(BridgeState::Ready);
        drop(queue);

        info!(platform = self.platform_name(), flushed, "runtime ready");
        Ok(())
    }

    /// Complete a waiting `call` with `err`.
    fn fail_call(&self, id: Option<CommandId>, err: BridgeError) {
        let Some(id) = id else { return };
        if let Some(tx) = lock(&self.inner.pending).remove(&id) {
            let _ = tx.send(Err(err));
        }
    }
}

/// Removes a call's pending entry when `call` returns or is cancelled.
struct PendingSlot<'a> {
    inner: &'a Inner,
    id: CommandId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        lock(&self.inner.pending).remove(&self.id);
    }
}

/// Weak handle a transport uses to report back into its bridge.
///
/// Calls after the bridge is dropped are ignored.
#[derive(Clone)]
pub struct InboundHandle {
    inner: Weak<Inner>,
}

impl InboundHandle {
    fn bridge(&self) -> Option<Bridge> {
        let bridge = self.inner.upgrade().map(|inner| Bridge { inner });
        if bridge.is_none() {
            debug!("bridge dropped, runtime callback ignored");
        }
        bridge
    }

    /// The runtime posted an event string.
    pub fn post_message(&self, raw: &str) {
        if let Some(bridge) = self.bridge() {
            bridge.on_runtime_message(raw);
        }
    }

    /// The runtime finished loading.
    pub fn page_loaded(&self) -> Result<()> {
        match self.bridge() {
            Some(bridge) => bridge.on_page_loaded(),
            None => Ok(()),
        }
    }
}
