// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android WebView transport via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`.
//
// ## Architecture notes
//
// The host Activity owns the `android.webkit.WebView`.  Its Kotlin glue
// (`com.directbridge.NativeBridge`) must:
//
// 1. call `nativeRegisterWebView(webView)` once the view exists,
// 2. register a `@JavascriptInterface` object as `AndroidBridge` whose
//    `postMessage(String)` forwards to `nativePostMessage` and whose
//    `onSDKReady()` forwards to `nativeOnSdkReady`.
//
// `WebView` methods must run on the UI thread, so sends and the ready
// callback have to happen there as well.

#![cfg(target_os = "android")]

use std::sync::OnceLock;

use jni::{JNIEnv, JavaVM};
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};

use directbridge_core::config::BridgeConfig;
use directbridge_core::error::{BridgeError, Result};
use directbridge_protocol::inbound_call_script;

use crate::adapter::InboundHandle;
use crate::page::{HostFlavor, bridge_script, host_page};
use crate::traits::RuntimeTransport;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// The WebView handed over by `nativeRegisterWebView`.
static WEB_VIEW: OnceLock<GlobalRef> = OnceLock::new();

/// The bridge the JavaScript interface reports into.  One per process.
static INBOUND: OnceLock<InboundHandle> = OnceLock::new();

/// The process JavaVM, taken from the NDK context on first use.
static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| jni_err("failed to obtain JavaVM", e))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| jni_err("failed to attach JNI thread", e))
}

fn jni_err(context: &str, e: jni::errors::Error) -> BridgeError {
    BridgeError::Transport(format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Drives a registered `android.webkit.WebView`.
pub struct AndroidWebViewTransport {
    web_view: GlobalRef,
}

impl AndroidWebViewTransport {
    /// Use the WebView the host registered through `nativeRegisterWebView`.
    ///
    /// Returns `PlatformUnavailable` if no WebView has been registered yet.
    pub fn registered() -> Result<Self> {
        let web_view = WEB_VIEW.get().cloned().ok_or(BridgeError::PlatformUnavailable)?;
        Ok(Self { web_view })
    }

    /// Load the host page into the WebView.
    pub fn load_host_page(&self, config: &BridgeConfig) -> Result<()> {
        let mut env = jni_env()?;
        let html = env
            .new_string(host_page(config, HostFlavor::Android))
            .map_err(|e| jni_err("new_string(html)", e))?;
        let mime = env
            .new_string("text/html")
            .map_err(|e| jni_err("new_string(mime)", e))?;
        let encoding = env
            .new_string("utf-8")
            .map_err(|e| jni_err("new_string(encoding)", e))?;
        let base_url = env
            .new_string("https://localhost/")
            .map_err(|e| jni_err("new_string(base)", e))?;

        env.call_method(
            self.web_view.as_obj(),
            "loadDataWithBaseURL",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V",
            &[
                JValue::Object(&base_url),
                JValue::Object(&html),
                JValue::Object(&mime),
                JValue::Object(&encoding),
                JValue::Object(&JObject::null()),
            ],
        )
        .map_err(|e| jni_err("loadDataWithBaseURL", e))?;

        tracing::info!("Android: host page loading");
        Ok(())
    }

    /// `webView.evaluateJavascript(script, null)`.
    fn evaluate(&self, script: &str) -> Result<()> {
        let mut env = jni_env()?;
        let js = env
            .new_string(script)
            .map_err(|e| jni_err("new_string(script)", e))?;
        env.call_method(
            self.web_view.as_obj(),
            "evaluateJavascript",
            "(Ljava/lang/String;Landroid/webkit/ValueCallback;)V",
            &[JValue::Object(&js), JValue::Object(&JObject::null())],
        )
        .map_err(|e| jni_err("evaluateJavascript", e))?;
        // Permanently attached threads never pop a local frame.
        env.delete_local_ref(js)
            .map_err(|e| jni_err("delete_local_ref", e))?;
        Ok(())
    }
}

impl RuntimeTransport for AndroidWebViewTransport {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn attach(&self, inbound: InboundHandle) {
        if INBOUND.set(inbound).is_err() {
            tracing::warn!("Android: a bridge is already attached; callbacks stay with it");
        }
    }

    fn deliver(&self, command_json: &str) -> Result<()> {
        self.evaluate(&inbound_call_script(command_json))
    }

    fn install_bridge_script(&self, config: &BridgeConfig) -> Result<()> {
        tracing::debug!("Android: injecting bridge script");
        self.evaluate(&bridge_script(config, HostFlavor::Android))
    }
}

// ---------------------------------------------------------------------------
// JNI exports (com.directbridge.NativeBridge)
// ---------------------------------------------------------------------------

/// `external fun nativeRegisterWebView(webView: WebView)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_directbridge_NativeBridge_nativeRegisterWebView(
    env: JNIEnv,
    _class: JClass,
    web_view: JObject,
) {
    match env.new_global_ref(&web_view) {
        Ok(global) => {
            if WEB_VIEW.set(global).is_err() {
                tracing::warn!("Android: WebView already registered");
            }
        }
        Err(e) => tracing::error!(error = %e, "Android: could not pin WebView"),
    }
}

/// `external fun nativeOnSdkReady()`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_directbridge_NativeBridge_nativeOnSdkReady(
    _env: JNIEnv,
    _class: JClass,
) {
    match INBOUND.get() {
        Some(inbound) => {
            if let Err(e) = inbound.page_loaded() {
                tracing::error!(error = %e, "Android: load signal failed");
            }
        }
        None => tracing::warn!("Android: SDK ready before a bridge was attached"),
    }
}

/// `external fun nativePostMessage(message: String)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_directbridge_NativeBridge_nativePostMessage(
    mut env: JNIEnv,
    _class: JClass,
    message: JString,
) {
    let raw: String = match env.get_string(&message) {
        Ok(s) => s.into(),
        Err(e) => {
            tracing::warn!(error = %e, "Android: unreadable message from WebView");
            return;
        }
    };
    match INBOUND.get() {
        Some(inbound) => inbound.post_message(&raw),
        None => tracing::warn!("Android: message before a bridge was attached"),
    }
}
