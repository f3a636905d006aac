// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS WKWebView transport via objc2.
//
// Requires compilation with the iOS SDK (Xcode).  The host app owns the
// `WKWebView` and hands its pointer over; this module registers two script
// message handlers on the view's user content controller (`iosBridge` for
// events, `iosBridgeReady` for the load signal) and sends commands with
// `evaluateJavaScript:completionHandler:`.
//
// WebKit is main-thread only.  Sends made off the main thread return
// `BridgeError::Transport`.
//
// ## Unsafe code
//
// 1. **ObjC message sends** (msg_send!, define_class! #[unsafe(...)]):
//    required by the objc2 runtime.  Selectors follow Apple's WebKit headers.
//
// 2. **Raw WebView pointer** (`IosWebViewTransport::from_raw`): the caller
//    guarantees the pointer is a live `WKWebView *`.

#![cfg(target_os = "ios")]

use std::ffi::c_void;

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, NSObject};
use objc2::{DefinedClass, MainThreadBound, MainThreadMarker, MainThreadOnly, define_class, msg_send};
use objc2_foundation::NSString;

use directbridge_core::config::BridgeConfig;
use directbridge_core::error::{BridgeError, Result};
use directbridge_protocol::inbound_call_script;

use crate::adapter::InboundHandle;
use crate::page::{HostFlavor, IOS_MESSAGE_HANDLER, IOS_READY_HANDLER, bridge_script, host_page};
use crate::traits::RuntimeTransport;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_main_thread() -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| BridgeError::Transport("must be called from the main thread".into()))
}

// ---------------------------------------------------------------------------
// Script message handler (WKScriptMessageHandler)
// ---------------------------------------------------------------------------

struct ScriptHandlerIvars {
    inbound: InboundHandle,
}

// SAFETY: define_class! #[unsafe(super(NSObject))] declares ScriptHandler as
// an ObjC class inheriting from NSObject.  MainThreadOnly matches WebKit,
// which delivers script messages on the main thread.
define_class! {
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "DirectBridgeScriptHandler"]
    #[ivars = ScriptHandlerIvars]
    struct ScriptHandler;

    impl ScriptHandler {
        /// `-[WKScriptMessageHandler userContentController:didReceiveScriptMessage:]`
        #[unsafe(method(userContentController:didReceiveScriptMessage:))]
        fn did_receive(&self, _controller: &AnyObject, message: &AnyObject) {
            // SAFETY: `name` and `body` are WKScriptMessage properties.
            let name: Retained<NSString> = unsafe { msg_send![message, name] };
            let body: Option<Retained<AnyObject>> = unsafe { msg_send![message, body] };

            let name = name.to_string();
            if name == IOS_READY_HANDLER {
                if let Err(e) = self.ivars().inbound.page_loaded() {
                    tracing::error!(error = %e, "iOS: load signal failed");
                }
                return;
            }
            if name != IOS_MESSAGE_HANDLER {
                tracing::debug!(handler = %name, "iOS: message for unknown handler");
                return;
            }
            match body.as_deref().and_then(|b| b.downcast_ref::<NSString>()) {
                Some(text) => self.ivars().inbound.post_message(&text.to_string()),
                None => tracing::warn!("iOS: script message body is not a string"),
            }
        }
    }
}

impl ScriptHandler {
    fn new(mtm: MainThreadMarker, inbound: InboundHandle) -> Retained<Self> {
        let this = mtm.alloc::<Self>();
        let this = this.set_ivars(ScriptHandlerIvars { inbound });
        // SAFETY: Standard NSObject init via super.
        unsafe { msg_send![super(this), init] }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Drives a host-owned `WKWebView`.
pub struct IosWebViewTransport {
    web_view: MainThreadBound<Retained<AnyObject>>,
}

impl IosWebViewTransport {
    /// Wrap the host's WebView.
    ///
    /// # Safety
    ///
    /// `web_view` must point to a live `WKWebView`.
    pub unsafe fn from_raw(mtm: MainThreadMarker, web_view: *mut AnyObject) -> Result<Self> {
        // SAFETY: guaranteed by the caller.
        let web_view = unsafe { Retained::retain(web_view) }
            .ok_or_else(|| BridgeError::Transport("WKWebView pointer is null".into()))?;
        Ok(Self {
            web_view: MainThreadBound::new(web_view, mtm),
        })
    }

    /// Load the host page into the WebView.
    pub fn load_host_page(&self, config: &BridgeConfig) -> Result<()> {
        let mtm = require_main_thread()?;
        let html = NSString::from_str(&host_page(config, HostFlavor::Ios));
        let web_view = self.web_view.get(mtm);
        // SAFETY: loadHTMLString:baseURL: with a nil base URL.  The returned
        // WKNavigation is not needed.
        let _: Option<Retained<AnyObject>> = unsafe {
            msg_send![
                &**web_view,
                loadHTMLString: &*html,
                baseURL: std::ptr::null::<AnyObject>()
            ]
        };
        tracing::info!("iOS: host page loading");
        Ok(())
    }

    fn evaluate(&self, script: &str) -> Result<()> {
        let mtm = require_main_thread()?;
        let js = NSString::from_str(script);
        let web_view = self.web_view.get(mtm);
        // SAFETY: evaluateJavaScript:completionHandler: accepts a nil block.
        unsafe {
            let _: () = msg_send![
                &**web_view,
                evaluateJavaScript: &*js,
                completionHandler: std::ptr::null::<c_void>()
            ];
        }
        Ok(())
    }

    fn register_handlers(&self, mtm: MainThreadMarker, inbound: InboundHandle) {
        let web_view = self.web_view.get(mtm);
        let handler = ScriptHandler::new(mtm, inbound);
        // SAFETY: `configuration.userContentController` is non-nil for any
        // initialised WKWebView.  The controller retains the handler.
        unsafe {
            let configuration: Retained<AnyObject> = msg_send![&**web_view, configuration];
            let controller: Retained<AnyObject> =
                msg_send![&*configuration, userContentController];
            for name in [IOS_MESSAGE_HANDLER, IOS_READY_HANDLER] {
                let name = NSString::from_str(name);
                let _: () = msg_send![
                    &*controller,
                    addScriptMessageHandler: &*handler,
                    name: &*name
                ];
            }
        }
    }
}

impl RuntimeTransport for IosWebViewTransport {
    fn platform_name(&self) -> &str {
        "iOS"
    }

    fn attach(&self, inbound: InboundHandle) {
        match require_main_thread() {
            Ok(mtm) => self.register_handlers(mtm, inbound),
            Err(e) => tracing::error!(error = %e, "iOS: script handlers not registered"),
        }
    }

    fn deliver(&self, command_json: &str) -> Result<()> {
        self.evaluate(&inbound_call_script(command_json))
    }

    fn install_bridge_script(&self, config: &BridgeConfig) -> Result<()> {
        tracing::debug!("iOS: injecting bridge script");
        self.evaluate(&bridge_script(config, HostFlavor::Ios))
    }
}
