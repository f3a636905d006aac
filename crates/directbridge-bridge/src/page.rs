// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host page and bridge script generation for WebView runtimes.
//
// The host page only loads the SDK and signals readiness.  The handler
// itself (`assets/bridge.js`) is injected afterwards, wrapped in a prelude
// that tells it the SDK global and how to post back to the host.  React
// Native pages carry the handler inline.

use directbridge_core::config::BridgeConfig;
use directbridge_protocol::script_literal;

const BRIDGE_JS: &str = include_str!("../assets/bridge.js");

/// Name of the object the Android host registers with `addJavascriptInterface`.
pub const ANDROID_INTERFACE: &str = "AndroidBridge";
/// WKScriptMessageHandler name that carries events on iOS.
pub const IOS_MESSAGE_HANDLER: &str = "iosBridge";
/// WKScriptMessageHandler name that carries the ready signal on iOS.
pub const IOS_READY_HANDLER: &str = "iosBridgeReady";

/// Which native host the page talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFlavor {
    Android,
    Ios,
    /// `react-native-webview`.  The RN host is JavaScript, so the handler is
    /// embedded in the page instead of injected on ready.
    ReactNative,
}

impl HostFlavor {
    /// Body of `postToHost(text)`.
    fn post_statement(self) -> String {
        match self {
            Self::Android => format!("window.{ANDROID_INTERFACE}.postMessage(text);"),
            Self::Ios => format!("window.webkit.messageHandlers.{IOS_MESSAGE_HANDLER}.postMessage(text);"),
            Self::ReactNative => "window.ReactNativeWebView.postMessage(text);".into(),
        }
    }

    /// Extra wiring for hosts that push commands as DOM `message` events.
    /// `react-native-webview` fires on `document` under Android and on
    /// `window` under iOS.
    fn listen_statement(self) -> &'static str {
        match self {
            Self::Android | Self::Ios => "",
            Self::ReactNative => {
                "function onHostMessage(e) {\n\
                 \x20 handle(typeof e.data === 'string' ? e.data : JSON.stringify(e.data));\n\
                 }\n\
                 document.addEventListener('message', onHostMessage);\n\
                 window.addEventListener('message', onHostMessage);\n"
            }
        }
    }

    fn ready_statement(self) -> String {
        match self {
            Self::Android => format!("window.{ANDROID_INTERFACE}.onSDKReady();"),
            Self::Ios => format!("window.webkit.messageHandlers.{IOS_READY_HANDLER}.postMessage('');"),
            Self::ReactNative => "console.log('SDK ready');".into(),
        }
    }
}

/// A JS string literal that is also safe inside an inline `<script>`.
fn inline_literal(text: &str) -> String {
    script_literal(text).replace("</", "<\\/")
}

/// HTML for the WebView: loads the SDK, then signals the host once the SDK
/// global exists.
pub fn host_page(config: &BridgeConfig, flavor: HostFlavor) -> String {
    let display = if config.debug_page { "block" } else { "none" };
    let embedded = match flavor {
        HostFlavor::ReactNative => format!(
            "<script>\n{}</script>\n",
            bridge_script(config, flavor).replace("</", "<\\/")
        ),
        _ => String::new(),
    };
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>DirectBridge</title>
</head>
<body>
<pre id="out" style="display:{display}">Waiting for commands...</pre>
<script>
(function () {{
  var script = document.createElement('script');
  script.src = {url};
  script.onload = function () {{
    if (typeof window[{global}] === 'function') {{
      {ready}
    }} else {{
      console.error('SDK loaded but ' + {global} + ' is missing');
    }}
  }};
  script.onerror = function () {{
    console.error('Failed to load SDK from ' + script.src);
  }};
  document.head.appendChild(script);
}})();
</script>
{embedded}</body>
</html>
"#,
        url = inline_literal(&config.sdk_url),
        global = inline_literal(&config.sdk_global),
        ready = flavor.ready_statement(),
    )
}

/// The handler script to evaluate once the page reports ready.
pub fn bridge_script(config: &BridgeConfig, flavor: HostFlavor) -> String {
    format!(
        "(function () {{\n\
         var SDK_GLOBAL = {global};\n\
         var DEBUG = {debug};\n\
         function postToHost(text) {{ {post} }}\n\
         {BRIDGE_JS}\n\
         {listen}\
         }})();\n",
        global = script_literal(&config.sdk_global),
        debug = config.debug_page,
        post = flavor.post_statement(),
        listen = flavor.listen_statement(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_page_loads_sdk_and_signals_ready() {
        let config = BridgeConfig::default();
        let android = host_page(&config, HostFlavor::Android);
        assert!(android.contains(r#"script.src = "https://js.dlocal.com/direct";"#));
        assert!(android.contains("window.AndroidBridge.onSDKReady();"));
        assert!(android.contains("display:none"));

        let ios = host_page(&config, HostFlavor::Ios);
        assert!(ios.contains("window.webkit.messageHandlers.iosBridgeReady.postMessage('');"));
    }

    #[test]
    fn debug_page_shows_output() {
        let config = BridgeConfig {
            debug_page: true,
            ..BridgeConfig::default()
        };
        assert!(host_page(&config, HostFlavor::Ios).contains("display:block"));
        assert!(bridge_script(&config, HostFlavor::Ios).contains("var DEBUG = true;"));
    }

    #[test]
    fn react_native_page_embeds_the_handler() {
        let config = BridgeConfig::default();
        let page = host_page(&config, HostFlavor::ReactNative);
        assert!(page.contains("window.ReactNativeWebView.postMessage(text);"));
        assert!(page.contains("window.handleMessageFromNative"));
        assert_eq!(page.matches("</script>").count(), 2);

        let android = host_page(&config, HostFlavor::Android);
        assert!(!android.contains("handleMessageFromNative"));
    }

    #[test]
    fn react_native_listens_for_host_messages() {
        let config = BridgeConfig::default();
        let script = bridge_script(&config, HostFlavor::ReactNative);
        assert!(script.contains("document.addEventListener('message', onHostMessage);"));
        assert!(script.contains("window.addEventListener('message', onHostMessage);"));
        assert!(script.trim_end().ends_with("})();"));
        assert!(host_page(&config, HostFlavor::ReactNative).contains("addEventListener('message'"));

        for flavor in [HostFlavor::Android, HostFlavor::Ios] {
            assert!(!bridge_script(&config, flavor).contains("addEventListener"));
        }
    }

    #[test]
    fn hostile_url_cannot_close_the_script_tag() {
        let config = BridgeConfig {
            sdk_url: "https://x.test/\"</script><script>alert(1)//".into(),
            ..BridgeConfig::default()
        };
        let page = host_page(&config, HostFlavor::Android);
        assert_eq!(page.matches("</script>").count(), 1);
        assert!(page.contains(r#"https://x.test/\"<\/script>"#));
    }

    #[test]
    fn bridge_script_binds_global_and_post_target() {
        let config = BridgeConfig {
            sdk_global: "paymentsSdk".into(),
            ..BridgeConfig::default()
        };
        let android = bridge_script(&config, HostFlavor::Android);
        assert!(android.contains(r#"var SDK_GLOBAL = "paymentsSdk";"#));
        assert!(android.contains("window.AndroidBridge.postMessage(text);"));
        assert!(android.contains("window.handleMessageFromNative = function (raw)"));

        let ios = bridge_script(&config, HostFlavor::Ios);
        assert!(!ios.contains("ReactNativeWebView"));
        assert!(ios.contains("window.webkit.messageHandlers.iosBridge.postMessage(text);"));
        assert!(ios.starts_with("(function () {"));
        assert!(ios.trim_end().ends_with("})();"));
    }
}
