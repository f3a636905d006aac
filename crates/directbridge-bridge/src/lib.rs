// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DirectBridge — host-side bridge and embedded-runtime transports.
//
// `Bridge` is the same on every platform; only the `RuntimeTransport`
// differs.  Android and iOS drive a WebView; everything else (desktop, CI,
// the CLI) runs the command handler in-process against a scripted SDK.

pub mod adapter;
pub mod fixture;
pub mod in_process;
pub mod page;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

pub use adapter::{Bridge, InboundHandle};
pub use fixture::{Fixture, FixtureSdk};
pub use in_process::InProcessRuntime;
pub use page::{HostFlavor, bridge_script, host_page};
pub use traits::RuntimeTransport;

/// Name of the platform this build targets.
pub fn target_platform() -> &'static str {
    #[cfg(target_os = "ios")]
    {
        "iOS"
    }
    #[cfg(target_os = "android")]
    {
        "Android"
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        "in-process"
    }
}
