//! Service control
//!
//! Compensating actions need to flip service startup modes and start or stop
//! services: side effects the generic key/value backup model cannot capture.
//! The engine talks to the `ServiceController` trait; `SystemdController`
//! drives `systemctl` through the tool runner (exit status authoritative,
//! bounded timeout, like every other external invocation).

// Library API - stop is consumed by apply-side service steps downstream
#![allow(dead_code)]

use crate::error::Result;
use crate::runner::{DEFAULT_TOOL_TIMEOUT, ToolInvocation, run_tool};
use crate::types::StartupMode;
use std::time::Duration;

/// Abstraction over the platform service manager.
pub trait ServiceController: Send + Sync {
    /// Change how the service starts at boot.
    fn set_startup(&self, service: &str, mode: StartupMode) -> Result<()>;

    /// Start the service now.
    fn start(&self, service: &str) -> Result<()>;

    /// Stop the service now.
    fn stop(&self, service: &str) -> Result<()>;
}

/// systemctl-backed controller.
///
/// Startup mode mapping: `Automatic` enables the unit, `Manual` disables it
/// (start-on-demand stays possible), `Disabled` masks it so nothing can
/// start it.
pub struct SystemdController {
    timeout: Duration,
}

impl SystemdController {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn systemctl(&self, verb: &str, service: &str) -> Result<()> {
        let invocation = ToolInvocation::new(
            "systemctl",
            vec![verb.to_string(), format!("{}.service", service)],
        )
        .with_timeout(self.timeout);
        let output = run_tool(&invocation)?;
        output.ensure_success(&format!("systemctl {} {}", verb, service))
    }
}

impl Default for SystemdController {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceController for SystemdController {
    fn set_startup(&self, service: &str, mode: StartupMode) -> Result<()> {
        let verb = match mode {
            StartupMode::Automatic => "enable",
            StartupMode::Manual => "disable",
            StartupMode::Disabled => "mask",
        };
        self.systemctl(verb, service)
    }

    fn start(&self, service: &str) -> Result<()> {
        self.systemctl("start", service)
    }

    fn stop(&self, service: &str) -> Result<()> {
        self.systemctl("stop", service)
    }
}
