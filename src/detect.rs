//! Platform fact detection
//!
//! Supplies the boolean facts that plan guards reference by name. Detection
//! runs once at startup using pure std primitives (no shelling out) and
//! the engine only ever consumes the resulting booleans through the guard
//! registry.
//!
//! # Built-in guards
//!
//! | Name        | True when                          |
//! |-------------|------------------------------------|
//! | `elevated`  | effective uid is 0                 |
//! | `uefi`      | firmware booted in UEFI mode       |
//! | `bios`      | firmware booted in legacy BIOS mode|
//! | `intel_cpu` | CPU vendor is Intel                |
//! | `amd_cpu`   | CPU vendor is AMD                  |

// Library API - facts are consumed by embedding front ends
#![allow(dead_code)]

use crate::guards::GuardRegistry;
use std::fmt;
use std::path::Path;

/// Detected firmware mode of the system.
///
/// Determined by checking for the existence of `/sys/firmware/efi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareMode {
    Uefi,
    Bios,
}

impl FirmwareMode {
    pub fn is_uefi(self) -> bool {
        matches!(self, Self::Uefi)
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uefi => write!(f, "UEFI"),
            Self::Bios => write!(f, "BIOS"),
        }
    }
}

/// CPU vendor, as far as guards care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuVendor {
    Intel,
    Amd,
    Other,
}

impl fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intel => write!(f, "Intel"),
            Self::Amd => write!(f, "AMD"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Aggregated detection results.
///
/// Created once via `PlatformFacts::detect()` before a run. Detection never
/// panics; ambiguity falls back to the conservative value (not elevated,
/// BIOS, Other vendor).
#[derive(Debug, Clone)]
pub struct PlatformFacts {
    pub firmware: FirmwareMode,
    pub cpu: CpuVendor,
    pub elevated: bool,
}

impl PlatformFacts {
    /// Detect the environment.
    pub fn detect() -> Self {
        let firmware = detect_firmware_mode();
        let cpu = detect_cpu_vendor();
        let elevated = detect_elevated();

        log::info!(
            "platform detection: firmware={}, cpu={}, elevated={}",
            firmware,
            cpu,
            elevated
        );

        Self { firmware, cpu, elevated }
    }

    /// Build a guard registry exposing these facts under the built-in names.
    pub fn guard_registry(&self) -> GuardRegistry {
        let mut registry = GuardRegistry::new();
        registry.register_fact("elevated", self.elevated);
        registry.register_fact("uefi", self.firmware.is_uefi());
        registry.register_fact("bios", !self.firmware.is_uefi());
        registry.register_fact("intel_cpu", self.cpu == CpuVendor::Intel);
        registry.register_fact("amd_cpu", self.cpu == CpuVendor::Amd);
        registry
    }
}

fn detect_firmware_mode() -> FirmwareMode {
    if Path::new("/sys/firmware/efi").exists() {
        FirmwareMode::Uefi
    } else {
        FirmwareMode::Bios
    }
}

fn detect_cpu_vendor() -> CpuVendor {
    match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(contents) => parse_cpu_vendor(&contents),
        Err(e) => {
            log::warn!("could not read /proc/cpuinfo: {}", e);
            CpuVendor::Other
        }
    }
}

fn parse_cpu_vendor(cpuinfo: &str) -> CpuVendor {
    for line in cpuinfo.lines() {
        if let Some(value) = line.strip_prefix("vendor_id") {
            let vendor = value.trim_start_matches([':', ' ', '\t']).trim();
            return match vendor {
                "GenuineIntel" => CpuVendor::Intel,
                "AuthenticAMD" => CpuVendor::Amd,
                _ => CpuVendor::Other,
            };
        }
    }
    CpuVendor::Other
}

fn detect_elevated() -> bool {
    match std::fs::read_to_string("/proc/self/status") {
        Ok(contents) => parse_effective_uid(&contents) == Some(0),
        Err(e) => {
            log::warn!("could not read /proc/self/status: {}", e);
            false
        }
    }
}

/// Effective uid is the second field of the `Uid:` line.
fn parse_effective_uid(status: &str) -> Option<u32> {
    let line = status.lines().find(|l| l.starts_with("Uid:"))?;
    line.split_whitespace().nth(2)?.parse().ok()
}
