//! Constraint gates evaluated before each job firing.

use std::sync::atomic::{AtomicBool, Ordering};

/// Boolean gates a firing must satisfy. Unmet gates defer the firing to the
/// next boundary; they never cancel it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub battery_not_low: bool,
    pub device_idle: bool,
    pub network_required: bool,
}

impl Constraints {
    /// True when every required gate holds for the given host state.
    pub fn satisfied_by(&self, host: &dyn HostStatus) -> bool {
        if self.battery_not_low && host.battery_low() {
            return false;
        }
        if self.device_idle && !host.device_idle() {
            return false;
        }
        if self.network_required && !host.network_available() {
            return false;
        }
        true
    }
}

/// Host/device state the scheduler consults at firing boundaries.
///
/// An injected capability: embedders wire real battery/idle probes here,
/// and the engine never reaches for a global.
pub trait HostStatus: Send + Sync {
    fn battery_low(&self) -> bool;
    fn device_idle(&self) -> bool;
    fn network_available(&self) -> bool;
}

/// Fixed host status.
pub struct StaticHostStatus {
    battery_low: bool,
    device_idle: bool,
    network_available: bool,
}

impl StaticHostStatus {
    pub const fn new(battery_low: bool, device_idle: bool, network_available: bool) -> Self {
        Self {
            battery_low,
            device_idle,
            network_available,
        }
    }

    /// A healthy, idle, online host: every gate passes.
    pub const fn permissive() -> Self {
        Self::new(false, true, true)
    }
}

impl HostStatus for StaticHostStatus {
    fn battery_low(&self) -> bool {
        self.battery_low
    }

    fn device_idle(&self) -> bool {
        self.device_idle
    }

    fn network_available(&self) -> bool {
        self.network_available
    }
}

/// Host status backed by atomics so probe tasks can update it while the
/// scheduler reads it. Starts as a healthy, idle, online host.
pub struct SharedHostStatus {
    battery_low: AtomicBool,
    device_idle: AtomicBool,
    network_available: AtomicBool,
}

impl SharedHostStatus {
    pub fn new() -> Self {
        Self {
            battery_low: AtomicBool::new(false),
            device_idle: AtomicBool::new(true),
            network_available: AtomicBool::new(true),
        }
    }

    pub fn set_battery_low(&self, low: bool) {
        self.battery_low.store(low, Ordering::Relaxed);
    }

    pub fn set_device_idle(&self, idle: bool) {
        self.device_idle.store(idle, Ordering::Relaxed);
    }

    pub fn set_network_available(&self, available: bool) {
        self.network_available.store(available, Ordering::Relaxed);
    }
}

impl Default for SharedHostStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStatus for SharedHostStatus {
    fn battery_low(&self) -> bool {
        self.battery_low.load(Ordering::Relaxed)
    }

    fn device_idle(&self) -> bool {
        self.device_idle.load(Ordering::Relaxed)
    }

    fn network_available(&self) -> bool {
        self.network_available.load(Ordering::Relaxed)
    }
}
