// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Compute device descriptors.

use crate::sensor::TemperatureSensor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Class of a compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Multi-core host CPU. Always a valid execution target.
    Cpu,
    /// Integrated GPU sharing the host's physical memory.
    IntegratedGpu,
    /// Discrete GPU with private memory; requires explicit transfers.
    DiscreteGpu,
}

impl DeviceClass {
    /// Whether this class is a GPU of any kind.
    pub fn is_gpu(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Whether buffers must be copied into private device memory.
    pub fn has_private_memory(self) -> bool {
        matches!(self, Self::DiscreteGpu)
    }

    /// Get the class name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::IntegratedGpu => "igpu",
            Self::DiscreteGpu => "dgpu",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single compute device.
///
/// Identity, class, rated throughput and thermal envelope are fixed at
/// registration. Temperature is read through the attached sensor on
/// demand. The busy flag gives simple mutual exclusion: a device runs
/// one offloaded kernel at a time.
pub struct Device {
    id: SmolStr,
    class: DeviceClass,
    throughput_gflops: f64,
    thermal_limit_c: f64,
    throttle_margin_c: f64,
    sensor: Box<dyn TemperatureSensor>,
    busy: AtomicBool,
}

/// Default soft-throttle margin below the hard limit, in degrees.
pub const DEFAULT_THROTTLE_MARGIN_C: f64 = 7.0;

impl Device {
    /// Create a device descriptor.
    pub fn new(
        id: impl Into<SmolStr>,
        class: DeviceClass,
        throughput_gflops: f64,
        thermal_limit_c: f64,
        sensor: Box<dyn TemperatureSensor>,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            throughput_gflops,
            thermal_limit_c,
            throttle_margin_c: DEFAULT_THROTTLE_MARGIN_C,
            sensor,
            busy: AtomicBool::new(false),
        }
    }

    /// Override the soft-throttle margin. Clamped to 5–10 degrees.
    pub fn with_throttle_margin(mut self, margin_c: f64) -> Self {
        self.throttle_margin_c = margin_c.clamp(5.0, 10.0);
        self
    }

    /// Stable device identifier.
    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    /// Device class.
    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Rated theoretical throughput in GFLOP/s.
    pub fn throughput_gflops(&self) -> f64 {
        self.throughput_gflops
    }

    /// Hard thermal limit in degrees Celsius.
    pub fn thermal_limit(&self) -> f64 {
        self.thermal_limit_c
    }

    /// Soft-throttle margin in degrees.
    pub fn throttle_margin(&self) -> f64 {
        self.throttle_margin_c
    }

    /// Soft throttle threshold: hard limit minus the margin.
    pub fn throttle_threshold(&self) -> f64 {
        self.thermal_limit_c - self.throttle_margin_c
    }

    /// Read the current temperature from the sensor.
    pub fn temperature(&self) -> f64 {
        self.sensor.read_celsius()
    }

    /// Try to mark the device busy. Returns `false` if already busy.
    pub fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Return the device to idle.
    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Whether a kernel is currently in flight on this device.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("throughput_gflops", &self.throughput_gflops)
            .field("thermal_limit_c", &self.thermal_limit_c)
            .field("busy", &self.is_busy())
            .finish()
    }
}
