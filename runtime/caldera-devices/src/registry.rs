// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Ordered inventory of registered devices.

use crate::device::{Device, DeviceClass};
use std::sync::Arc;

/// Registry of all compute devices known to the runtime.
///
/// Registration order is preserved: round-robin scheduling cycles
/// devices in the order they were registered.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return its shared handle.
    pub fn register(&mut self, device: Device) -> Arc<Device> {
        let device = Arc::new(device);
        self.devices.push(Arc::clone(&device));
        device
    }

    /// All devices in registration order.
    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.iter().find(|d| d.id() == id).cloned()
    }

    /// The first registered CPU device, if any.
    pub fn cpu(&self) -> Option<Arc<Device>> {
        self.devices
            .iter()
            .find(|d| d.class() == DeviceClass::Cpu)
            .cloned()
    }

    /// All GPU devices (integrated and discrete) in registration order.
    pub fn gpus(&self) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .filter(|d| d.class().is_gpu())
            .cloned()
            .collect()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
