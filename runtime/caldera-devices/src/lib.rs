// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Device descriptor set for Caldera.
//!
//! Static inventory of the compute devices available to the runtime:
//! a multi-core CPU, optionally an integrated GPU sharing system memory,
//! and optionally a discrete GPU with private memory. Each device carries
//! its rated throughput, its thermal envelope, and a temperature sensor.
//!
//! Device identity is immutable for the process lifetime; temperature is
//! re-read through the sensor on demand. The registry is created once at
//! orchestrator construction and passed by reference — there is no
//! process-wide singleton.

pub mod device;
pub mod registry;
pub mod sensor;

pub use device::{Device, DeviceClass};
pub use registry::DeviceRegistry;
pub use sensor::{FixedSensor, ScriptedSensor, SysfsThermalSensor, TemperatureSensor};
