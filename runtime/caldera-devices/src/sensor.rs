// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Temperature sensor access.
//!
//! Sampling is pull-based: callers read the sensor when they need a
//! value. Production devices read sysfs thermal zones; tests inject
//! fixed or scripted temperature models.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A source of device temperature readings, in degrees Celsius.
pub trait TemperatureSensor: Send + Sync {
    /// Read the current temperature.
    fn read_celsius(&self) -> f64;
}

/// Sensor that always reports the same temperature.
#[derive(Debug, Clone)]
pub struct FixedSensor {
    celsius: f64,
}

impl FixedSensor {
    /// Create a sensor pinned to `celsius`.
    pub fn new(celsius: f64) -> Self {
        Self { celsius }
    }
}

impl TemperatureSensor for FixedSensor {
    fn read_celsius(&self) -> f64 {
        self.celsius
    }
}

/// Sensor driven by a programmed sequence of readings.
///
/// Each read pops the next value; once the sequence is exhausted the
/// last value repeats. Used to simulate heating and cooling curves in
/// tests without real hardware.
pub struct ScriptedSensor {
    script: Mutex<ScriptState>,
}

struct ScriptState {
    pending: VecDeque<f64>,
    last: f64,
}

impl ScriptedSensor {
    /// Create a sensor that replays `readings` in order.
    ///
    /// An empty script reports `initial` forever.
    pub fn new(initial: f64, readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: Mutex::new(ScriptState {
                pending: readings.into_iter().collect(),
                last: initial,
            }),
        }
    }

    /// Append further readings to the script.
    pub fn feed(&self, readings: impl IntoIterator<Item = f64>) {
        let mut state = lock_script(&self.script);
        state.pending.extend(readings);
    }

    /// Number of readings not yet consumed.
    pub fn remaining(&self) -> usize {
        lock_script(&self.script).pending.len()
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read_celsius(&self) -> f64 {
        let mut state = lock_script(&self.script);
        if let Some(next) = state.pending.pop_front() {
            state.last = next;
        }
        state.last
    }
}

fn lock_script(mutex: &Mutex<ScriptState>) -> std::sync::MutexGuard<'_, ScriptState> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sensor reading a Linux sysfs thermal zone (`temp` file, millidegrees).
pub struct SysfsThermalSensor {
    temp_path: PathBuf,
    fallback_celsius: f64,
}

impl SysfsThermalSensor {
    /// Create a sensor for an explicit thermal zone directory.
    pub fn new(zone_dir: impl AsRef<Path>) -> Self {
        Self {
            temp_path: zone_dir.as_ref().join("temp"),
            fallback_celsius: 45.0,
        }
    }

    /// Discover the first available thermal zone, if any.
    pub fn discover() -> Option<Self> {
        let entries = fs::read_dir("/sys/class/thermal").ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let is_zone = name.to_string_lossy().starts_with("thermal_zone");
            if is_zone && path.join("temp").exists() {
                return Some(Self::new(path));
            }
        }
        None
    }

    /// Temperature reported when the zone file cannot be read.
    pub fn set_fallback(&mut self, celsius: f64) {
        self.fallback_celsius = celsius;
    }

    fn read_raw(&self) -> Option<f64> {
        let data = fs::read_to_string(&self.temp_path).ok()?;
        let millidegrees: i64 = data.trim().parse().ok()?;
        Some(millidegrees as f64 / 1000.0)
    }
}

impl TemperatureSensor for SysfsThermalSensor {
    fn read_celsius(&self) -> f64 {
        self.read_raw().unwrap_or(self.fallback_celsius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sensor_repeats() {
        let sensor = FixedSensor::new(42.5);
        assert_eq!(sensor.read_celsius(), 42.5);
        assert_eq!(sensor.read_celsius(), 42.5);
    }

    #[test]
    fn test_scripted_sensor_replays_then_holds() {
        let sensor = ScriptedSensor::new(30.0, [40.0, 50.0]);
        assert_eq!(sensor.read_celsius(), 40.0);
        assert_eq!(sensor.read_celsius(), 50.0);
        // Exhausted: last value repeats.
        assert_eq!(sensor.read_celsius(), 50.0);
        assert_eq!(sensor.read_celsius(), 50.0);
    }

    #[test]
    fn test_scripted_sensor_empty_reports_initial() {
        let sensor = ScriptedSensor::new(25.0, []);
        assert_eq!(sensor.read_celsius(), 25.0);
    }

    #[test]
    fn test_scripted_sensor_feed() {
        let sensor = ScriptedSensor::new(20.0, []);
        sensor.feed([60.0]);
        assert_eq!(sensor.remaining(), 1);
        assert_eq!(sensor.read_celsius(), 60.0);
        assert_eq!(sensor.remaining(), 0);
    }

    #[test]
    fn test_sysfs_sensor_fallback_on_missing_zone() {
        let mut sensor = SysfsThermalSensor::new("/nonexistent/thermal_zone99");
        sensor.set_fallback(33.0);
        assert_eq!(sensor.read_celsius(), 33.0);
    }
}
