// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Admission control against per-device thermal envelopes.

use crate::sample::{now_ms, SampleHistory, ThermalSample};
use caldera_devices::{Device, DeviceClass};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a thermal admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Safe to run the estimated workload.
    Approve,
    /// Workload would cross the soft threshold; halve it or pick
    /// another device.
    Throttle,
    /// Device is at or past its hard limit. In-flight offloaded work
    /// on it must be evacuated back to the CPU.
    Reject,
}

/// Governor tuning knobs.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Maximum age of a cached sensor sample. Zero disables caching
    /// and re-reads the sensor on every check.
    pub staleness_ms: u64,

    /// Samples retained per device.
    pub history_cap: usize,

    /// Samples used for trend extrapolation. Below two disables
    /// predictive throttling.
    pub prediction_window: usize,

    /// How far ahead the trend is extrapolated.
    pub prediction_horizon_ms: u64,

    /// Hard-limit overrides by device class, in degrees Celsius.
    pub class_limit_overrides: FxHashMap<DeviceClass, f64>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            staleness_ms: 50,
            history_cap: 256,
            prediction_window: 8,
            prediction_horizon_ms: 250,
            class_limit_overrides: FxHashMap::default(),
        }
    }
}

struct DeviceThermal {
    history: SampleHistory,
    cached: Option<(f64, Instant)>,
}

/// Thermal governor.
///
/// Holds a rolling sample history and an evacuation board, both keyed
/// per device behind per-device locks so checks against unrelated
/// devices never serialize.
pub struct ThermalGovernor {
    config: GovernorConfig,
    devices: RwLock<FxHashMap<SmolStr, Arc<Mutex<DeviceThermal>>>>,
    evacuations: Mutex<FxHashSet<SmolStr>>,
}

impl ThermalGovernor {
    /// Create a governor with default configuration.
    pub fn new() -> Self {
        Self::with_config(GovernorConfig::default())
    }

    /// Create a governor with explicit configuration.
    pub fn with_config(config: GovernorConfig) -> Self {
        Self {
            config,
            devices: RwLock::new(FxHashMap::default()),
            evacuations: Mutex::new(FxHashSet::default()),
        }
    }

    /// Effective hard limit for a device, honouring class overrides.
    pub fn effective_limit(&self, device: &Device) -> f64 {
        self.config
            .class_limit_overrides
            .get(&device.class())
            .copied()
            .unwrap_or_else(|| device.thermal_limit())
    }

    /// Soft threshold: effective limit minus the device's margin.
    pub fn soft_threshold(&self, device: &Device) -> f64 {
        self.effective_limit(device) - device.throttle_margin()
    }

    /// Degrees remaining before the effective hard limit.
    pub fn headroom(&self, device: &Device) -> f64 {
        self.effective_limit(device) - self.sample(device)
    }

    /// Current temperature, through the staleness cache, with the
    /// sample recorded in the rolling history.
    pub fn current(&self, device: &Device) -> f64 {
        self.sample(device)
    }

    /// Admission decision for running a workload with the given
    /// estimated temperature rise on `device`.
    ///
    /// Side effects: records a sample in the rolling history, and on
    /// Reject marks the device for evacuation.
    pub fn admit(&self, device: &Device, estimated_rise: f64) -> Admission {
        let current = self.sample(device);
        let limit = self.effective_limit(device);
        let soft = limit - device.throttle_margin();

        if current >= limit {
            warn!(device = %device.id(), current, limit, "thermal hard limit reached, rejecting");
            self.mark_evacuation(device.id());
            return Admission::Reject;
        }

        if current + estimated_rise >= soft {
            debug!(device = %device.id(), current, estimated_rise, soft, "throttling");
            return Admission::Throttle;
        }

        if self.config.prediction_window >= 2 {
            let state = self.state_for(device.id());
            let guard = lock(&state);
            let predicted = guard
                .history
                .predict(self.config.prediction_window, self.config.prediction_horizon_ms);
            if let Some(predicted) = predicted {
                if predicted >= soft {
                    debug!(device = %device.id(), predicted, soft, "predictive throttle");
                    return Admission::Throttle;
                }
            }
        }

        Admission::Approve
    }

    /// Whether a hard-limit rejection has flagged this device for
    /// forced migration of its in-flight work.
    pub fn evacuation_pending(&self, device_id: &str) -> bool {
        lock(&self.evacuations).contains(device_id)
    }

    /// Clear an evacuation flag once migration has been handled.
    /// Returns whether a flag was present.
    pub fn clear_evacuation(&self, device_id: &str) -> bool {
        lock(&self.evacuations).remove(device_id)
    }

    /// Devices currently flagged for evacuation.
    pub fn pending_evacuations(&self) -> Vec<SmolStr> {
        lock(&self.evacuations).iter().cloned().collect()
    }

    /// Peak temperature observed on a device at or after `at_ms`.
    pub fn peak_since(&self, device_id: &str, at_ms: u64) -> Option<f64> {
        let state = self.existing_state(device_id)?;
        let guard = lock(&state);
        guard.history.peak_since(at_ms)
    }

    /// Snapshot of a device's sample history, oldest first.
    pub fn history_snapshot(&self, device_id: &str) -> Vec<ThermalSample> {
        match self.existing_state(device_id) {
            Some(state) => lock(&state).history.samples().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Serialize a device's sample history to JSON for diagnostics.
    pub fn history_json(&self, device_id: &str) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.history_snapshot(device_id))
    }

    fn mark_evacuation(&self, device_id: &SmolStr) {
        lock(&self.evacuations).insert(device_id.clone());
    }

    fn sample(&self, device: &Device) -> f64 {
        let state = self.state_for(device.id());
        let mut guard = lock(&state);

        if self.config.staleness_ms > 0 {
            if let Some((celsius, taken)) = guard.cached {
                if taken.elapsed() <= Duration::from_millis(self.config.staleness_ms) {
                    return celsius;
                }
            }
        }

        let celsius = device.temperature();
        guard.cached = Some((celsius, Instant::now()));
        guard.history.push(ThermalSample {
            device: device.id().clone(),
            celsius,
            at_ms: now_ms(),
        });
        celsius
    }

    fn state_for(&self, device_id: &SmolStr) -> Arc<Mutex<DeviceThermal>> {
        if let Some(state) = self.existing_state(device_id) {
            return state;
        }
        let mut map = match self.devices.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(map.entry(device_id.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(DeviceThermal {
                history: SampleHistory::new(self.config.history_cap),
                cached: None,
            }))
        }))
    }

    fn existing_state(&self, device_id: &str) -> Option<Arc<Mutex<DeviceThermal>>> {
        let map = match self.devices.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(device_id).cloned()
    }
}

impl Default for ThermalGovernor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caldera_devices::{FixedSensor, ScriptedSensor};

    fn uncached() -> GovernorConfig {
        GovernorConfig {
            staleness_ms: 0,
            ..GovernorConfig::default()
        }
    }

    fn device_at(celsius: f64) -> Device {
        // Limit 85, default margin 7 -> soft threshold 78.
        Device::new(
            "igpu0",
            DeviceClass::IntegratedGpu,
            900.0,
            85.0,
            Box::new(FixedSensor::new(celsius)),
        )
    }

    #[test]
    fn test_approve_with_headroom() {
        let governor = ThermalGovernor::with_config(uncached());
        let device = device_at(60.0);
        assert_eq!(governor.admit(&device, 5.0), Admission::Approve);
        assert!((governor.headroom(&device) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_throttle_when_rise_crosses_soft_threshold() {
        let governor = ThermalGovernor::with_config(uncached());
        let device = device_at(70.0);
        // 70 + 10 >= 78
        assert_eq!(governor.admit(&device, 10.0), Admission::Throttle);
    }

    #[test]
    fn test_reject_at_hard_limit_marks_evacuation() {
        let governor = ThermalGovernor::with_config(uncached());
        let device = device_at(86.0);
        assert_eq!(governor.admit(&device, 0.0), Admission::Reject);
        assert!(governor.evacuation_pending("igpu0"));
        assert!(governor.clear_evacuation("igpu0"));
        assert!(!governor.evacuation_pending("igpu0"));
    }

    #[test]
    fn test_class_limit_override() {
        let mut config = uncached();
        config.class_limit_overrides.insert(DeviceClass::IntegratedGpu, 70.0);
        let governor = ThermalGovernor::with_config(config);
        let device = device_at(72.0);
        // Over the overridden limit even though under the rated one.
        assert_eq!(governor.admit(&device, 0.0), Admission::Reject);
    }

    #[test]
    fn test_staleness_cache_bounds_sensor_reads() {
        let mut config = GovernorConfig::default();
        config.staleness_ms = 10_000;
        config.prediction_window = 0;
        let governor = ThermalGovernor::with_config(config);

        let sensor = ScriptedSensor::new(50.0, [50.0, 90.0]);
        let device = Device::new(
            "cpu0",
            DeviceClass::Cpu,
            200.0,
            95.0,
            Box::new(sensor),
        );

        assert_eq!(governor.admit(&device, 0.0), Admission::Approve);
        // Second check inside the staleness window reuses the cached
        // 50 degree sample; the scripted 90 degree reading is not seen.
        assert_eq!(governor.admit(&device, 0.0), Admission::Approve);
    }

    #[test]
    fn test_predictive_throttle_on_steep_ramp() {
        let mut config = uncached();
        config.prediction_window = 4;
        config.prediction_horizon_ms = 250;
        let governor = ThermalGovernor::with_config(config);

        let sensor = ScriptedSensor::new(50.0, [50.0, 60.0, 70.0]);
        let device = Device::new(
            "igpu0",
            DeviceClass::IntegratedGpu,
            900.0,
            95.0,
            Box::new(sensor),
        );

        assert_eq!(governor.admit(&device, 0.0), Admission::Approve);
        std::thread::sleep(Duration::from_millis(15));
        governor.admit(&device, 0.0);
        std::thread::sleep(Duration::from_millis(15));
        // Current is 70, soft threshold 88, but the ramp is far too
        // steep to finish 250ms of work safely.
        assert_eq!(governor.admit(&device, 0.0), Admission::Throttle);
    }

    #[test]
    fn test_history_records_samples() {
        let governor = ThermalGovernor::with_config(uncached());
        let device = device_at(61.0);
        governor.admit(&device, 0.0);
        governor.admit(&device, 0.0);
        assert_eq!(governor.history_snapshot("igpu0").len(), 2);
        assert_eq!(governor.peak_since("igpu0", 0), Some(61.0));
        assert!(governor.history_json("igpu0").is_ok());
    }

    #[test]
    fn test_unknown_device_has_no_history() {
        let governor = ThermalGovernor::new();
        assert!(governor.history_snapshot("ghost").is_empty());
        assert_eq!(governor.peak_since("ghost", 0), None);
    }
}
