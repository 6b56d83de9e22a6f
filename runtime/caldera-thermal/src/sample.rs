// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Rolling temperature sample history.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// One temperature sample taken during an admission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSample {
    /// Device the sample was taken from.
    pub device: SmolStr,

    /// Temperature in degrees Celsius.
    pub celsius: f64,

    /// Milliseconds since the Unix epoch.
    pub at_ms: u64,
}

/// Bounded ring of samples for one device, newest last.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<ThermalSample>,
    cap: usize,
}

impl SampleHistory {
    /// Create a history bounded to `cap` samples.
    pub fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: ThermalSample) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&ThermalSample> {
        self.samples.back()
    }

    /// Highest temperature among samples taken at or after `at_ms`.
    pub fn peak_since(&self, at_ms: u64) -> Option<f64> {
        self.samples
            .iter()
            .filter(|s| s.at_ms >= at_ms)
            .map(|s| s.celsius)
            .fold(None, |peak, c| Some(peak.map_or(c, |p: f64| p.max(c))))
    }

    /// Extrapolate the temperature `horizon_ms` past the newest sample.
    ///
    /// Least-squares linear fit over the last `window` samples. Returns
    /// `None` with fewer than two samples or when all timestamps
    /// coincide (no usable trend).
    pub fn predict(&self, window: usize, horizon_ms: u64) -> Option<f64> {
        if window < 2 || self.samples.len() < 2 {
            return None;
        }
        let start = self.samples.len().saturating_sub(window);
        let recent: Vec<&ThermalSample> = self.samples.iter().skip(start).collect();

        let n = recent.len() as f64;
        let t0 = recent[0].at_ms as f64;
        let mean_t: f64 = recent.iter().map(|s| s.at_ms as f64 - t0).sum::<f64>() / n;
        let mean_c: f64 = recent.iter().map(|s| s.celsius).sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var = 0.0;
        for s in &recent {
            let dt = (s.at_ms as f64 - t0) - mean_t;
            cov += dt * (s.celsius - mean_c);
            var += dt * dt;
        }
        if var == 0.0 {
            return None;
        }

        let slope = cov / var;
        let last = self.samples.back()?;
        Some(last.celsius + slope * horizon_ms as f64)
    }

    /// All samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &ThermalSample> {
        self.samples.iter()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
