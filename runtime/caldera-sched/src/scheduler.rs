// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Device selection strategies.

use caldera_devices::Device;
use caldera_thermal::{Admission, ThermalGovernor};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

fn cmp_f64(a: f64, b: f64) -> CmpOrdering {
    a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal)
}

/// Selection strategy, fixed at process configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Cycle candidates in registration order.
    RoundRobin,
    /// Highest rated throughput that the governor will admit.
    Greedy,
    /// Throughput blended with thermal safety margin.
    Adaptive,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Adaptive
    }
}

/// Thermal requirements of one placement decision.
#[derive(Debug, Clone, Copy)]
pub struct WorkRequest {
    /// Expected device temperature rise if the work runs there.
    pub estimated_temp_rise: f64,
}

/// Lifetime selection counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Successful selections.
    pub selected: u64,
    /// Calls where no candidate was eligible.
    pub none_eligible: u64,
}

/// Thermal-aware device selector.
pub struct WorkScheduler {
    strategy: Strategy,
    /// Exponent on the thermal safety factor in the Adaptive score.
    /// 1.0 is a linear blend; higher values favour cooler devices.
    thermal_weight: f64,
    cursor: AtomicUsize,
    selected: AtomicU64,
    none_eligible: AtomicU64,
}

impl WorkScheduler {
    /// Create a scheduler with the given strategy.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            thermal_weight: 1.0,
            cursor: AtomicUsize::new(0),
            selected: AtomicU64::new(0),
            none_eligible: AtomicU64::new(0),
        }
    }

    /// Override the Adaptive thermal weight. Tunable policy, not a
    /// fixed contract.
    pub fn with_thermal_weight(mut self, weight: f64) -> Self {
        self.thermal_weight = weight.max(0.0);
        self
    }

    /// The configured strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Select a target device for `request` among `candidates`, or
    /// `None` when no candidate is eligible.
    ///
    /// Pure decision step: device and buffer state are untouched. The
    /// governor's admission checks append to its sample history, which
    /// is the governor's own side effect.
    pub fn select(
        &self,
        request: &WorkRequest,
        candidates: &[Arc<Device>],
        governor: &ThermalGovernor,
    ) -> Option<Arc<Device>> {
        if candidates.is_empty() {
            self.none_eligible.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let choice = match self.strategy {
            Strategy::RoundRobin => self.select_round_robin(request, candidates, governor),
            Strategy::Greedy => self.select_greedy(request, candidates, governor),
            Strategy::Adaptive => self.select_adaptive(request, candidates, governor),
        };

        match &choice {
            Some(device) => {
                trace!(device = %device.id(), strategy = ?self.strategy, "selected");
                self.selected.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.none_eligible.fetch_add(1, Ordering::Relaxed);
            }
        }
        choice
    }

    fn select_round_robin(
        &self,
        request: &WorkRequest,
        candidates: &[Arc<Device>],
        governor: &ThermalGovernor,
    ) -> Option<Arc<Device>> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..candidates.len() {
            let device = &candidates[(start + offset) % candidates.len()];
            if governor.admit(device, request.estimated_temp_rise) != Admission::Reject {
                return Some(Arc::clone(device));
            }
        }
        None
    }

    fn select_greedy(
        &self,
        request: &WorkRequest,
        candidates: &[Arc<Device>],
        governor: &ThermalGovernor,
    ) -> Option<Arc<Device>> {
        let admissions: Vec<(Admission, &Arc<Device>)> = candidates
            .iter()
            .map(|d| (governor.admit(d, request.estimated_temp_rise), d))
            .collect();

        let best_of = |tier: Admission| {
            admissions
                .iter()
                .filter(|(a, _)| *a == tier)
                .max_by(|(_, x), (_, y)| cmp_f64(x.throughput_gflops(), y.throughput_gflops()))
                .map(|(_, d)| Arc::clone(d))
        };

        // Throttle-tier candidates only when nothing is Approved.
        best_of(Admission::Approve).or_else(|| best_of(Admission::Throttle))
    }

    fn select_adaptive(
        &self,
        request: &WorkRequest,
        candidates: &[Arc<Device>],
        governor: &ThermalGovernor,
    ) -> Option<Arc<Device>> {
        let scored: Vec<(f64, f64, &Arc<Device>)> = candidates
            .iter()
            .filter(|d| governor.admit(d, request.estimated_temp_rise) == Admission::Approve)
            .map(|d| {
                let limit = governor.effective_limit(d);
                let headroom = governor.headroom(d).max(0.0);
                let safety = if limit > 0.0 { headroom / limit } else { 0.0 };
                let score = d.throughput_gflops() * safety.powf(self.thermal_weight);
                (score, headroom, d)
            })
            .collect();

        scored
            .into_iter()
            .max_by(|(score_a, head_a, _), (score_b, head_b, _)| {
                // Ties break toward the larger absolute headroom.
                cmp_f64(*score_a, *score_b).then(cmp_f64(*head_a, *head_b))
            })
            .map(|(_, _, d)| Arc::clone(d))
    }

    /// Lifetime statistics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            selected: self.selected.load(Ordering::Relaxed),
            none_eligible: self.none_eligible.load(Ordering::Relaxed),
        }
    }
}
