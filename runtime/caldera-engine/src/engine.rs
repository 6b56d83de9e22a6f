// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! The tiered execution engine.
//!
//! Tracks per-unit tier state behind per-unit locks, promotes units at
//! the configured invocation thresholds, and drives the offload
//! pipeline: device selection, kernel generation, thermal admission,
//! zone staging, launch, and cleanup. Any failure in that pipeline
//! (other than a transiently missing device) downgrades the unit to
//! the compiled tier permanently and completes the invocation there.

use crate::backend::{Backends, CompiledArtifact, KernelArtifact};
use crate::error::{ExecError, ExecResult};
use crate::tier::{Tier, TierThresholds};
use crate::work::{ArgSet, Value, WorkUnit};
use caldera_devices::{Device, DeviceClass, DeviceRegistry};
use caldera_sched::{WorkRequest, WorkScheduler};
use caldera_thermal::{Admission, ThermalGovernor};
use caldera_zones::{PinToken, Zone, ZoneBridge, ZoneError, ZonedBuffer};
use rustc_hash::FxHashMap;
use serde::Serialize;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Result of one engine invocation, with placement telemetry.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// The computed value.
    pub value: Value,
    /// Tier that produced the value.
    pub tier: Tier,
    /// Device used, for offloaded executions.
    pub device: Option<SmolStr>,
    /// Peak device temperature observed over the execution window.
    pub peak_celsius: Option<f64>,
    /// Whether this invocation triggered the one-time offload
    /// downgrade.
    pub downgraded: bool,
}

/// Lifetime execution counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Invocations completed by the interpreter.
    pub interpreted_runs: u64,
    /// Invocations completed by compiled baseline artifacts.
    pub compiled_runs: u64,
    /// Invocations completed on a device.
    pub offloaded_runs: u64,
    /// Invocations completed by native artifacts.
    pub native_runs: u64,
    /// Units downgraded out of the offloaded tier.
    pub downgrades: u64,
    /// Downgrades caused by a thermal rejection or evacuation.
    pub evacuations: u64,
}

#[derive(Default)]
struct Counters {
    interpreted_runs: AtomicU64,
    compiled_runs: AtomicU64,
    offloaded_runs: AtomicU64,
    native_runs: AtomicU64,
    downgrades: AtomicU64,
    evacuations: AtomicU64,
}

struct UnitState {
    tier: Tier,
    invocations: u64,
    /// Set by the one-time downgrade; the unit never re-enters the
    /// offloaded tier afterwards.
    offload_barred: bool,
    compiled: Option<Arc<dyn CompiledArtifact>>,
    native: Option<Arc<dyn CompiledArtifact>>,
    kernels: FxHashMap<DeviceClass, Arc<dyn KernelArtifact>>,
}

impl UnitState {
    fn new() -> Self {
        Self {
            tier: Tier::Interpreted,
            invocations: 0,
            offload_barred: false,
            compiled: None,
            native: None,
            kernels: FxHashMap::default(),
        }
    }
}

/// Releases the device busy flag when the launch scope unwinds.
struct DeviceLease<'a> {
    device: &'a Device,
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        self.device.release();
    }
}

/// Default deadline for a single device kernel launch.
pub const DEFAULT_KERNEL_TIMEOUT: Duration = Duration::from_secs(2);

/// The tiered execution engine.
pub struct TieredEngine {
    backends: Backends,
    thresholds: TierThresholds,
    kernel_timeout: Duration,
    registry: Arc<DeviceRegistry>,
    governor: Arc<ThermalGovernor>,
    bridge: Arc<ZoneBridge>,
    scheduler: Arc<WorkScheduler>,
    units: RwLock<FxHashMap<SmolStr, Arc<Mutex<UnitState>>>>,
    next_pin: AtomicU64,
    counters: Counters,
}

impl TieredEngine {
    /// Create an engine over the given backends and runtime services.
    pub fn new(
        backends: Backends,
        registry: Arc<DeviceRegistry>,
        governor: Arc<ThermalGovernor>,
        bridge: Arc<ZoneBridge>,
        scheduler: Arc<WorkScheduler>,
    ) -> Self {
        Self {
            backends,
            thresholds: TierThresholds::default(),
            kernel_timeout: DEFAULT_KERNEL_TIMEOUT,
            registry,
            governor,
            bridge,
            scheduler,
            units: RwLock::new(FxHashMap::default()),
            next_pin: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// Override the promotion thresholds.
    pub fn with_thresholds(mut self, thresholds: TierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Override the device kernel deadline.
    pub fn with_kernel_timeout(mut self, timeout: Duration) -> Self {
        self.kernel_timeout = timeout;
        self
    }

    /// Execute one invocation of a work unit.
    ///
    /// Applies due tier promotions first, then runs at the unit's
    /// current tier. Offload failures complete the invocation at the
    /// compiled tier; the caller still gets a correct value, with the
    /// fallback reported in the outcome.
    pub fn invoke(&self, unit: &WorkUnit, args: &ArgSet) -> ExecResult<ExecutionOutcome> {
        let handle = self.unit_state(unit.id());
        let mut state = lock(&handle);
        state.invocations += 1;
        self.maybe_promote(&mut state, unit);

        match state.tier {
            Tier::Interpreted => {
                let value = self.backends.interpreter.eval(unit, args)?;
                self.counters.interpreted_runs.fetch_add(1, Ordering::Relaxed);
                Ok(outcome(value, Tier::Interpreted, None, None, false))
            }
            Tier::Compiled => {
                let value = self.run_compiled(&mut state, unit, args)?;
                Ok(outcome(value, Tier::Compiled, None, None, false))
            }
            Tier::Offloaded => match self.try_offload(&mut state, unit, args) {
                Ok((value, device, peak)) => {
                    self.counters.offloaded_runs.fetch_add(1, Ordering::Relaxed);
                    Ok(outcome(value, Tier::Offloaded, Some(device), peak, false))
                }
                Err(ExecError::NoEligibleDevice) => {
                    // Every device busy or rejecting right now. The
                    // unit stays offloaded and retries next invocation.
                    debug!(unit = %unit.id(), "no eligible device, running compiled this round");
                    let value = self.run_compiled(&mut state, unit, args)?;
                    Ok(outcome(value, Tier::Compiled, None, None, false))
                }
                Err(err) => {
                    warn!(unit = %unit.id(), %err, "offload failed, downgrading to compiled");
                    state.tier = Tier::Compiled;
                    state.offload_barred = true;
                    self.counters.downgrades.fetch_add(1, Ordering::Relaxed);
                    if matches!(err, ExecError::ThermalRejected { .. }) {
                        self.counters.evacuations.fetch_add(1, Ordering::Relaxed);
                    }
                    let value = self.run_compiled(&mut state, unit, args)?;
                    Ok(outcome(value, Tier::Compiled, None, None, true))
                }
            },
            Tier::Native => match state.native.clone() {
                Some(artifact) => {
                    let value = artifact.run(args)?;
                    self.counters.native_runs.fetch_add(1, Ordering::Relaxed);
                    Ok(outcome(value, Tier::Native, None, None, false))
                }
                None => Err(ExecError::CompilationFailed {
                    unit: unit.id().to_string(),
                    reason: "no native artifact installed".into(),
                }),
            },
        }
    }

    /// Install an ahead-of-time native artifact for a unit. The unit
    /// moves to the terminal native tier and stays there.
    pub fn install_native(&self, unit_id: &str, artifact: Arc<dyn CompiledArtifact>) {
        let handle = self.unit_state(&SmolStr::new(unit_id));
        let mut state = lock(&handle);
        state.native = Some(artifact);
        state.tier = Tier::Native;
        info!(unit = unit_id, "native artifact installed");
    }

    /// Current tier of a unit, if it has ever been invoked or had a
    /// native artifact installed.
    pub fn tier_of(&self, unit_id: &str) -> Option<Tier> {
        self.existing_state(unit_id).map(|s| lock(&s).tier)
    }

    /// Lifetime invocation count for a unit.
    pub fn invocations_of(&self, unit_id: &str) -> u64 {
        self.existing_state(unit_id)
            .map(|s| lock(&s).invocations)
            .unwrap_or(0)
    }

    /// Whether the one-time downgrade has barred a unit from offload.
    pub fn is_offload_barred(&self, unit_id: &str) -> bool {
        self.existing_state(unit_id)
            .map(|s| lock(&s).offload_barred)
            .unwrap_or(false)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            interpreted_runs: self.counters.interpreted_runs.load(Ordering::Relaxed),
            compiled_runs: self.counters.compiled_runs.load(Ordering::Relaxed),
            offloaded_runs: self.counters.offloaded_runs.load(Ordering::Relaxed),
            native_runs: self.counters.native_runs.load(Ordering::Relaxed),
            downgrades: self.counters.downgrades.load(Ordering::Relaxed),
            evacuations: self.counters.evacuations.load(Ordering::Relaxed),
        }
    }

    fn maybe_promote(&self, state: &mut UnitState, unit: &WorkUnit) {
        if state.tier == Tier::Interpreted && state.invocations >= self.thresholds.tier1 {
            match self.backends.compiler.compile(unit) {
                Ok(artifact) => {
                    state.compiled = Some(artifact);
                    state.tier = Tier::Compiled;
                    info!(unit = %unit.id(), tier = %Tier::Compiled, "promoted");
                }
                Err(err) => {
                    // Stay interpreted; the promotion retries on the
                    // next invocation.
                    warn!(unit = %unit.id(), %err, "baseline compilation failed");
                }
            }
        }
        if state.tier == Tier::Compiled
            && !state.offload_barred
            && unit.is_parallel()
            && state.invocations >= self.thresholds.tier2
        {
            state.tier = Tier::Offloaded;
            info!(unit = %unit.id(), tier = %Tier::Offloaded, "promoted");
        }
    }

    fn run_compiled(&self, state: &mut UnitState, unit: &WorkUnit, args: &ArgSet) -> ExecResult<Value> {
        let artifact = match &state.compiled {
            Some(artifact) => Arc::clone(artifact),
            None => {
                let artifact = self.backends.compiler.compile(unit)?;
                state.compiled = Some(Arc::clone(&artifact));
                artifact
            }
        };
        let value = artifact.run(args)?;
        self.counters.compiled_runs.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// The offload pipeline: select, generate, admit, stage, launch,
    /// unstage. Buffers are back at their origin zones on every exit
    /// path.
    fn try_offload(
        &self,
        state: &mut UnitState,
        unit: &WorkUnit,
        args: &ArgSet,
    ) -> ExecResult<(Value, SmolStr, Option<f64>)> {
        let request = WorkRequest {
            estimated_temp_rise: unit.estimated_temp_rise(),
        };
        let gpus = self.registry.gpus();
        let device = self
            .scheduler
            .select(&request, &gpus, &self.governor)
            .ok_or(ExecError::NoEligibleDevice)?;

        let kernel = match state.kernels.get(&device.class()) {
            Some(kernel) => Arc::clone(kernel),
            None => {
                let kernel = self.backends.kernel_generator.generate(unit, device.class())?;
                state.kernels.insert(device.class(), Arc::clone(&kernel));
                kernel
            }
        };

        match self.governor.admit(&device, unit.estimated_temp_rise()) {
            Admission::Approve => {}
            Admission::Throttle => {
                // Run at reduced intensity rather than bouncing the
                // unit between devices.
                let halved = unit.estimated_temp_rise() / 2.0;
                debug!(device = %device.id(), halved, "throttled launch");
                if self.governor.admit(&device, halved) == Admission::Reject {
                    return Err(ExecError::ThermalRejected {
                        device: device.id().to_string(),
                    });
                }
            }
            Admission::Reject => {
                return Err(ExecError::ThermalRejected {
                    device: device.id().to_string(),
                });
            }
        }

        if !device.try_acquire() {
            // One kernel per device; a busy device is transient.
            return Err(ExecError::NoEligibleDevice);
        }
        let lease = DeviceLease { device: &device };

        // Selection probes for other units may have flagged this
        // device while it was briefly at-limit. A stale flag must not
        // discard the run we are about to start.
        self.governor.clear_evacuation(device.id());

        let token = PinToken::new(self.next_pin.fetch_add(1, Ordering::Relaxed));
        let mut promoted: Vec<ZonedBuffer> = Vec::new();
        if let Err(err) = self.stage_buffers(args, &device, token, &mut promoted) {
            self.unstage(&promoted);
            return Err(err.into());
        }

        let window_start = now_ms();
        let started = Instant::now();
        let result = kernel.launch(&device, args, self.kernel_timeout);
        let elapsed = started.elapsed();

        // The in-flight work already ran to completion; the question
        // is whether the device crossed its hard limit while it did.
        let post = self.governor.admit(&device, 0.0);
        let evacuated = post == Admission::Reject || self.governor.evacuation_pending(device.id());
        if evacuated {
            self.governor.clear_evacuation(device.id());
        }

        self.unstage(&promoted);
        drop(lease);

        let peak = self.governor.peak_since(device.id(), window_start);
        let value = result?;
        if elapsed > self.kernel_timeout {
            return Err(ExecError::DeviceExecutionTimeout {
                device: device.id().to_string(),
                timeout_ms: self.kernel_timeout.as_millis() as u64,
            });
        }
        if evacuated {
            warn!(device = %device.id(), unit = %unit.id(), "hard limit crossed mid-run, discarding result");
            return Err(ExecError::ThermalRejected {
                device: device.id().to_string(),
            });
        }
        Ok((value, device.id().clone(), peak))
    }

    fn stage_buffers(
        &self,
        args: &ArgSet,
        device: &Device,
        token: PinToken,
        promoted: &mut Vec<ZonedBuffer>,
    ) -> Result<(), ZoneError> {
        for buffer in args.buffers() {
            self.bridge.promote(buffer, Zone::Unified, token)?;
            promoted.push(buffer.clone());
            if device.class().has_private_memory() {
                self.bridge.promote(buffer, Zone::DeviceLocal, token)?;
            }
        }
        Ok(())
    }

    fn unstage(&self, buffers: &[ZonedBuffer]) {
        for buffer in buffers {
            self.bridge.demote_fully(buffer);
        }
    }

    fn unit_state(&self, unit_id: &SmolStr) -> Arc<Mutex<UnitState>> {
        if let Some(state) = self.existing_state(unit_id) {
            return state;
        }
        let mut map = match self.units.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            map.entry(unit_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(UnitState::new()))),
        )
    }

    fn existing_state(&self, unit_id: &str) -> Option<Arc<Mutex<UnitState>>> {
        let map = match self.units.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(unit_id).cloned()
    }
}

fn outcome(
    value: Value,
    tier: Tier,
    device: Option<SmolStr>,
    peak_celsius: Option<f64>,
    downgraded: bool,
) -> ExecutionOutcome {
    ExecutionOutcome {
        value,
        tier,
        device,
        peak_celsius,
        downgraded,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
