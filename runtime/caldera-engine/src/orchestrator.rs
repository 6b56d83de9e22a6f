// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! The unified runtime facade.
//!
//! Wires the device registry, thermal governor, zone bridge, scheduler
//! and tiered engine together behind one entry point, and keeps an
//! append-only execution log with per-call placement telemetry.

use crate::backend::Backends;
use crate::engine::{now_ms, EngineStats, TieredEngine};
use crate::error::ExecResult;
use crate::telemetry::{ExecutionLog, ExecutionRecord};
use crate::tier::TierThresholds;
use crate::work::{ArgSet, Value, WorkUnit};
use caldera_devices::DeviceRegistry;
use caldera_sched::{SchedulerStats, Strategy, WorkScheduler};
use caldera_thermal::{GovernorConfig, ThermalGovernor};
use caldera_zones::ZoneBridge;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// A rejected runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Every deployment needs a CPU: it is the fallback target for
    /// every downgrade and evacuation.
    #[error("device registry has no CPU device")]
    MissingCpu,
}

/// Orchestrator construction knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Device selection strategy.
    pub strategy: Strategy,
    /// Exponent on the thermal safety factor in the Adaptive score.
    pub thermal_weight: f64,
    /// Tier promotion thresholds.
    pub thresholds: TierThresholds,
    /// Thermal governor tuning.
    pub governor: GovernorConfig,
    /// Deadline for a single device kernel launch.
    pub kernel_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            thermal_weight: 1.0,
            thresholds: TierThresholds::default(),
            governor: GovernorConfig::default(),
            kernel_timeout: crate::engine::DEFAULT_KERNEL_TIMEOUT,
        }
    }
}

/// The assembled runtime.
pub struct Orchestrator {
    registry: Arc<DeviceRegistry>,
    governor: Arc<ThermalGovernor>,
    bridge: Arc<ZoneBridge>,
    scheduler: Arc<WorkScheduler>,
    engine: TieredEngine,
    log: ExecutionLog,
}

impl Orchestrator {
    /// Assemble a runtime with default configuration.
    pub fn new(registry: DeviceRegistry, backends: Backends) -> Result<Self, ConfigError> {
        Self::with_config(registry, backends, OrchestratorConfig::default())
    }

    /// Assemble a runtime with explicit configuration.
    pub fn with_config(
        registry: DeviceRegistry,
        backends: Backends,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        if registry.cpu().is_none() {
            return Err(ConfigError::MissingCpu);
        }
        let registry = Arc::new(registry);
        let governor = Arc::new(ThermalGovernor::with_config(config.governor));
        let bridge = Arc::new(ZoneBridge::new());
        let scheduler = Arc::new(
            WorkScheduler::new(config.strategy).with_thermal_weight(config.thermal_weight),
        );
        let engine = TieredEngine::new(
            backends,
            Arc::clone(&registry),
            Arc::clone(&governor),
            Arc::clone(&bridge),
            Arc::clone(&scheduler),
        )
        .with_thresholds(config.thresholds)
        .with_kernel_timeout(config.kernel_timeout);

        info!(devices = registry.len(), strategy = ?config.strategy, "runtime assembled");
        Ok(Self {
            registry,
            governor,
            bridge,
            scheduler,
            engine,
            log: ExecutionLog::new(),
        })
    }

    /// Execute one invocation of a work unit, returning its value and
    /// the telemetry record that was appended to the log.
    ///
    /// Failed invocations are not logged; the error carries the full
    /// context instead.
    pub fn execute(&self, unit: &WorkUnit, args: &ArgSet) -> ExecResult<(Value, ExecutionRecord)> {
        let at_ms = now_ms();
        let started = Instant::now();
        let outcome = self.engine.invoke(unit, args)?;
        let record = ExecutionRecord {
            unit: unit.id().clone(),
            tier: outcome.tier,
            device: outcome.device,
            peak_celsius: outcome.peak_celsius,
            downgraded: outcome.downgraded,
            duration_ms: started.elapsed().as_millis() as u64,
            at_ms,
        };
        self.log.append(record.clone());
        Ok((outcome.value, record))
    }

    /// The device inventory.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The thermal governor.
    pub fn governor(&self) -> &ThermalGovernor {
        &self.governor
    }

    /// The zone bridge.
    pub fn bridge(&self) -> &ZoneBridge {
        &self.bridge
    }

    /// The tiered engine.
    pub fn engine(&self) -> &TieredEngine {
        &self.engine
    }

    /// The execution log.
    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Serialize the execution log to JSON for diagnostics.
    pub fn log_json(&self) -> Result<String, serde_json::Error> {
        self.log.to_json()
    }

    /// Engine execution counters.
    pub fn engine_stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Scheduler selection counters.
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}
