// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Tiered execution engine and unified orchestrator for Caldera.
//!
//! ## Tiered execution
//!
//! Work units start at a low tier and are promoted as they get "hot":
//!
//! | Tier | Backend | Cost to enter | Runtime speed |
//! |------|---------|---------------|---------------|
//! | 0 | Interpreter | None | Slowest |
//! | 1 | Compiled baseline | One compile | Moderate |
//! | 2 | Device-offloaded kernel | Kernel generation + zone promotion | Fast for data-parallel work |
//! | 3 | Ahead-of-time native | External AOT build | Fastest |
//!
//! Tiers only move forward, with one exception: a failed device
//! execution (kernel generation failure, zone error, runtime fault,
//! timeout, or thermal rejection) downgrades the unit to the compiled
//! tier once and permanently — the unit never retries offload, which
//! prevents oscillation. The failing invocation still completes at the
//! compiled tier and returns a correct result; the fallback is visible
//! only in telemetry.
//!
//! ## Orchestration
//!
//! The [`Orchestrator`] composes the device registry, thermal
//! governor, zone bridge, scheduler and engine, and returns per-call
//! telemetry (device used, tier reached, peak temperature) alongside
//! each result.

pub mod backend;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod telemetry;
pub mod tier;
pub mod work;

pub use backend::{Backends, CompiledArtifact, Compiler, Interpreter, KernelArtifact, KernelGenerator};
pub use engine::{EngineStats, ExecutionOutcome, TieredEngine};
pub use error::{ExecError, ExecResult};
pub use orchestrator::{ConfigError, Orchestrator, OrchestratorConfig};
pub use telemetry::{ExecutionLog, ExecutionRecord};
pub use tier::{Tier, TierThresholds};
pub use work::{ArgSet, IrRegion, Value, WorkUnit};
