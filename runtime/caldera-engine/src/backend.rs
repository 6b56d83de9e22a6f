// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Execution backend traits.
//!
//! The engine is generic over how IR actually runs: an interpreter for
//! tier 0, a baseline compiler for tier 1, and a kernel generator for
//! tier 2. Tier 3 artifacts come from an external ahead-of-time build
//! and run through the same [`CompiledArtifact`] interface.

use crate::error::ExecResult;
use crate::work::{ArgSet, Value, WorkUnit};
use caldera_devices::{Device, DeviceClass};
use std::sync::Arc;
use std::time::Duration;

/// Tier 0: direct IR evaluation.
pub trait Interpreter: Send + Sync {
    /// Evaluate a work unit against its arguments.
    fn eval(&self, unit: &WorkUnit, args: &ArgSet) -> ExecResult<Value>;
}

/// A host-executable artifact: tier 1 baseline output, or a tier 3
/// ahead-of-time native build.
pub trait CompiledArtifact: Send + Sync {
    /// Run the artifact against its arguments.
    fn run(&self, args: &ArgSet) -> ExecResult<Value>;
}

/// Tier 1: baseline compilation to host code.
pub trait Compiler: Send + Sync {
    /// Compile a work unit. Called at most once per promotion attempt;
    /// a failure leaves the unit interpreted until the next invocation.
    fn compile(&self, unit: &WorkUnit) -> ExecResult<Arc<dyn CompiledArtifact>>;
}

/// A device-executable kernel, specialized to one device class.
pub trait KernelArtifact: Send + Sync {
    /// Launch on `device` with a deadline. Implementations report
    /// faults and overruns through the error taxonomy.
    fn launch(&self, device: &Device, args: &ArgSet, timeout: Duration) -> ExecResult<Value>;
}

/// Tier 2: device kernel generation.
pub trait KernelGenerator: Send + Sync {
    /// Generate a kernel for a work unit targeting a device class.
    /// Results are cached per (unit, class) by the engine.
    fn generate(&self, unit: &WorkUnit, class: DeviceClass) -> ExecResult<Arc<dyn KernelArtifact>>;
}

/// The full backend bundle the engine executes through.
#[derive(Clone)]
pub struct Backends {
    /// Tier 0 evaluator.
    pub interpreter: Arc<dyn Interpreter>,
    /// Tier 1 baseline compiler.
    pub compiler: Arc<dyn Compiler>,
    /// Tier 2 kernel generator.
    pub kernel_generator: Arc<dyn KernelGenerator>,
}
