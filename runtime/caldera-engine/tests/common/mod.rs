// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Shared simulation backends and device fixtures.

#![allow(dead_code)]

use caldera_devices::{Device, DeviceClass, ScriptedSensor, TemperatureSensor};
use caldera_engine::{
    ArgSet, Backends, CompiledArtifact, Compiler, ExecError, ExecResult, Interpreter,
    KernelArtifact, KernelGenerator, OrchestratorConfig, TierThresholds, Value, WorkUnit,
};
use caldera_thermal::GovernorConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The reference semantics every sim backend implements: the sum of
/// all scalar arguments and all buffer elements.
pub fn compute(args: &ArgSet) -> Value {
    let mut total: f64 = args.scalars().iter().sum();
    for buffer in args.buffers() {
        total += buffer.to_f64_vec().iter().sum::<f64>();
    }
    Value::Scalar(total)
}

pub struct SimInterpreter {
    pub evals: AtomicU64,
}

impl Interpreter for SimInterpreter {
    fn eval(&self, _unit: &WorkUnit, args: &ArgSet) -> ExecResult<Value> {
        self.evals.fetch_add(1, Ordering::Relaxed);
        Ok(compute(args))
    }
}

pub struct SimArtifact {
    runs: Arc<AtomicU64>,
}

impl CompiledArtifact for SimArtifact {
    fn run(&self, args: &ArgSet) -> ExecResult<Value> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(compute(args))
    }
}

pub struct SimCompiler {
    pub compiles: AtomicU64,
    pub fail_next: AtomicBool,
    pub artifact_runs: Arc<AtomicU64>,
}

impl Compiler for SimCompiler {
    fn compile(&self, unit: &WorkUnit) -> ExecResult<Arc<dyn CompiledArtifact>> {
        self.compiles.fetch_add(1, Ordering::Relaxed);
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(ExecError::CompilationFailed {
                unit: unit.id().to_string(),
                reason: "injected compile failure".into(),
            });
        }
        Ok(Arc::new(SimArtifact {
            runs: Arc::clone(&self.artifact_runs),
        }))
    }
}

struct SimKernel {
    fail_launch: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    launches: Arc<AtomicU64>,
}

impl KernelArtifact for SimKernel {
    fn launch(&self, device: &Device, args: &ArgSet, _timeout: Duration) -> ExecResult<Value> {
        self.launches.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay_ms.load(Ordering::Acquire);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_launch.load(Ordering::Acquire) {
            return Err(ExecError::DeviceExecutionFault {
                device: device.id().to_string(),
                reason: "injected kernel fault".into(),
            });
        }
        Ok(compute(args))
    }
}

pub struct SimKernelGen {
    pub generates: AtomicU64,
    pub fail_generate: AtomicBool,
    pub fail_launch: Arc<AtomicBool>,
    pub launch_delay_ms: Arc<AtomicU64>,
    pub launches: Arc<AtomicU64>,
}

impl KernelGenerator for SimKernelGen {
    fn generate(&self, unit: &WorkUnit, _class: DeviceClass) -> ExecResult<Arc<dyn KernelArtifact>> {
        self.generates.fetch_add(1, Ordering::Relaxed);
        if self.fail_generate.load(Ordering::Acquire) {
            return Err(ExecError::KernelGenerationFailed {
                unit: unit.id().to_string(),
                reason: "injected generation failure".into(),
            });
        }
        Ok(Arc::new(SimKernel {
            fail_launch: Arc::clone(&self.fail_launch),
            delay_ms: Arc::clone(&self.launch_delay_ms),
            launches: Arc::clone(&self.launches),
        }))
    }
}

/// The full sim backend bundle, with handles kept for fault injection
/// and call-count assertions.
pub struct SimStack {
    pub interpreter: Arc<SimInterpreter>,
    pub compiler: Arc<SimCompiler>,
    pub kernels: Arc<SimKernelGen>,
}

impl SimStack {
    pub fn new() -> Self {
        Self {
            interpreter: Arc::new(SimInterpreter {
                evals: AtomicU64::new(0),
            }),
            compiler: Arc::new(SimCompiler {
                compiles: AtomicU64::new(0),
                fail_next: AtomicBool::new(false),
                artifact_runs: Arc::new(AtomicU64::new(0)),
            }),
            kernels: Arc::new(SimKernelGen {
                generates: AtomicU64::new(0),
                fail_generate: AtomicBool::new(false),
                fail_launch: Arc::new(AtomicBool::new(false)),
                launch_delay_ms: Arc::new(AtomicU64::new(0)),
                launches: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            interpreter: Arc::clone(&self.interpreter) as Arc<dyn Interpreter>,
            compiler: Arc::clone(&self.compiler) as Arc<dyn Compiler>,
            kernel_generator: Arc::clone(&self.kernels) as Arc<dyn KernelGenerator>,
        }
    }
}

/// Adapter so one scripted sensor can stay in the test's hands while
/// the device owns its own handle.
pub struct SharedSensor(pub Arc<ScriptedSensor>);

impl TemperatureSensor for SharedSensor {
    fn read_celsius(&self) -> f64 {
        self.0.read_celsius()
    }
}

pub fn fixed(celsius: f64) -> Box<dyn TemperatureSensor> {
    Box::new(caldera_devices::FixedSensor::new(celsius))
}

pub fn cpu() -> Device {
    Device::new("cpu0", DeviceClass::Cpu, 200.0, 95.0, fixed(45.0))
}

pub fn igpu(sensor: Box<dyn TemperatureSensor>) -> Device {
    Device::new("igpu0", DeviceClass::IntegratedGpu, 900.0, 85.0, sensor)
}

pub fn dgpu(sensor: Box<dyn TemperatureSensor>) -> Device {
    Device::new("dgpu0", DeviceClass::DiscreteGpu, 4000.0, 83.0, sensor)
}

/// Low thresholds, no sample caching, no trend prediction: every
/// admission reads the sensor and promotions happen within a few
/// invocations.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        thresholds: TierThresholds { tier1: 2, tier2: 3 },
        governor: GovernorConfig {
            staleness_ms: 0,
            prediction_window: 0,
            ..GovernorConfig::default()
        },
        kernel_timeout: Duration::from_millis(250),
        ..OrchestratorConfig::default()
    }
}

pub fn expect_ok<T, E: std::fmt::Display>(res: Result<T, E>) -> T {
    match res {
        Ok(val) => val,
        Err(err) => panic!("expected Ok, got {err}"),
    }
}
