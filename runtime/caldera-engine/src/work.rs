// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Work units, arguments, and result values.
//!
//! A work unit is a callable region of IR produced upstream. The
//! engine never inspects the IR; it tracks identity, the parallelism
//! annotation computed by the front end, and the captured arguments.

use caldera_zones::ZonedBuffer;
use smol_str::SmolStr;
use std::sync::Arc;

/// Opaque intermediate-representation payload.
///
/// Produced by the front end, consumed only by the backends. The
/// engine treats it as bytes.
#[derive(Debug, Clone)]
pub struct IrRegion {
    bytes: Arc<[u8]>,
}

impl IrRegion {
    /// Wrap raw IR bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
        }
    }

    /// The raw IR bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A callable region of IR tracked for tiering.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    id: SmolStr,
    ir: IrRegion,
    parallel: bool,
    estimated_temp_rise: f64,
}

impl WorkUnit {
    /// Create a work unit. The id must be stable for the unit's
    /// lifetime: tier state and artifact caches are keyed by it.
    pub fn new(id: impl Into<SmolStr>, ir: IrRegion) -> Self {
        Self {
            id: id.into(),
            ir,
            parallel: false,
            estimated_temp_rise: 3.0,
        }
    }

    /// Attach the upstream data-parallelism annotation. The runtime
    /// consumes this; it never re-derives it.
    pub fn with_parallel_hint(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Expected device temperature rise for one execution, in degrees.
    pub fn with_estimated_temp_rise(mut self, degrees: f64) -> Self {
        self.estimated_temp_rise = degrees.max(0.0);
        self
    }

    /// Stable identity.
    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    /// The IR payload.
    pub fn ir(&self) -> &IrRegion {
        &self.ir
    }

    /// Whether the unit was annotated data-parallel upstream.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Estimated per-execution temperature rise.
    pub fn estimated_temp_rise(&self) -> f64 {
        self.estimated_temp_rise
    }
}

/// Captured arguments for one invocation: zoned buffers plus scalars.
#[derive(Debug, Clone, Default)]
pub struct ArgSet {
    buffers: Vec<ZonedBuffer>,
    scalars: Vec<f64>,
}

impl ArgSet {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer argument (already tagged Static or Managed).
    pub fn with_buffer(mut self, buffer: ZonedBuffer) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Append a scalar argument.
    pub fn with_scalar(mut self, scalar: f64) -> Self {
        self.scalars.push(scalar);
        self
    }

    /// Buffer arguments.
    pub fn buffers(&self) -> &[ZonedBuffer] {
        &self.buffers
    }

    /// Scalar arguments.
    pub fn scalars(&self) -> &[f64] {
        &self.scalars
    }
}

/// Result of executing a work unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No result.
    Unit,
    /// A single number.
    Scalar(f64),
    /// A vector of numbers.
    Vector(Vec<f64>),
}
