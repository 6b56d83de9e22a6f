// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Execution errors.
//!
//! Everything except [`ExecError::NoEligibleDevice`] is recovered
//! inside the engine by the one-time tier downgrade and retried at the
//! compiled tier within the same invocation; callers only see an error
//! when the lower tier also fails. `NoEligibleDevice` surfaces when no
//! device at all can take the work, which with a registered CPU is a
//! configuration-level condition.

use caldera_zones::ZoneError;
use thiserror::Error;

/// Result type for engine operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// An execution error.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// The thermal governor rejected or evacuated the device.
    #[error("thermal governor rejected device '{device}'")]
    ThermalRejected {
        /// Device that was rejected.
        device: String,
    },

    /// A zone promotion or transfer failed.
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// Baseline compilation failed.
    #[error("compilation of '{unit}' failed: {reason}")]
    CompilationFailed {
        /// Work unit id.
        unit: String,
        /// Backend-provided reason.
        reason: String,
    },

    /// Device kernel generation failed.
    #[error("kernel generation for '{unit}' failed: {reason}")]
    KernelGenerationFailed {
        /// Work unit id.
        unit: String,
        /// Backend-provided reason.
        reason: String,
    },

    /// The device kernel faulted at runtime.
    #[error("device execution fault on '{device}': {reason}")]
    DeviceExecutionFault {
        /// Device the kernel ran on.
        device: String,
        /// Fault description.
        reason: String,
    },

    /// The device kernel exceeded the caller-supplied timeout.
    /// Treated identically to a device execution failure.
    #[error("device execution on '{device}' exceeded {timeout_ms}ms")]
    DeviceExecutionTimeout {
        /// Device the kernel ran on.
        device: String,
        /// The timeout that was exceeded.
        timeout_ms: u64,
    },

    /// No device can take the work.
    #[error("no eligible device for this work unit")]
    NoEligibleDevice,
}
