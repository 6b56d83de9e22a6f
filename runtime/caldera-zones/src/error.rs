// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Zone protocol errors.
//!
//! All variants are recoverable by the execution engine: a failed
//! promotion or transfer falls back to the compiled host tier.

use crate::zone::Zone;
use thiserror::Error;

/// An error raised by the zone bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ZoneError {
    /// The buffer's element type has no fixed, GPU-representable
    /// layout and cannot cross into device zones.
    #[error("element layout of '{label}' is not device-representable")]
    UnsupportedLayout {
        /// Buffer label.
        label: String,
    },

    /// Another execution context already holds the buffer's pin.
    #[error("buffer '{label}' is already pinned to another execution")]
    AlreadyPinned {
        /// Buffer label.
        label: String,
    },

    /// The device-side copy faulted.
    #[error("transfer of '{label}' to device memory failed")]
    TransferFailed {
        /// Buffer label.
        label: String,
    },

    /// The requested promotion is not an edge of the zone graph.
    #[error("cannot promote from {from} to {to}")]
    InvalidPromotion {
        /// Current zone.
        from: Zone,
        /// Requested zone.
        to: Zone,
    },

    /// Host-side write attempted while the buffer is pinned.
    #[error("buffer '{label}' is pinned and read-only from the host")]
    PinnedReadOnly {
        /// Buffer label.
        label: String,
    },
}
