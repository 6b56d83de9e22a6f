// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Promotion and demotion across memory zones.

use crate::buffer::{PinToken, ZonedBuffer};
use crate::error::ZoneError;
use crate::zone::Zone;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Counters for bridge activity, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Buffers pinned into Unified.
    pub pins: u64,
    /// Device transfers performed (both directions).
    pub transfers: u64,
    /// Bytes moved by device transfers.
    pub bytes_transferred: u64,
    /// Demotion steps taken.
    pub demotions: u64,
}

/// The zone bridge: owns the promotion/demotion protocol.
///
/// All zone state lives in the buffers themselves behind per-buffer
/// locks; the bridge validates transitions and keeps transfer
/// statistics. Two executions touching different buffers never
/// serialize on the bridge.
#[derive(Default)]
pub struct ZoneBridge {
    pins: AtomicU64,
    transfers: AtomicU64,
    bytes_transferred: AtomicU64,
    demotions: AtomicU64,
    transfer_fault: AtomicBool,
}

impl ZoneBridge {
    /// Create a bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote a buffer one level toward device memory.
    ///
    /// * Static/Managed → Unified pins the buffer to `token`; the host
    ///   view becomes read-only until the pin is released.
    /// * Unified → DeviceLocal performs an explicit transfer and is
    ///   only meaningful when targeting a discrete GPU.
    ///
    /// On error the buffer's zone is unchanged.
    pub fn promote(
        &self,
        buffer: &ZonedBuffer,
        target: Zone,
        token: PinToken,
    ) -> Result<ZonedBuffer, ZoneError> {
        let mut state = buffer.state();
        match (state.zone, target) {
            (Zone::Static | Zone::Managed, Zone::Unified) => {
                if !buffer.layout().is_device_representable() {
                    return Err(ZoneError::UnsupportedLayout {
                        label: buffer.label().to_string(),
                    });
                }
                debug_assert!(state.pin.is_none(), "host-zone buffer cannot hold a pin");
                let from = state.zone;
                state.trail.push(from);
                state.zone = Zone::Unified;
                state.pin = Some(token);
                self.pins.fetch_add(1, Ordering::Relaxed);
                debug!(buffer = %buffer.label(), %from, "pinned to unified");
            }
            (Zone::Unified, Zone::Unified) => {
                // Re-pin attempt: idempotent for the owner, a conflict
                // for anyone else.
                match state.pin {
                    Some(owner) if owner == token => {}
                    _ => {
                        return Err(ZoneError::AlreadyPinned {
                            label: buffer.label().to_string(),
                        })
                    }
                }
            }
            (Zone::Unified, Zone::DeviceLocal) => {
                match state.pin {
                    Some(owner) if owner != token => {
                        return Err(ZoneError::AlreadyPinned {
                            label: buffer.label().to_string(),
                        })
                    }
                    Some(_) => {}
                    None => state.pin = Some(token),
                }
                if self.transfer_fault.load(Ordering::Acquire) {
                    return Err(ZoneError::TransferFailed {
                        label: buffer.label().to_string(),
                    });
                }
                state.trail.push(Zone::Unified);
                state.zone = Zone::DeviceLocal;
                self.record_transfer(buffer.size_bytes());
                debug!(buffer = %buffer.label(), "transferred to device-local");
            }
            (from, to) => return Err(ZoneError::InvalidPromotion { from, to }),
        }
        drop(state);
        Ok(buffer.clone())
    }

    /// Demote a buffer exactly one level, reversing the most recent
    /// promotion. Demoting a buffer already at its origin zone is a
    /// no-op returning the same buffer unchanged.
    pub fn demote(&self, buffer: &ZonedBuffer) -> ZonedBuffer {
        let mut state = buffer.state();
        if let Some(prev) = state.trail.pop() {
            if state.zone == Zone::DeviceLocal {
                // Copy back out of private device memory.
                self.record_transfer(buffer.size_bytes());
            }
            let from = state.zone;
            state.zone = prev;
            if state.trail.is_empty() {
                state.pin = None;
            }
            self.demotions.fetch_add(1, Ordering::Relaxed);
            debug!(buffer = %buffer.label(), %from, to = %prev, "demoted");
        }
        drop(state);
        buffer.clone()
    }

    /// Demote until the buffer is back at its origin zone and
    /// unpinned. Cleanup path after execution completion, failure, or
    /// thermal evacuation.
    pub fn demote_fully(&self, buffer: &ZonedBuffer) -> ZonedBuffer {
        while buffer.zone().is_device_side() {
            self.demote(buffer);
        }
        buffer.clone()
    }

    /// Inject or clear a device-side copy fault. Simulation hook for
    /// exercising the `TransferFailed` recovery path.
    pub fn set_transfer_fault(&self, fault: bool) {
        self.transfer_fault.store(fault, Ordering::Release);
    }

    /// Current activity counters.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            pins: self.pins.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
        }
    }

    fn record_transfer(&self, bytes: usize) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}
