// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Memory zone bridge for Caldera.
//!
//! A buffer lives in exactly one zone at any instant:
//!
//! | Zone | Ownership | Mobility |
//! |------|-----------|----------|
//! | Static | exclusive to the allocating scope | may pin to Unified |
//! | Managed | shared, reference counted | may pin to Unified |
//! | Unified | one execution context (pinned) | may transfer to DeviceLocal |
//! | DeviceLocal | one execution context, discrete GPU | demotes back through Unified |
//!
//! Promotion follows the graph Static/Managed → Unified → DeviceLocal;
//! demotion reverses exactly one edge at a time and is triggered on
//! device execution completion, failure, or thermal evacuation. While a
//! buffer is pinned for a device execution its host-side handles stay
//! readable but reject writes.
//!
//! Managed reclamation is plain reference counting (last handle drop),
//! deterministic and pause-free.

pub mod bridge;
pub mod buffer;
pub mod error;
pub mod zone;

pub use bridge::{BridgeStats, ZoneBridge};
pub use buffer::{PinToken, ZonedBuffer};
pub use error::ZoneError;
pub use zone::{ElementLayout, Zone};
