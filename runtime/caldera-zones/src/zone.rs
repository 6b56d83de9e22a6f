// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Zone classification and element layouts.

use serde::{Deserialize, Serialize};

/// Classification of a buffer's ownership and mobility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// Compile-time sized, exclusively owned by its allocating scope.
    Static,
    /// Shared-ownership buffer; freed when the last reference drops.
    Managed,
    /// Visible to CPU and integrated GPU without copying; held only
    /// while pinned for one device execution.
    Unified,
    /// Resident in a discrete GPU's private memory; reached and left
    /// via explicit transfers.
    DeviceLocal,
}

impl Zone {
    /// Get the zone name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Managed => "managed",
            Self::Unified => "unified",
            Self::DeviceLocal => "device-local",
        }
    }

    /// Whether `target` is one legal promotion step from this zone.
    pub fn can_promote_to(self, target: Zone) -> bool {
        matches!(
            (self, target),
            (Self::Static, Self::Unified)
                | (Self::Managed, Self::Unified)
                | (Self::Unified, Self::DeviceLocal)
        )
    }

    /// Whether buffers in this zone are pinned to a device execution.
    pub fn is_device_side(self) -> bool {
        matches!(self, Self::Unified | Self::DeviceLocal)
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory layout of a buffer's element type.
///
/// Only fixed layouts are GPU-representable; variable layouts (host
/// objects with indirection) can never leave the host zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementLayout {
    /// Fixed size and alignment, safe to copy across zones.
    Fixed {
        /// Element size in bytes.
        size: usize,
        /// Element alignment in bytes.
        align: usize,
    },
    /// Size varies per element; host-only.
    Variable,
}

impl ElementLayout {
    /// Layout of a 64-bit float element.
    pub fn f64() -> Self {
        Self::Fixed { size: 8, align: 8 }
    }

    /// Layout of a 32-bit integer element.
    pub fn u32() -> Self {
        Self::Fixed { size: 4, align: 4 }
    }

    /// Whether the layout can cross into device zones.
    pub fn is_device_representable(self) -> bool {
        matches!(self, Self::Fixed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_graph() {
        assert!(Zone::Static.can_promote_to(Zone::Unified));
        assert!(Zone::Managed.can_promote_to(Zone::Unified));
        assert!(Zone::Unified.can_promote_to(Zone::DeviceLocal));

        assert!(!Zone::Managed.can_promote_to(Zone::DeviceLocal)); // no skipping
        assert!(!Zone::DeviceLocal.can_promote_to(Zone::Unified)); // that's demotion
        assert!(!Zone::Static.can_promote_to(Zone::Managed));
    }

    #[test]
    fn test_device_side_zones() {
        assert!(!Zone::Static.is_device_side());
        assert!(!Zone::Managed.is_device_side());
        assert!(Zone::Unified.is_device_side());
        assert!(Zone::DeviceLocal.is_device_side());
    }

    #[test]
    fn test_layout_representability() {
        assert!(ElementLayout::f64().is_device_representable());
        assert!(!ElementLayout::Variable.is_device_representable());
    }

    #[test]
    fn test_zone_display() {
        assert_eq!(Zone::DeviceLocal.to_string(), "device-local");
        assert_eq!(Zone::Managed.to_string(), "managed");
    }
}
