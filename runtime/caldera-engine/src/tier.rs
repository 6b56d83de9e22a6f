// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Execution tiers and promotion thresholds.

use serde::{Deserialize, Serialize};

/// Execution tier for a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Tier 0: direct IR interpretation (instant startup).
    Interpreted = 0,
    /// Tier 1: compiled baseline on the host CPU.
    Compiled = 1,
    /// Tier 2: device-offloaded kernel.
    Offloaded = 2,
    /// Tier 3: ahead-of-time native build. Terminal.
    Native = 3,
}

impl Tier {
    /// Get the next tier (if any).
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Interpreted => Some(Self::Compiled),
            Self::Compiled => Some(Self::Offloaded),
            Self::Offloaded => Some(Self::Native),
            Self::Native => None,
        }
    }

    /// Get the tier name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Interpreted => "interpreted",
            Self::Compiled => "compiled",
            Self::Offloaded => "offloaded",
            Self::Native => "native",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tier {} ({})", *self as u8, self.name())
    }
}

/// Invocation-count thresholds for tier promotion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Invocation count to promote Interpreted → Compiled.
    pub tier1: u64,
    /// Invocation count to attempt Compiled → Offloaded (data-parallel
    /// units only, subject to scheduler approval).
    pub tier2: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { tier1: 10, tier2: 100 }
    }
}
