// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Thermal governor for Caldera.
//!
//! Computes per-device thermal headroom and produces admission
//! decisions for work placement:
//!
//! | Decision | Condition |
//! |----------|-----------|
//! | Reject | current temperature at or above the hard limit |
//! | Throttle | current + estimated rise crosses the soft threshold, or the trend predicts it will |
//! | Approve | otherwise |
//!
//! Sampling is pull-based: every `admit` call re-reads the sensor
//! (optionally through a bounded-staleness cache) and appends the
//! sample to a rolling per-device history. A linear extrapolation over
//! recent samples pre-emptively throttles devices that are heating
//! toward the limit.
//!
//! A hard-limit Reject also marks the device for evacuation: in-flight
//! offloaded work on that device must be force-migrated back to the
//! CPU. The execution engine consults the evacuation board after every
//! device execution and discards results computed past the limit.

pub mod governor;
pub mod sample;

pub use governor::{Admission, GovernorConfig, ThermalGovernor};
pub use sample::{SampleHistory, ThermalSample};
