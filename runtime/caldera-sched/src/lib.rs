// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Work scheduler for Caldera.
//!
//! Given the thermal requirements of one unit of work and a set of
//! candidate devices, picks a target device using a configurable
//! strategy:
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | RoundRobin | cycles candidates in registration order, skipping Reject |
//! | Greedy | highest throughput among Approve, Throttle-tier fallback |
//! | Adaptive | throughput blended with thermal safety margin (default) |
//!
//! Selection is a pure decision step: it inspects admissions and
//! scores but mutates neither device nor buffer state. Sampling side
//! effects live in the thermal governor it consults.

pub mod scheduler;

pub use scheduler::{SchedulerStats, Strategy, WorkRequest, WorkScheduler};
