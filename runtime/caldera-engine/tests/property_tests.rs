// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Property-based tests for the runtime invariants:
//! - Tiers never regress except through the single permitted downgrade
//! - Zone transitions always follow the promotion graph
//! - The scheduler never places work past a thermal limit

mod common;

use caldera_devices::{Device, DeviceClass, DeviceRegistry, FixedSensor};
use caldera_engine::{ArgSet, IrRegion, Orchestrator, Tier, Value, WorkUnit};
use caldera_sched::{Strategy, WorkRequest, WorkScheduler};
use caldera_thermal::{Admission, GovernorConfig, ThermalGovernor};
use caldera_zones::{PinToken, Zone, ZoneBridge, ZonedBuffer};
use common::{cpu, expect_ok, fast_config, fixed, igpu, SimStack};
use proptest::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Property: the tier sequence of any invocation history is monotonic,
/// with at most one downgrade, after which offload never recurs.
#[cfg(test)]
mod tier_properties {
    use super::*;

    proptest! {
        #[test]
        fn tier_regresses_at_most_once(
            invocations in 5usize..40,
            fail_at in 0usize..40,
        ) {
            let stack = SimStack::new();
            let mut registry = DeviceRegistry::new();
            registry.register(cpu());
            registry.register(igpu(fixed(55.0)));
            let orch = expect_ok(Orchestrator::with_config(
                registry,
                stack.backends(),
                fast_config(),
            ));
            let unit = WorkUnit::new("uut", IrRegion::new(vec![1]))
                .with_parallel_hint(true)
                .with_estimated_temp_rise(2.0);
            let args = ArgSet::new().with_scalar(7.0);

            let mut downgrades = 0;
            let mut prev = Tier::Interpreted;
            for i in 0..invocations {
                stack.kernels.fail_launch.store(i == fail_at, Ordering::Release);
                let (value, record) = expect_ok(orch.execute(&unit, &args));
                prop_assert_eq!(&value, &Value::Scalar(7.0));

                if record.downgraded {
                    downgrades += 1;
                } else {
                    prop_assert!(
                        record.tier >= prev,
                        "tier regressed without a downgrade: {} -> {}",
                        prev,
                        record.tier
                    );
                }
                if downgrades > 0 {
                    prop_assert!(
                        record.tier != Tier::Offloaded,
                        "offload recurred after the one-time downgrade"
                    );
                }
                prev = record.tier;
            }
            prop_assert!(downgrades <= 1);
        }
    }
}

/// Property: arbitrary promote/demote sequences keep every buffer on
/// the promotion graph, pinned exactly while device-side.
#[cfg(test)]
mod zone_properties {
    use super::*;

    proptest! {
        #[test]
        fn zone_state_stays_on_the_graph(
            ops in prop::collection::vec(0u8..4, 1..30)
        ) {
            let bridge = ZoneBridge::new();
            let buf = ZonedBuffer::managed_f64("payload", &[1.0, 2.0]);
            let token = PinToken::new(1);

            for op in ops {
                let before = buf.zone();
                let result = match op {
                    0 => bridge.promote(&buf, Zone::Unified, token).map(|_| ()),
                    1 => bridge.promote(&buf, Zone::DeviceLocal, token).map(|_| ()),
                    2 => {
                        bridge.demote(&buf);
                        Ok(())
                    }
                    _ => {
                        bridge.demote_fully(&buf);
                        Ok(())
                    }
                };

                // Failed transitions leave the zone unchanged.
                if result.is_err() {
                    prop_assert_eq!(buf.zone(), before);
                }

                let zone = buf.zone();
                prop_assert!(
                    matches!(zone, Zone::Managed | Zone::Unified | Zone::DeviceLocal),
                    "managed buffer left its reachable zones: {}",
                    zone
                );
                // Pinned exactly while away from the origin zone.
                prop_assert_eq!(buf.is_pinned(), zone != Zone::Managed);
                // Host reads stay legal in every zone.
                prop_assert_eq!(buf.to_f64_vec().len(), 2);
            }

            bridge.demote_fully(&buf);
            prop_assert_eq!(buf.zone(), Zone::Managed);
            prop_assert!(!buf.is_pinned());
        }
    }
}

/// Property: placement decisions respect the thermal envelope.
#[cfg(test)]
mod scheduler_properties {
    use super::*;

    fn gpu(id: String, gflops: f64, temp: f64) -> Arc<Device> {
        Arc::new(Device::new(
            id,
            DeviceClass::IntegratedGpu,
            gflops,
            85.0,
            Box::new(FixedSensor::new(temp)),
        ))
    }

    fn governor() -> ThermalGovernor {
        ThermalGovernor::with_config(GovernorConfig {
            staleness_ms: 0,
            prediction_window: 0,
            ..GovernorConfig::default()
        })
    }

    proptest! {
        #[test]
        fn adaptive_only_places_within_the_soft_threshold(
            temps in prop::collection::vec(30.0f64..100.0, 1..5),
            gflops in prop::collection::vec(100.0f64..5000.0, 5),
            rise in 0.0f64..10.0,
        ) {
            let devices: Vec<Arc<Device>> = temps
                .iter()
                .zip(&gflops)
                .enumerate()
                .map(|(i, (t, g))| gpu(format!("gpu{i}"), *g, *t))
                .collect();
            let gov = governor();
            let sched = WorkScheduler::new(Strategy::Adaptive);
            let request = WorkRequest { estimated_temp_rise: rise };

            if let Some(chosen) = sched.select(&request, &devices, &gov) {
                let temp = chosen.temperature();
                // Soft threshold: 85 limit minus the default 7 margin.
                prop_assert!(
                    temp + rise < 78.0,
                    "placed on a device at {temp} with rise {rise}"
                );
            }
        }

        #[test]
        fn no_strategy_places_on_a_device_at_its_limit(
            temps in prop::collection::vec(30.0f64..100.0, 1..5),
            strategy_idx in 0usize..3,
            rise in 0.0f64..10.0,
        ) {
            let strategy = [Strategy::RoundRobin, Strategy::Greedy, Strategy::Adaptive]
                [strategy_idx];
            let devices: Vec<Arc<Device>> = temps
                .iter()
                .enumerate()
                .map(|(i, t)| gpu(format!("gpu{i}"), 900.0, *t))
                .collect();
            let gov = governor();
            let sched = WorkScheduler::new(strategy);
            let request = WorkRequest { estimated_temp_rise: rise };

            if let Some(chosen) = sched.select(&request, &devices, &gov) {
                prop_assert!(chosen.temperature() < 85.0);
            }
        }
    }
}

/// Property: headroom arithmetic and admission thresholds agree.
#[cfg(test)]
mod governor_properties {
    use super::*;

    proptest! {
        #[test]
        fn admission_matches_the_thresholds(
            temp in 20.0f64..110.0,
            rise in 0.0f64..15.0,
        ) {
            let gov = ThermalGovernor::with_config(GovernorConfig {
                staleness_ms: 0,
                prediction_window: 0,
                ..GovernorConfig::default()
            });
            let device = Device::new(
                "igpu0",
                DeviceClass::IntegratedGpu,
                900.0,
                85.0,
                Box::new(FixedSensor::new(temp)),
            );

            prop_assert!((gov.headroom(&device) - (85.0 - temp)).abs() < 1e-9);

            let expected = if temp >= 85.0 {
                Admission::Reject
            } else if temp + rise >= 78.0 {
                Admission::Throttle
            } else {
                Admission::Approve
            };
            prop_assert_eq!(gov.admit(&device, rise), expected);
        }
    }
}
