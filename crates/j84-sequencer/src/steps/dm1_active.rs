//! Step 1.11: active DTCs and lamps from broadcast DM1.

use std::collections::BTreeMap;

use async_trait::async_trait;

use j84_bus::packets::{Dm1, J1939Message};
use j84_bus::types::PGN_DM1;
use j84_protocol::dtc::LampStatus;

use crate::step::{StepContext, StepError, TestStep};

pub struct Dm1Active;

#[async_trait]
impl TestStep for Dm1Active {
    fn step(&self) -> u8 {
        11
    }

    fn name(&self) -> &str {
        "DM1: active DTCs"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let packets = ctx
            .j1939
            .read_broadcasts(ctx.config.sequence.dm1_listen())
            .await?;

        // Latest DM1 per source.
        let mut latest: BTreeMap<u8, Dm1> = BTreeMap::new();
        for packet in packets.iter().filter(|p| p.pgn == PGN_DM1) {
            match Dm1::parse(packet) {
                Ok(dm1) => {
                    latest.insert(dm1.source, dm1);
                }
                Err(e) => {
                    tracing::warn!(source = packet.source, error = %e, "malformed DM1");
                    ctx.warn(format!(
                        "{} broadcast a malformed DM1",
                        StepContext::module_name(packet.source)
                    ));
                }
            }
        }

        let obd = ctx.repo.obd_addresses().await;
        for &address in &obd {
            let name = StepContext::module_name(address);
            let Some(dm1) = latest.get(&address) else {
                ctx.fail(format!("{name} did not broadcast DM1"));
                continue;
            };
            if !dm1.dtcs.is_empty() {
                let codes: Vec<String> = dm1.dtcs.iter().map(ToString::to_string).collect();
                ctx.fail(format!("{name} reports active DTC(s): {}", codes.join(", ")));
            }
            if dm1.lamps.mil != LampStatus::Off {
                ctx.fail(format!("{name} reports MIL {:?}", dm1.lamps.mil));
            }
        }

        for (address, dm1) in latest.iter().filter(|(a, _)| !obd.contains(*a)) {
            if !dm1.dtcs.is_empty() {
                ctx.info(format!(
                    "{} (non-OBD) reports {} active DTC(s)",
                    StepContext::module_name(*address),
                    dm1.dtcs.len()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{Harness, mentions};
    use j84_bus::SimulatedVehicle;
    use j84_protocol::dtc::DiagnosticTroubleCode;
    use j84_protocol::outcome::Outcome;

    #[tokio::test(start_paused = true)]
    async fn quiet_vehicle_passes() {
        let harness = Harness::new(SimulatedVehicle::reference()).await.with_reference_modules().await;
        let outcomes = harness.run(&Dm1Active).await.unwrap();
        assert!(outcomes.is_empty(), "{outcomes:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn active_fault_and_mil_fail() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            ecu.faults.active = vec![DiagnosticTroubleCode::new(102, 3, 2)];
            ecu.faults.mil = LampStatus::On;
        });
        vehicle.with_ecu(0x17, |ecu| {
            ecu.faults.active = vec![DiagnosticTroubleCode::new(84, 2, 1)];
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm1Active).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "active DTC(s): SPN 102 FMI 3"));
        assert!(mentions(&outcomes, Outcome::Fail, "MIL On"));
        assert!(mentions(&outcomes, Outcome::Info, "(non-OBD) reports 1 active DTC(s)"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_dm1_fails() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x3D, |ecu| ecu.remove_broadcast(PGN_DM1));
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm1Active).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "(0x3D) did not broadcast DM1"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_dm1_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x17, |ecu| ecu.set_broadcast_payload(PGN_DM1, vec![0x00]));
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm1Active).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "Instrument Cluster #1 (0x17) broadcast a malformed DM1"));
        assert!(!outcomes.iter().any(|o| o.outcome == Outcome::Fail), "{outcomes:?}");
    }
}
