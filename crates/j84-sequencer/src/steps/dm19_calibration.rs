//! Step 1.7: calibration IDs and CVNs (DM19).

use async_trait::async_trait;

use j84_bus::packets::Dm19;

use crate::step::{StepContext, StepError, TestStep};

pub struct Dm19Calibration;

#[async_trait]
impl TestStep for Dm19Calibration {
    fn step(&self) -> u8 {
        7
    }

    fn name(&self) -> &str {
        "DM19: calibration information"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;
        let result = ctx.j1939.request_global::<Dm19>().await?;

        for packet in &result.rejected {
            ctx.fail(format!(
                "{} sent a malformed DM19",
                StepContext::module_name(packet.source)
            ));
        }

        let total: usize = result.packets.iter().map(|p| p.calibrations.len()).sum();
        if total == 0 {
            ctx.fail("no calibration information received");
            return Ok(());
        }
        if total != vehicle.calibrations {
            ctx.fail(format!(
                "{total} calibration(s) received, {} expected",
                vehicle.calibrations
            ));
        }

        for dm19 in result.packets {
            let name = StepContext::module_name(dm19.source);
            for cal in &dm19.calibrations {
                if !cal.has_printable_id() {
                    ctx.fail(format!(
                        "{name} calibration ID {:02X?} is not printable",
                        cal.raw_calibration_id
                    ));
                }
                if cal.cvn == 0 {
                    ctx.fail(format!("{name} reports CVN 0 for {}", cal.calibration_id));
                }
            }

            let source = dm19.source;
            let stored = ctx
                .repo
                .update_module(source, |m| m.calibrations = dm19.calibrations)
                .await;
            if !stored {
                ctx.warn(format!("{name} is not an OBD module but reported calibrations"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{Harness, mentions};
    use j84_bus::packets::J1939Message;
    use j84_bus::types::PGN_DM19;
    use j84_bus::{SimResponse, SimulatedVehicle};
    use j84_protocol::outcome::Outcome;

    #[tokio::test(start_paused = true)]
    async fn reference_calibrations_stored() {
        let harness = Harness::new(SimulatedVehicle::reference()).await.with_reference_modules().await;
        let outcomes = harness.run(&Dm19Calibration).await.unwrap();
        assert!(outcomes.is_empty(), "{outcomes:?}");

        let engine = harness.repo.module(0x00).await.unwrap();
        assert_eq!(engine.calibrations[0].calibration_id, "ENG-CAL-2024A");
        assert_eq!(harness.repo.module(0x3D).await.unwrap().calibrations.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn count_mismatch_and_zero_cvn() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x3D, |ecu| {
            let dm19 = Dm19::new(0x3D, vec![Dm19::calibration("ATS-CAL-0117", 0)]);
            ecu.set_response(PGN_DM19, SimResponse::Data(dm19.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;
        let mut info = SimulatedVehicle::reference_info();
        info.calibrations = 3;
        harness.repo.set_vehicle(info).await;

        let outcomes = harness.run(&Dm19Calibration).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "2 calibration(s) received, 3 expected"));
        assert!(mentions(&outcomes, Outcome::Fail, "CVN 0 for ATS-CAL-0117"));
    }

    #[tokio::test(start_paused = true)]
    async fn non_obd_responder_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x3D, |ecu| {
            ecu.set_response(PGN_DM19, SimResponse::Silent);
        });
        vehicle.with_ecu(0x17, |ecu| {
            let dm19 = Dm19::new(0x17, vec![Dm19::calibration("IC-0042", 0x1111_2222)]);
            ecu.set_response(PGN_DM19, SimResponse::Data(dm19.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm19Calibration).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "(0x17) is not an OBD module"));
        assert!(harness.repo.module(0x3D).await.unwrap().calibrations.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unprintable_calibration_id_fails() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x3D, |ecu| {
            let mut payload = 0x0C44_7B01u32.to_le_bytes().to_vec();
            payload.extend_from_slice(b"ATS\x07CAL");
            payload.resize(20, 0x00);
            ecu.set_response(PGN_DM19, SimResponse::Data(payload))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm19Calibration).await.unwrap();
        assert!(mentions(
            &outcomes,
            Outcome::Fail,
            "Exhaust Emission Controller (0x3D) calibration ID [41, 54, 53, 07, 43, 41, 4C"
        ));
        assert!(mentions(&outcomes, Outcome::Fail, "is not printable"));
    }
}
