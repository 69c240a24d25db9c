//! Step 1.6: engine model year (DM56) from each OBD module.

use async_trait::async_trait;

use j84_bus::Response;
use j84_bus::packets::{AckControl, Dm56};
use j84_protocol::module::ModelYearKind;

use crate::step::{StepContext, StepError, TestStep};
use crate::steps::describe_response;

pub struct Dm56ModelYear;

#[async_trait]
impl TestStep for Dm56ModelYear {
    fn step(&self) -> u8 {
        6
    }

    fn name(&self) -> &str {
        "DM56: model year and certification"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;

        for address in ctx.repo.obd_addresses().await {
            let name = StepContext::module_name(address);
            let result = ctx.j1939.request_ds::<Dm56>(address).await?;
            let dm56 = match result.response {
                Response::Packet(dm56) => dm56,
                Response::Ack(ack) if ack.control == AckControl::Nack => {
                    ctx.info(format!("{name} does not support DM56"));
                    continue;
                }
                Response::Malformed { .. } => {
                    ctx.fail(format!("{name} {} for DM56", describe_response(&result)));
                    continue;
                }
                Response::Ack(_) | Response::Timeout => {
                    ctx.warn(format!("{name} {} for DM56", describe_response(&result)));
                    continue;
                }
            };

            let info = dm56.info;
            if info.kind == ModelYearKind::Vehicle {
                ctx.warn(format!("{name} reports a vehicle model year instead of an engine model year"));
            } else if info.year != vehicle.engine_model_year {
                ctx.fail(format!(
                    "{name} reports engine model year {}, entered {}",
                    info.year, vehicle.engine_model_year
                ));
            }
            if info.family.trim().is_empty() {
                ctx.warn(format!("{name} reports no certification family"));
            }
            ctx.repo
                .update_module(address, |m| m.engine_model_year = Some(info))
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{Harness, mentions, worst};
    use j84_bus::packets::J1939Message;
    use j84_bus::types::PGN_DM56;
    use j84_bus::{SimResponse, SimulatedVehicle};
    use j84_protocol::outcome::Outcome;

    #[tokio::test(start_paused = true)]
    async fn reference_engine_model_year() {
        let harness = Harness::new(SimulatedVehicle::reference()).await.with_reference_modules().await;
        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();

        assert_eq!(worst(&outcomes), Outcome::Info);
        assert!(mentions(&outcomes, Outcome::Info, "(0x3D) does not support DM56"));
        let engine = harness.repo.module(0x00).await.unwrap();
        let info = engine.engine_model_year.unwrap();
        assert_eq!(info.year, 2024);
        assert_eq!(info.family, "RCEXH0912AAB");
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_year_fails() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            let dm56 = Dm56::new(0x00, 2022, ModelYearKind::Engine, "NCEXH0912AAB");
            ecu.set_response(PGN_DM56, SimResponse::Data(dm56.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "engine model year 2022, entered 2024"));
    }

    #[tokio::test(start_paused = true)]
    async fn vehicle_kind_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            let dm56 = Dm56::new(0x00, 2024, ModelYearKind::Vehicle, "RCEXH0912AAB");
            ecu.set_response(PGN_DM56, SimResponse::Data(dm56.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert_eq!(worst(&outcomes), Outcome::Warn);
        assert!(mentions(&outcomes, Outcome::Warn, "vehicle model year"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_answer_does_not_stop_the_step() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            ecu.set_response(PGN_DM56, SimResponse::Data(b"20X4E-MYRCEXH0912AAB*".to_vec()))
        });
        vehicle.with_ecu(0x3D, |ecu| {
            let dm56 = Dm56::new(0x3D, 2019, ModelYearKind::Engine, "KCEXH0912AAB");
            ecu.set_response(PGN_DM56, SimResponse::Data(dm56.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "Engine #1 (0x00) sent a malformed answer"));
        assert!(mentions(&outcomes, Outcome::Fail, "(0x3D) reports engine model year 2019, entered 2024"));
        assert!(harness.repo.module(0x00).await.unwrap().engine_model_year.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| ecu.set_response(PGN_DM56, SimResponse::Silent));
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert_eq!(worst(&outcomes), Outcome::Warn);
        assert!(mentions(&outcomes, Outcome::Warn, "Engine #1 (0x00) did not respond for DM56"));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_to_the_end_is_not_unsupported() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            ecu.set_response(
                PGN_DM56,
                SimResponse::Busy {
                    count: 10,
                    payload: Vec::new(),
                },
            )
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "Engine #1 (0x00) stayed busy for DM56"));
        assert!(!mentions(&outcomes, Outcome::Info, "Engine #1 (0x00) does not support DM56"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_family_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            let dm56 = Dm56::new(0x00, 2024, ModelYearKind::Engine, "");
            ecu.set_response(PGN_DM56, SimResponse::Data(dm56.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&Dm56ModelYear).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "Engine #1 (0x00) reports no certification family"));
    }
}
