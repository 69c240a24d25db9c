//! Step 1.8: component identification (PGN 65259).

use async_trait::async_trait;

use j84_bus::Response;
use j84_bus::packets::ComponentIdPacket;
use j84_bus::types::ENGINE_ADDR;

use crate::step::{StepContext, StepError, TestStep};
use crate::steps::describe_response;

pub struct ComponentId;

#[async_trait]
impl TestStep for ComponentId {
    fn step(&self) -> u8 {
        8
    }

    fn name(&self) -> &str {
        "Component identification"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let mut engine_reported = false;

        for address in ctx.repo.obd_addresses().await {
            let name = StepContext::module_name(address);
            let result = ctx.j1939.request_ds::<ComponentIdPacket>(address).await?;
            let packet = match result.response {
                Response::Packet(packet) => packet,
                Response::Malformed { .. } => {
                    ctx.fail(format!(
                        "{name} {} for component identification",
                        describe_response(&result)
                    ));
                    continue;
                }
                _ => {
                    if address != ENGINE_ADDR {
                        ctx.info(format!(
                            "{name} {} for component identification",
                            describe_response(&result)
                        ));
                    }
                    continue;
                }
            };

            let id = packet.id;
            let mut empty = Vec::new();
            if id.make.trim().is_empty() {
                empty.push("make");
            }
            if id.model.trim().is_empty() {
                empty.push("model");
            }
            if id.serial_number.trim().is_empty() {
                empty.push("serial number");
            }
            if !empty.is_empty() {
                ctx.warn(format!("{name} component identification has no {}", empty.join(", ")));
            }

            engine_reported |= address == ENGINE_ADDR;
            ctx.repo.update_module(address, |m| m.component_id = Some(id)).await;
        }

        if !engine_reported {
            ctx.fail(format!(
                "{} did not provide component identification",
                StepContext::module_name(ENGINE_ADDR)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{Harness, mentions, worst};
    use j84_bus::packets::J1939Message;
    use j84_bus::types::PGN_COMPONENT_ID;
    use j84_bus::{SimResponse, SimulatedVehicle};
    use j84_protocol::outcome::Outcome;

    #[tokio::test(start_paused = true)]
    async fn engine_identification_stored() {
        let harness = Harness::new(SimulatedVehicle::reference()).await.with_reference_modules().await;
        let outcomes = harness.run(&ComponentId).await.unwrap();

        assert_eq!(worst(&outcomes), Outcome::Info);
        let id = harness.repo.module(0x00).await.unwrap().component_id.unwrap();
        assert_eq!(id.make, "CMMNS");
        assert_eq!(id.serial_number, "79123456");
    }

    #[tokio::test(start_paused = true)]
    async fn engine_without_identification_fails() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| ecu.set_response(PGN_COMPONENT_ID, SimResponse::Nack));
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&ComponentId).await.unwrap();
        assert!(mentions(
            &outcomes,
            Outcome::Fail,
            "Engine #1 (0x00) did not provide component identification"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_fields_warn() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            let packet = ComponentIdPacket::new(0x00, "CMMNS", "", "", "1234");
            ecu.set_response(PGN_COMPONENT_ID, SimResponse::Data(packet.to_payload()))
        });
        let harness = Harness::new(vehicle).await.with_reference_modules().await;

        let outcomes = harness.run(&ComponentId).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "has no model, serial number"));
    }
}
