//! Step 1.5: compare the VIN on the bus with the entered VIN.

use std::collections::BTreeSet;

use async_trait::async_trait;

use j84_bus::packets::VinPacket;

use crate::step::{StepContext, StepError, TestStep};

pub struct VinCheck;

#[async_trait]
impl TestStep for VinCheck {
    fn step(&self) -> u8 {
        5
    }

    fn name(&self) -> &str {
        "VIN verification"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;
        let result = ctx.j1939.request_global::<VinPacket>().await?;

        if result.packets.is_empty() {
            ctx.fail("no module responded with a VIN");
            return Ok(());
        }

        let sources: BTreeSet<u8> = result.packets.iter().map(|p| p.source).collect();
        if sources.len() > 1 {
            ctx.warn(format!("{} modules responded with a VIN", sources.len()));
        }

        let vins: BTreeSet<&str> = result.packets.iter().map(|p| p.vin.as_str()).collect();
        if vins.len() > 1 {
            ctx.fail("modules reported different VINs");
        }

        for packet in &result.packets {
            if packet.vin != vehicle.vin {
                ctx.fail(format!(
                    "{} reported VIN {}, entered VIN is {}",
                    StepContext::module_name(packet.source),
                    packet.vin,
                    vehicle.vin
                ));
            }
        }
        Ok(())
    }
}
