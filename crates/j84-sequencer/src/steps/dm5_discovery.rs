//! Step 1.3: find the OBD modules with a global DM5 request.

use std::collections::BTreeSet;

use async_trait::async_trait;

use j84_bus::packets::Dm5;
use j84_protocol::module::OBDModuleInformation;

use crate::step::{StepContext, StepError, TestStep};

pub struct Dm5Discovery;

#[async_trait]
impl TestStep for Dm5Discovery {
    fn step(&self) -> u8 {
        3
    }

    fn name(&self) -> &str {
        "DM5: OBD module discovery"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;
        let result = ctx.j1939.request_global::<Dm5>().await?;

        for packet in &result.rejected {
            ctx.warn(format!(
                "{} sent a malformed DM5",
                StepContext::module_name(packet.source)
            ));
        }

        let mut seen = BTreeSet::new();
        let mut compliance = BTreeSet::new();
        for dm5 in &result.packets {
            if !seen.insert(dm5.source) {
                continue;
            }
            let name = StepContext::module_name(dm5.source);
            if !dm5.is_obd() {
                ctx.info(format!(
                    "{name} is not an OBD module (compliance 0x{:02X})",
                    dm5.obd_compliance
                ));
                continue;
            }

            tracing::debug!(source = dm5.source, compliance = dm5.obd_compliance, "OBD module found");
            compliance.insert(dm5.obd_compliance);
            ctx.repo
                .put_module(OBDModuleInformation::new(dm5.source, dm5.obd_compliance))
                .await;

            let incomplete = dm5.incomplete_monitors();
            if !incomplete.is_empty() {
                ctx.info(format!("{name} monitors not complete: {}", incomplete.join(", ")));
            }
        }

        let found = ctx.repo.obd_addresses().await.len();
        if found == 0 {
            ctx.fail("no OBD module responded to DM5");
            return Ok(());
        }
        if found != vehicle.obd_modules {
            ctx.warn(format!(
                "{found} OBD module(s) responded, {} expected",
                vehicle.obd_modules
            ));
        }
        if compliance.len() > 1 {
            ctx.warn("OBD modules report different OBD compliance values");
        }
        Ok(())
    }
}
