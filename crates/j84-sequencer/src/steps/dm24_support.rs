//! Step 1.4: collect supported SPNs (DM24) from every OBD module.

use async_trait::async_trait;

use j84_bus::Response;
use j84_bus::packets::Dm24;
use j84_bus::spn_validation;

use crate::step::{StepContext, StepError, TestStep};
use crate::steps::describe_response;

pub struct Dm24Support;

#[async_trait]
impl TestStep for Dm24Support {
    fn step(&self) -> u8 {
        4
    }

    fn name(&self) -> &str {
        "DM24: SPN support"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;

        for address in ctx.repo.obd_addresses().await {
            let name = StepContext::module_name(address);
            let result = ctx.j1939.request_ds::<Dm24>(address).await?;
            if result.retry_used {
                ctx.info(format!("{name} needed a retry to answer DM24"));
            }
            match result.response {
                Response::Packet(dm24) => {
                    tracing::debug!(source = address, spns = dm24.spns.len(), "DM24 received");
                    ctx.repo
                        .update_module(address, |m| m.supported_spns = dm24.spns)
                        .await;
                }
                _ => ctx.fail(format!("{name} {} for DM24", describe_response(&result))),
            }
        }

        let modules = ctx.repo.obd_modules().await;
        let missing = spn_validation::missing_required(&modules, vehicle.fuel_type);
        if !missing.is_empty() {
            ctx.fail(format!(
                "required data stream SPNs not supported: {}",
                join(&missing)
            ));
        }
        let missing = spn_validation::missing_freeze_frame(&modules);
        if !missing.is_empty() {
            ctx.warn(format!(
                "required freeze frame SPNs not supported: {}",
                join(&missing)
            ));
        }
        Ok(())
    }
}

fn join(spns: &[u32]) -> String {
    spns.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}
