//! Step 1.9: clear diagnostic information with a global DM11.

use async_trait::async_trait;

use j84_bus::packets::AckControl;
use j84_bus::types::PGN_DM11;

use crate::step::{StepContext, StepError, TestStep};

pub struct Dm11Clear;

#[async_trait]
impl TestStep for Dm11Clear {
    fn step(&self) -> u8 {
        9
    }

    fn name(&self) -> &str {
        "DM11: clear diagnostic information"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        if !ctx.config.sequence.allow_dtc_clear {
            ctx.info("DTC clearing is not enabled, DM11 not sent");
            return Ok(());
        }

        let result = ctx.j1939.request_raw_global(PGN_DM11).await?;
        for address in ctx.repo.obd_addresses().await {
            let name = StepContext::module_name(address);
            match result.acks.iter().find(|a| a.source == address) {
                Some(ack) if ack.control == AckControl::Ack => {
                    tracing::debug!(source = address, "DM11 acknowledged");
                }
                Some(ack) => ctx.fail(format!("{name} refused DM11 ({:?})", ack.control)),
                None => ctx.warn(format!("{name} did not acknowledge DM11")),
            }
        }
        Ok(())
    }
}
