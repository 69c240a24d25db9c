//! Step 1.10: confirm fault memory is empty after the clear.
//!
//! DM5 counts come first, then each DTC list is read globally. Permanent
//! DTCs (DM28) survive a DM11 and are only reported.

use async_trait::async_trait;

use j84_bus::packets::{Dm2, Dm5, Dm6, Dm12, Dm23, Dm28, DtcPacket, J1939Message};
use j84_protocol::dtc::DiagnosticTroubleCode;
use j84_protocol::outcome::Outcome;

use crate::step::{StepContext, StepError, TestStep};

pub struct Dm5AfterClear;

#[async_trait]
impl TestStep for Dm5AfterClear {
    fn step(&self) -> u8 {
        10
    }

    fn name(&self) -> &str {
        "DM5: fault memory after clear"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let obd = ctx.repo.obd_addresses().await;
        let result = ctx.j1939.request_global::<Dm5>().await?;

        for &address in &obd {
            let name = StepContext::module_name(address);
            let Some(dm5) = result.packets.iter().find(|p| p.source == address) else {
                ctx.fail(format!("{name} did not respond to DM5"));
                continue;
            };
            if dm5.active_count > 0 {
                ctx.fail(format!("{name} reports {} active DTC(s)", dm5.active_count));
            }
            if dm5.previously_active_count > 0 {
                ctx.fail(format!(
                    "{name} reports {} previously active DTC(s)",
                    dm5.previously_active_count
                ));
            }
        }

        check_list::<Dm2>(ctx, &obd, "DM2 previously active", Outcome::Fail).await?;
        check_list::<Dm6>(ctx, &obd, "DM6 pending", Outcome::Fail).await?;
        check_list::<Dm12>(ctx, &obd, "DM12 emissions-related active", Outcome::Fail).await?;
        check_list::<Dm23>(ctx, &obd, "DM23 previously MIL-on", Outcome::Fail).await?;
        check_list::<Dm28>(ctx, &obd, "DM28 permanent", Outcome::Info).await?;
        Ok(())
    }
}

async fn check_list<T>(
    ctx: &mut StepContext<'_>,
    obd: &[u8],
    label: &str,
    outcome: Outcome,
) -> Result<(), StepError>
where
    T: DtcList,
{
    let result = ctx.j1939.request_global::<T>().await?;
    for &address in obd {
        let name = StepContext::module_name(address);
        match result.packets.iter().find(|p| p.source() == address) {
            None => ctx.warn(format!("{name} did not respond to {label} request")),
            Some(packet) if !packet.dtcs().is_empty() => {
                let codes: Vec<String> = packet.dtcs().iter().map(ToString::to_string).collect();
                ctx.record(outcome, format!("{name} reports {label} DTC(s): {}", codes.join(", ")));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// The DTC-carrying diagnostic messages.
trait DtcList: J1939Message {
    fn dtcs(&self) -> &[DiagnosticTroubleCode];
}

impl<const DM_PGN: u32> DtcList for DtcPacket<DM_PGN> {
    fn dtcs(&self) -> &[DiagnosticTroubleCode] {
        &self.dtcs
    }
}
