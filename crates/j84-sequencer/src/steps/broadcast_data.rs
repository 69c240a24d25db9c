//! Step 1.13: broadcast periods and supported data-stream values.
//!
//! Listens to the bus, checks each periodic PGN against its rate, asks for
//! on-request PGNs that carry supported SPNs, then validates every
//! supported SPN's values per module.

use std::collections::BTreeSet;

use async_trait::async_trait;

use j84_bus::spn_validation::{self, SpnProblem};
use j84_bus::{Response, broadcast, pgn_db};

use crate::step::{StepContext, StepError, TestStep};
use crate::steps::describe_response;

pub struct BroadcastData;

#[async_trait]
impl TestStep for BroadcastData {
    fn step(&self) -> u8 {
        13
    }

    fn name(&self) -> &str {
        "Broadcast data and supported SPNs"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let listen = ctx.config.sequence.broadcast_listen();
        let packets = ctx.j1939.read_broadcasts(listen).await?;
        tracing::info!(count = packets.len(), secs = listen.as_secs(), "broadcast capture finished");

        let report = broadcast::analyze(&packets);
        for finding in &report.findings {
            ctx.warn(finding.to_string());
        }

        for module in ctx.repo.obd_modules().await {
            let address = module.source_address;
            let name = StepContext::module_name(address);
            let supported: Vec<u32> = module.data_stream_spns().map(|s| s.spn).collect();
            if supported.is_empty() {
                continue;
            }

            let broadcast_pgns: BTreeSet<u32> = report.pgns_from(address).into_iter().collect();
            let on_request: BTreeSet<u32> = supported
                .iter()
                .filter_map(|&spn| pgn_db::spn(spn))
                .map(|def| def.pgn)
                .filter(|pgn| !broadcast_pgns.contains(pgn))
                .filter(|&pgn| pgn_db::pgn(pgn).is_some_and(|d| d.rate.is_none()))
                .collect();

            let mut module_packets: Vec<_> = packets.iter().filter(|p| p.source == address).cloned().collect();
            for pgn in on_request {
                let result = ctx.j1939.request_raw_ds(pgn, address).await?;
                match result.response {
                    Response::Packet(packet) => module_packets.push(packet),
                    _ => ctx.fail(format!("{name} {} for PGN {pgn}", describe_response(&result))),
                }
            }

            for problem in spn_validation::validate_provided(&supported, &module_packets) {
                let message = format!("{name}: {problem}");
                match problem {
                    SpnProblem::NotProvided { .. } | SpnProblem::NotAvailable { .. } => ctx.fail(message),
                    SpnProblem::ErrorIndicator { .. } => ctx.warn(message),
                }
            }
        }
        Ok(())
    }
}
