//! Step 1.12: scaled test results (DM7 → DM30) for every supported SPN.

use async_trait::async_trait;

use j84_bus::Response;

use crate::step::{StepContext, StepError, TestStep};
use crate::steps::describe_response;

pub struct Dm7TestResults;

#[async_trait]
impl TestStep for Dm7TestResults {
    fn step(&self) -> u8 {
        12
    }

    fn name(&self) -> &str {
        "DM7/DM30: scaled test results"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let cleared = ctx.config.sequence.allow_dtc_clear;
        let mut requested = 0;

        for module in ctx.repo.obd_modules().await {
            let address = module.source_address;
            let name = StepContext::module_name(address);
            let mut collected = Vec::new();

            for spn in module.test_result_spns().map(|s| s.spn) {
                requested += 1;
                let result = ctx.j1939.request_test_results(address, spn).await?;
                let dm30 = match result.response {
                    Response::Packet(dm30) => dm30,
                    _ => {
                        ctx.fail(format!("{name} {} for DM7 SPN {spn}", describe_response(&result)));
                        continue;
                    }
                };

                if dm30.results.is_empty() {
                    ctx.fail(format!("{name} returned no test results for SPN {spn}"));
                    continue;
                }
                for r in &dm30.results {
                    if r.spn != spn {
                        ctx.warn(format!(
                            "{name} returned a result for SPN {} when asked for SPN {spn}",
                            r.spn
                        ));
                    } else if cleared && !r.is_initialized() {
                        ctx.warn(format!(
                            "{name} SPN {} FMI {} test result not initialized after clear ({:?})",
                            r.spn,
                            r.fmi,
                            r.state()
                        ));
                    }
                }
                tracing::debug!(source = address, spn, results = dm30.results.len(), "DM30 received");
                collected.extend(dm30.results);
            }

            ctx.repo
                .update_module(address, |m| m.scaled_test_results = collected)
                .await;
        }

        if requested == 0 {
            ctx.info("no module supports scaled test results");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequencerConfig;
    use crate::steps::testing::{Harness, mentions};
    use j84_bus::types::PGN_DM7;
    use j84_bus::{SimResponse, SimulatedVehicle};
    use j84_protocol::outcome::Outcome;
    use j84_protocol::spn::SupportedSpn;
    use j84_protocol::test_result::ScaledTestResult;

    async fn harness_with_support(vehicle: SimulatedVehicle, config: Option<SequencerConfig>) -> Harness {
        let harness = match config {
            Some(config) => Harness::with_config(vehicle, config).await,
            None => Harness::new(vehicle).await,
        };
        let harness = harness.with_reference_modules().await;
        let support = |spn| SupportedSpn {
            spn,
            length: 1,
            data_stream: false,
            freeze_frame: false,
            scaled_test_results: true,
        };
        harness
            .repo
            .update_module(0x00, |m| m.supported_spns = vec![support(3058)])
            .await;
        harness
            .repo
            .update_module(0x3D, |m| m.supported_spns = vec![support(3226), support(4364)])
            .await;
        harness
    }

    #[tokio::test(start_paused = true)]
    async fn results_collected() {
        let harness = harness_with_support(SimulatedVehicle::reference(), None).await;
        let outcomes = harness.run(&Dm7TestResults).await.unwrap();
        assert!(outcomes.is_empty(), "{outcomes:?}");

        let ats = harness.repo.module(0x3D).await.unwrap();
        assert_eq!(ats.scaled_test_results.len(), 3);
        assert!(ats.scaled_test_results.iter().all(|r| r.is_initialized()));
        assert_eq!(harness.repo.module(0x00).await.unwrap().scaled_test_results.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nack_and_unsupported_spn_fail() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| ecu.set_response(PGN_DM7, SimResponse::Nack));
        vehicle.with_ecu(0x3D, |ecu| ecu.set_test_results(4364, Vec::new()));
        let harness = harness_with_support(vehicle, None).await;

        let outcomes = harness.run(&Dm7TestResults).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Fail, "Engine #1 (0x00) NACKed the request for DM7 SPN 3058"));
        assert!(mentions(&outcomes, Outcome::Fail, "returned no test results for SPN 4364"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_after_clear_warn() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x00, |ecu| {
            ecu.set_test_results(
                3058,
                vec![ScaledTestResult {
                    test_id: 247,
                    spn: 3058,
                    fmi: 18,
                    slot_id: 242,
                    value: 120,
                    max: 200,
                    min: 0,
                }],
            )
        });
        let mut config = SequencerConfig::default();
        config.vehicle = Some(SimulatedVehicle::reference_info());
        config.sequence.allow_dtc_clear = true;
        let harness = harness_with_support(vehicle, Some(config)).await;

        let outcomes = harness.run(&Dm7TestResults).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Warn, "SPN 3058 FMI 18 test result not initialized"));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_supported() {
        let harness = Harness::new(SimulatedVehicle::reference()).await.with_reference_modules().await;
        let outcomes = harness.run(&Dm7TestResults).await.unwrap();
        assert!(mentions(&outcomes, Outcome::Info, "no module supports"));
    }

    #[tokio::test(start_paused = true)]
    async fn result_for_other_spn_warns() {
        let vehicle = SimulatedVehicle::reference();
        vehicle.with_ecu(0x3D, |ecu| {
            ecu.set_test_results(
                4364,
                vec![ScaledTestResult {
                    test_id: 247,
                    spn: 3226,
                    fmi: 18,
                    slot_id: 242,
                    value: 0xFB00,
                    max: 0xFFFF,
                    min: 0xFFFF,
                }],
            )
        });
        let harness = harness_with_support(vehicle, None).await;

        let outcomes = harness.run(&Dm7TestResults).await.unwrap();
        assert!(mentions(
            &outcomes,
            Outcome::Warn,
            "Exhaust Emission Controller (0x3D) returned a result for SPN 3226 when asked for SPN 4364"
        ));
    }
}
