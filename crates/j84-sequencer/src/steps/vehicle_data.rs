//! Step 1.2: check the operator-entered vehicle data.

use async_trait::async_trait;
use chrono::Datelike;

use j84_protocol::vehicle::FuelType;
use j84_protocol::vin::{self, VinProblem};

use crate::step::{StepContext, StepError, TestStep};

/// First model year with heavy-duty OBD requirements.
pub const FIRST_OBD_MODEL_YEAR: u16 = 2010;

pub struct VehicleData;

#[async_trait]
impl TestStep for VehicleData {
    fn step(&self) -> u8 {
        2
    }

    fn name(&self) -> &str {
        "Vehicle data collection"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let vehicle = ctx.vehicle().await?;

        for problem in vin::validate(&vehicle.vin, vehicle.model_year) {
            match problem {
                VinProblem::Length { .. } | VinProblem::InvalidCharacter { .. } => ctx.fail(problem.to_string()),
                VinProblem::CheckDigit { .. } | VinProblem::ModelYear { .. } => ctx.warn(problem.to_string()),
            }
        }

        // Next year's models are on sale before the calendar turns.
        let latest = chrono::Utc::now().year() as u16 + 1;
        if !(FIRST_OBD_MODEL_YEAR..=latest).contains(&vehicle.model_year) {
            ctx.fail(format!(
                "vehicle model year {} outside {FIRST_OBD_MODEL_YEAR}..={latest}",
                vehicle.model_year
            ));
        }
        if !(FIRST_OBD_MODEL_YEAR..=vehicle.model_year).contains(&vehicle.engine_model_year) {
            ctx.fail(format!(
                "engine model year {} outside {FIRST_OBD_MODEL_YEAR}..={}",
                vehicle.engine_model_year, vehicle.model_year
            ));
        }
        if vehicle.fuel_type == FuelType::NotAvailable {
            ctx.fail("fuel type not entered");
        }
        if vehicle.calibrations == 0 {
            ctx.fail("expected calibration count must be at least 1");
        }
        if vehicle.obd_modules == 0 {
            ctx.fail("expected OBD module count must be at least 1");
        }
        Ok(())
    }
}
