//! Part 1 steps: key on, engine off data collection.

pub mod broadcast_data;
pub mod component_id;
pub mod dm11_clear;
pub mod dm19_calibration;
pub mod dm1_active;
pub mod dm24_support;
pub mod dm56_model_year;
pub mod dm5_after_clear;
pub mod dm5_discovery;
pub mod dm7_test_results;
pub mod vehicle_data;
pub mod vin;

use j84_bus::packets::AckControl;
use j84_bus::{BusResult, Response};

use crate::step::TestStep;

/// Every Part 1 step, in execution order.
pub fn part1() -> Vec<Box<dyn TestStep>> {
    vec![
        Box::new(vehicle_data::VehicleData),
        Box::new(dm5_discovery::Dm5Discovery),
        Box::new(dm24_support::Dm24Support),
        Box::new(vin::VinCheck),
        Box::new(dm56_model_year::Dm56ModelYear),
        Box::new(dm19_calibration::Dm19Calibration),
        Box::new(component_id::ComponentId),
        Box::new(dm11_clear::Dm11Clear),
        Box::new(dm5_after_clear::Dm5AfterClear),
        Box::new(dm1_active::Dm1Active),
        Box::new(dm7_test_results::Dm7TestResults),
        Box::new(broadcast_data::BroadcastData),
    ]
}

/// How a destination-specific request ended, for finding messages.
pub(crate) fn describe_response<T>(result: &BusResult<T>) -> String {
    match &result.response {
        Response::Packet(_) => "responded".to_string(),
        Response::Ack(ack) => match ack.control {
            AckControl::Ack => "acknowledged without data".to_string(),
            AckControl::Nack => "NACKed the request".to_string(),
            AckControl::AccessDenied => "denied access".to_string(),
            AckControl::CannotRespond => "stayed busy".to_string(),
            AckControl::Other(control) => format!("answered with acknowledgment control {control}"),
        },
        Response::Malformed { reason, .. } => format!("sent a malformed answer ({reason})"),
        Response::Timeout => "did not respond".to_string(),
    }
}
