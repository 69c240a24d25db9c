use serde::{Deserialize, Serialize};

/// Operator-entered facts about the vehicle under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInformation {
    pub vin: String,
    pub model_year: u16,
    pub engine_model_year: u16,
    pub fuel_type: FuelType,
    /// Number of calibration IDs expected across all OBD modules.
    pub calibrations: usize,
    /// Number of OBD ECUs expected to respond.
    pub obd_modules: usize,
}

/// Fuel type as defined for SPN 5837.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    NotAvailable,
    Gasoline,
    Methanol,
    Ethanol,
    Diesel,
    Lpg,
    Cng,
    Propane,
    BatteryElectric,
    BiFuelGasoline,
    HybridGasoline,
    HybridDiesel,
    DualFuelDieselCng,
}

impl FuelType {
    /// Raw SPN 5837 value.
    pub fn value(self) -> u8 {
        match self {
            FuelType::NotAvailable => 0xFF,
            FuelType::Gasoline => 0x01,
            FuelType::Methanol => 0x02,
            FuelType::Ethanol => 0x03,
            FuelType::Diesel => 0x04,
            FuelType::Lpg => 0x05,
            FuelType::Cng => 0x06,
            FuelType::Propane => 0x07,
            FuelType::BatteryElectric => 0x08,
            FuelType::BiFuelGasoline => 0x09,
            FuelType::HybridGasoline => 0x11,
            FuelType::HybridDiesel => 0x13,
            FuelType::DualFuelDieselCng => 0x1B,
        }
    }

    pub fn from_value(value: u8) -> Self {
        match value {
            0x01 => FuelType::Gasoline,
            0x02 => FuelType::Methanol,
            0x03 => FuelType::Ethanol,
            0x04 => FuelType::Diesel,
            0x05 => FuelType::Lpg,
            0x06 => FuelType::Cng,
            0x07 => FuelType::Propane,
            0x08 => FuelType::BatteryElectric,
            0x09 => FuelType::BiFuelGasoline,
            0x11 => FuelType::HybridGasoline,
            0x13 => FuelType::HybridDiesel,
            0x1B => FuelType::DualFuelDieselCng,
            _ => FuelType::NotAvailable,
        }
    }

    pub fn is_compression_ignition(self) -> bool {
        matches!(
            self,
            FuelType::Diesel | FuelType::HybridDiesel | FuelType::DualFuelDieselCng
        )
    }

    pub fn is_spark_ignition(self) -> bool {
        matches!(
            self,
            FuelType::Gasoline
                | FuelType::Methanol
                | FuelType::Ethanol
                | FuelType::Lpg
                | FuelType::Cng
                | FuelType::Propane
                | FuelType::BiFuelGasoline
                | FuelType::HybridGasoline
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignition_classes() {
        assert!(FuelType::Diesel.is_compression_ignition());
        assert!(!FuelType::Diesel.is_spark_ignition());
        assert!(FuelType::Cng.is_spark_ignition());
        assert!(!FuelType::BatteryElectric.is_spark_ignition());
        assert!(!FuelType::BatteryElectric.is_compression_ignition());
    }

    #[test]
    fn fuel_type_values() {
        assert_eq!(FuelType::from_value(FuelType::Diesel.value()), FuelType::Diesel);
        assert_eq!(FuelType::from_value(0x42), FuelType::NotAvailable);
    }

    #[test]
    fn deserialize_vehicle() {
        let json = r#"{
            "vin": "1FUJGLDR5CLBP8834",
            "model_year": 2024,
            "engine_model_year": 2024,
            "fuel_type": "diesel",
            "calibrations": 2,
            "obd_modules": 2
        }"#;
        let vehicle: VehicleInformation = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.fuel_type, FuelType::Diesel);
        assert_eq!(vehicle.obd_modules, 2);
    }
}
