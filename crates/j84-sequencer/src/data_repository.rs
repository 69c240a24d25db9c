//! Shared store of what the sequence has learned about the vehicle.
//!
//! Steps write module facts here (DM5 compliance, DM24 support, DM19
//! calibrations, ...) and later steps read them back.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use j84_protocol::module::OBDModuleInformation;
use j84_protocol::vehicle::VehicleInformation;

#[derive(Debug, Default)]
struct RepositoryState {
    vehicle: Option<VehicleInformation>,
    modules: BTreeMap<u8, OBDModuleInformation>,
}

/// Cheaply cloneable handle to the run's shared state.
#[derive(Debug, Clone, Default)]
pub struct DataRepository {
    state: Arc<RwLock<RepositoryState>>,
}

impl DataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_vehicle(&self, vehicle: VehicleInformation) {
        self.state.write().await.vehicle = Some(vehicle);
    }

    pub async fn vehicle(&self) -> Option<VehicleInformation> {
        self.state.read().await.vehicle.clone()
    }

    /// Insert or replace the module at its source address.
    pub async fn put_module(&self, module: OBDModuleInformation) {
        self.state
            .write()
            .await
            .modules
            .insert(module.source_address, module);
    }

    pub async fn module(&self, address: u8) -> Option<OBDModuleInformation> {
        self.state.read().await.modules.get(&address).cloned()
    }

    /// Apply `f` to a stored module; returns false when there is none.
    pub async fn update_module(&self, address: u8, f: impl FnOnce(&mut OBDModuleInformation)) -> bool {
        match self.state.write().await.modules.get_mut(&address) {
            Some(module) => {
                f(module);
                true
            }
            None => false,
        }
    }

    /// Every stored module, ordered by address.
    pub async fn obd_modules(&self) -> Vec<OBDModuleInformation> {
        self.state.read().await.modules.values().cloned().collect()
    }

    pub async fn obd_addresses(&self) -> Vec<u8> {
        self.state.read().await.modules.keys().copied().collect()
    }

    pub async fn is_obd_module(&self, address: u8) -> bool {
        self.state.read().await.modules.contains_key(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j84_protocol::vehicle::FuelType;

    #[tokio::test]
    async fn modules_ordered_by_address() {
        let repo = DataRepository::new();
        repo.put_module(OBDModuleInformation::new(0x3D, 0x13)).await;
        repo.put_module(OBDModuleInformation::new(0x00, 0x13)).await;

        assert_eq!(repo.obd_addresses().await, vec![0x00, 0x3D]);
        assert!(repo.is_obd_module(0x3D).await);
        assert!(!repo.is_obd_module(0x17).await);
    }

    #[tokio::test]
    async fn update_visible_through_clones() {
        let repo = DataRepository::new();
        let other = repo.clone();
        repo.put_module(OBDModuleInformation::new(0x00, 0x13)).await;

        assert!(other.update_module(0x00, |m| m.obd_compliance = 0x14).await);
        assert!(!other.update_module(0x01, |_| {}).await);
        assert_eq!(repo.module(0x00).await.unwrap().obd_compliance, 0x14);
    }

    #[tokio::test]
    async fn vehicle_round_trip() {
        let repo = DataRepository::new();
        assert!(repo.vehicle().await.is_none());
        repo.set_vehicle(VehicleInformation {
            vin: "1FUJGLDR2RLBP8834".into(),
            model_year: 2024,
            engine_model_year: 2024,
            fuel_type: FuelType::Diesel,
            calibrations: 2,
            obd_modules: 2,
        })
        .await;
        assert_eq!(repo.vehicle().await.unwrap().model_year, 2024);
    }
}
