//! Component N: Ports (spec §6 EXTERNAL INTERFACES).
//!
//! Trait seams standing in for the out-of-scope external collaborators the
//! original vendor clients (`manager_fox_cloud`, `manager_forecast`,
//! `manager_nordpool`, `manager_production`) talked to over HTTP. Only the
//! DTO *shapes* those modules returned are kept; their request bodies,
//! authentication, and solar-position physics are not in scope.

use crate::errors::InputError;
use crate::types::{BatteryParams, DemandSlot, Minute};

/// Forecasts and historical series a planning tick needs, generalizing
/// `manager_forecast::ForecastRecord`/`manager_production`'s per-minute
/// arrays into horizon-agnostic slices keyed by minute offset from now.
pub trait DataProvider {
    fn load_history_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn pv_forecast_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn pv10_forecast_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn import_rate_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn export_rate_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn carbon_intensity_per_minute(&self) -> Result<Vec<f64>, InputError>;
    fn car_demand(&self) -> Result<Vec<DemandSlot>, InputError>;
    fn cloud_factor(&self) -> Result<f64, InputError>;
}

/// Battery/inverter read+write, generalizing `manager_fox_cloud`'s
/// `RealTimeData`/`RequestCurrentBatState` DTOs into a typed seam.
pub trait InverterPort {
    fn read_battery_state(&self) -> Result<BatteryParams, InputError>;
    fn set_charge_window(&mut self, start: Minute, end: Minute, limit_kwh: f64) -> Result<(), InputError>;
    fn set_export_window(&mut self, start: Minute, end: Minute, legacy_limit: f64) -> Result<(), InputError>;
}

/// Notification/automation sink. No teacher equivalent survives the trim
/// (`manager_mail`'s SMTP body is out of scope); kept as an empty-ish seam
/// so an orchestrator can report plan changes without depending on a
/// concrete transport.
pub trait HomeAutomationPort {
    fn notify_plan_changed(&mut self, summary: &str) -> Result<(), InputError>;
}

/// Reference `DataProvider` backed by plain in-memory vectors, for running
/// the planner standalone and for integration tests (spec §6's "ports", not
/// a production client).
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataProvider {
    pub load_history: Vec<f64>,
    pub pv_forecast: Vec<f64>,
    pub pv10_forecast: Vec<f64>,
    pub import_rate: Vec<f64>,
    pub export_rate: Vec<f64>,
    pub carbon_intensity: Vec<f64>,
    pub car_demand: Vec<DemandSlot>,
    pub cloud_factor: f64,
}

impl DataProvider for InMemoryDataProvider {
    fn load_history_per_minute(&self) -> Result<Vec<f64>, InputError> {
        Ok(self.load_history.clone())
    }
    fn pv_forecast_per_minute(&self) -> Result<Vec<f64>, InputError> {
        Ok(self.pv_forecast.clone())
    }
    fn pv10_forecast_per_minute(&self) -> Result<Vec<f64>, InputError> {
        Ok(self.pv10_forecast.clone())
    }
    fn import_rate_per_minute(&self) -> Result<Vec<f64>, InputError> {
        if self.import_rate.is_empty() {
            return Err(InputError::MissingSeries("import_rate"));
        }
        Ok(self.import_rate.clone())
    }
    fn export_rate_per_minute(&self) -> Result<Vec<f64>, InputError> {
        if self.export_rate.is_empty() {
            return Err(InputError::MissingSeries("export_rate"));
        }
        Ok(self.export_rate.clone())
    }
    fn carbon_intensity_per_minute(&self) -> Result<Vec<f64>, InputError> {
        Ok(self.carbon_intensity.clone())
    }
    fn car_demand(&self) -> Result<Vec<DemandSlot>, InputError> {
        Ok(self.car_demand.clone())
    }
    fn cloud_factor(&self) -> Result<f64, InputError> {
        Ok(self.cloud_factor)
    }
}
