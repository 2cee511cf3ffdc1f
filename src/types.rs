//! Core data model (spec §3 DATA MODEL).

use serde::Serialize;
use std::collections::HashMap;

/// Minutes since local midnight of the planning day the tick started in.
/// Signed so that "minutes before now" (historical load) is representable.
pub type Minute = i64;

/// A dense map from step-aligned minute offset (relative to `minutes_now`) to a scalar.
pub type StepSeries = HashMap<Minute, f64>;

/// Which PV/load percentile a simulation run uses (spec §4.A/§4.B).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PvMode {
    Mid,
    P10,
}

/// A precomputed tariff slot (import or export), spec §3.
#[derive(Clone, Debug, PartialEq)]
pub struct TariffSlot {
    pub start: Minute,
    pub end: Minute,
    pub average_rate: f64,
    pub secondary_rate: Option<f64>,
}

/// A charge window, spec §3. `target` and `set` are populated by the
/// post-processor (component H) for reporting; they play no role in simulation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChargeWindow {
    pub start: Minute,
    pub end: Minute,
    pub average_rate: f64,
    pub target: Option<f64>,
    pub set: Option<f64>,
    /// `true` once a manual override map has pinned this window (invariant 6).
    pub locked: bool,
}

/// An export window, same shape as `ChargeWindow` with an export-tariff rate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportWindow {
    pub start: Minute,
    pub end: Minute,
    pub average_rate: f64,
    pub target: Option<f64>,
    pub set: Option<f64>,
    pub locked: bool,
}

/// The §9 REDESIGN FLAGS tagged-variant rewrite of the sentinel-encoded export
/// limit float (100 = off, 99 = freeze, fractional = low-power). The legacy
/// encoding is only reconstructed at the reporting boundary (`report.rs`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExportLimit {
    Off,
    Freeze,
    Export { target_pct: u8, power_scale: f64 },
}

impl ExportLimit {
    pub fn is_off(&self) -> bool {
        matches!(self, ExportLimit::Off)
    }

    pub fn is_freeze(&self) -> bool {
        matches!(self, ExportLimit::Freeze)
    }

    pub fn is_active_export(&self) -> bool {
        matches!(self, ExportLimit::Export { .. })
    }

    /// Reconstructs the teacher-era sentinel encoding for reporting purposes only.
    pub fn to_legacy_float(self) -> f64 {
        match self {
            ExportLimit::Off => 100.0,
            ExportLimit::Freeze => 99.0,
            ExportLimit::Export { target_pct, power_scale } => {
                if power_scale >= 1.0 {
                    target_pct as f64
                } else {
                    target_pct as f64 + power_scale
                }
            }
        }
    }
}

/// Snapshot of battery configuration (spec §3 "Battery state").
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatteryParams {
    pub soc_kwh: f64,
    pub soc_max: f64,
    pub reserve: f64,
    pub charge_rate_max: f64,
    pub discharge_rate_max: f64,
    pub battery_loss: f64,
    pub battery_loss_discharge: f64,
    pub inverter_loss: f64,
}

impl BatteryParams {
    pub fn reserve_pct(&self) -> u8 {
        if self.soc_max <= 0.0 {
            0
        } else {
            ((self.reserve / self.soc_max) * 100.0).round().clamp(0.0, 100.0) as u8
        }
    }
}

/// A car-charging or iBoost interval: `[start, end)` demanding `kwh` total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemandSlot {
    pub start: Minute,
    pub end: Minute,
    pub kwh: f64,
}

/// Output of the forward simulator for one candidate plan (spec §3 "Prediction result").
#[derive(Clone, Debug, Default, Serialize)]
pub struct PredictionResult {
    pub cost: f64,
    pub import_to_battery: f64,
    pub import_to_house: f64,
    pub export: f64,
    pub soc_min: f64,
    pub final_soc: f64,
    pub soc_min_minute: Minute,
    pub battery_cycle: f64,
    pub keep_penalty: f64,
    pub final_iboost: f64,
    pub final_carbon_g: f64,
    /// Per-step SoC trace, used by the clipper (component H) to re-derive
    /// achieved soc_min/soc_max inside a given window.
    pub soc_trace: Vec<(Minute, f64)>,
}

impl PredictionResult {
    /// Achieved min/max SoC within `[start, end)`, used by the clipper (§4.H.4/5).
    pub fn soc_range_in(&self, start: Minute, end: Minute) -> Option<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut any = false;
        for (m, soc) in &self.soc_trace {
            if *m >= start && *m < end {
                any = true;
                min = min.min(*soc);
                max = max.max(*soc);
            }
        }
        if any {
            Some((min, max))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_float_roundtrip() {
        assert_eq!(ExportLimit::Off.to_legacy_float(), 100.0);
        assert_eq!(ExportLimit::Freeze.to_legacy_float(), 99.0);
        assert_eq!(
            ExportLimit::Export { target_pct: 20, power_scale: 1.0 }.to_legacy_float(),
            20.0
        );
        assert_eq!(
            ExportLimit::Export { target_pct: 20, power_scale: 0.3 }.to_legacy_float(),
            20.3
        );
    }

    #[test]
    fn reserve_pct_rounds() {
        let b = BatteryParams {
            soc_kwh: 5.0,
            soc_max: 10.0,
            reserve: 1.0,
            charge_rate_max: 3.0,
            discharge_rate_max: 3.0,
            battery_loss: 1.0,
            battery_loss_discharge: 1.0,
            inverter_loss: 1.0,
        };
        assert_eq!(b.reserve_pct(), 10);
    }
}
