//! Component O: Reporting (spec §6 "Report").
//!
//! The externally-visible artifact a tick produces: the published window
//! lists plus four named SoC/cost time-series channels (base/base10 = do
//! nothing, best/best10 = the winning plan), all JSON-serializable so a
//! caller (CLI, or a future HTTP surface) can consume it directly.

use serde::Serialize;

use crate::types::{ChargeWindow, ExportWindow, Minute, PredictionResult};

#[derive(Clone, Debug, Serialize)]
pub struct SeriesPoint {
    pub minute: Minute,
    pub soc: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub charge_windows: Vec<ChargeWindow>,
    pub export_windows: Vec<ExportWindow>,
    pub base: Vec<SeriesPoint>,
    pub base10: Vec<SeriesPoint>,
    pub best: Vec<SeriesPoint>,
    pub best10: Vec<SeriesPoint>,
    pub best_cost: f64,
    pub base_cost: f64,
    pub metric: f64,
}

fn to_series(result: &PredictionResult) -> Vec<SeriesPoint> {
    result.soc_trace.iter().map(|&(minute, soc)| SeriesPoint { minute, soc }).collect()
}

/// Builds the reporting DTO from the four named simulation outcomes plus the
/// published window lists. `ExportWindow::set`/`target` already carry the
/// legacy-float encoding by the time they reach here (see
/// `postprocess::publish_targets`), so no further conversion happens.
pub fn build(
    charge_windows: Vec<ChargeWindow>,
    export_windows: Vec<ExportWindow>,
    base: &PredictionResult,
    base10: &PredictionResult,
    best: &PredictionResult,
    best10: &PredictionResult,
    metric: f64,
) -> Report {
    Report {
        charge_windows,
        export_windows,
        base: to_series(base),
        base10: to_series(base10),
        best: to_series(best),
        best10: to_series(best10),
        best_cost: best.cost,
        base_cost: base.cost,
        metric,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_copies_cost_fields() {
        let base = PredictionResult { cost: 5.0, soc_trace: vec![(0, 1.0)], ..Default::default() };
        let best = PredictionResult { cost: 2.0, soc_trace: vec![(0, 1.0)], ..Default::default() };
        let report = build(vec![], vec![], &base, &base, &best, &best, 1.5);
        assert_eq!(report.base_cost, 5.0);
        assert_eq!(report.best_cost, 2.0);
        assert_eq!(report.best.len(), 1);
    }
}
