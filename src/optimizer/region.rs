//! Component F: Region Refiner (spec §4.F).
//!
//! Repeats the threshold scan (component E) over successively smaller time
//! regions — halving from `horizon/2` down to one hour — restricted to the
//! windows intersecting the current region, grafting any improving result
//! back onto the running best plan. Grounded in `worker.rs`'s tick-driven
//! re-planning loop, generalized from "re-run everything" to "re-run a
//! shrinking slice".

use crate::metric::MetricWeights;
use crate::pool::WorkerPool;
use crate::simulator::SimInputs;
use crate::types::{ChargeWindow, ExportWindow, Minute};

use super::threshold::{self, ThresholdParams};
use super::{CandidatePlan, ScoredPlan};

#[allow(clippy::too_many_arguments)]
pub fn refine(
    mut best: ScoredPlan,
    charge_windows: &[ChargeWindow],
    charge_rates: &[f64],
    export_windows: &[ExportWindow],
    export_rates: &[f64],
    params: &ThresholdParams,
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: Minute,
    pool: &WorkerPool,
    horizon_minutes: Minute,
) -> ScoredPlan {
    let mut region_size = (horizon_minutes / 2).max(60);

    while region_size >= 60 {
        let step = (region_size / 2).max(60);
        let mut region_start = 0;

        while region_start < horizon_minutes {
            let region_end = (region_start + region_size).min(horizon_minutes);

            let idx_c: Vec<usize> = charge_windows
                .iter()
                .enumerate()
                .filter(|(_, w)| w.start < region_end && w.end > region_start)
                .map(|(i, _)| i)
                .collect();
            let idx_e: Vec<usize> = export_windows
                .iter()
                .enumerate()
                .filter(|(_, w)| w.start < region_end && w.end > region_start)
                .map(|(i, _)| i)
                .collect();

            if idx_c.is_empty() && idx_e.is_empty() {
                region_start += step;
                continue;
            }

            let sub_charge: Vec<ChargeWindow> = idx_c.iter().map(|&i| charge_windows[i].clone()).collect();
            let sub_charge_rates: Vec<f64> = idx_c.iter().map(|&i| charge_rates[i]).collect();
            let sub_export: Vec<ExportWindow> = idx_e.iter().map(|&i| export_windows[i].clone()).collect();
            let sub_export_rates: Vec<f64> = idx_e.iter().map(|&i| export_rates[i]).collect();

            let sub_candidates = threshold::scan(&sub_charge, &sub_charge_rates, &sub_export, &sub_export_rates, params);

            let merged: Vec<CandidatePlan> = sub_candidates
                .into_iter()
                .map(|sub| {
                    let mut charge_limits = best.plan.charge_limits.clone();
                    let mut export_limits = best.plan.export_limits.clone();
                    for (n, &i) in idx_c.iter().enumerate() {
                        charge_limits[i] = sub.charge_limits[n];
                    }
                    for (n, &i) in idx_e.iter().enumerate() {
                        export_limits[i] = sub.export_limits[n];
                    }
                    CandidatePlan { charge_limits, export_limits }
                })
                .collect();

            let scored = threshold::evaluate(merged, sim_mid, sim_p10, charge_windows, export_windows, weights, rate_min_fwd, end_record, pool);
            if let Some(candidate_best) = threshold::best(&scored) {
                if candidate_best.metric < best.metric {
                    best = candidate_best.clone();
                }
            }

            region_start += step;
        }

        region_size /= 2;
    }

    best
}
