//! Component E: Price-Threshold Optimizer (spec §4.E).
//!
//! The lattice sweep follows `scheduling.rs::seek_best`'s nested
//! combinatorial loop-and-record-best shape, re-targeted at the price/lattice
//! search instead of brute-force time slots. Structural-hash dedup (see
//! `super::CandidatePlan::structural_hash`) replaces the stringly-typed hash
//! key the teacher builds from a formatted string.

use std::collections::HashSet;

use crate::metric::{compute_metric, MetricWeights};
use crate::pool::WorkerPool;
use crate::simulator::{self, SimInputs};
use crate::types::{ChargeWindow, ExportLimit, ExportWindow, PvMode};
use crate::windows::{sort_window_by_price_combined, WindowKind};

use super::{CandidatePlan, ScoredPlan};

#[derive(Clone, Debug)]
pub struct ThresholdParams {
    pub best_soc_min: f64,
    pub best_soc_max: f64,
    pub best_soc_step: f64,
    pub lattice_modulo: Vec<u32>,
    pub lattice_divide: Vec<u32>,
    pub calculate_export_first: bool,
    pub set_charge_freeze: bool,
}

/// Sweeps price thresholds from highest to lowest effective rate. At each
/// threshold, every window priced at or above it is switched fully on
/// (charge to `best_soc_max`, export to 0%); a `(modulo, divide)` lattice
/// then fans out partial-SoC variants of that threshold's selection, and
/// (if enabled) a freeze variant. Structural duplicates are dropped.
pub fn scan(
    charge_windows: &[ChargeWindow],
    charge_rates: &[f64],
    export_windows: &[ExportWindow],
    export_rates: &[f64],
    params: &ThresholdParams,
) -> Vec<CandidatePlan> {
    let combined = sort_window_by_price_combined(charge_windows, charge_rates, export_windows, export_rates, params.calculate_export_first);

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    push_unique(
        &mut candidates,
        &mut seen,
        CandidatePlan {
            charge_limits: vec![0.0; charge_windows.len()],
            export_limits: vec![ExportLimit::Off; export_windows.len()],
        },
    );

    for &threshold in &combined.price_set {
        let mut charge_limits = vec![0.0; charge_windows.len()];
        let mut export_limits = vec![ExportLimit::Off; export_windows.len()];

        for key in &combined.ordered {
            let info = match combined.info.get(&(key.kind, key.id)) {
                Some(i) => i,
                None => continue,
            };
            if info.average < threshold {
                continue;
            }
            match key.kind {
                WindowKind::Charge => charge_limits[key.id] = params.best_soc_max,
                WindowKind::Export => {
                    export_limits[key.id] = ExportLimit::Export { target_pct: 0, power_scale: 1.0 };
                }
            }
        }

        push_unique(&mut candidates, &mut seen, CandidatePlan { charge_limits: charge_limits.clone(), export_limits: export_limits.clone() });

        for (&modulo, &divide) in params.lattice_modulo.iter().zip(params.lattice_divide.iter()) {
            if divide == 0 {
                continue;
            }
            let fraction = modulo as f64 / divide as f64;
            if !(0.0..=1.0).contains(&fraction) {
                continue;
            }
            let target = round_to_step(params.best_soc_min + (params.best_soc_max - params.best_soc_min) * fraction, params.best_soc_step);

            let mut lattice_charge = charge_limits.clone();
            for v in lattice_charge.iter_mut() {
                if *v > 0.0 {
                    *v = target;
                }
            }
            push_unique(&mut candidates, &mut seen, CandidatePlan { charge_limits: lattice_charge, export_limits: export_limits.clone() });
        }

        if params.set_charge_freeze {
            let mut freeze_limits = charge_limits.clone();
            for v in freeze_limits.iter_mut() {
                if *v > 0.0 {
                    *v = params.best_soc_min.max(0.0);
                }
            }
            push_unique(&mut candidates, &mut seen, CandidatePlan { charge_limits: freeze_limits, export_limits });
        }
    }

    candidates
}

fn round_to_step(v: f64, step: f64) -> f64 {
    if step <= 0.0 {
        v
    } else {
        (v / step).round() * step
    }
}

fn push_unique(out: &mut Vec<CandidatePlan>, seen: &mut HashSet<u64>, plan: CandidatePlan) {
    if seen.insert(plan.structural_hash()) {
        out.push(plan);
    }
}

/// Simulates every candidate's mid and p10 outcome via the worker pool and
/// scores it, per spec §4.E/§5.
pub fn evaluate(
    candidates: Vec<CandidatePlan>,
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    charge_windows: &[ChargeWindow],
    export_windows: &[ExportWindow],
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    pool: &WorkerPool,
) -> Vec<ScoredPlan> {
    pool.map_ordered(candidates, |plan| {
        let mid = simulator::run(sim_mid, charge_windows, &plan.charge_limits, export_windows, &plan.export_limits, PvMode::Mid, end_record);
        let p10 = simulator::run(sim_p10, charge_windows, &plan.charge_limits, export_windows, &plan.export_limits, PvMode::P10, end_record);
        let metric = compute_metric(&mid, &p10, weights, rate_min_fwd);
        ScoredPlan { plan, metric, mid, p10 }
    })
}

/// Lowest-metric plan; ties keep the first-submitted plan (spec §5 "Parallel
/// safety invariants": deterministic regardless of scheduling order).
pub fn best(scored: &[ScoredPlan]) -> Option<&ScoredPlan> {
    scored.iter().fold(None, |acc, s| match acc {
        None => Some(s),
        Some(b) if s.metric < b.metric => Some(s),
        Some(b) => Some(b),
    })
}
