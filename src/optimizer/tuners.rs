//! Component G: Per-Window Tuners (spec §4.G).
//!
//! Hill-climbs each window's set-point independently once the region refiner
//! has located a good neighborhood, mirroring `scheduler.rs`'s
//! window-at-a-time tightening passes (freeze, then normal, then low-power),
//! each gated by its own minimum-improvement threshold from config.

use crate::metric::{compute_metric, MetricWeights};
use crate::simulator::{self, SimInputs};
use crate::types::{ChargeWindow, ExportLimit, ExportWindow, PredictionResult, PvMode};
use crate::windows::{sort_window_by_price_combined, sort_window_by_time_combined, WindowKind};

use super::{CandidatePlan, ScoredPlan};

#[derive(Clone, Debug)]
pub struct TunerParams {
    pub best_soc_min: f64,
    pub best_soc_max: f64,
    pub best_soc_step: f64,
    pub best_soc_margin: f64,
    pub reserve: f64,
    pub metric_min_improvement: f64,
    pub metric_min_improvement_export: f64,
    pub metric_min_improvement_export_freeze: f64,
    pub charge_low_power_margin: i64,
    pub set_charge_low_power: bool,
    pub set_export_low_power: bool,
    pub set_export_freeze_only: bool,
    pub set_charge_freeze: bool,
    pub calculate_export_first: bool,
}

fn simulate_and_score(
    plan_charge: &[f64],
    plan_export: &[ExportLimit],
    charge_windows: &[ChargeWindow],
    export_windows: &[ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
) -> (f64, PredictionResult, PredictionResult) {
    let mid = simulator::run(sim_mid, charge_windows, plan_charge, export_windows, plan_export, PvMode::Mid, end_record);
    let p10 = simulator::run(sim_p10, charge_windows, plan_charge, export_windows, plan_export, PvMode::P10, end_record);
    let metric = compute_metric(&mid, &p10, weights, rate_min_fwd);
    (metric, mid, p10)
}

/// Probes `{soc_max, floor}` under both PV modes to find the achievable
/// `[min, max]` SoC envelope inside a charge window (spec §4.G.1). Candidates
/// outside `envelope ± step` are not worth simulating in full.
#[allow(clippy::too_many_arguments)]
fn probe_charge_envelope(
    i: usize,
    floor: f64,
    best: &ScoredPlan,
    charge_windows: &[ChargeWindow],
    export_windows: &[ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    params: &TunerParams,
    end_record: i64,
) -> (f64, f64) {
    let window = &charge_windows[i];
    let mut probe = |limit: f64| -> Option<(f64, f64)> {
        let mut trial = best.plan.charge_limits.clone();
        trial[i] = limit;
        let mid = simulator::run(sim_mid, charge_windows, &trial, export_windows, &best.plan.export_limits, PvMode::Mid, end_record);
        let p10 = simulator::run(sim_p10, charge_windows, &trial, export_windows, &best.plan.export_limits, PvMode::P10, end_record);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for r in [&mid, &p10] {
            if let Some((mn, mx)) = r.soc_range_in(window.start, window.end) {
                lo = lo.min(mn);
                hi = hi.max(mx);
            }
        }
        if lo.is_finite() && hi.is_finite() {
            Some((lo, hi))
        } else {
            None
        }
    };

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (a, b) in [probe(params.best_soc_max), probe(floor)].into_iter().flatten() {
        lo = lo.min(a);
        hi = hi.max(b);
    }
    if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (params.reserve, params.best_soc_max)
    }
}

/// Hill-climbs one charge window's target SoC downward in `best_soc_step`
/// increments from `best_soc_max`, skipping candidates outside the achievable
/// envelope, applying the soft tie-breaking biases and the hold-current-target
/// bias, and accepting a move only when it improves the metric by more than
/// `metric_min_improvement` scaled to the window's length (spec §4.G.1-6).
/// Windows shorter than `charge_low_power_margin` are skipped entirely when
/// `set_charge_low_power` is on, since a low-power charge could not complete
/// within them.
#[allow(clippy::too_many_arguments)]
fn tune_charge_window(
    mut best: ScoredPlan,
    i: usize,
    charge_windows: &[ChargeWindow],
    export_windows: &[ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    params: &TunerParams,
) -> ScoredPlan {
    if best.plan.charge_limits[i] <= 0.0 {
        return best;
    }
    let window_len = charge_windows[i].end - charge_windows[i].start;
    if params.set_charge_low_power && window_len < params.charge_low_power_margin {
        return best;
    }

    let floor = params.reserve.max(params.best_soc_min);
    let step = params.best_soc_step.max(0.1);
    let (env_min, env_max) = probe_charge_envelope(i, floor, &best, charge_windows, export_windows, sim_mid, sim_p10, params, end_record);

    let mut candidates = Vec::new();
    let mut c = params.best_soc_max;
    while c >= floor {
        candidates.push(c);
        c -= step;
    }
    candidates.push(floor);
    if params.set_charge_freeze {
        candidates.push(params.reserve);
    }
    candidates.sort_by(|a, b| b.partial_cmp(a).unwrap());
    candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let min_improvement_scaled = params.metric_min_improvement * window_len as f64 / 30.0;
    let currently_active = charge_windows[i].target;

    for candidate in candidates {
        if candidate < env_min - step || candidate > env_max + step {
            continue;
        }
        let mut trial = best.plan.charge_limits.clone();
        trial[i] = candidate;
        let (mut metric, mid, p10) =
            simulate_and_score(&trial, &best.plan.export_limits, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record);

        if (candidate - floor).abs() < 1e-9 {
            metric -= 0.003;
        } else if (candidate - params.best_soc_max).abs() < 1e-9 {
            metric -= 0.002;
        } else if params.set_charge_freeze && (candidate - params.reserve).abs() < 1e-9 {
            metric -= 0.001;
        }
        if let Some(current) = currently_active {
            if (candidate - current).abs() < 1e-9 {
                metric -= params.metric_min_improvement.max(0.1);
            }
        }

        if best.metric - metric > min_improvement_scaled {
            best = ScoredPlan {
                plan: CandidatePlan { charge_limits: trial, export_limits: best.plan.export_limits.clone() },
                metric,
                mid,
                p10,
            };
        }
    }

    if params.best_soc_margin > 0.0 && best.plan.charge_limits[i] > floor {
        let margined = (best.plan.charge_limits[i] + params.best_soc_margin).min(params.best_soc_max);
        if margined > best.plan.charge_limits[i] + 1e-9 {
            let mut trial = best.plan.charge_limits.clone();
            trial[i] = margined;
            let (metric, mid, p10) =
                simulate_and_score(&trial, &best.plan.export_limits, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record);
            best = ScoredPlan {
                plan: CandidatePlan { charge_limits: trial, export_limits: best.plan.export_limits.clone() },
                metric,
                mid,
                p10,
            };
        }
    }

    best
}

/// Hill-climbs every already-selected charge window once, in price order.
#[allow(clippy::too_many_arguments)]
pub fn optimise_charge_limit(
    mut best: ScoredPlan,
    charge_windows: &[ChargeWindow],
    export_windows: &[ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    params: &TunerParams,
) -> ScoredPlan {
    for i in 0..charge_windows.len() {
        best = tune_charge_window(best, i, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
    }
    best
}

fn candidate_export_limits(params: &TunerParams) -> Vec<ExportLimit> {
    if params.set_export_freeze_only {
        return vec![ExportLimit::Off, ExportLimit::Freeze];
    }
    let mut out = vec![ExportLimit::Off, ExportLimit::Freeze];
    let mut target_pct: u8 = 0;
    while target_pct <= 100 {
        out.push(ExportLimit::Export { target_pct, power_scale: 1.0 });
        if params.set_export_low_power {
            for &scale in &[0.3, 0.5, 0.7] {
                out.push(ExportLimit::Export { target_pct, power_scale: scale });
            }
        }
        target_pct = target_pct.saturating_add(10);
    }
    out
}

/// Slides an active export window's start backward from `end - 5min` toward
/// its original start, holding `end` fixed, re-simulating at each position
/// and keeping the best (spec §4.G `optimise_export`, "also searches the
/// window start"). Mutates `export_windows[j].start` in place on the winning
/// position so the slide survives into reporting/post-processing.
#[allow(clippy::too_many_arguments)]
fn slide_export_start(
    mut best: ScoredPlan,
    j: usize,
    charge_windows: &[ChargeWindow],
    export_windows: &mut [ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    threshold: f64,
) -> ScoredPlan {
    let original_start = export_windows[j].start;
    let window_end = export_windows[j].end;
    let mut best_start = original_start;

    let mut candidate_start = window_end - 5;
    while candidate_start > original_start {
        export_windows[j].start = candidate_start;
        let (metric, mid, p10) =
            simulate_and_score(&best.plan.charge_limits, &best.plan.export_limits, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record);
        if best.metric - metric > threshold {
            best = ScoredPlan { plan: best.plan.clone(), metric, mid, p10 };
            best_start = candidate_start;
        }
        candidate_start -= 5;
    }

    export_windows[j].start = best_start;
    best
}

/// Hill-climbs one export window's limit across `{Off, Freeze, Export{..}}`
/// (plus low-power fractional variants when enabled), with a bias toward
/// holding the currently-active limit steady while it executes, then searches
/// the window's start position (spec §4.G `optimise_export`).
#[allow(clippy::too_many_arguments)]
fn tune_export_window(
    mut best: ScoredPlan,
    j: usize,
    charge_windows: &[ChargeWindow],
    export_windows: &mut [ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    params: &TunerParams,
) -> ScoredPlan {
    if best.plan.export_limits[j].is_off() {
        return best;
    }

    let threshold = if best.plan.export_limits[j].is_freeze() {
        params.metric_min_improvement_export_freeze
    } else {
        params.metric_min_improvement_export
    };
    let hold_bias = params.metric_min_improvement_export.max(0.5);
    let currently_active = best.plan.export_limits[j];

    for candidate in candidate_export_limits(params) {
        let mut trial = best.plan.export_limits.clone();
        trial[j] = candidate;
        let (mut metric, mid, p10) =
            simulate_and_score(&best.plan.charge_limits, &trial, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record);
        if candidate == currently_active {
            metric -= hold_bias;
        }
        if best.metric - metric > threshold {
            best = ScoredPlan {
                plan: CandidatePlan { charge_limits: best.plan.charge_limits.clone(), export_limits: trial },
                metric,
                mid,
                p10,
            };
        }
    }

    if !best.plan.export_limits[j].is_off() && !params.set_export_freeze_only {
        best = slide_export_start(best, j, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, threshold);
    }

    best
}

/// Hill-climbs every active export window once, in price order.
#[allow(clippy::too_many_arguments)]
pub fn optimise_export(
    mut best: ScoredPlan,
    charge_windows: &[ChargeWindow],
    export_windows: &mut [ExportWindow],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    params: &TunerParams,
) -> ScoredPlan {
    for j in 0..export_windows.len() {
        best = tune_export_window(best, j, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
    }
    best
}

/// Runs the three sub-passes of component G in the order spec §4.G "Main
/// pass ordering" prescribes: freeze (newest windows first, freeze-to-export
/// transitions only), normal (price order, turning candidates down), low
/// (price-reversed, turning off candidates back up). Each sub-pass reuses
/// the same per-window tuning machinery; what varies is iteration order and
/// which windows are in scope for that pass.
#[allow(clippy::too_many_arguments)]
pub fn tune(
    mut best: ScoredPlan,
    charge_windows: &[ChargeWindow],
    charge_rates: &[f64],
    export_windows: &mut Vec<ExportWindow>,
    export_rates: &[f64],
    sim_mid: &SimInputs,
    sim_p10: &SimInputs,
    weights: &MetricWeights,
    rate_min_fwd: f64,
    end_record: i64,
    params: &TunerParams,
) -> ScoredPlan {
    let combined = sort_window_by_price_combined(charge_windows, charge_rates, export_windows, export_rates, params.calculate_export_first);
    let best_price = combined.price_set.last().copied().unwrap_or(0.0);

    // 1. freeze sub-pass: newest windows first, freeze <-> export transitions only.
    let mut time_order = sort_window_by_time_combined(charge_windows, export_windows);
    time_order.reverse();
    for key in &time_order {
        if key.kind != WindowKind::Export {
            continue;
        }
        let j = key.id;
        if best.plan.export_limits[j].is_off() {
            continue;
        }
        best = tune_export_window(best, j, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
    }

    // 2. normal sub-pass: price order, turning candidates down.
    for key in &combined.ordered {
        match key.kind {
            WindowKind::Charge => {
                let info = combined.info.get(&(key.kind, key.id));
                if let Some(info) = info {
                    if info.average > best_price && (best.plan.charge_limits[key.id] - params.best_soc_max).abs() < 1e-9 {
                        continue;
                    }
                }
                best = tune_charge_window(best, key.id, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
            }
            WindowKind::Export => {
                best = tune_export_window(best, key.id, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
            }
        }
    }

    // 3. low sub-pass: price-reversed, turning off candidates back up.
    let mut low_order = combined.ordered.clone();
    low_order.reverse();
    for key in &low_order {
        let info = match combined.info.get(&(key.kind, key.id)) {
            Some(i) => i,
            None => continue,
        };
        if info.average >= best_price {
            continue;
        }
        match key.kind {
            WindowKind::Charge => {
                if best.plan.charge_limits[key.id] <= 0.0 {
                    best = tune_charge_window(best, key.id, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
                }
            }
            WindowKind::Export => {
                if best.plan.export_limits[key.id].is_off() {
                    let mut trial = best.plan.export_limits.clone();
                    trial[key.id] = ExportLimit::Export { target_pct: 0, power_scale: 1.0 };
                    let (metric, mid, p10) =
                        simulate_and_score(&best.plan.charge_limits, &trial, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record);
                    if best.metric - metric > params.metric_min_improvement_export {
                        best = ScoredPlan {
                            plan: CandidatePlan { charge_limits: best.plan.charge_limits.clone(), export_limits: trial },
                            metric,
                            mid,
                            p10,
                        };
                        best = tune_export_window(best, key.id, charge_windows, export_windows, sim_mid, sim_p10, weights, rate_min_fwd, end_record, params);
                    }
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatteryParams;

    fn battery() -> BatteryParams {
        BatteryParams {
            soc_kwh: 1.0,
            soc_max: 10.0,
            reserve: 1.0,
            charge_rate_max: 3.0,
            discharge_rate_max: 3.0,
            battery_loss: 1.0,
            battery_loss_discharge: 1.0,
            inverter_loss: 1.0,
        }
    }

    fn weights() -> MetricWeights {
        MetricWeights {
            value_scale: 1.0,
            iboost_scale: 0.0,
            rate_export_floor: 0.0,
            pv_metric10_weight: 0.0,
            carbon_enable: false,
            carbon_metric: 0.0,
            self_sufficiency_metric: 0.0,
            battery_cycle_metric: 0.0,
        }
    }

    fn params() -> TunerParams {
        TunerParams {
            best_soc_min: 2.0,
            best_soc_max: 10.0,
            best_soc_step: 1.0,
            best_soc_margin: 0.0,
            reserve: 1.0,
            metric_min_improvement: -1000.0,
            metric_min_improvement_export: 0.0,
            metric_min_improvement_export_freeze: 0.0,
            charge_low_power_margin: 0,
            set_charge_low_power: false,
            set_export_low_power: false,
            set_export_freeze_only: false,
            set_charge_freeze: false,
            calculate_export_first: true,
        }
    }

    #[test]
    fn charge_limit_never_dips_below_floor() {
        let load = vec![0.0; 8];
        let pv = vec![0.0; 8];
        let rate_import = vec![0.2; 8];
        let rate_export = vec![0.0; 8];
        let sim = SimInputs {
            battery: battery(),
            step_minutes: 30,
            load_step: &load,
            load10_step: &load,
            pv_step: &pv,
            pv10_step: &pv,
            rate_import_step: &rate_import,
            rate_export_step: &rate_export,
            carbon_step: None,
            car_demand: &[],
            car_charging_from_battery: true,
            iboost_enable: false,
            iboost_max_power: 0.0,
            iboost_from_battery: false,
            metric_soc_keep_floor: 0.0,
            metric_keep_penalty_rate: 0.0,
        };
        let charge_windows = vec![ChargeWindow { start: 0, end: 240, average_rate: 0.2, target: None, set: None, locked: false }];
        let plan = CandidatePlan { charge_limits: vec![10.0], export_limits: vec![] };
        let mid = simulator::run(&sim, &charge_windows, &plan.charge_limits, &[], &[], PvMode::Mid, 240);
        let p10 = mid.clone();
        let metric = compute_metric(&mid, &p10, &weights(), 0.0);
        let scored = ScoredPlan { plan, metric, mid, p10 };

        let params = params();
        let tuned = optimise_charge_limit(scored, &charge_windows, &[], &sim, &sim, &weights(), 0.0, 240, &params);
        assert!(tuned.plan.charge_limits[0] >= params.best_soc_min.max(params.reserve) - 1e-9);
    }

    #[test]
    fn export_tuning_honors_freeze_only() {
        let load = vec![0.0; 8];
        let pv = vec![1.0; 8];
        let rate_import = vec![0.2; 8];
        let rate_export = vec![0.1; 8];
        let sim = SimInputs {
            battery: battery(),
            step_minutes: 30,
            load_step: &load,
            load10_step: &load,
            pv_step: &pv,
            pv10_step: &pv,
            rate_import_step: &rate_import,
            rate_export_step: &rate_export,
            carbon_step: None,
            car_demand: &[],
            car_charging_from_battery: true,
            iboost_enable: false,
            iboost_max_power: 0.0,
            iboost_from_battery: false,
            metric_soc_keep_floor: 0.0,
            metric_keep_penalty_rate: 0.0,
        };
        let mut export_windows = vec![ExportWindow { start: 0, end: 240, average_rate: 0.1, target: None, set: None, locked: false }];
        let plan = CandidatePlan { charge_limits: vec![], export_limits: vec![ExportLimit::Export { target_pct: 0, power_scale: 1.0 }] };
        let mid = simulator::run(&sim, &[], &[], &export_windows, &plan.export_limits, PvMode::Mid, 240);
        let p10 = mid.clone();
        let metric = compute_metric(&mid, &p10, &weights(), 0.0);
        let scored = ScoredPlan { plan, metric, mid, p10 };

        let mut params = params();
        params.set_export_freeze_only = true;
        let tuned = optimise_export(scored, &[], &mut export_windows, &sim, &sim, &weights(), 0.0, 240, &params);
        assert!(!tuned.plan.export_limits[0].is_active_export());
    }
}
