//! Component I: Planner Orchestrator (spec §4.I).
//!
//! Drives one planning tick end-to-end: resample, build candidate windows,
//! scan price thresholds, refine by region, tune per-window, post-process,
//! decide whether to commit over the previous tick's plan, and report.
//! Grounded in `worker.rs`'s tick loop, split per spec §9 DESIGN NOTES into
//! immutable-per-tick inputs (`PlanInputs`) and orchestrator-owned
//! across-tick state (`PlanState`), with the simulator itself stateless.

use crate::config::Config;
use crate::errors::PlanError;
use crate::metric::{rate_min_forward, MetricWeights};
use crate::optimizer::region;
use crate::optimizer::threshold::{self, ThresholdParams};
use crate::optimizer::tuners::{self, TunerParams};
use crate::optimizer::CandidatePlan;
use crate::pool::WorkerPool;
use crate::postprocess::{self, ManualOverrides};
use crate::report::{self, Report};
use crate::resample::{self, Direction, StepDataParams};
use crate::simulator::{self, SimInputs};
use crate::types::{BatteryParams, ChargeWindow, DemandSlot, ExportLimit, ExportWindow, Minute, PvMode};

/// Everything the caller supplies fresh each tick (spec §9 "immutable
/// inputs"). Per-minute series are indexed by minute offset from
/// `minutes_now` and may be shorter or longer than the forecast horizon
/// (component A truncates/zero-pads, spec §4.A Failure semantics).
pub struct PlanInputs {
    pub battery: BatteryParams,
    pub minutes_now: Minute,
    pub load_per_minute: Vec<f64>,
    pub pv_per_minute: Vec<f64>,
    pub pv10_per_minute: Vec<f64>,
    pub import_rate_per_minute: Vec<f64>,
    pub export_rate_per_minute: Vec<f64>,
    pub carbon_per_minute: Vec<f64>,
    pub car_demand: Vec<DemandSlot>,
    pub cloud_factor: f64,
}

/// Carried across ticks: the previously committed window plan and its
/// metric, used by the commit-or-revert decision (spec §4.I step 13).
#[derive(Clone, Debug, Default)]
pub struct PlanState {
    pub charge_windows: Vec<ChargeWindow>,
    pub export_windows: Vec<ExportWindow>,
    pub metric: Option<f64>,
}

/// Minimum metric improvement (in metric units) required for a new plan to
/// replace the previously committed one, per spec §4.I step 13.
const COMMIT_IMPROVEMENT_THRESHOLD: f64 = 0.1;

pub struct Planner {
    config: Config,
    pool: WorkerPool,
    state: PlanState,
}

impl Planner {
    pub fn new(config: Config) -> Self {
        let pool = WorkerPool::build(config.optimizer.threads);
        Planner { config, pool, state: PlanState::default() }
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    /// Runs one full planning tick (spec §4.I steps 1-13) and returns the
    /// resulting report. `overrides` carries any manual window pins from the
    /// caller; pass `ManualOverrides::default()` when there are none.
    pub fn tick(&mut self, inputs: PlanInputs, overrides: &ManualOverrides) -> Result<Report, PlanError> {
        let opt = self.config.optimizer.clone();
        let horizon = opt.forecast_minutes.max(opt.step_minutes);

        // 1. resample every series onto the step grid (component A).
        let load_step = resample::step_data(&resample::align_to_horizon(&inputs.load_per_minute, horizon as usize), StepDataParams { step: opt.step_minutes, ..Default::default() }, None);
        let pv_step = resample::step_data(
            &resample::align_to_horizon(&inputs.pv_per_minute, horizon as usize),
            StepDataParams { step: opt.step_minutes, cloud_factor: inputs.cloud_factor, ..Default::default() },
            None,
        );
        let pv10_step = resample::step_data(
            &resample::align_to_horizon(&inputs.pv10_per_minute, horizon as usize),
            StepDataParams { step: opt.step_minutes, cloud_factor: resample::p10_cloud_factor(inputs.cloud_factor), ..Default::default() },
            None,
        );
        let rate_import_step = resample::step_data(&resample::align_to_horizon(&inputs.import_rate_per_minute, horizon as usize), StepDataParams { step: opt.step_minutes, ..Default::default() }, None);
        let rate_export_step = resample::step_data(&resample::align_to_horizon(&inputs.export_rate_per_minute, horizon as usize), StepDataParams { step: opt.step_minutes, ..Default::default() }, None);
        let carbon_step = resample::step_data(&resample::align_to_horizon(&inputs.carbon_per_minute, horizon as usize), StepDataParams { step: opt.step_minutes, ..Default::default() }, None);

        // 2. carve the horizon into candidate charge/export windows.
        let n_windows = ((horizon / opt.fast_step_minutes.max(1)).max(1) as usize).min(opt.max_charge_windows.max(1));
        let (charge_windows, charge_rates) = if opt.calculate_best_charge {
            build_windows(&rate_import_step, opt.step_minutes, n_windows, horizon)
        } else {
            (Vec::new(), Vec::new())
        };
        let (mut export_windows, export_rates) = if opt.calculate_best_export {
            build_windows(&rate_export_step, opt.step_minutes, n_windows, horizon)
        } else {
            (Vec::new(), Vec::new())
        };

        let sim = SimInputs {
            battery: inputs.battery,
            step_minutes: opt.step_minutes,
            load_step: &load_step,
            load10_step: &load_step,
            pv_step: &pv_step,
            pv10_step: &pv10_step,
            rate_import_step: &rate_import_step,
            rate_export_step: &rate_export_step,
            carbon_step: if opt.carbon_enable { Some(&carbon_step) } else { None },
            car_demand: &inputs.car_demand,
            car_charging_from_battery: true,
            iboost_enable: opt.iboost_enable,
            iboost_max_power: opt.iboost_max_power,
            iboost_from_battery: opt.iboost_from_battery,
            metric_soc_keep_floor: inputs.battery.soc_max * opt.metric_soc_keep_floor_pct / 100.0,
            metric_keep_penalty_rate: opt.metric_keep_penalty_rate,
        };

        let weights = MetricWeights {
            value_scale: opt.metric_value_scale,
            iboost_scale: opt.metric_iboost_scale,
            rate_export_floor: opt.metric_rate_export_floor,
            pv_metric10_weight: opt.pv_metric10_weight,
            carbon_enable: opt.carbon_enable,
            carbon_metric: opt.carbon_metric,
            self_sufficiency_metric: opt.metric_self_sufficiency,
            battery_cycle_metric: opt.metric_battery_cycle,
        };

        let losses = inputs.battery.battery_loss * inputs.battery.inverter_loss;
        let rate_max = rate_import_step.iter().copied().fold(0.0_f64, f64::max);
        let rate_min_fwd = rate_min_forward(&rate_import_step, 0, losses, rate_max, opt.metric_battery_cycle);

        // 3-6. price-threshold scan, then region refinement (components E/F).
        let baseline = CandidatePlan {
            charge_limits: vec![0.0; charge_windows.len()],
            export_limits: vec![ExportLimit::Off; export_windows.len()],
        };
        let mut scored = threshold::evaluate(vec![baseline], &sim, &sim, &charge_windows, &export_windows, &weights, rate_min_fwd, horizon, &self.pool);
        let mut best = scored.pop().expect("baseline candidate always present");

        let threshold_params = ThresholdParams {
            best_soc_min: opt.best_soc_min,
            best_soc_max: opt.best_soc_max,
            best_soc_step: opt.best_soc_step,
            lattice_modulo: opt.lattice_modulo.clone(),
            lattice_divide: opt.lattice_divide.clone(),
            calculate_export_first: opt.calculate_export_first,
            set_charge_freeze: opt.set_charge_freeze,
        };

        if opt.calculate_best_charge || opt.calculate_best_export {
            let candidates = threshold::scan(&charge_windows, &charge_rates, &export_windows, &export_rates, &threshold_params);
            let evaluated = threshold::evaluate(candidates, &sim, &sim, &charge_windows, &export_windows, &weights, rate_min_fwd, horizon, &self.pool);
            if let Some(found) = threshold::best(&evaluated) {
                if found.metric < best.metric {
                    best = found.clone();
                }
            }

            if opt.calculate_regions {
                best = region::refine(
                    best,
                    &charge_windows,
                    &charge_rates,
                    &export_windows,
                    &export_rates,
                    &threshold_params,
                    &sim,
                    &sim,
                    &weights,
                    rate_min_fwd,
                    horizon,
                    &self.pool,
                    horizon,
                );
            }
        }

        // 7. per-window tuning (component G), optionally twice (second pass).
        if opt.calculate_tweak_plan {
            let tuner_params = TunerParams {
                best_soc_min: opt.best_soc_min,
                best_soc_max: opt.best_soc_max,
                best_soc_step: opt.best_soc_step,
                best_soc_margin: opt.best_soc_margin,
                reserve: inputs.battery.reserve,
                metric_min_improvement: opt.metric_min_improvement,
                metric_min_improvement_export: opt.metric_min_improvement_export,
                metric_min_improvement_export_freeze: opt.metric_min_improvement_export_freeze,
                charge_low_power_margin: opt.charge_low_power_margin,
                set_charge_low_power: opt.set_charge_low_power,
                set_export_low_power: opt.set_export_low_power,
                set_export_freeze_only: opt.set_export_freeze_only,
                set_charge_freeze: opt.set_charge_freeze,
                calculate_export_first: opt.calculate_export_first,
            };
            let passes = if opt.calculate_second_pass { 2 } else { 1 };
            for _ in 0..passes {
                best = tuners::tune(best, &charge_windows, &charge_rates, &mut export_windows, &export_rates, &sim, &sim, &weights, rate_min_fwd, horizon, &tuner_params);
            }
        }

        // 8-12. post-process: publish, override, clip, remove overlaps, merge, discard.
        let mut published_charge = charge_windows.clone();
        let mut published_export = export_windows.clone();
        postprocess::publish_targets(&mut published_charge, &best.plan.charge_limits, &mut published_export, &best.plan.export_limits);
        postprocess::apply_manual_overrides(&mut published_charge, &mut published_export, overrides);
        postprocess::clip_to_achieved(&mut published_charge, &mut published_export, &best.mid);

        let mut merged_charge: Vec<ChargeWindow> = Vec::new();
        for w in published_charge.into_iter() {
            if let Some(last) = merged_charge.last_mut() {
                if postprocess::maybe_merge_charge(last, &w, &best.mid) {
                    continue;
                }
            }
            merged_charge.push(w);
        }
        postprocess::remove_overlaps(&mut merged_charge);
        postprocess::remove_overlaps_export(&mut published_export);
        postprocess::remove_cross_kind_overlaps(&mut merged_charge, &mut published_export);
        postprocess::discard_unused(&mut merged_charge, inputs.battery.soc_kwh, &mut published_export);

        // 13. commit-or-revert against the previously committed plan.
        let improved = match self.state.metric {
            Some(prev) => prev - best.metric > COMMIT_IMPROVEMENT_THRESHOLD,
            None => true,
        };
        let (final_charge, final_export) = if improved {
            self.state = PlanState { charge_windows: merged_charge.clone(), export_windows: published_export.clone(), metric: Some(best.metric) };
            (merged_charge, published_export)
        } else {
            (self.state.charge_windows.clone(), self.state.export_windows.clone())
        };

        // Final 4-way simulation for reporting: base (do nothing) vs best, each mid/p10.
        let base_mid = simulator::run(&sim, &[], &[], &[], &[], PvMode::Mid, horizon);
        let base_p10 = simulator::run(&sim, &[], &[], &[], &[], PvMode::P10, horizon);
        let best_mid = best.mid.clone();
        let best_p10 = best.p10.clone();

        Ok(report::build(final_charge, final_export, &base_mid, &base_p10, &best_mid, &best_p10, best.metric))
    }
}

/// Carves `[0, horizon)` into `n_windows` equal slices, each annotated with
/// the mean rate over its span (spec §4.D "windows" input to the sorter).
fn build_windows(rate_step: &[f64], step: Minute, n_windows: usize, horizon: Minute) -> (Vec<ChargeWindow>, Vec<f64>) {
    if n_windows == 0 || rate_step.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let window_len = (horizon / n_windows as i64).max(step);
    let mut windows = Vec::with_capacity(n_windows);
    let mut rates = Vec::with_capacity(n_windows);

    let mut start = 0;
    while start < horizon {
        let end = (start + window_len).min(horizon);
        let lo_step = (start / step) as usize;
        let hi_step = ((end + step - 1) / step) as usize;
        let slice = &rate_step[lo_step.min(rate_step.len())..hi_step.min(rate_step.len())];
        let avg = if slice.is_empty() { 0.0 } else { slice.iter().sum::<f64>() / slice.len() as f64 };
        windows.push(ChargeWindow { start, end, average_rate: avg, target: None, set: None, locked: false });
        rates.push(avg);
        start += window_len;
    }

    (windows, rates)
}
