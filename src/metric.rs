//! Component C: Metric Evaluator (spec §4.C). No direct teacher equivalent
//! (the teacher scores candidates by raw `total_cost` alone); implemented
//! in full from the distilled formula since the engine's entire ranking
//! behavior depends on it.

use crate::types::PredictionResult;

/// Scalar weights feeding `compute_metric`, sourced from `Optimizer` config.
#[derive(Clone, Copy, Debug)]
pub struct MetricWeights {
    pub value_scale: f64,
    pub iboost_scale: f64,
    pub rate_export_floor: f64,
    pub pv_metric10_weight: f64,
    pub carbon_enable: bool,
    pub carbon_metric: f64,
    pub self_sufficiency_metric: f64,
    pub battery_cycle_metric: f64,
}

/// `rate_min_fwd`: minimum forward import rate from `end_record` onward,
/// de-rated by inverter+battery losses, clamped per spec §4.C.
pub fn rate_min_forward(rate_import_step: &[f64], end_record_step: usize, losses: f64, rate_max: f64, cycle_cost: f64) -> f64 {
    let min_rate = rate_import_step[end_record_step.min(rate_import_step.len())..]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let min_rate = if min_rate.is_finite() { min_rate } else { 0.0 };
    (min_rate * losses).clamp(0.0, (rate_max * losses - cycle_cost).max(0.0))
}

/// Combines a `mid` and a `p10` prediction over the same candidate plan into
/// a single scalar per spec §4.C. Lower is better.
pub fn compute_metric(mid: &PredictionResult, p10: &PredictionResult, weights: &MetricWeights, rate_min_fwd: f64) -> f64 {
    let value_multiplier = rate_min_fwd.max(1.0).max(weights.rate_export_floor);

    let battery_value_mid = (mid.final_soc * weights.value_scale + mid.final_iboost * weights.iboost_scale) * value_multiplier;
    let battery_value_p10 = (p10.final_soc * weights.value_scale + p10.final_iboost * weights.iboost_scale) * value_multiplier;

    let metric_mid = mid.cost - battery_value_mid;
    let metric_p10 = p10.cost - battery_value_p10;

    let risk_component = (metric_p10 - metric_mid).max(0.0) * weights.pv_metric10_weight;

    let carbon_component = if weights.carbon_enable {
        (mid.final_carbon_g / 1000.0) * weights.carbon_metric
    } else {
        0.0
    };

    let self_suff = (mid.import_to_house + mid.import_to_battery) * weights.self_sufficiency_metric;
    let cycle_component = mid.battery_cycle * weights.battery_cycle_metric + mid.keep_penalty;

    metric_mid + risk_component + carbon_component + self_suff + cycle_component
}
