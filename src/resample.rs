//! Component A: Time Grid & Step Resampler (spec §4.A).
//!
//! Converts a dense per-minute series into the planner's internal step grid,
//! applying cloud/divergence scaling. Grounded in `common/models.rs`'s
//! `PowerValues::minute_values`/`group_on_time` (minute interpolation, then
//! average-per-group bucketing) and `manager_production::group_on_time`'s
//! identical bucket-then-average shape, generalized from fixed-size daily
//! arrays to an arbitrary horizon.

use crate::types::Minute;

/// Direction a per-minute series runs in relative to `minutes_now`: load
/// history looks backward, forecasts look forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Historical,
}

/// Parameters controlling `step_data` (spec §4.A).
#[derive(Clone, Copy, Debug)]
pub struct StepDataParams {
    pub step: i64,
    pub direction: Direction,
    /// Multiplier applied only to minutes within the current day (divergence
    /// correction against a fresh same-day reading).
    pub scale_today: f64,
    /// Flat multiplier applied to every minute, regardless of day.
    pub scale_fixed: f64,
    /// Cloud/load divergence de-rating in `[0, 1]`.
    pub cloud_factor: f64,
    /// When true, `scale_today` only applies to minutes already elapsed
    /// today; future minutes use `scale_fixed` alone.
    pub dynamic_scaling: bool,
}

impl Default for StepDataParams {
    fn default() -> Self {
        StepDataParams {
            step: 5,
            direction: Direction::Forward,
            scale_today: 1.0,
            scale_fixed: 1.0,
            cloud_factor: 1.0,
            dynamic_scaling: false,
        }
    }
}

/// Resamples `per_minute[0..]` (indexed by minute offset from `minutes_now`,
/// missing entries already zero-filled by the caller per spec §4.A Failure
/// semantics) into step-aligned sums, scaled.
///
/// `today_cutoff` marks the minute offset of local midnight boundary used by
/// `dynamic_scaling`; pass `None` to disable the day split.
pub fn step_data(per_minute: &[f64], params: StepDataParams, today_cutoff: Option<Minute>) -> Vec<f64> {
    if params.step <= 0 || per_minute.is_empty() {
        return Vec::new();
    }
    let step = params.step as usize;
    let n_steps = per_minute.len().div_ceil(step);
    let mut out = Vec::with_capacity(n_steps);

    for k in 0..n_steps {
        let lo = k * step;
        let hi = (lo + step).min(per_minute.len());
        let mut sum = 0.0;
        for (i, v) in per_minute[lo..hi].iter().enumerate() {
            let minute = (lo + i) as Minute;
            let scale = if params.dynamic_scaling {
                match today_cutoff {
                    Some(cutoff) if minute < cutoff => params.scale_today,
                    _ => params.scale_fixed,
                }
            } else {
                params.scale_today * params.scale_fixed
            };
            sum += v * scale;
        }
        out.push(sum * params.cloud_factor);
    }

    out
}

/// Truncates (or zero-pads) `per_minute` to exactly `horizon_minutes` long,
/// per spec §4.A Failure: "series longer than the horizon are truncated"
/// (missing samples treated as zero).
pub fn align_to_horizon(per_minute: &[f64], horizon_minutes: usize) -> Vec<f64> {
    let mut out = vec![0.0; horizon_minutes];
    let n = per_minute.len().min(horizon_minutes);
    out[..n].copy_from_slice(&per_minute[..n]);
    out
}

/// Mid PV uses `metric_factor` directly; the pessimistic (p10) series uses
/// `min(metric_factor + 0.2, 1.0)`, per spec §4.A.
pub fn p10_cloud_factor(metric_factor: f64) -> f64 {
    (metric_factor + 0.2).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_and_scales_per_step() {
        let per_minute = vec![1.0; 10];
        let params = StepDataParams {
            step: 5,
            cloud_factor: 0.5,
            ..Default::default()
        };
        let steps = step_data(&per_minute, params, None);
        assert_eq!(steps, vec![2.5, 2.5]);
    }

    #[test]
    fn truncates_longer_series() {
        let per_minute = vec![1.0; 20];
        assert_eq!(align_to_horizon(&per_minute, 10).len(), 10);
    }

    #[test]
    fn zero_pads_shorter_series() {
        let per_minute = vec![1.0; 5];
        let out = align_to_horizon(&per_minute, 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[9], 0.0);
    }

    #[test]
    fn p10_adds_margin_and_clamps() {
        assert!((p10_cloud_factor(0.5) - 0.7).abs() < 1e-9);
        assert_eq!(p10_cloud_factor(0.9), 1.0);
    }
}
