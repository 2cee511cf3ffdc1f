//! Component B: Forward Simulator (spec §4.B).
//!
//! A stateless, pure function of its inputs (spec §9 DESIGN NOTES: the
//! teacher's "mutable self carrying every flag/intermediate/output" is split
//! into immutable inputs + a pure `Simulator::run`). Physics are generalized
//! from `scheduler.rs::add_net_prod`/`update_for_pv` (grid/PV/battery energy
//! balance with efficiency factors) from fixed 15-minute blocks to the
//! arbitrary step grid of §4.A.

use crate::types::{BatteryParams, ChargeWindow, DemandSlot, ExportLimit, ExportWindow, Minute, PredictionResult, PvMode};

/// Read-only inputs a single simulation run needs. Cheap to construct per
/// pass (`Clone` only copies a handful of slice references), shared by
/// reference across worker-pool tasks per spec §5 "Parallel safety invariants".
#[derive(Clone, Copy)]
pub struct SimInputs<'a> {
    pub battery: BatteryParams,
    pub step_minutes: i64,
    /// Net house load per step, kWh (already step-summed by component A).
    pub load_step: &'a [f64],
    pub load10_step: &'a [f64],
    /// PV production per step, kWh.
    pub pv_step: &'a [f64],
    pub pv10_step: &'a [f64],
    /// Rates indexed by step offset `k`, matching `load_step`/`pv_step` length.
    pub rate_import_step: &'a [f64],
    pub rate_export_step: &'a [f64],
    pub carbon_step: Option<&'a [f64]>,
    pub car_demand: &'a [DemandSlot],
    pub car_charging_from_battery: bool,
    pub iboost_enable: bool,
    pub iboost_max_power: f64,
    pub iboost_from_battery: bool,
    pub metric_soc_keep_floor: f64,
    pub metric_keep_penalty_rate: f64,
}

impl<'a> SimInputs<'a> {
    fn load_for(&self, mode: PvMode, k: usize) -> f64 {
        match mode {
            PvMode::Mid => *self.load_step.get(k).unwrap_or(&0.0),
            PvMode::P10 => *self.load10_step.get(k).unwrap_or(&0.0),
        }
    }

    fn pv_for(&self, mode: PvMode, k: usize) -> f64 {
        match mode {
            PvMode::Mid => *self.pv_step.get(k).unwrap_or(&0.0),
            PvMode::P10 => *self.pv10_step.get(k).unwrap_or(&0.0),
        }
    }

    /// kWh of car demand landing in step `k` (minute range `[m, m+step)`).
    fn car_kwh_in_step(&self, m: Minute, step: i64) -> f64 {
        let mut total = 0.0;
        for slot in self.car_demand {
            let lo = slot.start.max(m);
            let hi = slot.end.min(m + step);
            if hi > lo {
                let slot_minutes = (slot.end - slot.start).max(1) as f64;
                total += slot.kwh * (hi - lo) as f64 / slot_minutes;
            }
        }
        total
    }
}

enum Mode {
    Charge { limit: f64, freeze: bool },
    Export { target_soc: f64, power_scale: f64 },
    SelfConsume,
}

fn mode_for_minute(
    m: Minute,
    charge_windows: &[ChargeWindow],
    charge_limits: &[f64],
    export_windows: &[ExportWindow],
    export_limits: &[ExportLimit],
    soc_max: f64,
    reserve: f64,
) -> Mode {
    for (i, w) in charge_windows.iter().enumerate() {
        if m >= w.start && m < w.end {
            let limit = *charge_limits.get(i).unwrap_or(&0.0);
            if limit > 0.0 {
                return Mode::Charge { limit, freeze: limit <= reserve };
            }
        }
    }
    for (j, w) in export_windows.iter().enumerate() {
        if m >= w.start && m < w.end {
            if let ExportLimit::Export { target_pct, power_scale } = export_limits.get(j).copied().unwrap_or(ExportLimit::Off) {
                let target_soc = soc_max * target_pct as f64 / 100.0;
                return Mode::Export { target_soc, power_scale };
            }
        }
    }
    Mode::SelfConsume
}

/// Runs the forward simulation described in spec §4.B over `[0, end_record)`
/// using the given candidate plan, returning scalar results and a SoC trace.
pub fn run(
    inputs: &SimInputs,
    charge_windows: &[ChargeWindow],
    charge_limits: &[f64],
    export_windows: &[ExportWindow],
    export_limits: &[ExportLimit],
    pv_mode: PvMode,
    end_record: Minute,
) -> PredictionResult {
    let step = inputs.step_minutes.max(1);
    let step_hours = step as f64 / 60.0;
    let bat = inputs.battery;
    let rate_c = bat.charge_rate_max * step_hours;
    let rate_d = bat.discharge_rate_max * step_hours;

    let mut soc = bat.soc_kwh;
    let mut result = PredictionResult::default();
    result.soc_min = soc;
    result.final_soc = soc;

    let n_steps = inputs.load_step.len().max(inputs.pv_step.len());

    for k in 0..n_steps {
        let m = (k as i64) * step;
        let car_in_step = inputs.car_kwh_in_step(m, step);
        // spec §4.B edge case: car load only participates in the battery balance
        // when `car_charging_from_battery`; otherwise it is pure grid import,
        // tracked separately and added to `import_house` in every branch below.
        let (load, car_grid_only) = if inputs.car_charging_from_battery {
            (inputs.load_for(pv_mode, k) + car_in_step, 0.0)
        } else {
            (inputs.load_for(pv_mode, k), car_in_step)
        };
        let pv = inputs.pv_for(pv_mode, k);

        let mode = mode_for_minute(m, charge_windows, charge_limits, export_windows, export_limits, bat.soc_max, bat.reserve);

        let mut import_house = 0.0;
        let mut import_battery = 0.0;
        let mut export_energy = 0.0;

        match mode {
            Mode::Charge { limit, freeze } => {
                if freeze {
                    // freeze-charge: no grid/battery flow, house served from PV then grid.
                    let to_house = pv.min(load);
                    import_house += (load - to_house).max(0.0);
                    export_energy += (pv - to_house).max(0.0) * bat.inverter_loss;
                } else {
                    // Actively charging: house demand met from grid, PV surplus exports.
                    import_house += load;
                    let headroom = (limit - soc).max(0.0);
                    let charge_kwh = rate_c.min(headroom);
                    if charge_kwh > 0.0 {
                        soc += charge_kwh;
                        let grid_needed = charge_kwh / (bat.battery_loss * bat.inverter_loss).max(1e-9);
                        import_battery += grid_needed;
                        result.battery_cycle += charge_kwh;
                    }
                    export_energy += pv * bat.inverter_loss;
                }
                import_house += car_grid_only;
            }
            Mode::Export { target_soc, power_scale } => {
                let to_house = pv.min(load);
                let deficit = (load - to_house).max(0.0);
                let avail = (soc - target_soc).max(0.0).min(rate_d * power_scale.max(0.01));
                let discharge_to_house = avail.min(deficit / bat.battery_loss_discharge.max(1e-9));
                let discharge_export = (avail - discharge_to_house).max(0.0);

                soc -= discharge_to_house + discharge_export;
                result.battery_cycle += discharge_to_house + discharge_export;

                import_house += (deficit - discharge_to_house * bat.battery_loss_discharge).max(0.0);
                export_energy += (pv - to_house).max(0.0) * bat.inverter_loss;
                export_energy += discharge_export * bat.battery_loss_discharge * bat.inverter_loss;
                import_house += car_grid_only;
            }
            Mode::SelfConsume => {
                let to_house = pv.min(load);
                let mut remaining_pv = (pv - to_house).max(0.0);
                let mut deficit = (load - to_house).max(0.0);

                if remaining_pv > 0.0 {
                    let headroom = (bat.soc_max - soc).max(0.0);
                    let charge_kwh = remaining_pv.min(rate_c).min(headroom / bat.battery_loss.max(1e-9));
                    if charge_kwh > 0.0 {
                        soc += charge_kwh * bat.battery_loss;
                        result.battery_cycle += charge_kwh * bat.battery_loss;
                        remaining_pv -= charge_kwh;
                    }
                    export_energy += remaining_pv * bat.inverter_loss;
                }

                if deficit > 0.0 {
                    let avail = (soc - bat.reserve).max(0.0).min(rate_d);
                    let discharge_kwh = avail.min(deficit / bat.battery_loss_discharge.max(1e-9));
                    if discharge_kwh > 0.0 {
                        soc -= discharge_kwh;
                        result.battery_cycle += discharge_kwh;
                        deficit -= discharge_kwh * bat.battery_loss_discharge;
                    }
                }
                import_house += deficit.max(0.0) + car_grid_only;
            }
        }

        soc = soc.clamp(bat.reserve.min(soc), bat.soc_max);

        if inputs.iboost_enable {
            let spare = export_energy / bat.inverter_loss.max(1e-9);
            let iboost_cap = inputs.iboost_max_power * step_hours;
            let diverted = spare.min(iboost_cap);
            result.final_iboost += diverted;
            export_energy -= diverted * bat.inverter_loss;
        }

        if m < end_record {
            let rate_import = inputs.rate_import_step.get(k).copied().unwrap_or(0.0);
            let rate_export = inputs.rate_export_step.get(k).copied().unwrap_or(0.0);
            result.cost += (import_house + import_battery) * rate_import - export_energy * rate_export;
            if let Some(carbon) = inputs.carbon_step {
                result.final_carbon_g += (import_house + import_battery) * carbon.get(k).copied().unwrap_or(0.0);
            }
            let below_floor = (inputs.metric_soc_keep_floor - soc).max(0.0);
            result.keep_penalty += below_floor * inputs.metric_keep_penalty_rate * step_hours;
        }

        result.import_to_house += import_house;
        result.import_to_battery += import_battery;
        result.export += export_energy;
        result.soc_trace.push((m, soc));
        if soc < result.soc_min {
            result.soc_min = soc;
            result.soc_min_minute = m;
        }
    }

    result.final_soc = soc;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExportLimit;

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

    #[test]
    fn charging_window_fills_battery_to_limit() {
        let load = vec![0.0; 12];
        let pv = vec![0.0; 12];
        let rate_import = vec![0.05; 12];
        let rate_export = vec![0.0; 12];
        let inputs = SimInputs {
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
        let charge_windows = vec![ChargeWindow { start: 0, end: 180, average_rate: 5.0, target: None, set: None, locked: false }];
        let charge_limits = vec![10.0];
        let result = run(&inputs, &charge_windows, &charge_limits, &[], &[], PvMode::Mid, 360);
        assert!((result.final_soc - 10.0).abs() < 1e-6);
        assert!(result.import_to_battery > 0.0);
    }

    #[test]
    fn self_consume_uses_pv_before_grid() {
        let load = vec![1.0; 4];
        let pv = vec![1.0; 4];
        let rate_import = vec![0.3; 4];
        let rate_export = vec![0.05; 4];
        let inputs = SimInputs {
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
        let result = run(&inputs, &[], &[], &[], &[], PvMode::Mid, 120);
        assert_eq!(result.import_to_house, 0.0);
        assert_eq!(result.export, 0.0);
    }

    #[test]
    fn export_window_discharges_toward_target() {
        let mut battery = battery();
        battery.soc_kwh = 10.0;
        let load = vec![0.0; 4];
        let pv = vec![0.0; 4];
        let rate_import = vec![0.25; 4];
        let rate_export = vec![0.15; 4];
        let inputs = SimInputs {
            battery,
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
        let export_windows = vec![ExportWindow { start: 0, end: 120, average_rate: 15.0, target: None, set: None, locked: false }];
        let export_limits = vec![ExportLimit::Export { target_pct: 20, power_scale: 1.0 }];
        let result = run(&inputs, &[], &[], &export_windows, &export_limits, PvMode::Mid, 120);
        assert!(result.export > 0.0);
        assert!(result.final_soc <= 2.0 + 1e-6);
    }
}
