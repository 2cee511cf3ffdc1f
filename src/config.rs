use std::fs;

use log::LevelFilter;
use serde::Deserialize;

use crate::errors::ConfigError;

#[derive(Deserialize, Clone, Debug)]
pub struct Geo {
    pub lat: f64,
    pub long: f64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Battery {
    pub soc_max: f64,
    pub reserve: f64,
    pub charge_rate_max: f64,
    pub discharge_rate_max: f64,
    pub battery_loss: f64,
    pub battery_loss_discharge: f64,
    pub inverter_loss: f64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ForecastSource {
    pub host: String,
    pub port: u16,
}

/// The §6 configuration surface: every option named in SPEC_FULL.md's
/// "Configuration surface (enumerated effects)" table.
#[derive(Deserialize, Clone, Debug)]
pub struct Optimizer {
    pub calculate_best_charge: bool,
    pub calculate_best_export: bool,
    pub calculate_export_first: bool,
    pub calculate_export_oncharge: bool,
    pub calculate_regions: bool,
    pub calculate_tweak_plan: bool,
    pub calculate_second_pass: bool,

    pub set_charge_freeze: bool,
    pub set_export_freeze: bool,
    pub set_export_freeze_only: bool,
    pub set_export_low_power: bool,
    pub set_charge_low_power: bool,
    pub charge_low_power_margin: i64,

    pub iboost_enable: bool,
    pub iboost_max_power: f64,
    pub iboost_from_battery: bool,

    pub carbon_enable: bool,
    pub carbon_metric: f64,

    pub metric_battery_value_scaling: f64,
    pub metric_battery_cycle: f64,
    pub metric_self_sufficiency: f64,
    pub metric_min_improvement: f64,
    pub metric_min_improvement_export: f64,
    pub metric_min_improvement_export_freeze: f64,
    pub pv_metric10_weight: f64,
    pub metric_keep_penalty_rate: f64,
    pub metric_soc_keep_floor_pct: f64,
    pub metric_iboost_scale: f64,
    pub metric_value_scale: f64,
    pub metric_rate_export_floor: f64,

    pub best_soc_step: f64,
    pub best_soc_min: f64,
    pub best_soc_max: f64,
    pub best_soc_margin: f64,
    pub best_soc_keep: f64,

    pub forecast_plan_hours: i64,
    pub forecast_minutes: i64,
    pub max_charge_windows: usize,

    pub step_minutes: i64,
    pub fast_step_minutes: i64,

    pub threads: Threads,

    pub lattice_modulo: Vec<u32>,
    pub lattice_divide: Vec<u32>,
}

/// `threads = "auto"`, an integer, or `0` for synchronous execution (§5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threads {
    Auto,
    Fixed(usize),
}

impl<'de> Deserialize<'de> for Threads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) if n <= 0 => Ok(Threads::Fixed(0)),
            Raw::Int(n) => Ok(Threads::Fixed(n as usize)),
            Raw::Str(s) if s == "auto" => Ok(Threads::Auto),
            Raw::Str(s) => Err(serde::de::Error::custom(format!(
                "invalid threads value: {s}"
            ))),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct General {
    pub log_path: String,
    pub log_level: LevelFilter,
    pub log_to_stdout: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub geo: Geo,
    pub battery: Battery,
    pub forecast_source: ForecastSource,
    pub optimizer: Optimizer,
    pub general: General,
}

/// Loads the configuration file and returns a fully populated `Config`.
///
/// # Arguments
///
/// * `config_path` - path to the TOML configuration file
pub fn load_config(config_path: &str) -> Result<Config, ConfigError> {
    let toml = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&toml)?;
    Ok(config)
}
