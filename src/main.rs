use anyhow::{Context, Result};
use log::{error, info};

use gridplan::config::load_config;
use gridplan::logging::setup_logger;
use gridplan::ports::{DataProvider, InMemoryDataProvider};
use gridplan::{ManualOverrides, PlanInputs, Planner};

fn parse_config_path() -> String {
    std::env::args()
        .find_map(|arg| arg.strip_prefix("--config=").map(str::to_owned))
        .unwrap_or_else(|| "gridplan.toml".to_string())
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = load_config(&config_path).with_context(|| format!("loading config from {config_path}"))?;
    setup_logger(&config.general.log_path, config.general.log_level, config.general.log_to_stdout).context("setting up logging")?;

    // Real deployments wire a `DataProvider` backed by an inverter cloud API
    // and a weather/tariff forecast service; this binary only demonstrates
    // the planning engine against whatever an `InMemoryDataProvider` holds.
    let provider = InMemoryDataProvider::default();
    let inputs = PlanInputs {
        battery: gridplan::types::BatteryParams {
            soc_kwh: config.battery.soc_max * 0.5,
            soc_max: config.battery.soc_max,
            reserve: config.battery.reserve,
            charge_rate_max: config.battery.charge_rate_max,
            discharge_rate_max: config.battery.discharge_rate_max,
            battery_loss: config.battery.battery_loss,
            battery_loss_discharge: config.battery.battery_loss_discharge,
            inverter_loss: config.battery.inverter_loss,
        },
        minutes_now: 0,
        load_per_minute: provider.load_history_per_minute()?,
        pv_per_minute: provider.pv_forecast_per_minute()?,
        pv10_per_minute: provider.pv10_forecast_per_minute()?,
        import_rate_per_minute: provider.import_rate_per_minute()?,
        export_rate_per_minute: provider.export_rate_per_minute()?,
        carbon_per_minute: provider.carbon_intensity_per_minute()?,
        car_demand: provider.car_demand()?,
        cloud_factor: provider.cloud_factor()?,
    };

    let mut planner = Planner::new(config);
    match planner.tick(inputs, &ManualOverrides::default()) {
        Ok(report) => {
            info!("plan committed, metric={:.3}", report.metric);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!("planning tick failed: {e}");
            Err(e.into())
        }
    }
}
