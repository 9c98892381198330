//! CodeGauge server executable.
//!
//! Loads settings from `CODEGAUGE_CONFIG` (falling back to defaults plus
//! the environment) and runs the HTTP service with the daily scheduler.

use std::path::PathBuf;

use dotenvy::dotenv;

fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var("CODEGAUGE_CONFIG").ok().map(PathBuf::from);
    let settings = match codegauge_core::Settings::load(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };

    codegauge_server::run(settings)
}
