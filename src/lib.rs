pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod roast;
mod utils;

use std::path::PathBuf;

pub use config::PipelineConfig;
pub use error::{Result, RoastError};
pub use pipeline::{run_pipeline, PipelineReport, UserRoast};
pub use utils::init_logging;

/// Binary entry point: logging, config from `ROAST_CONFIG`, one pipeline run.
pub fn run() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to info
    init_logging();

    log::info!("screen-roast starting up...");

    let config_path = std::env::var_os(config::ENV_CONFIG_PATH).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref())?;

    let report = run_pipeline(&config)?;
    pipeline::print_report(&report);
    Ok(())
}
