use anyhow::{Context, Result};
use detect::{config::Config, Outcome};
use std::{env, path::PathBuf};
use structopt::StructOpt;
use tracing::error;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, StructOpt)]
/// Detect asteroids on a live camera feed
struct Args {
    #[structopt(long, default_value = "detect.json5")]
    /// configuration file
    pub config_file: PathBuf,
}

pub fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        let filter = if let Err(_) = env::var("RUST_LOG") {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        };
        filter
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Args { config_file } = Args::from_args();
    let config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;

    // a missing camera is not a failure of the program
    if let Outcome::DeviceUnavailable { index } = detect::start(&config)? {
        error!("could not open video stream on camera {}", index);
    }

    Ok(())
}
