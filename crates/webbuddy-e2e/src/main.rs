//! Web Buddy E2E harness entry point.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use webbuddy_e2e::{
    ConfigOverrides, EnvSignals, ExitStatus, HarnessConfig, logger, report, run,
};

/// Load the unpacked extension in Chromium and verify it end to end.
#[derive(Debug, Parser)]
#[command(name = "webbuddy-e2e", version)]
struct Cli {
    /// Extension root containing manifest.json (default: current directory)
    extension_dir: Option<PathBuf>,

    /// Config file (default: ./e2e.config.json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chromium executable
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let signals = EnvSignals::from_env();

    logger::init_logger(cli.verbose || signals.debug);

    let overrides = ConfigOverrides {
        config_file: cli.config,
        extension_dir: cli.extension_dir,
        chrome_path: cli.chrome,
    };

    let status = match HarnessConfig::load(&overrides, signals) {
        Ok(config) => {
            let result = run::run(config).await;
            report::print_report(&result);
            result.status
        }
        Err(e) => {
            error!("{e}");
            ExitStatus::HarnessCrash
        }
    };

    if signals.debug {
        run::arm_exit_valve(status, run::EXIT_VALVE_DELAY);
    }

    status.into()
}
