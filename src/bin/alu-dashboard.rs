//! Prints the verification dashboard for a simulation output directory.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use alutb::dashboard::Dashboard;

#[derive(Parser, Debug)]
#[command(name = "alu-dashboard")]
#[command(about = "Generate Verification Dashboard")]
struct Cli {
    /// Directory containing simulation results
    #[arg(long, env = "SIM_DIR", default_value = "sim")]
    sim_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_target(false)
        .init();

    match Dashboard::generate(&cli.sim_dir) {
        Ok(dashboard) => {
            println!("{}", dashboard);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
