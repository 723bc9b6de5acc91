//! ALU testbench CLI.
//!
//! Runs the built-in tests against the behavioral ALU and writes the reports.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use alutb::config::TbConfig;
use alutb::runner::Runner;
use alutb::scenarios;
use alutb::transaction::AluOp;

#[derive(Parser, Debug)]
#[command(name = "alutb")]
#[command(about = "Seeded, self-checking ready/valid testbench for an ALU")]
#[command(version)]
struct Cli {
    /// Top-level random seed (random if not given)
    #[arg(long, env = "RANDOM_SEED")]
    seed: Option<u64>,

    /// Collect functional coverage
    #[arg(long, env = "COVERAGE_EN", value_parser = clap::builder::BoolishValueParser::new())]
    coverage: bool,

    /// Directory for result and coverage files
    #[arg(long, env = "SIM_DIR", default_value = "sim")]
    sim_dir: PathBuf,

    /// Prefix of the result and coverage file names
    #[arg(long, env = "OUT_NAME_PREFIX", default_value = "alu")]
    out_prefix: String,

    /// Run only the named test (repeatable)
    #[arg(long = "test", short = 't')]
    tests: Vec<String>,

    /// List the available tests and exit
    #[arg(long)]
    list: bool,

    /// Operand bus width in bits
    #[arg(long, default_value_t = 8)]
    operand_width: u32,

    /// Result bus width in bits
    #[arg(long, default_value_t = 32)]
    result_width: u32,

    /// Per-test watchdog in simulated ns
    #[arg(long, default_value_t = 1_000_000)]
    timeout_ns: u64,

    /// Make the ALU model miscompute one opcode (e.g. XOR)
    #[arg(long)]
    inject_fault: Option<AluOp>,

    /// Do not write result or coverage files
    #[arg(long)]
    no_reports: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let tests = scenarios::all_tests();
    if cli.list {
        for name in tests.names() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }
    let tests = tests.filter(&cli.tests);
    if tests.is_empty() {
        error!("No test matches {:?}", cli.tests);
        return ExitCode::FAILURE;
    }

    let mut config = TbConfig::default()
        .coverage(cli.coverage)
        .out_dir(cli.sim_dir)
        .out_prefix(&cli.out_prefix)
        .operand_width(cli.operand_width)
        .result_width(cli.result_width)
        .timeout_ns(cli.timeout_ns)
        .inject_fault(cli.inject_fault)
        .write_reports(!cli.no_reports);
    config.seed = cli.seed;

    let runner = match Runner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    match runner.run(&tests) {
        Ok(report) if report.passed() => {
            info!("All {} tests passed (seed {})", report.outcomes.len(), report.seed);
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                "Failing tests: {} (rerun with --seed {})",
                report.failed_tests().join(", "),
                report.seed
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_switch_accepts_numeric_env_values() {
        std::env::set_var("COVERAGE_EN", "1");
        assert!(Cli::try_parse_from(["alutb"]).unwrap().coverage);
        std::env::set_var("COVERAGE_EN", "0");
        assert!(!Cli::try_parse_from(["alutb"]).unwrap().coverage);
        std::env::set_var("COVERAGE_EN", "true");
        assert!(Cli::try_parse_from(["alutb"]).unwrap().coverage);
        std::env::remove_var("COVERAGE_EN");
        assert!(!Cli::try_parse_from(["alutb"]).unwrap().coverage);
        assert!(Cli::try_parse_from(["alutb", "--coverage"]).unwrap().coverage);
    }
}
