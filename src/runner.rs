//! Runs tests one after another, each in a fresh simulation, and reports the results.

use num_format::{Locale, ToFormattedString};
use prettytable::{format, row, Table};
use std::time;
use tracing::{error, info};

use crate::config::TbConfig;
use crate::coverage::AluCoverage;
use crate::error::{TbError, TbResult};
use crate::executor::Task;
use crate::interface::AluIf;
use crate::junit;
use crate::kernel::{RunEnd, Simulation};
use crate::rng::RngNode;
use crate::scoreboard::CheckLog;
use crate::sim_if::now_ns;
use crate::tb_obj::TbObj;
use crate::test::{Test, TestContext, TestOutcome, TestSet, Verdict};
use crate::transaction::AluOp;
use crate::uut::AluModel;

pub const SUITE_NAME: &str = "alutb";

/// Everything collected during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub seed: u64,
    pub outcomes: Vec<TestOutcome>,
    pub checks: CheckLog,
    pub coverage: Option<AluCoverage>,
    pub wall_secs: f64,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(TestOutcome::passed)
    }

    pub fn failed_tests(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|t| !t.passed())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn sim_time_ns(&self) -> f64 {
        self.outcomes.iter().map(|t| t.sim_time_ns).sum()
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row!["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "RATIO (ns/s)"]);
        for t in &self.outcomes {
            let result = if t.passed() { "PASS" } else { "FAIL" };
            table.add_row(row![
                t.name,
                result,
                r->(t.sim_time_ns.round() as u64).to_formatted_string(&Locale::en),
                r->format!("{:.3}", t.time_secs),
                r->format!("{:.1}", t.sim_speed())
            ]);
        }
        let total = self.sim_time_ns();
        let speed = if self.wall_secs > 0.0 { total / self.wall_secs } else { 0.0 };
        table.add_row(row![
            b->"TOTAL",
            if self.passed() { "PASS" } else { "FAIL" },
            r->(total.round() as u64).to_formatted_string(&Locale::en),
            r->format!("{:.3}", self.wall_secs),
            r->format!("{:.1}", speed)
        ]);
        table
    }

    pub fn checks_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["OPCODE", "PASSED", "FAILED"]);
        for op in AluOp::ALL {
            let tally = self.checks.by_opcode.get(&op).cloned().unwrap_or_default();
            table.add_row(row![op, r->tally.passed, r->tally.failed]);
        }
        table
    }

    pub fn log_summary(&self) {
        for t in &self.outcomes {
            info!(
                "TEST {}: Result={}, Time={:.3}, SimTime={}ns, SimSpeed={:.3}ns/s",
                t.name,
                if t.passed() { "passed" } else { "failed" },
                t.time_secs,
                t.sim_time_ns,
                t.sim_speed()
            );
            if let Err(msg) = &t.verdict {
                error!("TEST {} failed: {}", t.name, msg);
            }
        }
        info!("Random seed: {}", self.seed);
        info!("\n{}", self.summary_table());
        info!("Checks by opcode\n{}", self.checks_table());
        if let Some(cov) = &self.coverage {
            info!("Functional coverage: {:.2}%", cov.percent());
        }
    }

    /// JUnit XML and, when collected, the coverage files.
    pub fn write_reports(&self, cfg: &TbConfig) -> TbResult {
        std::fs::create_dir_all(&cfg.out_dir)?;
        let path = cfg.results_path();
        junit::write_junit_xml(SUITE_NAME, &self.outcomes, &path)?;
        info!("Test results written to {}", path.display());
        if let Some(cov) = &self.coverage {
            cov.write_reports(&cfg.out_dir, &cfg.out_prefix)?;
        }
        Ok(())
    }
}

pub struct Runner {
    config: TbConfig,
    seed: u64,
    coverage: Option<TbObj<AluCoverage>>,
}

impl Runner {
    pub fn new(config: TbConfig) -> TbResult<Self> {
        config.validate()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random();
                info!("No seed given, using random seed {}", seed);
                seed
            }
        };
        let coverage = config
            .coverage
            .then(|| TbObj::new(AluCoverage::new(config.operand_width)));
        Ok(Self {
            config,
            seed,
            coverage,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &TbConfig {
        &self.config
    }

    /// Run every test in order, then write the reports if configured.
    pub fn run(&self, tests: &TestSet) -> TbResult<RunReport> {
        let start = time::Instant::now();
        info!(seed = self.seed, tests = tests.len(), "starting run");
        let mut outcomes = Vec::new();
        let mut checks = CheckLog::default();
        for test in tests.iter() {
            let outcome = self.run_test(test)?;
            checks.merge(&outcome.checks);
            outcomes.push(outcome);
        }
        let report = RunReport {
            seed: self.seed,
            outcomes,
            checks,
            coverage: self.coverage.as_ref().map(TbObj::snapshot),
            wall_secs: start.elapsed().as_secs_f64(),
        };
        report.log_summary();
        if self.config.write_reports {
            report.write_reports(&self.config)?;
        }
        Ok(report)
    }

    /// One test in its own simulation with a freshly reset ALU model.
    pub fn run_test(&self, test: &Test) -> TbResult<TestOutcome> {
        let cfg = &self.config;
        info!(test = %test.name, "starting test");
        let sim = Simulation::new("alu");
        let dut = AluIf::declare(&sim, cfg.operand_width, cfg.result_width)?;
        Task::spawn_from_future(
            AluModel::new(dut).with_fault(cfg.inject_fault).run(),
            "alu_model",
        );

        let checks = TbObj::new(CheckLog::default());
        let ctx = TestContext {
            dut,
            config: cfg.clone(),
            rng: RngNode::for_test(&test.name, self.seed),
            checks: checks.clone(),
            coverage: self.coverage.clone(),
        };
        let verdict: TbObj<Option<Verdict>> = TbObj::new(None);

        // The body runs as its own task so pass_test/fail_test can cancel it from anywhere.
        let body = Task::spawn_from_future((test.generator)(ctx), &test.name);
        let body_task = body
            .get_task()
            .cloned()
            .ok_or_else(|| TbError::Failed("test task vanished".to_string()))?;
        crate::set_current_test(body_task, verdict.clone());
        Task::spawn_from_future(
            async move {
                match body.await {
                    Ok(()) => crate::pass_test("passed"),
                    Err(e) => crate::fail_test(&e.to_string()),
                }
                Ok(())
            },
            "test_wrapper",
        );

        let time_start = time::Instant::now();
        let limit = cfg.timeout_ns.saturating_mul(1000);
        match sim.run(Some(limit)) {
            Ok(RunEnd::Finished) => {}
            Ok(RunEnd::Limit(_)) => crate::fail_test(&TbError::Timeout(cfg.timeout_ns).to_string()),
            Ok(RunEnd::Idle) => crate::fail_test(&TbError::Stalled.to_string()),
            Err(e) => crate::fail_test(&e.to_string()),
        }

        let verdict = verdict
            .snapshot()
            .unwrap_or_else(|| Err("test never settled".to_string()));
        let outcome = TestOutcome {
            name: test.name.clone(),
            verdict,
            time_secs: time_start.elapsed().as_secs_f64(),
            sim_time_ns: now_ns(),
            checks: checks.snapshot(),
        };
        match &outcome.verdict {
            Ok(_) => info!(t = outcome.sim_time_ns, test = %test.name, "test passed"),
            Err(msg) => error!(t = outcome.sim_time_ns, test = %test.name, "test failed: {}", msg),
        }
        Ok(outcome)
    }
}
