use std::path::PathBuf;

use crate::error::{TbError, TbResult};
use crate::transaction::AluOp;

/// Run-wide testbench settings. Tests read them through their `TestContext`.
#[derive(Debug, Clone, PartialEq)]
pub struct TbConfig {
    /// Top-level seed; drawn from entropy (and logged) when absent.
    pub seed: Option<u64>,
    pub coverage: bool,
    pub out_dir: PathBuf,
    pub out_prefix: String,
    pub operand_width: u32,
    pub result_width: u32,
    pub clock_period_ps: u64,
    pub reset_cycles: u32,
    pub drain_cycles: u32,
    /// Per-test watchdog in simulated ns.
    pub timeout_ns: u64,
    /// Make the behavioral ALU miscompute this opcode.
    pub inject_fault: Option<AluOp>,
    pub write_reports: bool,
}

impl Default for TbConfig {
    fn default() -> Self {
        Self {
            seed: None,
            coverage: false,
            out_dir: PathBuf::from("sim"),
            out_prefix: "alu".to_string(),
            operand_width: 8,
            result_width: 32,
            clock_period_ps: 1000,
            reset_cycles: 2,
            drain_cycles: 2,
            timeout_ns: 1_000_000,
            inject_fault: None,
            write_reports: true,
        }
    }
}

impl TbConfig {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn coverage(mut self, enable: bool) -> Self {
        self.coverage = enable;
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn out_prefix(mut self, prefix: &str) -> Self {
        self.out_prefix = prefix.to_string();
        self
    }

    pub fn operand_width(mut self, width: u32) -> Self {
        self.operand_width = width;
        self
    }

    pub fn result_width(mut self, width: u32) -> Self {
        self.result_width = width;
        self
    }

    pub fn clock_period_ps(mut self, period: u64) -> Self {
        self.clock_period_ps = period;
        self
    }

    pub fn timeout_ns(mut self, timeout: u64) -> Self {
        self.timeout_ns = timeout;
        self
    }

    pub fn inject_fault(mut self, op: Option<AluOp>) -> Self {
        self.inject_fault = op;
        self
    }

    pub fn write_reports(mut self, enable: bool) -> Self {
        self.write_reports = enable;
        self
    }

    pub fn validate(&self) -> TbResult {
        if !(1..=32).contains(&self.operand_width) {
            return Err(TbError::Config(format!(
                "operand width {} not in 1..=32",
                self.operand_width
            )));
        }
        if !(1..=64).contains(&self.result_width) {
            return Err(TbError::Config(format!(
                "result width {} not in 1..=64",
                self.result_width
            )));
        }
        if self.clock_period_ps == 0 || self.clock_period_ps % 2 != 0 {
            return Err(TbError::Config(format!(
                "clock period {}ps must be even and non-zero",
                self.clock_period_ps
            )));
        }
        if self.out_prefix.is_empty() {
            return Err(TbError::Config("empty output prefix".to_string()));
        }
        Ok(())
    }

    pub fn results_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_results.xml", self.out_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = TbConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.results_path(), PathBuf::from("sim/alu_results.xml"));
    }

    #[test]
    fn rejects_bad_widths_and_periods() {
        for cfg in [
            TbConfig::default().operand_width(0),
            TbConfig::default().operand_width(33),
            TbConfig::default().result_width(65),
            TbConfig::default().clock_period_ps(0),
            TbConfig::default().clock_period_ps(999),
            TbConfig::default().out_prefix(""),
        ] {
            assert!(matches!(cfg.validate(), Err(TbError::Config(_))), "{:?}", cfg);
        }
    }
}
