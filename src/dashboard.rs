//! Verification dashboard: aggregates the JUnit results and coverage databases of many runs.

use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

use crate::coverage::CoverageDb;
use crate::error::TbResult;

pub const MERGED_COVERAGE_FILE: &str = "merged_func_cov.json";

static TESTCASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<testcase\b([^>]*?)(/>|>(.*?)</testcase>)").expect("testcase pattern")
});
static TIME_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\btime\s*=\s*"([^"]*)""#).expect("time pattern"));

/// Where a dashboard was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub branch: String,
    pub commit: String,
    pub timestamp: String,
}

impl Signature {
    pub fn collect() -> Self {
        Self {
            branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]),
            commit: git(&["rev-parse", "--short", "HEAD"]),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestMetrics {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    /// Summed wall time of all test cases, in seconds.
    pub total_time: f64,
}

impl TestMetrics {
    pub fn pass_rate(&self) -> Option<f64> {
        (self.total_tests > 0).then(|| 100.0 * self.passed_tests as f64 / self.total_tests as f64)
    }

    /// Add the test cases of one JUnit document. Unparsable times count as zero.
    pub fn add_junit(&mut self, xml: &str, source: &str) {
        for case in TESTCASE.captures_iter(xml) {
            self.total_tests += 1;
            let body = case.get(3).map_or("", |m| m.as_str());
            if body.contains("<failure") {
                self.failed_tests += 1;
            }
            let attrs = case.get(1).map_or("", |m| m.as_str());
            if let Some(time) = TIME_ATTR.captures(attrs).and_then(|c| c.get(1)) {
                match time.as_str().parse::<f64>() {
                    Ok(secs) => self.total_time += secs,
                    Err(_) => warn!("Invalid time value '{}' in {}", time.as_str(), source),
                }
            }
        }
        self.passed_tests = self.total_tests - self.failed_tests;
    }
}

fn files(sim_dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full_pattern = sim_dir.join(pattern);
    let mut paths: Vec<PathBuf> = glob(full_pattern.to_string_lossy().as_ref())
        .map(|paths| paths.filter_map(Result::ok).collect())
        .unwrap_or_default();
    paths.sort();
    paths
}

/// Sum every `*_results.xml` in `sim_dir`. Unreadable files are skipped with a warning.
pub fn test_metrics(sim_dir: &Path) -> TestMetrics {
    let mut metrics = TestMetrics::default();
    for path in files(sim_dir, "*_results.xml") {
        match std::fs::read_to_string(&path) {
            Ok(xml) => metrics.add_junit(&xml, &path.display().to_string()),
            Err(e) => warn!("Error processing {}: {}", path.display(), e),
        }
    }
    metrics.total_time = (metrics.total_time * 1000.0).round() / 1000.0;
    metrics
}

/// Merge every `*_func_cov.json` in `sim_dir` into `merged_func_cov.json`.
///
/// Returns `None` when there was nothing to merge.
pub fn merge_coverage(sim_dir: &Path) -> TbResult<Option<CoverageDb>> {
    let inputs: Vec<PathBuf> = files(sim_dir, "*_func_cov.json")
        .into_iter()
        .filter(|p| p.file_name().map_or(true, |n| n != MERGED_COVERAGE_FILE))
        .collect();
    if inputs.is_empty() {
        warn!("No functional coverage files found in {}", sim_dir.display());
        return Ok(None);
    }
    let mut merged = CoverageDb::default();
    for path in &inputs {
        match CoverageDb::read_json(path) {
            Ok(db) => merged.merge(&db),
            Err(e) => warn!("Error processing {}: {}", path.display(), e),
        }
    }
    merged.write_json(&sim_dir.join(MERGED_COVERAGE_FILE))?;
    Ok(Some(merged))
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub signature: Signature,
    pub tests: TestMetrics,
    pub functional_coverage: f64,
}

impl Dashboard {
    pub fn generate(sim_dir: &Path) -> TbResult<Self> {
        let signature = Signature::collect();
        let tests = test_metrics(sim_dir);
        let functional_coverage = merge_coverage(sim_dir)?.map_or(0.0, |db| db.percent());
        Ok(Self {
            signature,
            tests,
            functional_coverage,
        })
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "Verification Dashboard")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Git Info: {}@{}", self.signature.branch, self.signature.commit)?;
        writeln!(f, "Generated: {}", self.signature.timestamp)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "TEST METRICS:")?;
        writeln!(f, "   Total Tests:     {}", self.tests.total_tests)?;
        writeln!(f, "   Passed Tests:    {}", self.tests.passed_tests)?;
        writeln!(f, "   Failed Tests:    {}", self.tests.failed_tests)?;
        match self.tests.pass_rate() {
            Some(rate) => writeln!(f, "   Pass Rate:       {:.2}%", rate)?,
            None => writeln!(f, "   Pass Rate:       N/A")?,
        }
        writeln!(f, "   Total Time:      {}s", self.tests.total_time)?;
        writeln!(f)?;
        writeln!(f, "COVERAGE METRICS:")?;
        writeln!(f, "   Functional Coverage: {:.2}%", self.functional_coverage)?;
        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::AluCoverage;
    use crate::transaction::{AluOp, AluTxn};

    const RESULTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites>
  <testsuite name="alutb" tests="3" failures="1" time="1.5">
    <testcase name="simple_test" time="0.5"/>
    <testcase name="add_test" time="0.25">
      <failure type="failure" message="ADD failed"/>
    </testcase>
    <testcase name="random_test" time="abc"></testcase>
  </testsuite>
</testsuites>"#;

    #[test]
    fn counts_testcases_and_failures() {
        let mut m = TestMetrics::default();
        m.add_junit(RESULTS, "inline");
        assert_eq!((m.total_tests, m.passed_tests, m.failed_tests), (3, 2, 1));
        // the malformed time is skipped, the suite time is not a testcase
        assert!((m.total_time - 0.75).abs() < 1e-9);
        assert!((m.pass_rate().unwrap() - 66.666).abs() < 0.01);
    }

    #[test]
    fn aggregates_a_sim_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_results.xml"), RESULTS).unwrap();
        std::fs::write(dir.path().join("b_results.xml"), RESULTS).unwrap();
        std::fs::write(dir.path().join("notes.xml"), RESULTS).unwrap();

        let mut cov_a = AluCoverage::new(8);
        cov_a.sample(&AluTxn::new(AluOp::Add, 1, 1));
        cov_a.write_reports(dir.path(), "a").unwrap();
        let mut cov_b = AluCoverage::new(8);
        cov_b.sample(&AluTxn::new(AluOp::Sub, 1, 1));
        cov_b.write_reports(dir.path(), "b").unwrap();
        std::fs::write(dir.path().join("c_func_cov.json"), "not json").unwrap();

        let dash = Dashboard::generate(dir.path()).unwrap();
        assert_eq!(dash.tests.total_tests, 6);
        assert_eq!(dash.tests.failed_tests, 2);
        assert!((dash.tests.total_time - 1.5).abs() < 1e-9);

        let merged = CoverageDb::read_json(&dir.path().join(MERGED_COVERAGE_FILE)).unwrap();
        let mut both = cov_a.clone();
        both.merge(&cov_b);
        assert_eq!(&merged, both.db());
        assert!((dash.functional_coverage - both.percent()).abs() < 1e-9);
        assert!(dash.to_string().contains("Total Tests:     6"));
    }

    #[test]
    fn empty_directory_reports_zeroes() {
        let dir = tempfile::tempdir().unwrap();
        let dash = Dashboard::generate(dir.path()).unwrap();
        assert_eq!(dash.tests, TestMetrics::default());
        assert_eq!(dash.functional_coverage, 0.0);
        assert!(dash.to_string().contains("Pass Rate:       N/A"));
        assert!(!dir.path().join(MERGED_COVERAGE_FILE).exists());
    }
}
