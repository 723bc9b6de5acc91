//! Functional coverage of observed ALU transactions.
//!
//! Three coverpoints (opcode, sign class of `a`, sign class of `b`) and their full cross.
//! Bin counts live in a [`CoverageDb`], which is what gets written to and merged from disk.

use prettytable::{format, row, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::TbResult;
use crate::transaction::{AluOp, AluTxn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignClass {
    Positive,
    Negative,
    Zero,
}

impl SignClass {
    pub const ALL: [SignClass; 3] = [SignClass::Positive, SignClass::Negative, SignClass::Zero];

    /// Class of `value` read as a `width`-bit two's-complement number.
    pub fn of(value: u64, width: u32) -> Self {
        let width = width.clamp(1, 64);
        if value == 0 {
            SignClass::Zero
        } else if (value >> (width - 1)) & 1 == 1 {
            SignClass::Negative
        } else {
            SignClass::Positive
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SignClass::Positive => "positive",
            SignClass::Negative => "negative",
            SignClass::Zero => "zero",
        }
    }
}

impl fmt::Display for SignClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub hits: u64,
    /// Structurally unreachable; reported but not counted towards coverage.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverpoint {
    pub bins: BTreeMap<String, Bin>,
}

impl Coverpoint {
    fn with_bins<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self {
            bins: names.into_iter().map(|n| (n, Bin::default())).collect(),
        }
    }

    fn hit(&mut self, bin: &str) {
        self.bins.entry(bin.to_string()).or_default().hits += 1;
    }

    fn ignore(&mut self, bin: &str) {
        self.bins.entry(bin.to_string()).or_default().ignored = true;
    }

    /// (covered, coverable) bin counts.
    pub fn counts(&self) -> (usize, usize) {
        self.bins
            .values()
            .filter(|b| !b.ignored)
            .fold((0, 0), |(covered, total), b| {
                (covered + (b.hits > 0) as usize, total + 1)
            })
    }
}

/// Coverpoints by name. Serialized as-is to `<prefix>_func_cov.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageDb {
    pub coverpoints: BTreeMap<String, Coverpoint>,
}

impl CoverageDb {
    /// Percentage of non-ignored bins hit at least once, over all coverpoints.
    pub fn percent(&self) -> f64 {
        let (covered, total) = self
            .coverpoints
            .values()
            .map(Coverpoint::counts)
            .fold((0, 0), |(c, t), (c2, t2)| (c + c2, t + t2));
        if total == 0 {
            0.0
        } else {
            100.0 * covered as f64 / total as f64
        }
    }

    /// Add hit counts of `other`; bins missing here are created.
    pub fn merge(&mut self, other: &CoverageDb) {
        for (cp_name, cp) in &other.coverpoints {
            let mine = self.coverpoints.entry(cp_name.clone()).or_default();
            for (bin_name, bin) in &cp.bins {
                let b = mine.bins.entry(bin_name.clone()).or_default();
                b.hits += bin.hits;
                b.ignored |= bin.ignored;
            }
        }
    }

    pub fn to_json(&self) -> TbResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> TbResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_json(&self, path: &Path) -> TbResult {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> TbResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// One table per coverpoint, followed by the total.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (name, cp) in &self.coverpoints {
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
            table.set_titles(row!["BIN", "HITS", "STATUS"]);
            for (bin_name, bin) in &cp.bins {
                let status = if bin.ignored {
                    "ignored"
                } else if bin.hits > 0 {
                    "covered"
                } else {
                    "ZERO"
                };
                table.add_row(row![bin_name, r->bin.hits, status]);
            }
            let (covered, total) = cp.counts();
            out.push_str(&format!("Coverpoint {} ({}/{} bins)\n", name, covered, total));
            out.push_str(&table.to_string());
            out.push('\n');
        }
        out.push_str(&format!("Functional coverage: {:.2}%\n", self.percent()));
        out
    }
}

pub const CP_OPCODE: &str = "alu.opcode";
pub const CP_SIGN_A: &str = "alu.sign_a";
pub const CP_SIGN_B: &str = "alu.sign_b";
pub const CP_CROSS: &str = "alu.opcode_x_sign_a_x_sign_b";

fn cross_bin(op: AluOp, a: SignClass, b: SignClass) -> String {
    format!("{}.{}.{}", op, a, b)
}

/// Sampler fed by the monitor with completed transactions.
#[derive(Debug, Clone)]
pub struct AluCoverage {
    operand_width: u32,
    db: CoverageDb,
}

impl AluCoverage {
    pub fn new(operand_width: u32) -> Self {
        let mut db = CoverageDb::default();
        db.coverpoints.insert(
            CP_OPCODE.to_string(),
            Coverpoint::with_bins(AluOp::ALL.iter().map(|op| op.to_string())),
        );
        for cp in [CP_SIGN_A, CP_SIGN_B] {
            db.coverpoints.insert(
                cp.to_string(),
                Coverpoint::with_bins(SignClass::ALL.iter().map(|s| s.to_string())),
            );
        }
        let mut cross = Coverpoint::with_bins(AluOp::ALL.into_iter().flat_map(|op| {
            SignClass::ALL.into_iter().flat_map(move |a| {
                SignClass::ALL.into_iter().map(move |b| cross_bin(op, a, b))
            })
        }));
        for a in SignClass::ALL {
            cross.ignore(&cross_bin(AluOp::Div, a, SignClass::Zero));
        }
        db.coverpoints.insert(CP_CROSS.to_string(), cross);
        // TODO: result coverpoint (zero / max / overflowed) once the result bus width is known here
        Self { operand_width, db }
    }

    pub fn sample(&mut self, item: &AluTxn) {
        let a = SignClass::of(item.a, self.operand_width);
        let b = SignClass::of(item.b, self.operand_width);
        let cps = &mut self.db.coverpoints;
        for (cp, bin) in [
            (CP_OPCODE, item.opcode.to_string()),
            (CP_SIGN_A, a.to_string()),
            (CP_SIGN_B, b.to_string()),
            (CP_CROSS, cross_bin(item.opcode, a, b)),
        ] {
            cps.entry(cp.to_string()).or_default().hit(&bin);
        }
    }

    pub fn db(&self) -> &CoverageDb {
        &self.db
    }

    pub fn percent(&self) -> f64 {
        self.db.percent()
    }

    pub fn hits(&self, coverpoint: &str, bin: &str) -> u64 {
        self.db
            .coverpoints
            .get(coverpoint)
            .and_then(|cp| cp.bins.get(bin))
            .map_or(0, |b| b.hits)
    }

    pub fn merge(&mut self, other: &AluCoverage) {
        self.db.merge(&other.db);
    }

    /// Write `<prefix>_func_cov.log` and `<prefix>_func_cov.json` into `dir`.
    pub fn write_reports(&self, dir: &Path, prefix: &str) -> TbResult {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(format!("{}_func_cov.log", prefix)), self.db.report())?;
        self.db
            .write_json(&dir.join(format!("{}_func_cov.json", prefix)))?;
        tracing::info!(
            "Functional coverage {:.2}% written to {}",
            self.percent(),
            dir.display()
        );
        Ok(())
    }
}
