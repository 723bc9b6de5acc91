use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::analysis::Mailbox;
use crate::error::{TbError, TbResult};
use crate::sim_if::now_ns;
use crate::tb_obj::TbObj;
use crate::transaction::{AluOp, AluTxn};

/// The operation behind each opcode on unbounded operands.
///
/// `None` where the result is undefined (division by zero).
fn operation(op: AluOp) -> fn(u128, u128) -> Option<u128> {
    match op {
        AluOp::Add => |a, b| Some(a + b),
        AluOp::Sub => |a, b| Some(a.wrapping_sub(b)),
        AluOp::And => |a, b| Some(a & b),
        AluOp::Or => |a, b| Some(a | b),
        AluOp::Xor => |a, b| Some(a ^ b),
        AluOp::ShiftLeft => |a, b| Some(u32::try_from(b).ok().and_then(|b| a.checked_shl(b)).unwrap_or(0)),
        AluOp::ShiftRight => |a, b| Some(u32::try_from(b).ok().and_then(|b| a.checked_shr(b)).unwrap_or(0)),
        AluOp::Mul => |a, b| Some(a * b),
        AluOp::Div => |a, b| a.checked_div(b),
    }
}

/// Expected ALU output, reduced to a `result_width`-bit bus.
///
/// Operands and bus are at most 64 bits wide, so computing on u128 and masking afterwards
/// equals arithmetic modulo 2^`result_width` (a left shift only drops bits above the mask).
/// Shift amounts of 128 and more shift everything out.
pub fn expected(op: AluOp, a: u64, b: u64, result_width: u32) -> Option<u64> {
    let mask: u128 = if result_width >= 64 {
        u64::MAX as u128
    } else {
        (1u128 << result_width) - 1
    };
    operation(op)(a as u128, b as u128).map(|r| (r & mask) as u64)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpcodeTally {
    pub passed: u32,
    pub failed: u32,
}

/// Pass/fail stream of a scoreboard, keyed by opcode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckLog {
    pub by_opcode: BTreeMap<AluOp, OpcodeTally>,
    pub failures: Vec<String>,
}

impl CheckLog {
    pub fn record(&mut self, op: AluOp, passed: bool) {
        let tally = self.by_opcode.entry(op).or_default();
        if passed {
            tally.passed += 1;
        } else {
            tally.failed += 1;
        }
    }

    pub fn passed(&self) -> u32 {
        self.by_opcode.values().map(|t| t.passed).sum()
    }

    pub fn failed(&self) -> u32 {
        self.by_opcode.values().map(|t| t.failed).sum()
    }

    pub fn failed_opcodes(&self) -> Vec<AluOp> {
        self.by_opcode
            .iter()
            .filter(|(_, t)| t.failed > 0)
            .map(|(op, _)| *op)
            .collect()
    }

    pub fn merge(&mut self, other: &CheckLog) {
        for (op, t) in &other.by_opcode {
            let tally = self.by_opcode.entry(*op).or_default();
            tally.passed += t.passed;
            tally.failed += t.failed;
        }
        self.failures.extend(other.failures.iter().cloned());
    }
}

/// Reference-model checker fed by the monitor.
pub struct AluScoreboard {
    export: Mailbox<AluTxn>,
    result_width: u32,
    log: TbObj<CheckLog>,
}

impl AluScoreboard {
    pub fn new(result_width: u32, log: TbObj<CheckLog>) -> Self {
        Self {
            export: Mailbox::new("scoreboard.analysis_export"),
            result_width,
            log,
        }
    }

    /// Connect this to the monitor's analysis port.
    pub fn analysis_export(&self) -> Mailbox<AluTxn> {
        self.export.clone()
    }

    pub fn log(&self) -> TbObj<CheckLog> {
        self.log.clone()
    }

    /// Compare one observed item against the reference model.
    pub fn check(&self, item: &AluTxn) -> TbResult {
        let verdict = self.compare(item);
        self.log.with_mut(|log| {
            log.record(item.opcode, verdict.is_ok());
            if let Err(e) = &verdict {
                log.failures.push(e.to_string());
            }
        });
        match &verdict {
            Ok(()) => info!(
                t = now_ns(),
                "Opcode {} passed. Input: {}, {}, Output: {}",
                item.opcode,
                item.a,
                item.b,
                item.result.unwrap_or_default()
            ),
            Err(e) => error!(t = now_ns(), "{}", e),
        }
        verdict
    }

    fn compare(&self, item: &AluTxn) -> TbResult {
        let observed = item
            .result
            .ok_or_else(|| TbError::MissingResult(item.to_string()))?;
        let expected = expected(item.opcode, item.a, item.b, self.result_width)
            .ok_or(TbError::DivideByZero { a: item.a })?;
        if observed == expected {
            Ok(())
        } else {
            Err(TbError::Mismatch {
                opcode: item.opcode,
                a: item.a,
                b: item.b,
                expected,
                observed,
            })
        }
    }

    /// Check items as they arrive, up to the first failure.
    pub async fn run(self) -> TbResult {
        loop {
            let item = self.export.recv().await;
            self.check(&item)?;
        }
    }
}
