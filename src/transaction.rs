use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TbError, TbResult};

/// ALU operation codes, as driven on the 4-bit `opcode` bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AluOp {
    Add = 0b0000,
    Sub = 0b0001,
    And = 0b0010,
    Or = 0b0011,
    Xor = 0b0100,
    ShiftLeft = 0b0101,
    ShiftRight = 0b0110,
    Mul = 0b0111,
    Div = 0b1000,
}

impl AluOp {
    pub const ALL: [AluOp; 9] = [
        AluOp::Add,
        AluOp::Sub,
        AluOp::And,
        AluOp::Or,
        AluOp::Xor,
        AluOp::ShiftLeft,
        AluOp::ShiftRight,
        AluOp::Mul,
        AluOp::Div,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> TbResult<Self> {
        AluOp::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or(TbError::InvalidOpcode(code))
    }

    pub fn name(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::ShiftLeft => "SL",
            AluOp::ShiftRight => "SR",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AluOp {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        AluOp::ALL
            .into_iter()
            .find(|op| op.name() == upper)
            .or(match upper.as_str() {
                "SHIFT_LEFT" => Some(AluOp::ShiftLeft),
                "SHIFT_RIGHT" => Some(AluOp::ShiftRight),
                _ => None,
            })
            .ok_or_else(|| TbError::Config(format!("unknown opcode '{}'", s)))
    }
}

/// One ALU request and, once observed, its response.
///
/// Sequences create stimulus-only items (`result == None`); the monitor builds a fresh item
/// from bus values and fills in the result. Consumers only ever read items.
#[derive(Debug, Clone, PartialEq)]
pub struct AluTxn {
    pub opcode: AluOp,
    pub a: u64,
    pub b: u64,
    pub result: Option<u64>,
    /// Sim time (ns) of the request transfer, set by the monitor.
    pub begin_time: Option<f64>,
    /// Sim time (ns) of the response transfer, set by the monitor.
    pub end_time: Option<f64>,
}

impl AluTxn {
    pub fn new(opcode: AluOp, a: u64, b: u64) -> Self {
        Self {
            opcode,
            a,
            b,
            result: None,
            begin_time: None,
            end_time: None,
        }
    }

    /// Randomize opcode and operands. `operand_width` is in bits.
    pub fn randomize(&mut self, rng: &mut impl Rng, operand_width: u32) {
        self.opcode = AluOp::ALL[rng.gen_range(0..AluOp::ALL.len())];
        self.rnd_operands(rng, operand_width);
    }

    /// Randomize only the operands, keeping the opcode.
    pub fn rnd_operands(&mut self, rng: &mut impl Rng, operand_width: u32) {
        let max = operand_max(operand_width);
        self.a = rng.gen_range(0..=max);
        self.b = rng.gen_range(0..=max);
        self.post_randomize();
    }

    fn post_randomize(&mut self) {
        // Can't divide by zero
        if self.opcode == AluOp::Div && self.b == 0 {
            self.b = 1;
        }
    }

    /// Same request and response, ignoring observation timestamps.
    pub fn same_payload(&self, other: &AluTxn) -> bool {
        self.opcode == other.opcode
            && self.a == other.a
            && self.b == other.b
            && self.result == other.result
    }
}

impl fmt::Display for AluTxn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opcode: {}, a: {}, b: {}, result: ", self.opcode, self.a, self.b)?;
        match self.result {
            Some(r) => write!(f, "{}", r),
            None => f.write_str("None"),
        }
    }
}

pub(crate) fn operand_max(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn opcodes_round_trip_through_bus_codes() {
        for (i, op) in AluOp::ALL.into_iter().enumerate() {
            assert_eq!(op.code(), i as u64);
            assert_eq!(AluOp::from_code(i as u64).unwrap(), op);
        }
        assert!(matches!(AluOp::from_code(9), Err(TbError::InvalidOpcode(9))));
    }

    #[test]
    fn parses_names() {
        assert_eq!("div".parse::<AluOp>().unwrap(), AluOp::Div);
        assert_eq!("SHIFT_LEFT".parse::<AluOp>().unwrap(), AluOp::ShiftLeft);
        assert!("NOP".parse::<AluOp>().is_err());
    }

    #[test]
    fn displays_like_the_log_stream() {
        let mut txn = AluTxn::new(AluOp::Add, 1, 2);
        assert_eq!(txn.to_string(), "opcode: ADD, a: 1, b: 2, result: None");
        txn.result = Some(3);
        assert_eq!(txn.to_string(), "opcode: ADD, a: 1, b: 2, result: 3");
    }

    proptest! {
        #[test]
        fn randomized_div_never_has_zero_divisor(seed in any::<u64>(), width in 1u32..=16) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..64 {
                let mut txn = AluTxn::new(AluOp::Add, 0, 0);
                txn.randomize(&mut rng, width);
                prop_assert!(txn.a <= operand_max(width));
                prop_assert!(txn.b <= operand_max(width));
                if txn.opcode == AluOp::Div {
                    prop_assert_ne!(txn.b, 0);
                }
            }
        }

        #[test]
        fn directed_div_operands_are_fixed_up(seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut txn = AluTxn::new(AluOp::Div, 0, 0);
            // width 1 hits b == 0 half of the time
            txn.rnd_operands(&mut rng, 1);
            prop_assert_eq!(txn.opcode, AluOp::Div);
            prop_assert_eq!(txn.b, 1);
        }
    }
}
