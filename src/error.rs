use thiserror::Error;

use crate::transaction::AluOp;

pub type TbResult<T = ()> = Result<T, TbError>;

#[derive(Debug, Error)]
pub enum TbError {
    #[error("{opcode} failed. Input: {a}, {b}. Expected {expected}, got {observed}")]
    Mismatch {
        opcode: AluOp,
        a: u64,
        b: u64,
        expected: u64,
        observed: u64,
    },
    #[error("DIV by zero reached the scoreboard (a={a})")]
    DivideByZero { a: u64 },
    #[error("{0} was published without a result")]
    MissingResult(String),
    #[error("no simulation object named '{0}'")]
    NoSuchObject(String),
    #[error("object '{0}' carries no value")]
    NotASignal(String),
    #[error("value {value:#x} does not fit {width}-bit signal '{name}'")]
    ValueOverflow { name: String, width: u32, value: u64 },
    #[error("write to '{0}' during the read-only phase")]
    ReadOnlyWrite(String),
    #[error("invalid opcode value {0}")]
    InvalidOpcode(u64),
    #[error("invalid time unit '{0}'")]
    TimeUnit(String),
    #[error("can't convert {time} {unit} to simulation steps without rounding")]
    TimeRounding { time: f64, unit: String },
    #[error("unknown callback handle {0}")]
    NoSuchCallback(usize),
    #[error("delta cycle limit exceeded at {0} steps")]
    DeltaOverflow(u64),
    #[error("illegal phase transition {from:?} -> {to:?}")]
    Phase {
        from: crate::env::TbPhase,
        to: crate::env::TbPhase,
    },
    #[error("watchdog expired after {0} ns")]
    Timeout(u64),
    #[error("simulation went idle before the test finished")]
    Stalled,
    #[error("task was cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("test failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("junit report: {0}")]
    Junit(String),
}
