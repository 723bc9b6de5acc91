pub use crate::analysis::{AnalysisPort, Mailbox};
pub use crate::config::TbConfig;
pub use crate::coverage::{AluCoverage, CoverageDb, SignClass};
pub use crate::env::{AluAgent, AluEnv, TbPhase};
pub use crate::error::{TbError, TbResult};
pub use crate::event::Event;
pub use crate::executor::{JoinHandle, Task};
pub use crate::handshake::wait_for_ready_valid;
pub use crate::interface::AluIf;
pub use crate::kernel::{RunEnd, Simulation};
pub use crate::rng::{HasRng, RngNode};
pub use crate::runner::{RunReport, Runner};
pub use crate::scoreboard::{expected, AluScoreboard, CheckLog};
pub use crate::sequence::{DirectedSeq, RandomSeq, Sequence, SweepSeq};
pub use crate::signal::SimObject;
pub use crate::sim_if::{now_ns, SimIf, SIM_IF};
pub use crate::tb_obj::TbObj;
pub use crate::test::{Test, TestContext, TestFn, TestSet};
pub use crate::transaction::{AluOp, AluTxn};
pub use crate::trigger::Trigger;
pub use crate::{fail_test, pass_test};
pub use futures::future::{BoxFuture, FutureExt};
