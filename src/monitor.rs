use tracing::info;

use crate::analysis::AnalysisPort;
use crate::coverage::AluCoverage;
use crate::error::TbResult;
use crate::event::Event;
use crate::handshake::wait_for_ready_valid;
use crate::interface::AluIf;
use crate::sim_if::now_ns;
use crate::tb_obj::TbObj;
use crate::transaction::{AluOp, AluTxn};

/// Passive observer of both ALU buses. Never drives a signal.
pub struct AluMonitor {
    bus: AluIf,
    reset_done: Event,
    pub ap: AnalysisPort<AluTxn>,
    coverage: Option<TbObj<AluCoverage>>,
}

impl AluMonitor {
    pub fn new(bus: AluIf, reset_done: Event, coverage: Option<TbObj<AluCoverage>>) -> Self {
        Self {
            bus,
            reset_done,
            ap: AnalysisPort::new("monitor.ap"),
            coverage,
        }
    }

    pub async fn run(self) -> TbResult {
        let bus = self.bus;
        self.reset_done.wait().await;
        loop {
            // request accepted by the ALU
            wait_for_ready_valid(bus.clk, bus.ready_in, bus.valid_in).await?;
            let mut item = AluTxn::new(AluOp::from_code(bus.opcode.u64()?)?, bus.a.u64()?, bus.b.u64()?);
            item.begin_time = Some(now_ns());

            // response accepted by the testbench
            wait_for_ready_valid(bus.clk, bus.ready_out, bus.valid_out).await?;
            item.result = Some(bus.result.u64()?);
            item.end_time = Some(now_ns());

            info!(t = now_ns(), "Observed item: {}", item);
            self.ap.write(item.clone());
            if let Some(coverage) = &self.coverage {
                coverage.with_mut(|cov| cov.sample(&item));
            }
        }
    }
}
