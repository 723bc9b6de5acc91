//! Verification environment: one agent (sequencer, driver, monitor), the scoreboard and
//! the optional coverage sampler, plus the reset/run phase sequencing around them.

use std::future::Future;
use tracing::{error, info};

use crate::analysis::Mailbox;
use crate::config::TbConfig;
use crate::coverage::AluCoverage;
use crate::driver::AluDriver;
use crate::error::{TbError, TbResult};
use crate::event::Event;
use crate::executor::Task;
use crate::interface::AluIf;
use crate::monitor::AluMonitor;
use crate::scoreboard::{AluScoreboard, CheckLog};
use crate::sequence::{self, Sequence};
use crate::sequencer::{sequencer, Sequencer};
use crate::sim_if::now_ns;
use crate::tb_obj::TbObj;
use crate::testbench::clock;
use crate::transaction::AluTxn;
use crate::utils::{clock_cycles, falling_cycles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbPhase {
    Init,
    Resetting,
    Ready,
    Running,
    Done,
}

impl TbPhase {
    /// The only phase reachable from `self`.
    pub fn next(self) -> Option<TbPhase> {
        match self {
            TbPhase::Init => Some(TbPhase::Resetting),
            TbPhase::Resetting => Some(TbPhase::Ready),
            TbPhase::Ready => Some(TbPhase::Running),
            TbPhase::Running => Some(TbPhase::Done),
            TbPhase::Done => None,
        }
    }

    pub fn advance(&mut self, to: TbPhase) -> TbResult {
        if self.next() != Some(to) {
            return Err(TbError::Phase { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

/// Sequencer, driver and monitor of the ALU bus. Tasks are forked by [`AluEnv::start`].
pub struct AluAgent {
    pub sequencer: Sequencer,
    driver: Option<AluDriver>,
    monitor: Option<AluMonitor>,
}

impl AluAgent {
    fn new(bus: AluIf, reset_done: &Event, coverage: Option<TbObj<AluCoverage>>) -> Self {
        let (sequencer, port) = sequencer();
        Self {
            sequencer,
            driver: Some(AluDriver::new(bus, port, reset_done.clone())),
            monitor: Some(AluMonitor::new(bus, reset_done.clone(), coverage)),
        }
    }

    /// Subscribe `export` to observed transactions.
    pub fn connect(&mut self, export: Mailbox<AluTxn>) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.ap.connect(export);
        }
    }
}

pub struct AluEnv {
    bus: AluIf,
    clock_period_ps: u64,
    reset_cycles: u32,
    drain_cycles: u32,
    phase: TbObj<TbPhase>,
    reset_done: Event,
    pub agent: AluAgent,
    scoreboard: Option<AluScoreboard>,
    checks: TbObj<CheckLog>,
}

impl AluEnv {
    pub fn new(
        bus: AluIf,
        cfg: &TbConfig,
        checks: TbObj<CheckLog>,
        coverage: Option<TbObj<AluCoverage>>,
    ) -> Self {
        let reset_done = Event::new("reset_done");
        let mut agent = AluAgent::new(bus, &reset_done, coverage);
        let scoreboard = AluScoreboard::new(bus.result_width(), checks.clone());
        agent.connect(scoreboard.analysis_export());
        Self {
            bus,
            clock_period_ps: cfg.clock_period_ps,
            reset_cycles: cfg.reset_cycles,
            drain_cycles: cfg.drain_cycles,
            phase: TbObj::new(TbPhase::Init),
            reset_done,
            agent,
            scoreboard: Some(scoreboard),
            checks,
        }
    }

    pub fn phase(&self) -> TbPhase {
        *self.phase.get()
    }

    pub fn reset_done(&self) -> &Event {
        &self.reset_done
    }

    pub fn checks(&self) -> TbObj<CheckLog> {
        self.checks.clone()
    }

    fn advance(&self, to: TbPhase) -> TbResult {
        self.phase.with_mut(|p| p.advance(to))?;
        info!(t = now_ns(), phase = ?to, "phase change");
        Ok(())
    }

    /// Fork the clock and every component task. Agents stay idle until reset completes.
    pub fn start(&mut self) {
        self.spawn(clock(self.bus.clk, self.clock_period_ps, "ps"), "clock");
        if let Some(driver) = self.agent.driver.take() {
            self.spawn(driver.run(), "driver");
        }
        if let Some(monitor) = self.agent.monitor.take() {
            self.spawn(monitor.run(), "monitor");
        }
        if let Some(scoreboard) = self.scoreboard.take() {
            self.spawn(scoreboard.run(), "scoreboard");
        }
    }

    // a component that errors out fails the running test
    fn spawn(&self, fut: impl Future<Output = TbResult> + Send + 'static, name: &str) {
        let component = name.to_string();
        Task::spawn_from_future(
            async move {
                let result = fut.await;
                if let Err(e) = &result {
                    error!(t = now_ns(), component = %component, "{}", e);
                    crate::fail_test(&e.to_string());
                }
                result
            },
            name,
        );
    }

    /// Hold reset for the configured number of cycles, then release the agents.
    pub async fn reset(&self) -> TbResult {
        self.advance(TbPhase::Resetting)?;
        let bus = self.bus;
        bus.clk.falling_edge().await;
        bus.rst_n.set(0)?;
        falling_cycles(bus.clk, self.reset_cycles).await?;
        bus.rst_n.set(1)?;
        bus.clk.falling_edge().await;
        self.advance(TbPhase::Ready)?;
        self.reset_done.set();
        Ok(())
    }

    /// Drive `seq` to completion, then let the last response drain.
    pub async fn run<S: Sequence>(&self, seq: S) -> TbResult<usize> {
        self.advance(TbPhase::Running)?;
        let items = sequence::start(seq, &self.agent.sequencer).await?;
        clock_cycles(self.bus.clk, self.drain_cycles).await?;
        self.advance(TbPhase::Done)?;
        Ok(items)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward_one_step() {
        let mut phase = TbPhase::Init;
        for to in [TbPhase::Resetting, TbPhase::Ready, TbPhase::Running, TbPhase::Done] {
            phase.advance(to).unwrap();
        }
        assert!(matches!(
            phase.advance(TbPhase::Init),
            Err(TbError::Phase { from: TbPhase::Done, to: TbPhase::Init })
        ));

        let mut phase = TbPhase::Init;
        assert!(phase.advance(TbPhase::Running).is_err());
        assert_eq!(phase, TbPhase::Init);
    }
}
