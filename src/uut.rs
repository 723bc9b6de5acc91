//! Behavioral model of the ALU, standing in for the HDL design.
//!
//! One request in flight: after accepting `valid_in && ready_in` on a rising edge the model
//! drops `ready_in`, presents `result` with `valid_out` from the next cycle on, and only
//! takes a new request once `valid_out && ready_out` has been seen on a later edge.

use tracing::{debug, warn};

use crate::error::TbResult;
use crate::interface::AluIf;
use crate::sim_if::now_ns;
use crate::transaction::{operand_max, AluOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Busy,
}

pub struct AluModel {
    bus: AluIf,
    mask: u64,
    fault: Option<AluOp>,
}

impl AluModel {
    pub fn new(bus: AluIf) -> Self {
        Self {
            bus,
            mask: operand_max(bus.result_width()),
            fault: None,
        }
    }

    /// Corrupt the least significant result bit of every `op` result.
    pub fn with_fault(mut self, op: Option<AluOp>) -> Self {
        self.fault = op;
        self
    }

    /// Result the hardware would present for a request.
    pub fn compute(&self, op: AluOp, a: u64, b: u64) -> u64 {
        let raw = match op {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::And => a & b,
            AluOp::Or => a | b,
            AluOp::Xor => a ^ b,
            AluOp::ShiftLeft => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).unwrap_or(0),
            AluOp::ShiftRight => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)).unwrap_or(0),
            AluOp::Mul => a.wrapping_mul(b),
            // a hardware divider saturates
            AluOp::Div => a.checked_div(b).unwrap_or(u64::MAX),
        };
        let res = raw & self.mask;
        if self.fault == Some(op) {
            (res ^ 1) & self.mask
        } else {
            res
        }
    }

    /// Clocked process; reset is sampled on the rising edge.
    pub async fn run(self) -> TbResult {
        let bus = self.bus;
        let mut state = State::Idle;
        loop {
            bus.clk.rising_edge().await;
            if !bus.rst_n.is_high()? {
                bus.ready_in.set(0)?;
                bus.valid_out.set(0)?;
                bus.result.set(0)?;
                state = State::Idle;
                continue;
            }
            match state {
                State::Idle => {
                    if bus.valid_in.is_high()? && bus.ready_in.is_high()? {
                        let code = bus.opcode.u64()?;
                        let (a, b) = (bus.a.u64()?, bus.b.u64()?);
                        let result = match AluOp::from_code(code) {
                            Ok(op) => self.compute(op, a, b),
                            Err(_) => {
                                warn!(t = now_ns(), "ALU got undefined opcode {:#06b}", code);
                                0
                            }
                        };
                        debug!(t = now_ns(), code, a, b, result, "ALU accepted request");
                        bus.result.set(result)?;
                        bus.valid_out.set(1)?;
                        bus.ready_in.set(0)?;
                        state = State::Busy;
                    } else {
                        bus.ready_in.set(1)?;
                    }
                }
                State::Busy => {
                    if bus.valid_out.is_high()? && bus.ready_out.is_high()? {
                        bus.valid_out.set(0)?;
                        bus.ready_in.set(1)?;
                        state = State::Idle;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Task;
    use crate::kernel::Simulation;
    use crate::testbench::clock;
    use crate::utils::falling_cycles;

    fn model(result_width: u32) -> AluModel {
        let sim = Simulation::new("alu");
        AluModel::new(AluIf::declare(&sim, 8, result_width).unwrap())
    }

    #[test]
    fn computes_modulo_the_result_bus() {
        let m = model(8);
        assert_eq!(m.compute(AluOp::Add, 200, 100), 44);
        assert_eq!(m.compute(AluOp::Sub, 0, 1), 0xff);
        assert_eq!(m.compute(AluOp::ShiftLeft, 1, 70), 0);
        assert_eq!(m.compute(AluOp::Div, 7, 0), 0xff);
        let m = model(32);
        assert_eq!(m.compute(AluOp::Mul, 255, 255), 65025);
        assert_eq!(m.compute(AluOp::ShiftRight, 0x80, 7), 1);
    }

    #[test]
    fn fault_flips_the_lsb_of_one_opcode() {
        let m = model(32).with_fault(Some(AluOp::Xor));
        assert_eq!(m.compute(AluOp::Xor, 3, 1), 3);
        assert_eq!(m.compute(AluOp::Add, 3, 1), 4);
    }

    #[test]
    fn answers_one_request_per_handshake() {
        let sim = Simulation::new("alu");
        let bus = AluIf::declare(&sim, 8, 32).unwrap();
        Task::fork(clock(bus.clk, 10, "ns"));
        Task::fork(AluModel::new(bus).run());
        Task::fork(async move {
            falling_cycles(bus.clk, 2).await?;
            bus.rst_n.set(1)?;
            bus.ready_out.set(1)?;
            falling_cycles(bus.clk, 2).await?;
            bus.valid_in.set(1)?;
            bus.opcode.set(AluOp::Mul.code())?;
            bus.a.set(12)?;
            bus.b.set(11)?;
            Ok(())
        });
        // released at 20ns, ready from 25ns, request applied at 40ns, accepted at 45ns
        sim.run(Some(50_000)).unwrap();
        assert!(bus.valid_out.is_high().unwrap());
        assert!(!bus.ready_in.is_high().unwrap());
        assert_eq!(bus.result.u64().unwrap(), 132);
        // response taken at 55ns
        sim.run(Some(60_000)).unwrap();
        assert!(!bus.valid_out.is_high().unwrap());
        assert!(bus.ready_in.is_high().unwrap());
    }
}
