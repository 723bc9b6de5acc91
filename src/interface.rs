use crate::error::TbResult;
use crate::kernel::Simulation;
use crate::signal::SimObject;

pub const OPCODE_WIDTH: u32 = 4;

/// Handles to every port of the ALU.
#[derive(Clone, Copy, Debug)]
pub struct AluIf {
    pub clk: SimObject,
    /// Active-low asynchronous reset.
    pub rst_n: SimObject,
    pub valid_in: SimObject,
    pub ready_in: SimObject,
    pub opcode: SimObject,
    pub a: SimObject,
    pub b: SimObject,
    pub valid_out: SimObject,
    pub ready_out: SimObject,
    pub result: SimObject,
}

impl AluIf {
    /// Look the ports up below `dut`.
    pub fn from_dut(dut: SimObject) -> TbResult<Self> {
        Ok(Self {
            clk: dut.c("clk")?,
            rst_n: dut.c("rst_n")?,
            valid_in: dut.c("valid_in")?,
            ready_in: dut.c("ready_in")?,
            opcode: dut.c("opcode")?,
            a: dut.c("a")?,
            b: dut.c("b")?,
            valid_out: dut.c("valid_out")?,
            ready_out: dut.c("ready_out")?,
            result: dut.c("result")?,
        })
    }

    /// Create the ports in a fresh simulation. Reset starts asserted.
    pub fn declare(sim: &Simulation, operand_width: u32, result_width: u32) -> TbResult<Self> {
        Ok(Self {
            clk: sim.add_signal("clk", 1, 0)?,
            rst_n: sim.add_signal("rst_n", 1, 0)?,
            valid_in: sim.add_signal("valid_in", 1, 0)?,
            ready_in: sim.add_signal("ready_in", 1, 0)?,
            opcode: sim.add_signal("opcode", OPCODE_WIDTH, 0)?,
            a: sim.add_signal("a", operand_width, 0)?,
            b: sim.add_signal("b", operand_width, 0)?,
            valid_out: sim.add_signal("valid_out", 1, 0)?,
            ready_out: sim.add_signal("ready_out", 1, 0)?,
            result: sim.add_signal("result", result_width, 0)?,
        })
    }

    pub fn operand_width(&self) -> u32 {
        self.a.width().unwrap_or(0)
    }

    pub fn result_width(&self) -> u32 {
        self.result.width().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_ports_are_found_by_name() {
        let sim = Simulation::new("alu");
        let declared = AluIf::declare(&sim, 8, 32).unwrap();
        let found = AluIf::from_dut(sim.root().unwrap()).unwrap();
        assert_eq!(declared.result, found.result);
        assert_eq!(found.operand_width(), 8);
        assert_eq!(found.result_width(), 32);
        assert_eq!(found.opcode.width(), Some(OPCODE_WIDTH));
    }
}
