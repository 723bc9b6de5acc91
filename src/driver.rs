use tracing::info;

use crate::error::TbResult;
use crate::event::Event;
use crate::handshake::wait_for_ready_valid;
use crate::interface::AluIf;
use crate::sequencer::SeqItemPort;
use crate::sim_if::now_ns;
use crate::transaction::AluTxn;

/// Drives items from the sequencer onto the ALU's request bus.
pub struct AluDriver {
    bus: AluIf,
    port: SeqItemPort,
    reset_done: Event,
}

impl AluDriver {
    pub fn new(bus: AluIf, port: SeqItemPort, reset_done: Event) -> Self {
        Self { bus, port, reset_done }
    }

    /// Runs until every sequencer handle is dropped.
    pub async fn run(mut self) -> TbResult {
        let bus = self.bus;
        bus.valid_in.set(0)?; // input is not valid by default
        self.reset_done.wait().await;
        bus.ready_out.set(1)?; // always ready to accept the ALU's output

        while let Some(item) = self.port.get_next_item().await {
            bus.clk.falling_edge().await;
            self.apply(&item)?;
            wait_for_ready_valid(bus.clk, bus.ready_in, bus.valid_in).await?;
            self.port.item_done();
            info!(t = now_ns(), "Applied item: {}", item);
            // reassert per item instead of holding a stale request on the bus
            bus.clk.falling_edge().await;
            bus.valid_in.set(0)?;
        }
        Ok(())
    }

    fn apply(&self, item: &AluTxn) -> TbResult {
        self.bus.valid_in.set(1)?;
        self.bus.opcode.set(item.opcode.code())?;
        self.bus.a.set(item.a)?;
        self.bus.b.set(item.b)?;
        Ok(())
    }
}
