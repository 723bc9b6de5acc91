use crate::error::TbResult;
use crate::signal::SimObject;

/// Wait for a ready/valid transfer.
///
/// Both signals are sampled right at the rising edge of `clk`, before anything written on
/// that edge commits, so a value driven for the next cycle is never mistaken for the
/// current one. Always consumes at least one edge. There is no timeout: a UUT that never
/// completes the handshake parks the caller until the runner's watchdog fires.
pub async fn wait_for_ready_valid(clk: SimObject, ready: SimObject, valid: SimObject) -> TbResult<()> {
    loop {
        clk.rising_edge().await;
        if valid.is_high()? && ready.is_high()? {
            return Ok(());
        }
    }
}
