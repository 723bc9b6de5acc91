use crate::error::TbResult;
use crate::signal::SimObject;
use crate::sim_if::{SimIf, SIM_IF};
use crate::trigger::Trigger;

/*
 * CLOCK
 */
/// Free-running clock on `clk`, starting low. Never returns.
pub async fn clock(clk: SimObject, period: u64, unit: &str) -> TbResult {
    let period_steps = SIM_IF.get_sim_steps(period as f64, unit)?;
    let high_t = period_steps / 2;
    let low_t = period_steps - high_t;
    if period_steps % 2 != 0 {
        tracing::warn!(
            "Clock period {}{} not dividable by 2. High time will be {} steps; low time will be {} steps.",
            period, unit, high_t, low_t
        );
    }
    loop {
        clk.set(0)?;
        Trigger::timer_steps(low_t).await;
        clk.set(1)?;
        Trigger::timer_steps(high_t).await;
    }
}
