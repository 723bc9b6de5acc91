use crate::error::TbResult;
use crate::signal::SimObject;

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
    Ok(())
}

pub async fn falling_cycles(signal: SimObject, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        signal.falling_edge().await;
    }
    Ok(())
}
