use crate::error::{TbError, TbResult};
use crate::kernel;
use crate::signal::ObjectKind;

/// Handle to the simulator backing the current thread.
pub static SIM_IF: SimHandle = SimHandle;

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative delay when registering, absolute time when reported back.
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

/// Interface between the testbench and a simulator.
///
/// Everything above this trait (triggers, signals, agents) only talks to the simulator
/// through it. The in-process [`kernel`] is the backend shipped with this crate.
pub trait SimIf {
    fn set_value(&self, handle: usize, value: u64) -> TbResult<()>;
    fn get_value(&self, handle: usize) -> TbResult<u64>;
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize>;
    fn get_kind(&self, handle: usize) -> TbResult<ObjectKind>;
    fn get_full_name(&self, handle: usize) -> TbResult<String>;
    fn get_root_handle(&self) -> TbResult<usize>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&self, cb: SimCallback) -> TbResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()>;
    /// Ask the simulator to stop once the current callback returns.
    fn finish(&self);
    fn get_sim_time(&self, unit: &str) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        match time_scale(unit) {
            Ok(scale) => ldexp10(t, precision - scale),
            Err(_) => t,
        }
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> TbResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps % 1.0 == 0.0 && steps >= 0.0 {
            Ok(steps as u64)
        } else {
            Err(TbError::TimeRounding {
                time,
                unit: unit.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimHandle;

impl SimIf for SimHandle {
    fn set_value(&self, handle: usize, value: u64) -> TbResult<()> {
        kernel::with_kernel(|k| k.set_value(handle, value))
    }
    fn get_value(&self, handle: usize) -> TbResult<u64> {
        kernel::with_kernel(|k| k.get_value(handle))
    }
    fn get_handle_by_name(&self, name: &str) -> TbResult<usize> {
        kernel::with_kernel(|k| k.handle_by_name(name))
    }
    fn get_kind(&self, handle: usize) -> TbResult<ObjectKind> {
        kernel::with_kernel(|k| k.kind(handle))
    }
    fn get_full_name(&self, handle: usize) -> TbResult<String> {
        kernel::with_kernel(|k| k.full_name(handle))
    }
    fn get_root_handle(&self) -> TbResult<usize> {
        Ok(kernel::ROOT_HANDLE)
    }
    fn get_sim_time_steps(&self) -> u64 {
        kernel::with_kernel(|k| k.time())
    }
    fn get_sim_precision(&self) -> i8 {
        kernel::PRECISION
    }
    fn register_callback(&self, cb: SimCallback) -> TbResult<usize> {
        kernel::with_kernel(|k| k.register_callback(cb))
    }
    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()> {
        kernel::with_kernel(|k| k.cancel_callback(cb_hdl))
    }
    fn finish(&self) {
        kernel::with_kernel(|k| k.finish())
    }
}

/// Current simulation time in ns, for log records.
pub fn now_ns() -> f64 {
    SIM_IF.get_sim_time("ns")
}

fn time_scale(unit: &str) -> TbResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(TbError::TimeUnit(unit.to_string())),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}
