//! In-process discrete-event simulator.
//!
//! Signal writes are staged and committed at the end of a delta cycle, reads always see
//! committed values. Edges are detected on commit, so every task woken by a clock edge
//! samples the same pre-edge state no matter in which order the executor resumes them.
//!
//! Each thread owns its own kernel; [`Simulation::new`] resets it.

use intmap::IntMap;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::error::{TbError, TbResult};
use crate::executor;
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::SimCallback;
use crate::trigger::{self, EdgeKind};

pub(crate) const ROOT_HANDLE: usize = 0;
/// Simulation steps are picoseconds.
pub(crate) const PRECISION: i8 = -12;
const MAX_DELTAS: usize = 1000;

thread_local! {
    static KERNEL: RefCell<Kernel> = RefCell::new(Kernel::new("top"));
}

pub(crate) fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    KERNEL.with(|k| f(&mut k.borrow_mut()))
}

struct Object {
    name: String,
    kind: ObjectKind,
    value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    ReadOnly,
}

pub(crate) struct Kernel {
    time: u64,
    phase: Phase,
    objects: Vec<Object>,
    names: HashMap<String, usize>,
    staged: Vec<(usize, u64)>,
    callbacks: IntMap<SimCallback>,
    // signal handle -> callback handle
    watched: IntMap<usize>,
    // absolute time -> callback handle
    timers: BTreeMap<u64, usize>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    read_only_done_at: Option<u64>,
    next_cb: usize,
    finished: bool,
}

impl Kernel {
    fn new(root: &str) -> Self {
        let mut names = HashMap::new();
        names.insert(root.to_string(), ROOT_HANDLE);
        Kernel {
            time: 0,
            phase: Phase::Active,
            objects: vec![Object {
                name: root.to_string(),
                kind: ObjectKind::Hier,
                value: 0,
            }],
            names,
            staged: Vec::new(),
            callbacks: IntMap::new(),
            watched: IntMap::new(),
            timers: BTreeMap::new(),
            read_write: None,
            read_only: None,
            read_only_done_at: None,
            next_cb: 1,
            finished: false,
        }
    }

    fn add_signal(&mut self, name: &str, width: u32, init: u64) -> TbResult<usize> {
        if width == 0 || width > 64 {
            return Err(TbError::Config(format!("signal '{}' has unsupported width {}", name, width)));
        }
        let full_name = format!("{}.{}", self.objects[ROOT_HANDLE].name, name);
        if init > mask(width) {
            return Err(TbError::ValueOverflow { name: full_name, width, value: init });
        }
        let handle = self.objects.len();
        self.objects.push(Object {
            name: full_name.clone(),
            kind: ObjectKind::Vector(width),
            value: init,
        });
        self.names.insert(full_name, handle);
        Ok(handle)
    }

    fn object(&self, handle: usize) -> TbResult<&Object> {
        self.objects
            .get(handle)
            .ok_or_else(|| TbError::NoSuchObject(format!("<handle {}>", handle)))
    }

    pub(crate) fn set_value(&mut self, handle: usize, value: u64) -> TbResult<()> {
        let phase = self.phase;
        let obj = self.object(handle)?;
        let width = match obj.kind {
            ObjectKind::Vector(width) => width,
            ObjectKind::Hier => return Err(TbError::NotASignal(obj.name.clone())),
        };
        if phase == Phase::ReadOnly {
            return Err(TbError::ReadOnlyWrite(obj.name.clone()));
        }
        if value > mask(width) {
            return Err(TbError::ValueOverflow { name: obj.name.clone(), width, value });
        }
        self.staged.push((handle, value));
        Ok(())
    }

    pub(crate) fn get_value(&self, handle: usize) -> TbResult<u64> {
        let obj = self.object(handle)?;
        match obj.kind {
            ObjectKind::Vector(_) => Ok(obj.value),
            ObjectKind::Hier => Err(TbError::NotASignal(obj.name.clone())),
        }
    }

    pub(crate) fn handle_by_name(&self, name: &str) -> TbResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TbError::NoSuchObject(name.to_string()))
    }

    pub(crate) fn kind(&self, handle: usize) -> TbResult<ObjectKind> {
        Ok(self.object(handle)?.kind)
    }

    pub(crate) fn full_name(&self, handle: usize) -> TbResult<String> {
        Ok(self.object(handle)?.name.clone())
    }

    pub(crate) fn time(&self) -> u64 {
        self.time
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }

    pub(crate) fn register_callback(&mut self, cb: SimCallback) -> TbResult<usize> {
        let handle = self.next_cb;
        self.next_cb += 1;
        let cb = match cb {
            SimCallback::Time(delay) => {
                let abs_time = self.time + delay;
                self.timers.insert(abs_time, handle);
                SimCallback::Time(abs_time)
            }
            SimCallback::Edge(sig_hdl) => {
                self.object(sig_hdl)?;
                self.watched.insert(sig_hdl as u64, handle);
                cb
            }
            SimCallback::ReadWrite => {
                self.read_write = Some(handle);
                cb
            }
            SimCallback::ReadOnly => {
                self.read_only = Some(handle);
                cb
            }
        };
        self.callbacks.insert(handle as u64, cb);
        Ok(handle)
    }

    pub(crate) fn cancel_callback(&mut self, cb_hdl: usize) -> TbResult<()> {
        match self.callbacks.remove(cb_hdl as u64) {
            Some(SimCallback::Time(abs_time)) => {
                self.timers.remove(&abs_time);
            }
            Some(SimCallback::Edge(sig_hdl)) => {
                self.watched.remove(sig_hdl as u64);
            }
            Some(SimCallback::ReadWrite) => self.read_write = None,
            Some(SimCallback::ReadOnly) => self.read_only = None,
            None => return Err(TbError::NoSuchCallback(cb_hdl)),
        }
        Ok(())
    }

    /// Apply staged writes, returning the signals whose value changed.
    fn commit(&mut self) -> Vec<(usize, EdgeKind)> {
        let staged = std::mem::take(&mut self.staged);
        let mut before: Vec<(usize, u64)> = Vec::new();
        for (handle, value) in staged {
            if !before.iter().any(|(h, _)| *h == handle) {
                before.push((handle, self.objects[handle].value));
            }
            // last write in a delta wins
            self.objects[handle].value = value;
        }
        before
            .into_iter()
            .filter_map(|(handle, old)| {
                let obj = &self.objects[handle];
                if obj.value == old {
                    return None;
                }
                let edge = match obj.kind {
                    ObjectKind::Vector(1) if obj.value == 1 => EdgeKind::Rising,
                    ObjectKind::Vector(1) => EdgeKind::Falling,
                    _ => EdgeKind::Any,
                };
                Some((handle, edge))
            })
            .collect()
    }

    fn is_watched(&self, sig_hdl: usize) -> bool {
        self.watched.contains_key(sig_hdl as u64)
    }

    fn take_read_write(&mut self) -> bool {
        match self.read_write.take() {
            Some(handle) => {
                self.callbacks.remove(handle as u64);
                true
            }
            None => false,
        }
    }

    fn take_read_only(&mut self) -> bool {
        if self.read_only_done_at == Some(self.time) {
            // a read-only region runs once per time step
            return false;
        }
        match self.read_only.take() {
            Some(handle) => {
                self.callbacks.remove(handle as u64);
                self.read_only_done_at = Some(self.time);
                true
            }
            None => false,
        }
    }

    fn next_timer(&self) -> Option<u64> {
        self.timers.keys().next().copied()
    }

    fn advance_to(&mut self, time: u64) {
        self.time = time;
        if let Some(handle) = self.timers.remove(&time) {
            self.callbacks.remove(handle as u64);
        }
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Why [`Simulation::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// `finish()` was requested.
    Finished,
    /// No callback is registered anymore.
    Idle,
    /// The next event lies beyond the time limit; carries the current time in steps.
    Limit(u64),
}

/// Owner of the current thread's simulation.
#[derive(Debug)]
pub struct Simulation {
    _private: (),
}

impl Simulation {
    /// Start a fresh simulation with a root object named `root`, dropping all state
    /// (signals, callbacks, pending tasks) of a previous one on this thread.
    pub fn new(root: &str) -> Self {
        executor::clear_ready_queue();
        trigger::reset();
        KERNEL.with(|k| *k.borrow_mut() = Kernel::new(root));
        Simulation { _private: () }
    }

    pub fn add_signal(&self, name: &str, width: u32, init: u64) -> TbResult<SimObject> {
        let handle = with_kernel(|k| k.add_signal(name, width, init))?;
        SimObject::from_handle(handle)
    }

    pub fn root(&self) -> TbResult<SimObject> {
        SimObject::get_root()
    }

    /// Run until finished, idle, or the next event lies beyond `limit_steps`.
    pub fn run(&self, limit_steps: Option<u64>) -> TbResult<RunEnd> {
        executor::run_once();
        loop {
            self.settle()?;
            if finished() {
                return Ok(RunEnd::Finished);
            }
            if with_kernel(|k| k.take_read_only()) {
                with_kernel(|k| k.phase = Phase::ReadOnly);
                trigger::react(SimCallback::ReadOnly, None);
                with_kernel(|k| k.phase = Phase::Active);
                continue;
            }
            let (now, next) = with_kernel(|k| (k.time, k.next_timer()));
            match next {
                None => return Ok(RunEnd::Idle),
                Some(t) if limit_steps.map_or(false, |limit| t > limit) => {
                    return Ok(RunEnd::Limit(now));
                }
                Some(t) => {
                    with_kernel(|k| k.advance_to(t));
                    trigger::react(SimCallback::Time(t), None);
                }
            }
        }
    }

    fn settle(&self) -> TbResult<()> {
        for _ in 0..MAX_DELTAS {
            if finished() {
                return Ok(());
            }
            let changes = with_kernel(|k| k.commit());
            if !changes.is_empty() {
                for (sig_hdl, edge) in changes {
                    if with_kernel(|k| k.is_watched(sig_hdl)) {
                        trigger::react(SimCallback::Edge(sig_hdl), Some(edge));
                    }
                }
                continue;
            }
            if with_kernel(|k| k.take_read_write()) {
                trigger::react(SimCallback::ReadWrite, None);
                continue;
            }
            return Ok(());
        }
        Err(TbError::DeltaOverflow(with_kernel(|k| k.time)))
    }
}

fn finished() -> bool {
    with_kernel(|k| k.finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Task;
    use crate::tb_obj::TbObj;
    use crate::trigger::Trigger;

    #[test]
    fn writes_become_visible_after_the_delta() {
        let sim = Simulation::new("top");
        let sig = sim.add_signal("sig", 4, 0).unwrap();
        let seen = TbObj::new(Vec::new());
        let log = seen.clone();
        Task::fork(async move {
            sig.set(7)?;
            log.with_mut(|v| v.push(sig.u64().unwrap()));
            Trigger::read_write().await;
            log.with_mut(|v| v.push(sig.u64().unwrap()));
            Ok(())
        });
        sim.run(None).unwrap();
        assert_eq!(seen.snapshot(), vec![0, 7]);
    }

    #[test]
    fn edge_waiters_sample_pre_edge_values() {
        // a flop and a sampler woken by the same edge must not see each other's writes
        let sim = Simulation::new("top");
        let clk = sim.add_signal("clk", 1, 0).unwrap();
        let q = sim.add_signal("q", 8, 1).unwrap();
        let sampled = TbObj::new(Vec::new());
        let log = sampled.clone();
        Task::fork(async move {
            loop {
                clk.rising_edge().await;
                q.set(q.u64()? + 1)?;
            }
        });
        Task::fork(async move {
            for _ in 0..3 {
                clk.rising_edge().await;
                log.with_mut(|v| v.push(q.u64().unwrap()));
            }
            Ok(())
        });
        Task::fork(async move {
            for _ in 0..3 {
                Trigger::timer_steps(5).await;
                clk.set(1)?;
                Trigger::timer_steps(5).await;
                clk.set(0)?;
            }
            Ok(())
        });
        sim.run(None).unwrap();
        assert_eq!(sampled.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn read_only_phase_rejects_writes() {
        let sim = Simulation::new("top");
        let sig = sim.add_signal("sig", 1, 0).unwrap();
        let result = TbObj::new(None);
        let out = result.clone();
        Task::fork(async move {
            Trigger::read_only().await;
            out.with_mut(|r| *r = Some(sig.set(1)));
            Ok(())
        });
        sim.run(None).unwrap();
        assert!(matches!(
            result.get().take(),
            Some(Err(TbError::ReadOnlyWrite(_)))
        ));
    }

    #[test]
    fn rejects_values_wider_than_the_signal() {
        let sim = Simulation::new("top");
        let sig = sim.add_signal("nibble", 4, 0).unwrap();
        assert!(matches!(sig.set(16), Err(TbError::ValueOverflow { .. })));
        assert!(sig.set(15).is_ok());
    }

    #[test]
    fn stops_at_the_time_limit() {
        let sim = Simulation::new("top");
        Task::fork(async {
            loop {
                Trigger::timer_steps(10).await;
            }
        });
        assert_eq!(sim.run(Some(95)).unwrap(), RunEnd::Limit(90));
    }

    #[test]
    fn combinational_loop_overflows_deltas() {
        let sim = Simulation::new("top");
        let sig = sim.add_signal("osc", 1, 0).unwrap();
        Task::fork(async move {
            loop {
                sig.set(1 - sig.u64()?)?;
                sig.edge().await;
            }
        });
        assert!(matches!(sim.run(None), Err(TbError::DeltaOverflow(0))));
    }
}
