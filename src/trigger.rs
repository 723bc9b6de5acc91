use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::error::TbResult;
use crate::{
    signal::SimObject,
    sim_if::{SimCallback, SimIf, SIM_IF},
};

// IntMap specializes on u64 keys and doesn't actually need to calculate a hash.
// EDGES is keyed by signal handle, TIMERS by absolute callback time.
struct TriggerTable {
    edges: IntMap<CallbackHandles>,
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

impl TriggerTable {
    fn new() -> Self {
        TriggerTable {
            edges: IntMap::new(),
            timers: IntMap::new(),
            read_only: CallbackHandles::default(),
            read_write: CallbackHandles::default(),
        }
    }
}

thread_local! {
    static TRIGGERS: RefCell<TriggerTable> = RefCell::new(TriggerTable::new());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

pub(crate) fn cancel_all_triggers() {
    let handles: Vec<usize> = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut handles = Vec::new();
        handles.extend(std::mem::take(&mut t.read_only).handle);
        handles.extend(std::mem::take(&mut t.read_write).handle);
        for (_, cb) in t.timers.drain() {
            handles.extend(cb.handle);
        }
        for (_, cb) in t.edges.drain() {
            handles.extend(cb.handle);
        }
        handles
    });
    for handle in handles {
        let _ = SIM_IF.cancel_callback(handle);
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    fired: Arc<AtomicBool>,
    // If trigger is an edge, react needs to know if it waits for a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
}

impl TrigShared {
    fn fire(self) {
        self.fired.store(true, Ordering::Release);
        self.waker.wake();
    }
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// A single-use future completing on the next matching simulator callback.
#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    // set by react() once the callback fired; None until first polled
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    /// Panics if `time` can't be expressed in simulator steps; use [`Trigger::timer_steps`]
    /// with precomputed steps in hot loops.
    pub fn timer(time: u64, unit: &str) -> Self {
        match SIM_IF.get_sim_steps(time as f64, unit) {
            Ok(steps) => Trigger::timer_steps(steps),
            Err(e) => panic!("Trigger::timer({}, {}): {}", time, unit, e),
        }
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }

    fn register(&self, shared: TrigShared) -> TbResult<()> {
        match self.kind {
            TrigKind::ReadWrite => {
                let needs_cb = TRIGGERS.with(|t| {
                    let mut t = t.borrow_mut();
                    t.read_write.callbacks.push_back(shared);
                    t.read_write.handle.is_none()
                });
                if needs_cb {
                    let cb_hdl = SIM_IF.register_callback(SimCallback::ReadWrite)?;
                    TRIGGERS.with(|t| t.borrow_mut().read_write.handle = Some(cb_hdl));
                }
            }
            TrigKind::ReadOnly => {
                let needs_cb = TRIGGERS.with(|t| {
                    let mut t = t.borrow_mut();
                    t.read_only.callbacks.push_back(shared);
                    t.read_only.handle.is_none()
                });
                if needs_cb {
                    let cb_hdl = SIM_IF.register_callback(SimCallback::ReadOnly)?;
                    TRIGGERS.with(|t| t.borrow_mut().read_only.handle = Some(cb_hdl));
                }
            }
            TrigKind::Timer(t) => {
                // the simulator reports back absolute time, not the delay
                let abs_time = t + SIM_IF.get_sim_time_steps();
                let appended = TRIGGERS.with(|tt| {
                    match tt.borrow_mut().timers.get_mut(abs_time) {
                        Some(callbacks) => {
                            callbacks.callbacks.push_back(shared.clone());
                            true
                        }
                        None => false,
                    }
                });
                if !appended {
                    let handle = SIM_IF.register_callback(SimCallback::Time(t))?;
                    let callback = CallbackHandles {
                        handle: Some(handle),
                        callbacks: VecDeque::from([shared]),
                    };
                    TRIGGERS.with(|tt| tt.borrow_mut().timers.insert(abs_time, callback));
                }
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                let shared = TrigShared { edge_kind, ..shared };
                let appended = TRIGGERS.with(|t| {
                    match t.borrow_mut().edges.get_mut(sig_hdl as u64) {
                        Some(callbacks) => {
                            callbacks.callbacks.push_back(shared.clone());
                            true
                        }
                        None => false,
                    }
                });
                if !appended {
                    let handle = SIM_IF.register_callback(SimCallback::Edge(sig_hdl))?;
                    let callback = CallbackHandles {
                        handle: Some(handle),
                        callbacks: VecDeque::from([shared]),
                    };
                    TRIGGERS.with(|t| t.borrow_mut().edges.insert(sig_hdl as u64, callback));
                }
            }
        }
        Ok(())
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // polled again: only complete once react() has fired our callback
            return if fired.load(Ordering::Acquire) {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        let shared = TrigShared {
            waker: cx.waker().clone(),
            fired: fired.clone(),
            edge_kind: EdgeKind::Any,
        };
        if let Err(e) = self.register(shared) {
            panic!("Could not register {:?}: {}", self.kind, e);
        }
        self.fired = Some(fired);
        Poll::Pending
    }
}

/// Called by the simulator for every registered callback.
#[inline]
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    let vec_wake: Option<VecDeque<TrigShared>> = match cb {
        SimCallback::ReadWrite => TRIGGERS.with(|t| {
            let mut t = t.borrow_mut();
            t.read_write.handle = None; // callback is done
            Some(std::mem::take(&mut t.read_write.callbacks))
        }),
        SimCallback::ReadOnly => TRIGGERS.with(|t| {
            let mut t = t.borrow_mut();
            t.read_only.handle = None;
            Some(std::mem::take(&mut t.read_only.callbacks))
        }),
        SimCallback::Time(t) => {
            TRIGGERS.with(|tt| tt.borrow_mut().timers.remove(t)).map(|cb| cb.callbacks)
        }
        SimCallback::Edge(sig_hdl) => react_edge(sig_hdl, edge.unwrap_or(EdgeKind::Any)),
    };

    match vec_wake {
        Some(vec_wake) => {
            for shared in vec_wake {
                shared.fire();
            }
            // execute woken tasks
            executor::run_once();
        }
        None => tracing::warn!(?cb, "callback without waiting triggers"),
    }
}

fn react_edge(sig_hdl: usize, edge: EdgeKind) -> Option<VecDeque<TrigShared>> {
    let mut callbacks = TRIGGERS.with(|t| t.borrow_mut().edges.remove(sig_hdl as u64))?;
    let mut vec_resched: VecDeque<TrigShared> = VecDeque::new();
    let mut vec_wake: VecDeque<TrigShared> = VecDeque::new();
    for trig in callbacks.callbacks.drain(..) {
        if edge == EdgeKind::Any || trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge {
            vec_wake.push_back(trig);
        } else {
            vec_resched.push_back(trig);
        }
    }
    if vec_resched.is_empty() {
        // no waiters left on this signal
        if let Some(handle) = callbacks.handle {
            let _ = SIM_IF.cancel_callback(handle);
        }
    } else {
        callbacks.callbacks = vec_resched;
        TRIGGERS.with(|t| t.borrow_mut().edges.insert(sig_hdl as u64, callbacks));
    }
    // waiters for the other edge direction only: nothing to wake, but not stray either
    Some(vec_wake)
}

pub(crate) fn reset() {
    TRIGGERS.with(|t| *t.borrow_mut() = TriggerTable::new());
}
