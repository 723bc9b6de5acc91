use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::tb_obj::TbObj;

#[derive(Default)]
struct EventInner {
    set: bool,
    waiters: Vec<Waker>,
}

/// Broadcast flag: `set()` releases every current and future waiter until `clear()`.
#[derive(Clone)]
pub struct Event {
    name: String,
    inner: TbObj<EventInner>,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Event {
            name: name.to_string(),
            inner: TbObj::new(EventInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self) {
        let waiters = self.inner.with_mut(|e| {
            e.set = true;
            std::mem::take(&mut e.waiters)
        });
        for waker in waiters {
            waker.wake();
        }
    }

    pub fn clear(&self) {
        self.inner.with_mut(|e| e.set = false);
    }

    pub fn is_set(&self) -> bool {
        self.inner.with(|e| e.set)
    }

    pub fn wait(&self) -> EventWait {
        EventWait {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("set", &self.is_set())
            .finish()
    }
}

pub struct EventWait {
    inner: TbObj<EventInner>,
}

impl Future for EventWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.inner.with_mut(|e| {
            if e.set {
                Poll::Ready(())
            } else {
                if !e.waiters.iter().any(|w| w.will_wake(cx.waker())) {
                    e.waiters.push(cx.waker().clone());
                }
                Poll::Pending
            }
        })
    }
}
