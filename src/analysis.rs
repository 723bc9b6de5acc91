//! Monitor-to-subscriber plumbing.
//!
//! A [`Mailbox`] holds at most one item: the monitor publishes once per request/response
//! pair and the subscriber drains the slot in the delta it is woken. An overwrite is logged.
//! A deeper queue would let a new request be observed before the previous one is checked,
//! which only a pipelined protocol could allow.

use crate::event::Event;
use crate::tb_obj::TbObj;

/// Single-slot rendezvous between a publisher and one consumer.
pub struct Mailbox<T> {
    slot: TbObj<Option<T>>,
    event: Event,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            event: self.event.clone(),
        }
    }
}

impl<T: Send + 'static> Mailbox<T> {
    pub fn new(name: &str) -> Self {
        Self {
            slot: TbObj::new(None),
            event: Event::new(name),
        }
    }

    pub fn write(&self, item: T) {
        if self.slot.with_mut(|s| s.replace(item)).is_some() {
            tracing::warn!(
                mailbox = self.event.name(),
                "previous item was not consumed and has been overwritten"
            );
        }
        self.event.set();
    }

    pub async fn recv(&self) -> T {
        loop {
            self.event.wait().await;
            let item = self.slot.with_mut(|s| s.take());
            self.event.clear();
            if let Some(item) = item {
                return item;
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.slot.with(|s| s.is_some())
    }
}

/// Broadcasts every written item to all connected mailboxes.
pub struct AnalysisPort<T> {
    name: String,
    exports: Vec<Mailbox<T>>,
}

impl<T: Clone + Send + 'static> AnalysisPort<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exports: Vec::new(),
        }
    }

    pub fn connect(&mut self, export: Mailbox<T>) {
        self.exports.push(export);
    }

    pub fn write(&self, item: T) {
        if self.exports.is_empty() {
            tracing::debug!(port = %self.name, "write to unconnected analysis port");
        }
        for export in &self.exports {
            export.write(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{run_once, Task};
    use crate::kernel::Simulation;

    #[test]
    fn port_delivers_to_every_subscriber() {
        Simulation::new("top");
        let a = Mailbox::new("a");
        let b = Mailbox::new("b");
        let mut port = AnalysisPort::new("ap");
        port.connect(a.clone());
        port.connect(b.clone());
        let got = TbObj::new(Vec::new());
        for mb in [a, b] {
            let got = got.clone();
            Task::fork(async move {
                let item: u32 = mb.recv().await;
                got.with_mut(|v| v.push(item));
                Ok(())
            });
        }
        run_once();
        port.write(7);
        run_once();
        assert_eq!(got.snapshot(), vec![7, 7]);
    }

    #[test]
    fn unconsumed_item_is_overwritten() {
        Simulation::new("top");
        let mb = Mailbox::new("sb");
        mb.write(1u32);
        mb.write(2u32);
        assert!(mb.is_full());
        let got = TbObj::new(None);
        let out = got.clone();
        let rx = mb.clone();
        Task::fork(async move {
            let item = rx.recv().await;
            out.with_mut(|g| *g = Some(item));
            Ok(())
        });
        run_once();
        assert_eq!(got.snapshot(), Some(2));
        assert!(!mb.is_full());
    }
}
