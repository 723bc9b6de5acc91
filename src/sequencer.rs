use futures::StreamExt;
use futures_channel::{mpsc, oneshot};

use crate::error::{TbError, TbResult};
use crate::transaction::AluTxn;

type SeqItem = (AluTxn, oneshot::Sender<()>);

/// Create the producer and consumer ends of a stimulus queue.
pub fn sequencer() -> (Sequencer, SeqItemPort) {
    let (tx, rx) = mpsc::unbounded();
    (Sequencer { tx }, SeqItemPort { rx, current: None })
}

/// Producer end: sequences hand items to the driver through it.
#[derive(Clone, Debug)]
pub struct Sequencer {
    tx: mpsc::UnboundedSender<SeqItem>,
}

impl Sequencer {
    /// Queue `item` and wait until the driver reports it done.
    pub async fn execute(&self, item: AluTxn) -> TbResult {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .unbounded_send((item, done_tx))
            .map_err(|_| TbError::Cancelled)?;
        done_rx.await.map_err(|_| TbError::Cancelled)
    }
}

/// Consumer end, owned by the driver.
#[derive(Debug)]
pub struct SeqItemPort {
    rx: mpsc::UnboundedReceiver<SeqItem>,
    current: Option<oneshot::Sender<()>>,
}

impl SeqItemPort {
    /// Blocking FIFO pull. `None` once every producer is gone.
    pub async fn get_next_item(&mut self) -> Option<AluTxn> {
        let (item, done) = self.rx.next().await?;
        if self.current.replace(done).is_some() {
            tracing::warn!("get_next_item() called before item_done()");
        }
        Some(item)
    }

    /// Release the producer of the current item.
    pub fn item_done(&mut self) {
        match self.current.take() {
            Some(done) => {
                let _ = done.send(());
            }
            None => tracing::warn!("item_done() without an item in progress"),
        }
    }
}
