use futures::{future::{BoxFuture, FutureExt}, task::{waker_ref, ArcWake, Context, Poll}};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{future::Future, pin::Pin, sync::{Arc, Mutex}};

use crate::error::{TbError, TbResult};

thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
}

pub fn schedule_task(task: Arc<Task>) {
    // a task sits in the queue at most once, however often it is woken
    if task.queued.swap(true, Ordering::AcqRel) {
        return;
    }
    READY_QUEUE.with(|q| {
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        while let Ok(task) = q.remove() {
            task.queued.store(false, Ordering::Release);
        }
    });
}

/// Poll every ready task until no task is ready anymore.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    task.queued.store(false, Ordering::Release);
    if *lock(&task.state) == TaskState::Cancelled {
        // do not execute if state is cancelled, will be dropped once all references disappear
        return;
    }

    // the slot is released while polling, so a task may cancel itself
    let fut = lock(&task.future).take();
    if let Some(mut fut) = fut {
        let waker = waker_ref(&task);
        let context = &mut Context::from_waker(&waker);
        match fut.as_mut().poll(context) {
            Poll::Pending => {
                if *lock(&task.state) != TaskState::Cancelled {
                    *lock(&task.future) = Some(fut);
                }
            }
            Poll::Ready(result) => {
                *lock(&task.state) = TaskState::Done;
                if let Some(tx) = lock(&task.join_tx).take() {
                    let _ = tx.send(result);
                }
            }
        }
    } else {
        // woken after completion by a stale waker
        tracing::trace!(task = %task.name, "ignoring wake of finished task");
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TbResult>>>,
    state: Mutex<TaskState>,
    queued: AtomicBool,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<TbResult>>>,
}

impl Task {
    pub fn fork(future: impl Future<Output = TbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future, "forked")
    }
    pub fn spawn_from_future(
        future: impl Future<Output = TbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        schedule_task(task);
        join_handle
    }
    fn new(fut: BoxFuture<'static, TbResult>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<TbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            queued: AtomicBool::new(false),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            join_rx: rx,
            awaited_task: Some(task.clone()),
        };
        (task, join_handle)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn cancel(&self) {
        // set state to Cancelled, the executor drops the Task without polling it again
        *lock(&self.state) = TaskState::Cancelled;
        lock(&self.future).take();
        lock(&self.join_tx).take();
    }
    pub fn is_done(&self) -> bool {
        *lock(&self.state) == TaskState::Done
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<TbResult>,
}

impl JoinHandle {
    pub fn get_task(&self) -> Option<&Arc<Task>> {
        self.awaited_task.as_ref()
    }
    pub fn cancel(mut self) {
        // take awaited_task, cancel it and drop its reference
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }
}

impl Future for JoinHandle {
    type Output = TbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TbError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
