//! Serialized executor: one worker task owning a piece of state.
//!
//! Tasks are closures over `&mut S` queued on an unbounded channel and run by
//! a single spawned worker in submission order, so the state never needs a
//! lock. Submitters never wait: [`Executor::schedule`] returns as soon as the
//! task is queued. Tasks have no error channel back to the submitter and must
//! log their own failures; a panicking task is caught and logged and the
//! worker moves on to the next one.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Task<S>),
    Shutdown,
}

/// Scheduling errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The executor was shut down and accepts no more tasks
    #[error("executor is shut down")]
    Closed,
}

/// Handle to a single-worker task queue owning a value of type `S`
pub struct Executor<S> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Message<S>>,
    closed: Arc<AtomicBool>,
}

impl<S> Clone for Executor<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<S> Executor<S> {
    /// Whether [`Executor::shutdown`] was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<S: Send + 'static> Executor<S> {
    /// Spawn the worker owning `state` on the current tokio runtime
    pub fn new(name: &'static str, state: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(name, state, rx));
        Self {
            name,
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue `task` behind every task scheduled so far
    pub fn schedule<F>(&self, task: F) -> Result<(), ScheduleError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.is_closed() {
            return Err(ScheduleError::Closed);
        }
        self.tx
            .send(Message::Run(Box::new(task)))
            .map_err(|_| ScheduleError::Closed)
    }

    /// Run `f` on the worker and wait for its result
    pub async fn query<F, R>(&self, f: F) -> Result<R, ScheduleError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.schedule(move |state| {
            let _ = reply_tx.send(f(state));
        })?;
        reply_rx.await.map_err(|_| ScheduleError::Closed)
    }

    /// Wait until every task scheduled before this call has run
    pub async fn flush(&self) -> Result<(), ScheduleError> {
        self.query(|_| ()).await
    }

    /// Stop accepting tasks; queued tasks still run, then the worker exits
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Message::Shutdown);
    }
}

async fn run_worker<S>(name: &'static str, mut state: S, mut rx: mpsc::UnboundedReceiver<Message<S>>) {
    debug!("Executor {} started", name);
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run(task) => run_task(name, &mut state, task),
            Message::Shutdown => break,
        }
    }

    // A submitter that checked `closed` just before shutdown may have queued
    // behind the Shutdown message; once closed, later sends fail instead.
    rx.close();
    while let Some(message) = rx.recv().await {
        if let Message::Run(task) = message {
            run_task(name, &mut state, task);
        }
    }
    debug!("Executor {} stopped", name);
}

fn run_task<S>(name: &'static str, state: &mut S, task: Task<S>) {
    if catch_unwind(AssertUnwindSafe(|| task(state))).is_err() {
        error!("Executor {} task panicked, continuing with next task", name);
    }
}
