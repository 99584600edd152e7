// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Task handle
//!
//! [`TaskRef`] is the caller-side handle of a task. It is cheap to clone and
//! can be shared across threads: any number of callers submit work through it
//! while a single worker executes that work in order.
//!
//! ## Submission paths
//!
//! | Method             | Blocks caller | Result to caller            |
//! |--------------------|---------------|-----------------------------|
//! | `submit`           | no            | `bool` (accepted)           |
//! | `submit_front`     | no            | `bool` (accepted)           |
//! | `dispatch`         | no            | `bool` (accepted)           |
//! | `call`             | yes (async)   | `Result<H::Output, Error>`  |
//!
//! A finished task rejects every submission immediately, so callers can treat
//! it the same way as a full one.
//!

use crate::{
    Error, Handler,
    config::TaskConfig,
    mailbox::{Mailbox, Position},
    pool::PoolStats,
    request::{Command, Request},
};

use tokio::sync::{oneshot, watch};

use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

/// Observable lifecycle state of a task.
///
/// States only move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    /// Constructed, waiting for the start control message.
    Created,
    /// `on_init` and `on_start` are running.
    Initializing,
    /// Processing requests.
    Running,
    /// The loop has ended; stop hooks are running. Submissions are refused.
    Stopping,
    /// `on_release` has run. Terminal.
    Released,
}

/// State shared by every handle of a task and its runner.
pub(crate) struct Shared<H: Handler> {
    pub(crate) name: String,
    pub(crate) mailbox: Mailbox<H>,
    pub(crate) state: watch::Sender<TaskState>,
    pub(crate) token: CancellationToken,
    pub(crate) worker: OnceLock<tokio::task::Id>,
}

impl<H: Handler> Shared<H> {
    pub(crate) fn new(config: TaskConfig) -> Self {
        let (state, _) = watch::channel(TaskState::Created);
        Self {
            mailbox: Mailbox::new(&config),
            name: config.name,
            state,
            token: CancellationToken::new(),
            worker: OnceLock::new(),
        }
    }

    pub(crate) fn publish(&self, state: TaskState) {
        self.state.send_if_modified(|current| {
            if *current < state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Closes the mailbox, wakes pending callers and publishes `Released`.
    /// Safe to call more than once.
    pub(crate) fn finish(&self) {
        let dropped = self.mailbox.close();
        if dropped > 0 {
            debug!(
                "Task {} dropped {} requests left after release.",
                self.name, dropped
            );
        }
        self.publish(TaskState::Released);
    }
}

/// Handle to a running task.
pub struct TaskRef<H: Handler> {
    shared: Arc<Shared<H>>,
}

impl<H: Handler> TaskRef<H> {
    pub(crate) fn new(shared: Arc<Shared<H>>) -> Self {
        debug!("Creating new task reference.");
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Released
    }

    /// True when called from the task's own worker.
    pub fn is_worker(&self) -> bool {
        match (tokio::task::try_id(), self.shared.worker.get()) {
            (Some(current), Some(worker)) => current == *worker,
            _ => false,
        }
    }

    /// Number of queued commands, control messages included.
    pub fn pending(&self) -> usize {
        self.shared.mailbox.pending()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.shared.mailbox.pool_stats()
    }

    /// Enqueues the start control message. The worker passes the arguments
    /// to [`Handler::on_init`]. Only the first call succeeds.
    pub fn init(&self, arg1: i32, arg2: i32, payload: Option<H::Payload>) -> bool {
        let accepted = self.shared.mailbox.post_start(arg1, arg2, payload);
        if !accepted {
            warn!(
                "Task {} was already initialized or has finished.",
                self.shared.name
            );
        }
        accepted
    }

    /// Enqueues a fire-and-forget request at the tail.
    pub fn submit(
        &self,
        what: i32,
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    ) -> bool {
        let request = Request::new(what, arg1, arg2, payload);
        self.post(Command::Request(request), Position::Back)
    }

    /// Enqueues a fire-and-forget request at the head, ahead of everything
    /// already queued.
    pub fn submit_front(
        &self,
        what: i32,
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    ) -> bool {
        let request = Request::new(what, arg1, arg2, payload);
        self.post(Command::Request(request), Position::Front)
    }

    /// Runs `f` on the worker, in queue order.
    pub fn dispatch<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Command::Run(Box::new(f)), Position::Back)
    }

    fn post(&self, command: Command<H>, position: Position) -> bool {
        debug!("Posting {:?} to task {}.", &command, self.shared.name);
        let accepted = self.shared.mailbox.post(command, position);
        if !accepted {
            debug!("Task {} rejected the request.", self.shared.name);
        }
        accepted
    }

    /// Submits a request and waits for the handler's result.
    ///
    /// Returns `Error::Unserviced` if the task stops before the request runs,
    /// and `Error::Reentrant` when invoked from the worker itself; handlers
    /// use [`TaskContext::call`](crate::TaskContext::call) for that.
    pub async fn call(
        &self,
        what: i32,
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    ) -> Result<H::Output, Error> {
        if self.is_worker() {
            warn!(
                "Task {} can not wait on itself, call rejected.",
                self.shared.name
            );
            return Err(Error::Reentrant);
        }
        let (reply, mut receiver) = oneshot::channel();
        let request = Request::new(what, arg1, arg2, payload);
        if !self.post(Command::Call { request, reply }, Position::Back) {
            return Err(Error::Rejected(self.shared.name.clone()));
        }

        let mut state = self.shared.state.subscribe();
        tokio::select! {
            biased;
            result = &mut receiver => {
                result.unwrap_or(Err(Error::Unserviced))
            }
            _ = state.wait_for(|state| *state == TaskState::Released) => {
                receiver.try_recv().unwrap_or(Err(Error::Unserviced))
            }
        }
    }

    /// Removes every queued request with the given `what`. Returns how many
    /// were removed; a request already taken by the worker is not affected.
    pub fn cancel(&self, what: i32) -> usize {
        self.shared.mailbox.remove_if(|request| request.what == what)
    }

    /// Removes every queued request matching `predicate`.
    pub fn cancel_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Request<H::Payload>) -> bool,
    {
        self.shared.mailbox.remove_if(predicate)
    }

    /// Waits until the task has finished starting up, for at most `timeout`.
    /// Returns true if the task is running.
    pub async fn await_ready(&self, timeout: Duration) -> bool {
        let mut state = self.shared.state.subscribe();
        let _ = tokio::time::timeout(
            timeout,
            state.wait_for(|state| *state >= TaskState::Running),
        )
        .await;
        self.is_running()
    }

    /// Stops the task and waits until it is released.
    ///
    /// Pending requests are dropped. With `interrupt` the in-flight request is
    /// abandoned and the stop hooks are skipped. Called from the worker it
    /// only signals, since the worker can not wait for itself.
    pub async fn shutdown(&self, interrupt: bool) {
        self.shutdown_nowait(interrupt);
        if self.is_worker() {
            return;
        }
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(|state| *state == TaskState::Released).await;
        debug!("Task {} shut down.", self.shared.name);
    }

    /// Signals the task to stop without waiting.
    pub fn shutdown_nowait(&self, interrupt: bool) {
        if let Some(dropped) = self.shared.mailbox.post_quit() {
            debug!(
                "Task {} quit requested, {} pending requests dropped.",
                self.shared.name, dropped
            );
        }
        if interrupt {
            debug!("Interrupting task {}.", self.shared.name);
            self.shared.token.cancel();
        }
    }
}

impl<H: Handler> Clone for TaskRef<H> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<H: Handler> std::fmt::Debug for TaskRef<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRef")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
