// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Task runner
//!
//! The `TaskRunner` is the worker side of a task. It owns the handler and
//! drives it through the lifecycle
//! `Created → Initializing → Running → Stopping → Released`, pulling commands
//! from the mailbox one at a time.
//!
//! ## Failure handling
//!
//! - Request errors go to [`Handler::on_error`]; `true` ends the loop.
//! - `Error::Break` always ends the loop.
//! - `on_init` / `on_start` errors are fatal and skip `Running` entirely.
//! - `on_stop` and `on_release` errors are logged only.
//! - Panics are caught and treated as `Error::Panicked`.
//! - Interruption (cancelled token) abandons the in-flight request and skips
//!   `on_before_stop` / `on_stop`, but `on_release` still runs.
//!
//! Dropping a runner before it reaches `Released` (for instance because its
//! task was aborted) still closes the mailbox and publishes `Released`, so no
//! caller is left waiting.
//!

use crate::{
    Error, Handler,
    config::TaskConfig,
    context::TaskContext,
    request::{Command, Request, Slot},
    task::{Shared, TaskRef, TaskState},
};

use futures::FutureExt;

use tokio::select;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Break,
    Interrupted,
}

/// Polls `future`, turning a panic into `Error::Panicked`.
pub(crate) async fn guarded<F, T>(future: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(Error::from_panic(panic)))
}

/// Executes one request on the handler.
pub(crate) async fn execute<H: Handler>(
    handler: &mut H,
    ctx: &mut TaskContext<H>,
    request: Request<H::Payload>,
) -> Result<H::Output, Error> {
    guarded(handler.process_request(ctx, request)).await
}

pub struct TaskRunner<H: Handler> {
    handler: H,
    shared: Arc<Shared<H>>,
    state: TaskState,
    interrupted: bool,
}

impl<H: Handler> TaskRunner<H> {
    /// Builds a runner and its handle. Nothing runs until
    /// [`run`](TaskRunner::run) is polled.
    pub fn create(handler: H, config: TaskConfig) -> (Self, TaskRef<H>) {
        debug!("Creating new task runner.");
        let shared = Arc::new(Shared::new(config));
        let task = TaskRef::new(shared.clone());
        let runner = TaskRunner {
            handler,
            shared,
            state: TaskState::Created,
            interrupted: false,
        };
        (runner, task)
    }

    /// Worker body. Poll it on its own tokio task: the task id is what
    /// identifies re-entrant calls.
    pub async fn run(mut self) {
        let name = self.shared.name.clone();
        debug!("Initializing task {} runner.", name);
        if let Some(id) = tokio::task::try_id() {
            let _ = self.shared.worker.set(id);
        }

        let token = self.shared.token.clone();
        let mut ctx = TaskContext::new(TaskRef::new(self.shared.clone()));
        let mut start = None;

        loop {
            match self.state {
                // State: CREATED
                TaskState::Created => {
                    debug!("Task {} is created.", name);
                    match self.next_control(&token).await {
                        Some(Command::Start {
                            arg1,
                            arg2,
                            payload,
                        }) => {
                            start = Some((arg1, arg2, payload));
                            self.transition(TaskState::Initializing);
                        }
                        Some(_) => {
                            debug!("Task {} quit before starting.", name);
                            self.transition(TaskState::Released);
                        }
                        None => {
                            debug!("Task {} interrupted before starting.", name);
                            self.interrupted = true;
                            self.transition(TaskState::Released);
                        }
                    }
                }
                // State: INITIALIZING
                TaskState::Initializing => {
                    debug!("Task {} is initializing.", name);
                    let (arg1, arg2, payload) = start.take().unwrap_or((0, 0, None));
                    match self.initialize(&mut ctx, arg1, arg2, payload).await {
                        Ok(()) => {
                            debug!("Task {} has started successfully.", name);
                            self.transition(TaskState::Running);
                        }
                        Err(err) => {
                            error!("Task {} failed to start: {}", name, err);
                            self.transition(TaskState::Stopping);
                        }
                    }
                }
                // State: RUNNING
                TaskState::Running => {
                    debug!("Task {} is running.", name);
                    self.process(&mut ctx, &token).await;
                    self.transition(TaskState::Stopping);
                }
                // State: STOPPING
                TaskState::Stopping => {
                    debug!("Task {} is stopping.", name);
                    let dropped = self.shared.mailbox.close();
                    if dropped > 0 {
                        debug!("Task {} dropped {} pending requests.", name, dropped);
                    }
                    if self.interrupted || token.is_cancelled() {
                        debug!("Task {} was interrupted, skipping stop hooks.", name);
                    } else {
                        self.stop(&mut ctx).await;
                    }
                    self.transition(TaskState::Released);
                }
                // State: RELEASED
                TaskState::Released => {
                    if let Err(err) = guarded(self.handler.on_release()).await {
                        error!("Task {} failed to release: {}", name, err);
                    }
                    self.shared.finish();
                    debug!("Task {} is released.", name);
                    break;
                }
            }
        }
    }

    fn transition(&mut self, state: TaskState) {
        self.state = state;
        // `Released` is published by `Shared::finish` once `on_release` ran.
        if state < TaskState::Released {
            self.shared.publish(state);
        }
    }

    async fn next_control(
        &mut self,
        token: &CancellationToken,
    ) -> Option<Command<H>> {
        let mut slot = select! {
            biased;
            _ = token.cancelled() => return None,
            slot = self.shared.mailbox.next_control() => slot,
        };
        let command = slot.take();
        self.shared.mailbox.recycle(slot);
        command
    }

    async fn initialize(
        &mut self,
        ctx: &mut TaskContext<H>,
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    ) -> Result<(), Error> {
        guarded(self.handler.on_init(ctx, arg1, arg2, payload))
            .await
            .map_err(|err| match err {
                Error::Init(_) => err,
                other => Error::Init(other.to_string()),
            })?;
        guarded(self.handler.on_start(ctx))
            .await
            .map_err(|err| match err {
                Error::Start(_) => err,
                other => Error::Start(other.to_string()),
            })
    }

    async fn stop(&mut self, ctx: &mut TaskContext<H>) {
        let before_stop = guarded(async {
            self.handler.on_before_stop(ctx).await;
            Ok(())
        })
        .await;
        if let Err(err) = before_stop {
            error!("Task {} failed before stop: {}", self.shared.name, err);
        }
        if let Err(err) = guarded(self.handler.on_stop(ctx)).await {
            error!("Task {} failed to stop: {}", self.shared.name, err);
        }
    }

    async fn process(&mut self, ctx: &mut TaskContext<H>, token: &CancellationToken) {
        loop {
            let mut slot: Box<Slot<H>> = select! {
                biased;
                _ = token.cancelled() => {
                    self.interrupted = true;
                    break;
                }
                slot = self.shared.mailbox.next() => slot,
            };
            let Some(command) = slot.take() else {
                self.shared.mailbox.recycle(slot);
                continue;
            };

            let flow = match command {
                Command::Quit => {
                    debug!("Task {} received quit request.", self.shared.name);
                    Flow::Break
                }
                Command::Start { .. } => {
                    warn!("Task {} ignored a repeated start request.", self.shared.name);
                    Flow::Continue
                }
                Command::Request(request) => {
                    select! {
                        biased;
                        _ = token.cancelled() => Flow::Interrupted,
                        result = execute(&mut self.handler, ctx, request) => {
                            self.outcome(result.err().as_ref())
                        }
                    }
                }
                Command::Call { request, reply } => {
                    select! {
                        biased;
                        _ = token.cancelled() => Flow::Interrupted,
                        result = execute(&mut self.handler, ctx, request) => {
                            let flow = self.outcome(result.as_ref().err());
                            if reply.send(result).is_err() {
                                debug!("Caller of task {} went away.", self.shared.name);
                            }
                            flow
                        }
                    }
                }
                Command::Run(closure) => {
                    match std::panic::catch_unwind(AssertUnwindSafe(closure)) {
                        Ok(()) => Flow::Continue,
                        Err(panic) => self.outcome(Some(&Error::from_panic(panic))),
                    }
                }
            };
            self.shared.mailbox.recycle(slot);

            match flow {
                Flow::Continue => {}
                Flow::Break => break,
                Flow::Interrupted => {
                    debug!("Task {} interrupted while processing.", self.shared.name);
                    self.interrupted = true;
                    break;
                }
            }
        }
    }

    /// Decides whether the error a request let escape ends the loop.
    fn outcome(&mut self, error: Option<&Error>) -> Flow {
        let Some(error) = error else {
            return Flow::Continue;
        };
        if let Error::Break = error {
            debug!("Task {} loop aborted by the handler.", self.shared.name);
            return Flow::Break;
        }
        error!(
            "Task {} failed to process request: {}",
            self.shared.name, error
        );
        if self.handler.on_error(error) {
            Flow::Break
        } else {
            Flow::Continue
        }
    }
}

impl<H: Handler> Drop for TaskRunner<H> {
    fn drop(&mut self) {
        let released = *self.shared.state.borrow() == TaskState::Released;
        if !released {
            warn!("Task {} runner dropped before release.", self.shared.name);
            self.shared.finish();
        }
    }
}
