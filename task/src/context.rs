// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Worker-side context handed to every [`Handler`] hook.

use crate::{
    Error, Handler,
    request::Request,
    runner::execute,
    task::TaskRef,
};

use tracing::debug;

/// Execution context of a task, only ever used on its worker.
pub struct TaskContext<H: Handler> {
    task: TaskRef<H>,
}

impl<H: Handler> TaskContext<H> {
    pub(crate) fn new(task: TaskRef<H>) -> Self {
        debug!("Creating task {} context.", task.name());
        Self { task }
    }

    /// The task's own handle, e.g. to submit follow-up requests.
    pub fn task(&self) -> &TaskRef<H> {
        &self.task
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Runs `request` inline and returns its result.
    ///
    /// This is the synchronous call available from inside the worker, where
    /// [`TaskRef::call`] would have to wait on itself. An error is handed
    /// back to the calling request only; [`Handler::on_error`] sees it if
    /// that request lets it escape.
    pub async fn call(
        &mut self,
        handler: &mut H,
        request: Request<H::Payload>,
    ) -> Result<H::Output, Error> {
        debug!("Task {} running request {} inline.", self.name(), request.what);
        execute(handler, self, request).await
    }

    /// Asks the task to stop once the current request returns. Pending
    /// requests are dropped.
    pub fn stop(&self) {
        self.task.shutdown_nowait(false);
    }
}
