// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Task errors
//!
//! A single error type is shared by handlers, the runner and callers of
//! [`TaskRef::call`](crate::TaskRef::call). Fire-and-forget submissions never
//! produce an `Error`; they report rejection through a `bool`.
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the task runner.
///
/// `Break` is not a failure: a handler returns it to end the worker loop on
/// purpose. The runner never passes it to [`Handler::on_error`].
///
/// [`Handler::on_error`]: crate::Handler::on_error
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// The task no longer accepts work or its queue is full.
    #[error("Task {0} is not accepting requests.")]
    Rejected(String),
    /// A pending call was dropped by cancellation or shutdown.
    #[error("The request was dropped before the task could process it.")]
    Unserviced,
    /// A blocking call was issued from the task's own worker.
    #[error("A task can not wait on itself, use the context to call inline.")]
    Reentrant,
    /// Returned by a handler to end the worker loop.
    #[error("Task loop aborted by the handler.")]
    Break,
    /// `on_init` failed.
    #[error("An error occurred while initializing the task: {0}")]
    Init(String),
    /// `on_start` failed.
    #[error("An error occurred while starting the task: {0}")]
    Start(String),
    /// `on_stop` failed.
    #[error("An error occurred while stopping the task: {0}")]
    Stop(String),
    /// `on_release` failed.
    #[error("An error occurred while releasing the task: {0}")]
    Release(String),
    /// A handler hook or dispatched closure panicked.
    #[error("Handler panicked: {0}")]
    Panicked(String),
    /// Application error raised by a handler.
    #[error("Error: {0}")]
    Functional(String),
}

impl Error {
    /// Builds `Error::Panicked` from the payload of a caught panic.
    pub(crate) fn from_panic(panic: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_owned()
        };
        Error::Panicked(message)
    }
}
