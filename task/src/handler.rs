// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Handler
//!
//! The `Handler` trait supplies all business logic of a task. The runner only
//! provides sequencing and lifecycle: every hook below is invoked on the
//! task's single worker, one at a time, so a handler can mutate its own state
//! through `&mut self` without any locking.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ── Start ──▶ Initializing ── on_init, on_start ──▶ Running
//!    │                      │                                   │
//!    │ Quit            error│                      Quit / Break / fatal error
//!    │                      ▼                                   ▼
//!    │                  Stopping ◀──────────────────────────────┘
//!    │                      │  on_before_stop, on_stop (skipped when interrupted)
//!    ▼                      ▼
//! Released ◀────────────────┘  on_release
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use libcommon::{Handler, Request, TaskContext, Error};
//! use async_trait::async_trait;
//!
//! struct Counter { total: i64 }
//!
//! #[async_trait]
//! impl Handler for Counter {
//!     type Payload = ();
//!     type Output = i64;
//!
//!     async fn process_request(
//!         &mut self,
//!         _ctx: &mut TaskContext<Self>,
//!         request: Request<()>,
//!     ) -> Result<i64, Error> {
//!         self.total += request.arg1 as i64;
//!         Ok(self.total)
//!     }
//! }
//! ```
//!

use crate::{Error, context::TaskContext, request::Request};

use async_trait::async_trait;

/// Business logic of a task.
#[async_trait]
pub trait Handler: Send + Sized + 'static {
    /// Opaque data attached to a request.
    type Payload: Send + 'static;
    /// Result produced by [`process_request`](Handler::process_request).
    /// Only synchronous callers ever receive it.
    type Output: Send + 'static;

    /// First hook on the worker, fed with the arguments given to
    /// [`TaskRef::init`](crate::TaskRef::init). An error is always fatal.
    async fn on_init(
        &mut self,
        _ctx: &mut TaskContext<Self>,
        _arg1: i32,
        _arg2: i32,
        _payload: Option<Self::Payload>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Runs right after `on_init`. An error is always fatal.
    async fn on_start(
        &mut self,
        _ctx: &mut TaskContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Executes one application request.
    ///
    /// Returning `Err(Error::Break)` ends the worker loop unconditionally.
    /// Any other error is passed to [`on_error`](Handler::on_error).
    async fn process_request(
        &mut self,
        ctx: &mut TaskContext<Self>,
        request: Request<Self::Payload>,
    ) -> Result<Self::Output, Error>;

    /// Classifies a request failure. `true` stops the task, `false` keeps
    /// processing the next request.
    fn on_error(&mut self, _error: &Error) -> bool {
        true
    }

    /// Runs when the loop ends, unless the task was interrupted.
    async fn on_before_stop(&mut self, _ctx: &mut TaskContext<Self>) {}

    /// Runs after `on_before_stop`, unless the task was interrupted. Errors
    /// are logged and do not prevent `on_release`.
    async fn on_stop(
        &mut self,
        _ctx: &mut TaskContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Last hook, always invoked. Errors are logged and swallowed.
    async fn on_release(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) struct DummyHandler;

#[cfg(test)]
#[async_trait]
impl Handler for DummyHandler {
    type Payload = String;
    type Output = i32;

    async fn process_request(
        &mut self,
        _ctx: &mut TaskContext<Self>,
        request: Request<String>,
    ) -> Result<i32, Error> {
        Ok(request.what)
    }
}
