// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message task
//!
//! A single-worker task runner: many callers submit requests, one worker
//! executes them strictly one at a time. State owned by the handler is
//! touched only by that worker, so it needs no locking.
//!
//! ## Overview
//!
//! A task is made of three pieces:
//!
//! - a [`Handler`], which supplies the lifecycle hooks and the request logic;
//! - a [`TaskRunner`], the worker loop that owns the handler;
//! - any number of [`TaskRef`] handles, used to submit work and control the
//!   lifecycle from other tasks or threads.
//!
//! Requests are served in FIFO order. `submit_front` jumps the queue, `call`
//! waits for the handler's result, and `dispatch` runs an arbitrary closure on
//! the worker. Handlers issue synchronous calls to themselves through
//! [`TaskContext::call`], which runs inline instead of waiting on the queue.
//!
//! ## Quick start
//!
//! ```ignore
//! use task::{spawn, Error, Handler, Request, TaskConfig, TaskContext};
//! use async_trait::async_trait;
//!
//! struct Adder;
//!
//! #[async_trait]
//! impl Handler for Adder {
//!     type Payload = ();
//!     type Output = i32;
//!
//!     async fn process_request(
//!         &mut self,
//!         _ctx: &mut TaskContext<Self>,
//!         request: Request<()>,
//!     ) -> Result<i32, Error> {
//!         Ok(request.arg1 + request.arg2)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let task = spawn(Adder, TaskConfig::new("adder"));
//!     task.init(0, 0, None);
//!     assert_eq!(task.call(0, 2, 3, None).await, Ok(5));
//!     task.shutdown(false).await;
//! }
//! ```
//!

mod config;
mod context;
mod error;
mod handler;
mod mailbox;
mod pool;
mod request;
mod runner;
mod task;

use tracing::Instrument;

//
// Core Types
//

/// Strategy trait supplying the lifecycle hooks and request logic.
pub use handler::Handler;

/// Worker-side context passed to every handler hook.
pub use context::TaskContext;

/// Application request delivered to the handler.
pub use request::Request;

/// Worker loop that owns the handler.
pub use runner::TaskRunner;

/// Cloneable handle used to submit work and control the lifecycle.
pub use task::TaskRef;

/// Observable lifecycle state of a task.
pub use task::TaskState;

//
// Configuration and Diagnostics
//

/// Task name and request pool settings.
pub use config::TaskConfig;

/// Snapshot of request pool occupancy.
pub use pool::PoolStats;

//
// Error Handling
//

/// Error type shared by handlers, the runner and callers.
pub use error::Error;

/// Creates a task and spawns its worker on the current tokio runtime.
///
/// The worker inherits the caller's tracing span. The task still has to be
/// started with [`TaskRef::init`].
pub fn spawn<H: Handler>(handler: H, config: TaskConfig) -> TaskRef<H> {
    let (runner, task) = TaskRunner::create(handler, config);
    tokio::spawn(runner.run().in_current_span());
    task
}
