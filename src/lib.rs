// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Common utilities library.
//! Provides the single-worker message task runner: callers on any thread submit
//! requests, one worker executes them in order.

pub use task::{
    Error as TaskError, Handler, PoolStats, Request, TaskConfig, TaskContext,
    TaskRef, TaskRunner, TaskState, spawn,
};
