// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

// Shared test handler for the task integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use task::{Error, Handler, Request, TaskContext};
use tokio::sync::oneshot;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub const OK: i32 = 1;
pub const ERR: i32 = 2;
pub const BREAK: i32 = 3;
pub const PANIC: i32 = 4;
pub const ECHO: i32 = 5;
pub const SELF_CALL: i32 = 6;
pub const SLOW: i32 = 7;
pub const STOP_SELF: i32 = 8;
pub const SHUTDOWN_SELF: i32 = 9;
pub const NESTED_ERR: i32 = 10;
pub const NESTED_RECOVER: i32 = 11;
pub const NESTED_BREAK: i32 = 12;
pub const GATE: i32 = 100;

pub enum Payload {
    Gate(oneshot::Receiver<()>),
    Value(i32),
}

#[derive(Clone, Default)]
pub struct Journal {
    pub seen: Arc<Mutex<Vec<i32>>>,
    pub events: Arc<Mutex<Vec<&'static str>>>,
}

impl Journal {
    pub fn seen(&self) -> Vec<i32> {
        self.seen.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn event(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }
}

// Records every request and lifecycle hook it sees.
pub struct Recorder {
    pub journal: Journal,
    pub fatal_errors: bool,
    pub fail_init: bool,
}

impl Recorder {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fatal_errors: false,
            fail_init: false,
        }
    }
}

#[async_trait]
impl Handler for Recorder {
    type Payload = Payload;
    type Output = i32;

    async fn on_init(
        &mut self,
        _ctx: &mut TaskContext<Self>,
        _arg1: i32,
        _arg2: i32,
        _payload: Option<Payload>,
    ) -> Result<(), Error> {
        self.journal.event("init");
        if self.fail_init {
            return Err(Error::Init("init refused".to_owned()));
        }
        Ok(())
    }

    async fn on_start(
        &mut self,
        _ctx: &mut TaskContext<Self>,
    ) -> Result<(), Error> {
        self.journal.event("start");
        Ok(())
    }

    async fn process_request(
        &mut self,
        ctx: &mut TaskContext<Self>,
        request: Request<Payload>,
    ) -> Result<i32, Error> {
        self.journal.seen.lock().unwrap().push(request.what);
        match request.what {
            GATE => {
                if let Some(Payload::Gate(gate)) = request.payload {
                    let _ = gate.await;
                }
                Ok(0)
            }
            ERR => Err(Error::Functional("boom".to_owned())),
            BREAK => Err(Error::Break),
            PANIC => panic!("handler panic"),
            ECHO => {
                let extra = match request.payload {
                    Some(Payload::Value(value)) => value,
                    _ => 0,
                };
                Ok(request.arg1 * 10 + request.arg2 + extra)
            }
            SELF_CALL => {
                let queued = ctx.task().call(ECHO, 0, 0, None).await;
                assert_eq!(queued, Err(Error::Reentrant));
                ctx.call(self, Request::new(ECHO, 1, 2, None)).await
            }
            NESTED_ERR => ctx.call(self, Request::of(ERR)).await,
            NESTED_RECOVER => {
                let inner = ctx.call(self, Request::of(ERR)).await;
                assert_eq!(inner, Err(Error::Functional("boom".to_owned())));
                Ok(0)
            }
            NESTED_BREAK => ctx.call(self, Request::of(BREAK)).await,
            SLOW => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(0)
            }
            STOP_SELF => {
                ctx.stop();
                Ok(0)
            }
            SHUTDOWN_SELF => {
                ctx.task().shutdown(false).await;
                Ok(0)
            }
            what => Ok(what),
        }
    }

    fn on_error(&mut self, _error: &Error) -> bool {
        self.journal.event("error");
        self.fatal_errors
    }

    async fn on_before_stop(&mut self, _ctx: &mut TaskContext<Self>) {
        self.journal.event("before_stop");
    }

    async fn on_stop(
        &mut self,
        _ctx: &mut TaskContext<Self>,
    ) -> Result<(), Error> {
        self.journal.event("stop");
        Ok(())
    }

    async fn on_release(&mut self) -> Result<(), Error> {
        self.journal.event("release");
        Ok(())
    }
}

/// Polls `condition` every few milliseconds for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Submits a gate request and waits until the worker is blocked inside it.
pub async fn close_gate(
    task: &task::TaskRef<Recorder>,
    journal: &Journal,
) -> oneshot::Sender<()> {
    let (open, gate) = oneshot::channel();
    assert!(task.submit(GATE, 0, 0, Some(Payload::Gate(gate))));
    assert!(wait_until(|| journal.seen().contains(&GATE)).await);
    open
}
