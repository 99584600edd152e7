// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! The mailbox is the only structure shared between callers and the worker.
//! It owns a deque of filled slots and the pool of empty ones, each behind
//! its own lock. The two locks are never held together.
//!
//! Closing the mailbox and draining it happen under the queue lock, so a
//! submission either lands before the drain (and is dropped by it) or is
//! refused. A `Call` can therefore never be left behind in a closed queue.
//!

use crate::{
    Handler,
    config::TaskConfig,
    pool::{PoolStats, RequestPool},
    request::{Command, Request, Slot},
};

use parking_lot::Mutex;

use tokio::sync::Notify;

use tracing::debug;

use std::collections::VecDeque;

/// Where a command is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Back,
    Front,
}

struct Queue<H: Handler> {
    items: VecDeque<Box<Slot<H>>>,
    closed: bool,
    init_posted: bool,
}

pub(crate) struct Mailbox<H: Handler> {
    queue: Mutex<Queue<H>>,
    pool: Mutex<RequestPool<H>>,
    notify: Notify,
}

impl<H: Handler> Mailbox<H> {
    pub(crate) fn new(config: &TaskConfig) -> Self {
        Self {
            queue: Mutex::new(Queue {
                items: VecDeque::new(),
                closed: false,
                init_posted: false,
            }),
            pool: Mutex::new(RequestPool::new(
                config.max_request,
                config.effective_init_num(),
            )),
            notify: Notify::new(),
        }
    }

    /// Enqueues a user command. Returns false if the mailbox is closed or
    /// the pool is exhausted.
    pub(crate) fn post(&self, command: Command<H>, position: Position) -> bool {
        let Some(mut slot) = self.pool.lock().obtain(true) else {
            return false;
        };
        slot.fill(command);
        match self.push(slot, position, false) {
            Ok(()) => true,
            Err(slot) => {
                self.recycle(slot);
                false
            }
        }
    }

    /// Enqueues the start control message at the front. Only the first call
    /// on an open mailbox succeeds.
    pub(crate) fn post_start(
        &self,
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    ) -> bool {
        let Some(mut slot) = self.pool.lock().obtain(false) else {
            return false;
        };
        slot.fill(Command::Start {
            arg1,
            arg2,
            payload,
        });
        match self.push(slot, Position::Front, true) {
            Ok(()) => true,
            Err(slot) => {
                self.recycle(slot);
                false
            }
        }
    }

    /// Closes the mailbox, drops everything pending and puts a quit control
    /// message at the head. Returns the number of dropped commands, or
    /// `None` if the mailbox was already closed.
    pub(crate) fn post_quit(&self) -> Option<usize> {
        let Some(mut quit) = self.pool.lock().obtain(false) else {
            return None;
        };
        quit.fill(Command::Quit);
        let drained = {
            let mut queue = self.queue.lock();
            if queue.closed {
                Err(quit)
            } else {
                queue.closed = true;
                let dropped: Vec<_> = queue.items.drain(..).collect();
                queue.items.push_front(quit);
                self.notify.notify_one();
                Ok(dropped)
            }
        };
        match drained {
            Ok(dropped) => {
                let count = dropped.len();
                for slot in dropped {
                    self.recycle(slot);
                }
                Some(count)
            }
            Err(quit) => {
                self.recycle(quit);
                None
            }
        }
    }

    fn push(
        &self,
        slot: Box<Slot<H>>,
        position: Position,
        is_init: bool,
    ) -> Result<(), Box<Slot<H>>> {
        {
            let mut queue = self.queue.lock();
            if queue.closed || (is_init && queue.init_posted) {
                return Err(slot);
            }
            if is_init {
                queue.init_posted = true;
            }
            match position {
                Position::Back => queue.items.push_back(slot),
                Position::Front => queue.items.push_front(slot),
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for the next slot in deque order.
    pub(crate) async fn next(&self) -> Box<Slot<H>> {
        loop {
            if let Some(slot) = self.queue.lock().items.pop_front() {
                return slot;
            }
            self.notify.notified().await;
        }
    }

    /// Waits for the first control message, leaving user commands queued
    /// behind it untouched.
    pub(crate) async fn next_control(&self) -> Box<Slot<H>> {
        loop {
            {
                let mut queue = self.queue.lock();
                let position = queue.items.iter().position(|slot| {
                    slot.command().is_some_and(Command::is_control)
                });
                if let Some(slot) = position.and_then(|i| queue.items.remove(i))
                {
                    return slot;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Removes queued user requests matching `predicate`.
    pub(crate) fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Request<H::Payload>) -> bool,
    {
        let removed: Vec<_> = {
            let mut queue = self.queue.lock();
            let (removed, kept): (VecDeque<_>, VecDeque<_>) =
                queue.items.drain(..).partition(|slot| {
                    slot.command()
                        .and_then(Command::request)
                        .is_some_and(&predicate)
                });
            queue.items = kept;
            removed.into_iter().collect()
        };
        let count = removed.len();
        for slot in removed {
            self.recycle(slot);
        }
        if count > 0 {
            debug!("Removed {} queued requests.", count);
        }
        count
    }

    /// Closes the mailbox and drops everything pending.
    pub(crate) fn close(&self) -> usize {
        let dropped: Vec<_> = {
            let mut queue = self.queue.lock();
            queue.closed = true;
            queue.items.drain(..).collect()
        };
        let count = dropped.len();
        for slot in dropped {
            self.recycle(slot);
        }
        count
    }

    pub(crate) fn recycle(&self, mut slot: Box<Slot<H>>) {
        // Drop the command outside the pool lock.
        slot.clear();
        self.pool.lock().recycle(slot);
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().items.len()
    }

    pub(crate) fn pool_stats(&self) -> PoolStats {
        self.pool.lock().stats()
    }
}
