// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Free list of request slots.
//!
//! The pool also enforces `max_request`: once that many slots are alive, a
//! bounded `obtain` fails and the submission is rejected as "queue full".

use crate::{Handler, request::Slot};

use tracing::debug;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live slots: idle plus queued plus in flight.
    pub allocated: usize,
    /// Empty slots waiting in the free list.
    pub idle: usize,
}

pub(crate) struct RequestPool<H: Handler> {
    free: Vec<Box<Slot<H>>>,
    allocated: usize,
    max_request: Option<usize>,
}

impl<H: Handler> RequestPool<H> {
    pub(crate) fn new(max_request: Option<usize>, init_num: usize) -> Self {
        let free: Vec<_> = (0..init_num).map(|_| Slot::empty()).collect();
        Self {
            allocated: free.len(),
            free,
            max_request,
        }
    }

    /// Returns an empty slot.
    ///
    /// With `bounded` set, no slot is allocated past `max_request`. Control
    /// messages obtain unbounded so shutdown is never refused. In a bounded
    /// pool they never take an idle slot, so they can not crowd out user
    /// submissions.
    pub(crate) fn obtain(&mut self, bounded: bool) -> Option<Box<Slot<H>>> {
        match self.max_request {
            Some(max) if bounded => {
                if let Some(slot) = self.free.pop() {
                    return Some(slot);
                }
                if self.allocated >= max {
                    debug!("Request pool exhausted ({} live).", self.allocated);
                    return None;
                }
            }
            Some(_) => {}
            None => {
                if let Some(slot) = self.free.pop() {
                    return Some(slot);
                }
            }
        }
        self.allocated += 1;
        Some(Slot::empty())
    }

    /// Returns a slot to the free list, clearing it first.
    pub(crate) fn recycle(&mut self, mut slot: Box<Slot<H>>) {
        slot.clear();
        match self.max_request {
            Some(max) if self.allocated > max => {
                // Over the bound because of an unbounded control slot.
                self.allocated -= 1;
            }
            _ => self.free.push(slot),
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated,
            idle: self.free.len(),
        }
    }
}
