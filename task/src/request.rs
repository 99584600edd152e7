// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Requests
//!
//! A [`Request`] is what a handler sees. Internally every queued unit of work
//! is a [`Command`], which carries either a user request or one of the control
//! messages that drive the runner's own lifecycle. Commands travel inside a
//! pooled [`Slot`].
//!

use crate::{Error, Handler};

use tokio::sync::oneshot;

use std::fmt;

/// An application request delivered to [`Handler::process_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<P> {
    /// Operation selector, interpreted by the handler.
    pub what: i32,
    pub arg1: i32,
    pub arg2: i32,
    pub payload: Option<P>,
}

impl<P> Request<P> {
    pub fn new(what: i32, arg1: i32, arg2: i32, payload: Option<P>) -> Self {
        Self {
            what,
            arg1,
            arg2,
            payload,
        }
    }

    /// A request with no arguments and no payload.
    pub fn of(what: i32) -> Self {
        Self::new(what, 0, 0, None)
    }
}

pub(crate) type Reply<H> = oneshot::Sender<Result<<H as Handler>::Output, Error>>;

pub(crate) type Closure = Box<dyn FnOnce() + Send + 'static>;

/// Unit of work stored in the mailbox.
pub(crate) enum Command<H: Handler> {
    /// Start control message, carrying the `on_init` arguments.
    Start {
        arg1: i32,
        arg2: i32,
        payload: Option<H::Payload>,
    },
    /// Quit control message.
    Quit,
    /// Fire-and-forget user request.
    Request(Request<H::Payload>),
    /// Synchronous user request; the result goes back through `reply`.
    Call {
        request: Request<H::Payload>,
        reply: Reply<H>,
    },
    /// Fire-and-forget closure executed on the worker.
    Run(Closure),
}

impl<H: Handler> Command<H> {
    pub(crate) fn is_control(&self) -> bool {
        matches!(self, Command::Start { .. } | Command::Quit)
    }

    /// The user request carried by this command, if any.
    pub(crate) fn request(&self) -> Option<&Request<H::Payload>> {
        match self {
            Command::Request(request) | Command::Call { request, .. } => {
                Some(request)
            }
            _ => None,
        }
    }
}

impl<H: Handler> fmt::Debug for Command<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start { arg1, arg2, .. } => {
                write!(f, "Start({}, {})", arg1, arg2)
            }
            Command::Quit => write!(f, "Quit"),
            Command::Request(request) => {
                write!(f, "Request({})", request.what)
            }
            Command::Call { request, .. } => write!(f, "Call({})", request.what),
            Command::Run(_) => write!(f, "Run"),
        }
    }
}

/// Pooled envelope for a [`Command`].
///
/// Invariant: a slot held by the pool is empty, a slot held by the queue is
/// filled. The worker takes the command out when it dequeues the slot.
pub(crate) struct Slot<H: Handler> {
    command: Option<Command<H>>,
}

impl<H: Handler> Slot<H> {
    pub(crate) fn empty() -> Box<Self> {
        Box::new(Self { command: None })
    }

    pub(crate) fn fill(&mut self, command: Command<H>) {
        debug_assert!(self.is_empty());
        self.command = Some(command);
    }

    pub(crate) fn take(&mut self) -> Option<Command<H>> {
        self.command.take()
    }

    pub(crate) fn command(&self) -> Option<&Command<H>> {
        self.command.as_ref()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.command.is_none()
    }

    /// Drops the carried command. A pending `Call` reply sender is dropped
    /// with it, which wakes its caller with `Error::Unserviced`.
    pub(crate) fn clear(&mut self) {
        self.command = None;
    }
}
