// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Ordering, round-trip, pooling and cancellation behaviour of a task.

mod common;

use common::*;
use task::{Error, TaskConfig, TaskState, spawn};
use tracing_test::traced_test;

use std::time::Duration;

#[tokio::test]
#[traced_test]
async fn test_fifo_before_start() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("fifo"));

    for what in 10..30 {
        assert!(task.submit(what, 0, 0, None));
    }
    assert_eq!(task.state(), TaskState::Created);
    assert!(task.init(0, 0, None));

    assert_eq!(task.call(ECHO, 0, 0, None).await, Ok(0));
    let mut expected: Vec<i32> = (10..30).collect();
    expected.push(ECHO);
    assert_eq!(journal.seen(), expected);

    task.shutdown(false).await;
    assert!(logs_contain("Task fifo is running"));
}

#[tokio::test]
async fn test_front_submission_jumps_queue() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("front"));
    assert!(task.init(0, 0, None));

    let open = close_gate(&task, &journal).await;
    assert!(task.submit(20, 0, 0, None));
    assert!(task.submit(21, 0, 0, None));
    assert!(task.submit_front(30, 0, 0, None));
    open.send(()).unwrap();

    assert_eq!(task.call(ECHO, 0, 0, None).await, Ok(0));
    assert_eq!(journal.seen(), vec![GATE, 30, 20, 21, ECHO]);

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_front_submission_before_start() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("early"));

    assert!(task.submit(20, 0, 0, None));
    assert!(task.submit_front(30, 0, 0, None));
    assert!(task.init(0, 0, None));

    assert_eq!(task.call(ECHO, 0, 0, None).await, Ok(0));
    assert_eq!(journal.seen(), vec![30, 20, ECHO]);
    assert_eq!(journal.events(), vec!["init", "start"]);

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_call_round_trip() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal), TaskConfig::new("echo"));
    assert!(task.init(0, 0, None));

    for (arg1, arg2, value) in [(0, 0, 0), (3, 4, 5), (-2, 7, 100), (9, 9, -9)] {
        let result = task.call(ECHO, arg1, arg2, Some(Payload::Value(value))).await;
        assert_eq!(result, Ok(arg1 * 10 + arg2 + value));
    }

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_self_call_does_not_deadlock() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("reentrant"));
    assert!(task.init(0, 0, None));
    assert!(task.await_ready(Duration::from_secs(1)).await);

    let result =
        tokio::time::timeout(Duration::from_millis(100), task.call(SELF_CALL, 0, 0, None))
            .await
            .expect("self call blocked");
    assert_eq!(result, Ok(12));
    assert_eq!(journal.seen(), vec![SELF_CALL, ECHO]);

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_shutdown_rejects_further_work() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("closed"));
    assert!(task.init(0, 0, None));
    assert!(task.submit(OK, 0, 0, None));

    task.shutdown(false).await;

    assert!(task.is_finished());
    assert!(!task.submit(OK, 0, 0, None));
    assert!(!task.submit_front(OK, 0, 0, None));
    assert!(!task.dispatch(|| {}));
    assert_eq!(
        task.call(ECHO, 0, 0, None).await,
        Err(Error::Rejected("closed".to_owned()))
    );
    assert_eq!(task.pending(), 0);
}

#[tokio::test]
async fn test_pool_reuse_bound() {
    let journal = Journal::default();
    let config = TaskConfig::new("pooled").with_max_request(4).with_init_num(2);
    let task = spawn(Recorder::new(journal), config);
    assert!(task.init(0, 0, None));

    for i in 0..50 {
        assert_eq!(task.call(ECHO, i, 0, None).await, Ok(i * 10));
        assert!(task.pool_stats().allocated <= 4);
    }

    task.shutdown(false).await;
    assert!(task.pool_stats().allocated <= 4);
}

#[tokio::test]
async fn test_bounded_queue_rejects_when_full() {
    let journal = Journal::default();
    let config = TaskConfig::new("bounded").with_max_request(3);
    let task = spawn(Recorder::new(journal.clone()), config);
    assert!(task.init(0, 0, None));
    assert!(task.await_ready(Duration::from_secs(1)).await);

    let open = close_gate(&task, &journal).await;
    assert!(task.submit(20, 0, 0, None));
    assert!(task.submit(21, 0, 0, None));
    assert!(!task.submit(22, 0, 0, None));
    assert_eq!(
        task.call(ECHO, 0, 0, None).await,
        Err(Error::Rejected("bounded".to_owned()))
    );

    open.send(()).unwrap();
    assert!(wait_until(|| journal.seen().len() == 3).await);
    assert!(wait_until(|| task.pool_stats().idle == 3).await);
    assert_eq!(task.call(ECHO, 1, 1, None).await, Ok(11));

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_start_leaves_request_capacity() {
    let journal = Journal::default();
    let config = TaskConfig::new("tight").with_max_request(1).with_init_num(1);
    let task = spawn(Recorder::new(journal.clone()), config);

    assert!(task.init(0, 0, None));
    assert!(task.submit(OK, 0, 0, None));
    assert!(wait_until(|| journal.seen() == vec![OK]).await);

    task.shutdown(false).await;
    assert!(task.pool_stats().allocated <= 1);
}

#[tokio::test]
async fn test_cancel_by_kind() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("cancel"));
    assert!(task.init(0, 0, None));

    let open = close_gate(&task, &journal).await;
    for _ in 0..3 {
        assert!(task.submit(40, 0, 0, None));
    }
    assert!(task.submit(OK, 0, 0, None));
    assert_eq!(task.cancel(40), 3);
    assert_eq!(task.cancel(40), 0);
    open.send(()).unwrap();

    assert_eq!(task.call(ECHO, 0, 0, None).await, Ok(0));
    assert_eq!(journal.seen(), vec![GATE, OK, ECHO]);

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_cancel_matching_request() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("cancel_if"));
    assert!(task.init(0, 0, None));

    let open = close_gate(&task, &journal).await;
    assert!(task.submit(40, 1, 0, None));
    assert!(task.submit(40, 2, 0, None));
    assert!(task.submit(41, 2, 0, None));
    assert_eq!(task.cancel_if(|request| request.what == 40 && request.arg1 == 2), 1);

    let caller = {
        let task = task.clone();
        tokio::spawn(async move { task.call(ECHO, 0, 0, None).await })
    };
    assert!(wait_until(|| task.pending() == 3).await);
    assert_eq!(task.cancel(ECHO), 1);
    assert_eq!(caller.await.unwrap(), Err(Error::Unserviced));

    open.send(()).unwrap();
    assert_eq!(task.call(OK, 0, 0, None).await, Ok(OK));
    assert_eq!(journal.seen(), vec![GATE, 40, 41, OK]);

    task.shutdown(false).await;
}

#[tokio::test]
async fn test_dispatch_runs_on_worker_in_order() {
    let journal = Journal::default();
    let task = spawn(Recorder::new(journal.clone()), TaskConfig::new("dispatch"));
    assert!(task.init(0, 0, None));

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    assert!(task.submit(OK, 0, 0, None));
    {
        let inner = task.clone();
        let seen = journal.clone();
        assert!(task.dispatch(move || {
            let _ = sender.send((inner.is_worker(), seen.seen()));
        }));
    }

    let (on_worker, seen_before) = receiver.recv().await.unwrap();
    assert!(on_worker);
    assert_eq!(seen_before, vec![OK]);
    assert!(!task.is_worker());

    task.shutdown(false).await;
}
