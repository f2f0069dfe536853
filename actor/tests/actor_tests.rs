// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the actor runtime: delivery order, single-flight
//! handling, mailbox overflow and restart behavior.

use actor::{
    failure_channel, Actor, ActorCell, ActorId, Delivery, Directive, Error,
    Fault, FnHandler, MessageHandler, Payload,
};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

// Records every text payload it sees.
struct EchoHandler {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&mut self, delivery: Delivery) -> Result<(), Fault> {
        if let Payload::Text(text) = delivery.payload {
            let _ = self.tx.send(text);
        }
        Ok(())
    }
}

// Detects overlapping handler invocations for the same actor.
struct OverlapProbe {
    busy: Arc<AtomicU32>,
    overlaps: Arc<AtomicU32>,
    delivered: Arc<AtomicU32>,
}

#[async_trait]
impl MessageHandler for OverlapProbe {
    async fn handle(&mut self, _delivery: Delivery) -> Result<(), Fault> {
        if self.busy.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        sleep(Duration::from_millis(5)).await;
        self.busy.fetch_sub(1, Ordering::SeqCst);
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_per_sender_fifo_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let actor = ActorCell::new("ordered");
    actor.set_handler(EchoHandler { tx });
    actor.start().await;

    for n in 0..20 {
        actor.send_message(Payload::from(format!("msg-{n}")));
    }
    for n in 0..20 {
        assert_eq!(rx.recv().await, Some(format!("msg-{n}")));
    }

    actor.stop();
}

#[tokio::test]
async fn test_handler_never_overlaps() {
    let busy = Arc::new(AtomicU32::new(0));
    let overlaps = Arc::new(AtomicU32::new(0));
    let delivered = Arc::new(AtomicU32::new(0));

    let actor = Arc::new(ActorCell::new("probe"));
    actor.set_handler(OverlapProbe {
        busy: busy.clone(),
        overlaps: overlaps.clone(),
        delivered: delivered.clone(),
    });
    actor.start().await;

    let mut senders = Vec::new();
    for _ in 0..3 {
        let actor = actor.clone();
        senders.push(tokio::spawn(async move {
            for _ in 0..5 {
                actor.send_message(Payload::from("work"));
            }
        }));
    }
    for sender in senders {
        sender.await.expect("sender task");
    }

    let delivered_probe = delivered.clone();
    wait_until(move || delivered_probe.load(Ordering::SeqCst) == 15).await;
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);

    actor.stop();
}

#[tokio::test]
#[traced_test]
async fn test_overflow_drops_newest_message() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let actor = ActorCell::with_capacity("tiny", 2);
    actor.set_handler(EchoHandler { tx });

    // Fill the mailbox before the actor runs, so the drop is forced.
    actor.send_message(Payload::from("first"));
    actor.send_message(Payload::from("second"));
    actor.send_message(Payload::from("third"));
    assert!(logs_contain("is full"));

    actor.start().await;
    assert_eq!(rx.recv().await, Some("first".to_owned()));
    assert_eq!(rx.recv().await, Some("second".to_owned()));

    actor.stop();
    sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let actor = ActorCell::new("durable");
    actor.set_handler(EchoHandler { tx });
    actor.start().await;

    actor.send_message(Payload::from("before"));
    assert_eq!(rx.recv().await, Some("before".to_owned()));

    actor.stop();
    sleep(Duration::from_millis(20)).await;

    // Queued while stopped; must come out after the restart, in order.
    actor.send_message(Payload::from("one"));
    actor.send_message(Payload::from("two"));
    actor.start().await;

    assert_eq!(rx.recv().await, Some("one".to_owned()));
    assert_eq!(rx.recv().await, Some("two".to_owned()));

    actor.stop();
}

#[tokio::test]
async fn test_delivery_carries_identity() {
    let (tx, mut rx) = mpsc::unbounded_channel::<(ActorId, String)>();
    let actor = ActorCell::new("identified");
    let expected = actor.id();
    actor.set_handler(FnHandler::new(move |delivery: Delivery| {
        let tx = tx.clone();
        async move {
            let _ = tx.send((delivery.actor_id, delivery.actor_name));
            Ok(())
        }
        .boxed()
    }));
    actor.start().await;

    actor.send_message(Payload::from("who am I"));
    let (id, name) = rx.recv().await.expect("delivery metadata");
    assert_eq!(id, expected);
    assert_eq!(name, "identified");

    actor.stop();
}

#[tokio::test]
async fn test_dynamic_payload_downcast() {
    #[derive(Debug, PartialEq)]
    struct Job {
        steps: u32,
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
    let actor = ActorCell::new("typed");
    actor.set_handler(FnHandler::new(move |delivery: Delivery| {
        let tx = tx.clone();
        async move {
            match delivery.payload.downcast_ref::<Job>() {
                Some(job) => {
                    let _ = tx.send(job.steps);
                    Ok(())
                }
                None => Err(Fault::resume(Error::Handler(
                    "not a job".to_owned(),
                ))),
            }
        }
        .boxed()
    }));
    actor.start().await;

    actor.send_message(Payload::dynamic(Job { steps: 7 }));
    assert_eq!(rx.recv().await, Some(7));

    actor.stop();
}

#[tokio::test]
async fn test_standalone_failures_via_channel() {
    let (sink, mut failures) = failure_channel();
    let actor = ActorCell::new("loner");
    actor.set_handler(FnHandler::new(|_delivery: Delivery| {
        async move { Err(Fault::escalate(Error::Handler("alone".to_owned()))) }
            .boxed()
    }));
    actor.set_failure_sink(sink);
    actor.start().await;

    actor.send_message(Payload::from("work"));
    let report = failures.recv().await.expect("failure report");
    assert_eq!(report.directive, Directive::Escalate);
    assert_eq!(report.error, Error::Handler("alone".to_owned()));
    assert_eq!(report.actor_name, "loner");
    match report.payload {
        Payload::Text(text) => assert_eq!(text, "work"),
        other => panic!("unexpected payload {other:?}"),
    }

    actor.stop();
}

#[tokio::test]
#[traced_test]
async fn test_absorbed_failure_without_sink() {
    let actor = ActorCell::new("quiet");
    actor.set_handler(FnHandler::new(|_delivery: Delivery| {
        async move { Err(Fault::restart(Error::Handler("oops".to_owned()))) }
            .boxed()
    }));
    actor.start().await;

    actor.send_message(Payload::from("work"));
    sleep(Duration::from_millis(50)).await;
    assert!(logs_contain("failed to process a message"));
    assert!(logs_contain("no failure sink"));

    actor.stop();
}

#[tokio::test]
async fn test_shared_scope_stops_many_actors() {
    let scope = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut actors = Vec::new();
    for n in 0..3 {
        let actor = ActorCell::new(&format!("scoped-{n}"));
        actor.set_handler(EchoHandler { tx: tx.clone() });
        actor.set_cancellation_scope(scope.clone());
        actor.start().await;
        actors.push(actor);
    }

    scope.cancel();
    sleep(Duration::from_millis(50)).await;

    for actor in &actors {
        actor.send_message(Payload::from("late"));
    }
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}
