// Integration tests for the actor registry and the in-memory broker

use actor::{
    Actor, ActorCell, Delivery, Error, Fault, InMemoryBroker, MessageBroker,
    MessageHandler, Payload, Registry,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing_test::traced_test;

use std::sync::Arc;
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

fn running_worker(
    name: &str,
) -> (Arc<ActorCell>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = Arc::new(ActorCell::new(name));
    actor.set_handler(EchoHandler { tx });
    (actor, rx)
}

#[tokio::test]
async fn test_register_and_lookup() {
    let registry = Registry::new();
    let (actor, _rx) = running_worker("alpha");
    registry.register(actor.clone()).await;

    let found = registry.lookup("alpha").await.expect("registered actor");
    assert_eq!(found.id(), actor.id());
    assert_eq!(found.name(), "alpha");

    assert!(registry.lookup("beta").await.is_none());
}

#[tokio::test]
async fn test_register_overwrites_same_name() {
    let registry = Registry::new();
    let (first, _first_rx) = running_worker("worker");
    let (second, _second_rx) = running_worker("worker");

    registry.register(first.clone()).await;
    registry.register(second.clone()).await;

    let found = registry.lookup("worker").await.expect("registered actor");
    assert_eq!(found.id(), second.id());
    assert_ne!(found.id(), first.id());
}

#[tokio::test]
async fn test_lookup_returns_live_reference() {
    let registry = Registry::new();
    let (actor, mut rx) = running_worker("courier");
    actor.start().await;
    registry.register(actor.clone()).await;

    let found = registry.lookup("courier").await.expect("registered actor");
    found.send_message(Payload::from("via registry"));
    assert_eq!(rx.recv().await, Some("via registry".to_owned()));

    actor.stop();
}

#[tokio::test]
async fn test_concurrent_registration() {
    let registry = Registry::with_capacity(32);

    let mut tasks = Vec::new();
    for n in 0..10 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let (actor, _rx) = running_worker(&format!("worker-{n}"));
            registry.register(actor).await;
        }));
    }
    for task in tasks {
        task.await.expect("registration task");
    }

    for n in 0..10 {
        assert!(registry.lookup(&format!("worker-{n}")).await.is_some());
    }
}

#[tokio::test]
async fn test_publish_without_subscribers_fails() {
    let broker = InMemoryBroker::new();
    let result = broker.publish("empty-topic", Payload::from("lost")).await;
    assert_eq!(
        result,
        Err(Error::NoSubscribers("empty-topic".to_owned()))
    );
}

#[tokio::test]
async fn test_publish_fans_out_to_all_subscribers() {
    let broker = InMemoryBroker::new();
    let mut receivers = Vec::new();
    for n in 0..3 {
        let (actor, rx) = running_worker(&format!("listener-{n}"));
        actor.start().await;
        broker
            .subscribe("alerts", actor.clone())
            .await
            .expect("subscribe");
        receivers.push((actor, rx));
    }

    broker
        .publish("alerts", Payload::from("fire"))
        .await
        .expect("publish");

    for (actor, rx) in &mut receivers {
        assert_eq!(rx.recv().await, Some("fire".to_owned()));
        actor.stop();
    }
}

#[tokio::test]
async fn test_subscription_applies_to_later_publishes_only() {
    let broker = InMemoryBroker::new();
    let (early, mut early_rx) = running_worker("early");
    early.start().await;
    broker
        .subscribe("news", early.clone())
        .await
        .expect("subscribe");

    broker
        .publish("news", Payload::from("first"))
        .await
        .expect("publish");

    let (late, mut late_rx) = running_worker("late");
    late.start().await;
    broker
        .subscribe("news", late.clone())
        .await
        .expect("subscribe");

    broker
        .publish("news", Payload::from("second"))
        .await
        .expect("publish");

    assert_eq!(early_rx.recv().await, Some("first".to_owned()));
    assert_eq!(early_rx.recv().await, Some("second".to_owned()));
    assert_eq!(late_rx.recv().await, Some("second".to_owned()));

    sleep(Duration::from_millis(50)).await;
    assert!(late_rx.try_recv().is_err());

    early.stop();
    late.stop();
}

#[tokio::test]
#[traced_test]
async fn test_full_subscriber_drops_but_publish_succeeds() {
    let broker = InMemoryBroker::new();

    // Unstarted with a single slot, so the second publish overflows it.
    let (tx, _stuck_rx) = mpsc::unbounded_channel();
    let stuck = Arc::new(ActorCell::with_capacity("stuck", 1));
    stuck.set_handler(EchoHandler { tx });
    broker
        .subscribe("metrics", stuck.clone())
        .await
        .expect("subscribe");

    let (healthy, mut healthy_rx) = running_worker("healthy");
    healthy.start().await;
    broker
        .subscribe("metrics", healthy.clone())
        .await
        .expect("subscribe");

    broker
        .publish("metrics", Payload::from("one"))
        .await
        .expect("publish");
    broker
        .publish("metrics", Payload::from("two"))
        .await
        .expect("publish");

    assert_eq!(healthy_rx.recv().await, Some("one".to_owned()));
    assert_eq!(healthy_rx.recv().await, Some("two".to_owned()));
    assert!(logs_contain("is full"));

    healthy.stop();
}
