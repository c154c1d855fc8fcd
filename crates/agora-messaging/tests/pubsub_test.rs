//! Publish/subscribe flows against the in-process broker.

use agora_config::{BrokerConfig, HandlerFailurePolicy};
use agora_core::{DomainEvent, MediaId, PostCreated, PostDeleted, PostId, UserId};
use agora_messaging::{
    ConnectionManager, Disposition, EventConsumer, EventPublisher, InMemoryBroker, IncomingEvent, MessagingError,
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

struct Backbone {
    broker: InMemoryBroker,
    connection: Arc<ConnectionManager>,
    publisher: EventPublisher,
    consumer: EventConsumer,
}

fn backbone(policy: HandlerFailurePolicy) -> Backbone {
    let broker = InMemoryBroker::new();
    let config = BrokerConfig {
        retry_delay_ms: 1,
        on_handler_error: policy,
        ..BrokerConfig::default()
    };
    let connection = Arc::new(ConnectionManager::new(config, Arc::new(broker.clone())));
    Backbone {
        publisher: EventPublisher::new(Arc::clone(&connection)),
        consumer: EventConsumer::new(Arc::clone(&connection), policy),
        broker,
        connection,
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

async fn assert_silent<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    let next = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next);
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_post_created_is_received_deep_equal() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe("post.created", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                tx.send(event.body).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    let body = json!({
        "postId": "p1",
        "userId": "u1",
        "content": "hello",
        "createdAt": "2024-05-01T12:00:00Z"
    });
    bb.publisher.publish("post.created", &body).await.unwrap();

    assert_eq!(recv(&mut rx).await, body);
}

#[tokio::test]
async fn test_typed_event_round_trip() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe_event(move |event: PostCreated| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    let event = PostCreated {
        post_id: PostId::from("p1"),
        user_id: UserId::from("u1"),
        content: "hello".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    };
    bb.publisher.publish_event(&event).await.unwrap();

    assert_eq!(recv(&mut rx).await, event);
}

#[tokio::test]
async fn test_publish_without_subscriber_is_not_retained() {
    let bb = backbone(HandlerFailurePolicy::Ack);

    bb.publisher
        .publish("post.created", &json!({"postId": "early"}))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    bb.consumer
        .subscribe("post.created", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                tx.send(event.body).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    assert_silent(&mut rx).await;
    assert_eq!(bb.broker.stats().routed, 0);
}

#[tokio::test]
async fn test_each_message_handled_once() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    bb.consumer
        .subscribe("post.created", move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    for i in 0..20 {
        bb.publisher
            .publish("post.created", &json!({ "postId": format!("p{}", i) }))
            .await
            .unwrap();
    }

    eventually(|| bb.broker.stats().acked == 20).await;
    assert_eq!(calls.load(Ordering::SeqCst), 20);
    assert_eq!(bb.consumer.subscriptions()[0].processed, 20);
}

#[tokio::test]
async fn test_ack_happens_after_handler_returns() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);

    bb.consumer
        .subscribe("post.created", move |_| {
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    bb.publisher.publish("post.created", &json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bb.broker.stats().acked, 0);

    release.notify_one();
    eventually(|| bb.broker.stats().acked == 1).await;
}

#[tokio::test]
async fn test_failing_handler_does_not_stop_the_loop() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe("post.deleted", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                match event.body["postId"].as_str() {
                    Some("err") => Err(anyhow::anyhow!("index unavailable")),
                    Some("panic") => panic!("handler bug"),
                    other => {
                        tx.send(other.map(str::to_string)).ok();
                        Ok(Disposition::Ack)
                    }
                }
            }
        })
        .await
        .unwrap();

    for id in ["err", "panic", "ok"] {
        bb.publisher
            .publish("post.deleted", &json!({ "postId": id, "mediaIds": [] }))
            .await
            .unwrap();
    }

    assert_eq!(recv(&mut rx).await.as_deref(), Some("ok"));
    eventually(|| bb.broker.stats().acked == 3).await;

    let sub = &bb.consumer.subscriptions()[0];
    assert!(sub.running);
    assert_eq!(sub.processed, 1);
    assert_eq!(sub.failed, 2);
}

#[tokio::test]
async fn test_requeue_once_redelivers_then_acks() {
    let bb = backbone(HandlerFailurePolicy::RequeueOnce);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe("post.created", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                tx.send(event.redelivered).ok();
                Err(anyhow::anyhow!("always fails"))
            }
        })
        .await
        .unwrap();

    bb.publisher.publish("post.created", &json!({})).await.unwrap();

    assert!(!recv(&mut rx).await);
    assert!(recv(&mut rx).await);
    assert_silent(&mut rx).await;

    let stats = bb.broker.stats();
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.acked, 1);
}

#[tokio::test]
async fn test_requeue_disposition_gives_at_least_once() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe("post.created", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                tx.send(event.redelivered).ok();
                if event.redelivered {
                    Ok(Disposition::Ack)
                } else {
                    Ok(Disposition::Requeue)
                }
            }
        })
        .await
        .unwrap();

    bb.publisher.publish("post.created", &json!({})).await.unwrap();

    assert!(!recv(&mut rx).await);
    assert!(recv(&mut rx).await);
}

#[tokio::test]
async fn test_invalid_payloads_are_dropped() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe_event(move |event: PostDeleted| {
            let tx = tx.clone();
            async move {
                tx.send(event.post_id).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    let channel = bb.connection.channel().await.unwrap();
    channel
        .publish(bb.connection.exchange(), "post.deleted", b"not json".to_vec())
        .await
        .unwrap();
    bb.publisher
        .publish("post.deleted", &json!({ "userId": "u1" }))
        .await
        .unwrap();
    bb.publisher
        .publish_event(&PostDeleted {
            post_id: PostId::from("p1"),
            user_id: None,
            media_ids: vec![MediaId::from("m1")],
        })
        .await
        .unwrap();

    assert_eq!(recv(&mut rx).await, PostId::from("p1"));
    eventually(|| bb.broker.stats().rejected == 2).await;
}

#[tokio::test]
async fn test_subscriptions_filter_by_routing_key() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (created_tx, mut created_rx) = mpsc::unbounded_channel();
    let (deleted_tx, mut deleted_rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe(PostCreated::ROUTING_KEY, move |e: IncomingEvent| {
            let tx = created_tx.clone();
            async move {
                tx.send(e.routing_key).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();
    bb.consumer
        .subscribe(PostDeleted::ROUTING_KEY, move |e: IncomingEvent| {
            let tx = deleted_tx.clone();
            async move {
                tx.send(e.routing_key).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();

    bb.publisher.publish("post.deleted", &json!({})).await.unwrap();

    assert_eq!(recv(&mut deleted_rx).await, "post.deleted");
    assert_silent(&mut created_rx).await;
}

#[tokio::test]
async fn test_close_destroys_exclusive_queues() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    bb.consumer
        .subscribe("post.created", |_| async { Ok(Disposition::Ack) })
        .await
        .unwrap();
    assert_eq!(bb.broker.queue_count(), 1);

    bb.connection.close().await.unwrap();

    assert_eq!(bb.broker.queue_count(), 0);
    eventually(|| !bb.consumer.subscriptions()[0].running).await;
}

#[tokio::test]
async fn test_subscription_resumes_after_broker_restart() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    let (tx, mut rx) = mpsc::unbounded_channel();

    bb.consumer
        .subscribe("post.created", move |event: IncomingEvent| {
            let tx = tx.clone();
            async move {
                tx.send(event.body).ok();
                Ok(Disposition::Ack)
            }
        })
        .await
        .unwrap();
    let first_queue = bb.consumer.subscriptions()[0].queue.clone();

    bb.publisher.publish("post.created", &json!({ "n": 1 })).await.unwrap();
    assert_eq!(recv(&mut rx).await, json!({ "n": 1 }));

    bb.broker.disconnect_all();
    eventually(|| bb.consumer.subscriptions()[0].resubscribed == 1).await;

    bb.publisher.publish("post.created", &json!({ "n": 2 })).await.unwrap();
    assert_eq!(recv(&mut rx).await, json!({ "n": 2 }));

    let sub = &bb.consumer.subscriptions()[0];
    assert!(sub.running);
    assert_ne!(sub.queue, first_queue);
    assert_eq!(bb.broker.queue_count(), 1);
}

#[tokio::test]
async fn test_subscription_lost_when_broker_stays_down() {
    let bb = backbone(HandlerFailurePolicy::Ack);
    bb.consumer
        .subscribe("post.deleted", |_| async { Ok(Disposition::Ack) })
        .await
        .unwrap();

    bb.broker.fail_next_connects(u32::MAX);
    bb.broker.disconnect_all();

    tokio::time::timeout(Duration::from_secs(2), bb.consumer.subscription_lost())
        .await
        .expect("loss was never reported");
    assert!(!bb.consumer.subscriptions()[0].running);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_policy_bounds() {
    for max_attempts in [1_u32, 5, 10] {
        for failures in 0..=max_attempts {
            let broker = InMemoryBroker::new();
            broker.fail_next_connects(failures);
            let config = BrokerConfig {
                max_attempts,
                ..BrokerConfig::default()
            };
            let manager = ConnectionManager::new(config, Arc::new(broker.clone()));

            let result = manager.connect().await;

            if failures < max_attempts {
                assert!(
                    result.is_ok(),
                    "max_attempts={} failures={} should connect",
                    max_attempts,
                    failures
                );
                assert_eq!(broker.connect_attempts(), failures + 1);
            } else {
                assert!(
                    matches!(result, Err(MessagingError::ConnectExhausted { attempts, .. }) if attempts == max_attempts),
                    "max_attempts={} failures={} should be exhausted",
                    max_attempts,
                    failures
                );
                assert_eq!(broker.connect_attempts(), max_attempts);
            }
        }
    }
}
