use std::sync::Arc;

use serde_json::json;
use serde_json::value::RawValue;
use tokio::sync::mpsc::Receiver;
use tungstenite::Utf8Bytes;

use super::Hub;
use super::topic::Topic;
use crate::client::Endpoint;
use crate::transport::message::{Action, Envelope};

fn endpoint(name: &str) -> (Arc<Endpoint>, Receiver<Utf8Bytes>) {
    Endpoint::new(name, 256)
}

fn publish(topic: &str, payload: serde_json::Value) -> Envelope {
    let raw = RawValue::from_string(payload.to_string()).unwrap();
    Envelope::new(Action::Publish, topic, Some(raw))
}

fn drain(rx: &mut Receiver<Utf8Bytes>) -> Vec<Envelope> {
    let mut received = Vec::new();
    while let Ok(text) = rx.try_recv() {
        received.push(Envelope::decode(text.as_bytes()).unwrap());
    }
    received
}

#[test]
fn test_topic_new() {
    let topic = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert!(topic.is_empty());
}

#[test]
fn test_topic_subscribe_is_idempotent() {
    let (client, _rx) = endpoint("client1");
    let mut topic = Topic::new("test_topic");
    assert!(topic.subscribe(&client));
    assert!(!topic.subscribe(&client));
    assert_eq!(topic.len(), 1);

    assert!(topic.unsubscribe(client.id()));
    assert!(topic.is_empty());
}

#[test]
fn test_topic_skips_dropped_and_closed_endpoints() {
    let (gone, _rx1) = endpoint("gone");
    let (closed, _rx2) = endpoint("closed");
    let (live, _rx3) = endpoint("live");
    let mut topic = Topic::new("t");
    topic.subscribe(&gone);
    topic.subscribe(&closed);
    topic.subscribe(&live);

    drop(gone);
    closed.close();

    let recipients = topic.recipients();
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].id(), live.id());
}

#[test]
fn test_hub_new() {
    let hub = Hub::default();
    assert_eq!(hub.topic_count(), 0);
    assert!(hub.subscribers("anything").is_empty());
}

#[test]
fn test_hub_subscribe_and_unsubscribe() {
    let hub = Hub::new();
    let (client, _rx) = endpoint("alice");

    assert!(hub.subscribe("test_topic", &client));
    assert!(hub.is_subscribed("test_topic", client.id()));
    assert_eq!(hub.subscribers("test_topic"), vec![client.id().clone()]);

    assert!(hub.unsubscribe("test_topic", client.id()));
    assert!(!hub.is_subscribed("test_topic", client.id()));
    assert_eq!(hub.topic_count(), 0);
}

#[test]
fn subscribe_twice_then_unsubscribe_once_fully_removes() {
    let hub = Hub::new();
    let (client, mut rx) = endpoint("alice");

    assert!(hub.subscribe("news", &client));
    assert!(!hub.subscribe("news", &client));
    assert_eq!(hub.subscribers("news").len(), 1);

    hub.unsubscribe("news", client.id());
    assert_eq!(hub.publish(&publish("news", json!("hello"))), 0);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn unsubscribe_unknown_topic_is_a_noop() {
    let hub = Hub::new();
    let (client, _rx) = endpoint("alice");
    assert!(!hub.unsubscribe("nowhere", client.id()));

    hub.subscribe("news", &client);
    assert!(!hub.unsubscribe("news", &"someone-else".to_string()));
    assert!(hub.is_subscribed("news", client.id()));
}

#[test]
fn publish_reaches_exactly_the_subscribers_of_the_topic() {
    let hub = Hub::new();
    let (a, mut rx_a) = endpoint("a");
    let (b, mut rx_b) = endpoint("b");
    let (c, mut rx_c) = endpoint("c");
    hub.subscribe("news", &a);
    hub.subscribe("news", &b);
    hub.subscribe("sports", &c);

    let delivered = hub.publish(&publish("news", json!("hello")));
    assert_eq!(delivered, 2);

    for rx in [&mut rx_a, &mut rx_b] {
        let received = drain(rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].action, Action::Publish);
        assert_eq!(received[0].topic, "news");
        assert_eq!(received[0].payload_str(), r#""hello""#);
    }
    assert!(drain(&mut rx_c).is_empty());
}

#[test]
fn publish_forwards_structured_payload_verbatim() {
    let hub = Hub::new();
    let (a, mut rx) = endpoint("a");
    hub.subscribe("sensors", &a);

    // Unsorted keys, exponent notation and a 128-bit integer must survive as written.
    let sent = br#"{"action":0,"topic":"sensors","payload":{"b":1,"a":1e2,"n":12345678901234567890123}}"#;
    hub.publish(&Envelope::decode(sent).unwrap());

    let received = rx.try_recv().unwrap();
    assert_eq!(received.as_bytes(), &sent[..]);
}

#[test]
fn test_publish_to_nonexistent_topic() {
    let hub = Hub::new();
    assert_eq!(hub.publish(&publish("nonexistent_topic", json!("hello"))), 0);
    assert_eq!(hub.topic_count(), 0);
}

#[test]
fn remove_client_purges_every_topic() {
    let hub = Hub::new();
    let (a, mut rx_a) = endpoint("a");
    let (b, _rx_b) = endpoint("b");
    hub.subscribe("news", &a);
    hub.subscribe("sports", &a);
    hub.subscribe("sports", &b);

    hub.remove_client(a.id());
    hub.remove_client(a.id());

    assert!(!hub.is_subscribed("news", a.id()));
    assert!(!hub.is_subscribed("sports", a.id()));
    assert!(hub.is_subscribed("sports", b.id()));
    assert_eq!(hub.topic_count(), 1);

    hub.publish(&publish("news", json!(1)));
    hub.publish(&publish("sports", json!(2)));
    assert!(drain(&mut rx_a).is_empty());
}

#[test]
fn disconnect_runs_once() {
    let hub = Hub::new();
    let (a, _rx) = endpoint("a");
    hub.subscribe("news", &a);

    assert!(hub.disconnect(&a));
    assert!(!hub.disconnect(&a));
    assert!(a.is_closed());
    assert!(!hub.is_subscribed("news", a.id()));
}

#[test]
fn closed_endpoint_cannot_subscribe() {
    let hub = Hub::new();
    let (a, _rx) = endpoint("a");
    hub.disconnect(&a);

    assert!(!hub.subscribe("news", &a));
    assert_eq!(hub.topic_count(), 0);
}

#[test]
fn test_publish_to_client_with_closed_queue() {
    let hub = Hub::new();
    let (a, rx) = endpoint("a");
    hub.subscribe("news", &a);

    drop(rx);

    // No panic, nothing accepted.
    assert_eq!(hub.publish(&publish("news", json!("hello"))), 0);
}

#[test]
fn slow_subscriber_is_disconnected_on_overflow_without_blocking() {
    let hub = Hub::new();
    let (slow, mut slow_rx) = Endpoint::new("slow", 256);
    let (fast, mut fast_rx) = Endpoint::new("fast", 1024);
    hub.subscribe("burst", &slow);
    hub.subscribe("burst", &fast);

    let mut slow_accepted = 0;
    for i in 0..300 {
        let delivered = hub.publish(&publish("burst", json!(i)));
        if i < 256 {
            assert_eq!(delivered, 2);
            slow_accepted += 1;
        } else {
            assert_eq!(delivered, 1);
        }
    }

    assert_eq!(slow_accepted, 256);
    assert!(slow.is_closed());
    assert!(!hub.is_subscribed("burst", slow.id()));
    assert!(hub.is_subscribed("burst", fast.id()));

    let slow_received = drain(&mut slow_rx);
    assert_eq!(slow_received.len(), 256);
    assert_eq!(slow_received[255].payload_str(), "255");

    let fast_received = drain(&mut fast_rx);
    assert_eq!(fast_received.len(), 300);
    assert_eq!(fast_received[299].payload_str(), "299");
}

#[test]
fn concurrent_subscribe_and_remove_do_not_lose_updates() {
    let hub = Arc::new(Hub::new());
    let endpoints: Vec<_> = (0..16).map(|i| Endpoint::new(format!("c{i}"), 8)).collect();

    std::thread::scope(|scope| {
        for (endpoint, _) in &endpoints {
            let hub = hub.clone();
            scope.spawn(move || {
                for t in 0..50 {
                    hub.subscribe(&format!("topic-{}", t % 5), endpoint);
                }
            });
        }
    });

    for t in 0..5 {
        assert_eq!(hub.subscribers(&format!("topic-{t}")).len(), 16);
    }

    std::thread::scope(|scope| {
        for (endpoint, _) in endpoints.iter().step_by(2) {
            let hub = hub.clone();
            scope.spawn(move || hub.remove_client(endpoint.id()));
        }
    });

    for t in 0..5 {
        assert_eq!(hub.subscribers(&format!("topic-{t}")).len(), 8);
    }
}
