//! Publish/subscribe tests for wampease-client

mod common;

use common::{connected_client, router, Captured};
use serde_json::json;
use wampease_client::{raw_event_handler, Error, OptionsPatch};
use wampease_core::Dict;

fn dict(value: serde_json::Value) -> Dict {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[tokio::test]
async fn test_subscribe_twice_fails() {
    let router = router();
    let client = connected_client(&router).await;

    client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap();
    let err = client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AlreadySubscribed(ref t) if t == "com.example.topic"));
    assert_eq!(router.subscription_count().await, 1);
}

#[tokio::test]
async fn test_unsubscribe_then_resubscribe() {
    let router = router();
    let client = connected_client(&router).await;

    client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap();
    client.unsubscribe("com.example.topic").await.unwrap();
    assert!(client.subscriptions().await.is_empty());
    assert_eq!(router.subscription_count().await, 0);

    client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap();
    assert_eq!(client.subscriptions().await, vec!["com.example.topic"]);
}

#[tokio::test]
async fn test_unsubscribe_unknown_topic() {
    let router = router();
    let client = connected_client(&router).await;

    let err = client.unsubscribe("com.example.nothing").await.unwrap_err();
    assert!(matches!(err, Error::NotSubscribed(_)));
}

#[tokio::test]
async fn test_publish_preserves_order() {
    let router = router();
    let subscriber = connected_client(&router).await;
    let publisher = connected_client(&router).await;

    let received = Captured::new();
    let sink = received.clone();
    subscriber
        .subscribe("com.example.numbers", move |(n,): (i64,)| {
            let sink = sink.clone();
            async move { sink.push(n) }
        })
        .await
        .unwrap();

    publisher.publish("com.example.numbers", (1,)).await.unwrap();
    publisher.publish("com.example.numbers", (2,)).await.unwrap();

    assert_eq!(received.wait_for(2).await, vec![1, 2]);
}

#[tokio::test]
async fn test_positional_event_arguments() {
    let router = router();
    let subscriber = connected_client(&router).await;
    let publisher = connected_client(&router).await;

    let received = Captured::new();
    let sink = received.clone();
    subscriber
        .subscribe("com.example.pair", move |(n1, n2): (i64, i64)| {
            let sink = sink.clone();
            async move { sink.push((n1, n2)) }
        })
        .await
        .unwrap();

    publisher.publish("com.example.pair", (1, 2)).await.unwrap();
    assert_eq!(received.wait_for(1).await, vec![(1, 2)]);
}

#[tokio::test]
async fn test_own_events_excluded_by_default() {
    let router = router();
    let client = connected_client(&router).await;

    let received = Captured::new();
    let sink = received.clone();
    client
        .subscribe("com.example.echo", move |(n,): (i64,)| {
            let sink = sink.clone();
            async move { sink.push(n) }
        })
        .await
        .unwrap();

    client.publish("com.example.echo", (1,)).await.unwrap();
    assert!(received.items().is_empty());

    client
        .set_options(OptionsPatch::new().with_publish(dict(json!({"exclude_me": false}))))
        .await;
    client.publish("com.example.echo", (2,)).await.unwrap();
    assert_eq!(received.wait_for(1).await, vec![2]);
}

#[tokio::test]
async fn test_publish_acknowledge_option() {
    let router = router();
    let client = connected_client(&router).await;

    assert!(client.publish("com.example.ack", ()).await.unwrap().is_none());

    client
        .set_options(OptionsPatch::new().with_publish(dict(json!({"acknowledge": true}))))
        .await;
    assert!(client.publish("com.example.ack", ()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_subscribe_options_are_passed_through() {
    let router = router();
    let subscriber = connected_client(&router).await;
    let publisher = connected_client(&router).await;

    subscriber
        .set_options(OptionsPatch::new().with_subscribe(dict(json!({"match": "prefix"}))))
        .await;

    let topics = Captured::new();
    let sink = topics.clone();
    subscriber
        .subscribe_handler(
            "com.example",
            raw_event_handler(move |event| {
                let sink = sink.clone();
                async move { sink.push(event.details.topic) }
            }),
        )
        .await
        .unwrap();

    publisher.publish("com.example.a", ()).await.unwrap();
    publisher.publish("com.other.b", ()).await.unwrap();
    publisher.publish("com.example.c", ()).await.unwrap();

    assert_eq!(
        topics.wait_for(2).await,
        vec!["com.example.a".to_string(), "com.example.c".to_string()]
    );
}

#[tokio::test]
async fn test_invalid_match_option_releases_topic() {
    let router = router();
    let client = connected_client(&router).await;

    client
        .set_options(OptionsPatch::new().with_subscribe(dict(json!({"match": "fuzzy"}))))
        .await;
    let err = client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap_err();
    assert_eq!(err.uri(), "wamp.error.invalid_argument");

    client.reset_options_to_default().await;
    client
        .subscribe("com.example.topic", |(): ()| async {})
        .await
        .unwrap();
}

#[tokio::test]
async fn test_undecodable_event_is_dropped() {
    let router = router();
    let subscriber = connected_client(&router).await;
    let publisher = connected_client(&router).await;

    let received = Captured::new();
    let sink = received.clone();
    subscriber
        .subscribe("com.example.numbers", move |(n,): (i64,)| {
            let sink = sink.clone();
            async move { sink.push(n) }
        })
        .await
        .unwrap();

    publisher.publish("com.example.numbers", ("nope",)).await.unwrap();
    publisher.publish("com.example.numbers", (7,)).await.unwrap();

    assert_eq!(received.wait_for(1).await, vec![7]);
}
