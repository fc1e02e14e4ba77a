//! Integration tests for the loopback router through the core traits

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wampease_core::{
    event_handler, procedure, CloseReason, ConnectOptions, ConnectionEvent, Connector, Dict,
    FixedDelay, Session,
};
use wampease_router::{LoopbackConnector, Router, TRANSPORT_LOST};

async fn open_session(connector: &LoopbackConnector) -> Arc<dyn Session> {
    let connection = connector.connect(&ConnectOptions::default()).unwrap();
    let mut events = connection.open().unwrap();
    match events.recv().await {
        // The background task keeps the session attached after the handles drop
        Some(ConnectionEvent::Opened(session)) => session,
        other => panic!("expected an open session, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pubsub_between_sessions() {
    let connector = LoopbackConnector::new(Router::new("realm1"));
    let subscriber = open_session(&connector).await;
    let publisher = open_session(&connector).await;

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    subscriber
        .subscribe(
            "com.example.pair",
            event_handler(move |(a, b): (i64, String)| {
                let sink = Arc::clone(&sink);
                async move { sink.lock().unwrap().push((a, b)) }
            }),
            Dict::new(),
        )
        .await
        .unwrap();

    publisher
        .publish("com.example.pair", vec![json!(1), json!("one")], Dict::new(), Dict::new())
        .await
        .unwrap();
    publisher
        .publish("com.example.pair", vec![json!(2), json!("two")], Dict::new(), Dict::new())
        .await
        .unwrap();

    assert_eq!(
        *received.lock().unwrap(),
        vec![(1, "one".to_string()), (2, "two".to_string())]
    );
}

#[tokio::test]
async fn test_builder_deny_list_applies_to_sessions() {
    let router = Router::builder()
        .realm("chat")
        .deny("com.chat.admin")
        .build();
    let connector = LoopbackConnector::new(router.clone());

    let connection = connector
        .connect(&ConnectOptions::new("ws://localhost:8080/ws", "chat"))
        .unwrap();
    let mut events = connection.open().unwrap();
    let Some(ConnectionEvent::Opened(session)) = events.recv().await else {
        panic!("expected an open session");
    };

    let err = session
        .register(
            "com.chat.admin",
            procedure(|(): ()| async { Ok(()) }),
            Dict::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.uri(), "wamp.error.not_authorized");

    session
        .register(
            "com.chat.echo",
            procedure(|(text,): (String,)| async move { Ok(text) }),
            Dict::new(),
        )
        .await
        .unwrap();
    let echoed = session
        .call("com.chat.echo", vec![json!("hi")], Dict::new())
        .await
        .unwrap();
    assert_eq!(echoed, json!("hi"));

    connection.close(None, None).await.unwrap();
    match events.recv().await {
        Some(ConnectionEvent::Closed(close)) => assert_eq!(close.reason, CloseReason::Closed),
        other => panic!("expected a close, got {other:?}"),
    }
    assert_eq!(router.registration_count().await, 0);
}

#[tokio::test]
async fn test_dropped_session_reopens_with_fresh_state() {
    let router = Router::new("realm1");
    let connector = LoopbackConnector::new(router.clone())
        .with_reconnect(FixedDelay::new(Duration::from_millis(10)));

    let connection = connector.connect(&ConnectOptions::default()).unwrap();
    let mut events = connection.open().unwrap();
    let Some(ConnectionEvent::Opened(first)) = events.recv().await else {
        panic!("expected an open session");
    };
    first
        .subscribe(
            "com.example.topic",
            event_handler(|(): ()| async {}),
            Dict::new(),
        )
        .await
        .unwrap();

    assert_eq!(router.drop_sessions().await, 1);

    match events.recv().await {
        Some(ConnectionEvent::Closed(close)) => {
            assert_eq!(close.reason, CloseReason::Lost);
            assert_eq!(close.details.reason.as_deref(), Some(TRANSPORT_LOST));
            assert!(close.details.will_retry);
        }
        other => panic!("expected a close, got {other:?}"),
    }
    let Some(ConnectionEvent::Opened(second)) = events.recv().await else {
        panic!("expected a reopened session");
    };

    assert_ne!(first.id(), second.id());
    assert!(!first.is_open());
    assert!(second.is_open());
    assert_eq!(router.subscription_count().await, 0);

    connection.close(None, None).await.unwrap();
}
