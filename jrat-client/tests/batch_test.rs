//! Batch integration tests
//!
//! Shape preservation, one-message flushing, per-slot errors, whole-batch
//! transport failures and the interaction of batching with timers.

mod common;

use common::{ConnectableTransport, EchoTransport};
use jrat_client::{BatchResponse, ClientSession, PreparedCall, Response};
use jrat_core::{Error, RpcError};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[tokio::test]
async fn test_list_batch_preserves_order_in_one_message() {
    let transport = EchoTransport::new();
    let session = ClientSession::new(transport.clone()).unwrap();

    let calls: Vec<PreparedCall> = (0..4)
        .map(|n| session.prepare("echo", [n]).unwrap())
        .collect();
    assert_eq!(transport.send_count(), 0);

    let responses = session.batch(calls).await.unwrap().into_list().unwrap();
    assert_eq!(responses.len(), 4);
    for (n, response) in responses.iter().enumerate() {
        assert_eq!(response.result, Some(json!([n])));
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let params: Vec<_> = sent[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|request| request["params"].clone())
        .collect();
    assert_eq!(params, vec![json!([0]), json!([1]), json!([2]), json!([3])]);
}

#[tokio::test]
async fn test_map_batch_preserves_keys() {
    let session = ClientSession::new(EchoTransport::new()).unwrap();

    let mut calls = HashMap::new();
    calls.insert("first".to_string(), session.prepare("echo", ["a"]).unwrap());
    calls.insert("second".to_string(), session.prepare("fail", ()).unwrap());

    let responses = session.batch(calls).await.unwrap();
    let map = responses.into_map().unwrap();

    assert_eq!(
        map.keys().cloned().collect::<Vec<_>>(),
        vec!["first".to_string(), "second".to_string()]
    );
    assert_eq!(map["first"], Response::success(json!(["a"])));
    assert_eq!(map["second"].error.as_ref().unwrap().code, 1234);
}

#[tokio::test]
async fn test_empty_batches_touch_nothing() {
    let transport = ConnectableTransport::new();
    let session = ClientSession::builder(transport.clone())
        .auto_connect(false)
        .build()
        .unwrap();

    let list = session.batch(Vec::<PreparedCall>::new()).await.unwrap();
    assert_eq!(list, BatchResponse::List(Vec::new()));

    let map = session
        .batch(BTreeMap::<String, PreparedCall>::new())
        .await
        .unwrap();
    assert_eq!(map, BatchResponse::Map(BTreeMap::new()));

    assert_eq!(transport.connect_count(), 0);
    assert_eq!(transport.sends.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_send_failure_rejects_whole_batch() {
    let transport = EchoTransport::new();
    let session = ClientSession::new(transport.clone()).unwrap();

    let calls = vec![
        session.prepare("echo", [1]).unwrap(),
        session.prepare("fail", [2]).unwrap(),
    ];

    // the fake delivers both responses before reporting the failure
    transport.fail_sends(true);
    match session.batch(calls).await {
        Err(Error::Transport(msg)) => assert_eq!(msg, "send failed"),
        other => panic!("Expected transport error, got {:?}", other),
    }
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_fold_into_slots() {
    let session = ClientSession::builder(EchoTransport::new())
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let calls = [
        session.prepare("never", ()).unwrap(),
        session.prepare("echo", ["ok"]).unwrap(),
    ];
    let responses = session.batch(calls).await.unwrap();

    assert_eq!(responses.at(0).unwrap(), &Response::failure(RpcError::timeout()));
    assert_eq!(responses.at(1).unwrap(), &Response::success(json!(["ok"])));
}

#[tokio::test(start_paused = true)]
async fn test_timer_starts_at_flush_not_at_prepare() {
    let session = ClientSession::builder(EchoTransport::new())
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let prepared = session.prepare("echo", ["late"]).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let response = prepared.settle().await.unwrap();
    assert_eq!(response, Response::success(json!(["late"])));
}

#[tokio::test]
async fn test_batch_flushes_only_its_own_calls() {
    let transport = EchoTransport::new();
    let session = ClientSession::new(transport.clone()).unwrap();

    let outside = session.prepare("echo", ["outside"]).unwrap();
    let inside = session.prepare("echo", ["inside"]).unwrap();

    session.batch(vec![inside]).await.unwrap();
    assert_eq!(transport.sent()[0]["params"], json!(["inside"]));

    let response = outside.settle().await.unwrap();
    assert_eq!(response.result, Some(json!(["outside"])));
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_foreign_prepared_call_rejected() {
    let transport = EchoTransport::new();
    let session = ClientSession::new(transport.clone()).unwrap();
    let other = ClientSession::new(transport.clone()).unwrap();

    let calls = vec![
        session.prepare("echo", [1]).unwrap(),
        other.prepare("echo", [2]).unwrap(),
    ];

    assert!(matches!(
        session.batch(calls).await,
        Err(Error::Argument(_))
    ));
    assert_eq!(transport.send_count(), 0);
    assert_eq!(session.pending_calls(), 0);
    assert_eq!(other.pending_calls(), 0);
}

#[tokio::test]
async fn test_batching_disabled_sends_at_prepare() {
    let transport = EchoTransport::new();
    let session = ClientSession::builder(transport.clone())
        .batch_requests(false)
        .build()
        .unwrap();

    let a = session.prepare("echo", ["a"]).unwrap();
    let b = session.prepare("echo", ["b"]).unwrap();
    let responses = session.batch(vec![a, b]).await.unwrap();
    assert!(responses.all_success());

    // every call went out on its own, even with batch called straight away
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|payload| payload.is_object()));
    for params in [json!(["a"]), json!(["b"])] {
        assert!(sent.iter().any(|payload| payload["params"] == params));
    }
}

#[tokio::test]
async fn test_batching_disabled_send_failure_rejects_batch() {
    let transport = EchoTransport::new();
    transport.fail_sends(true);
    let session = ClientSession::builder(transport.clone())
        .batch_requests(false)
        .build()
        .unwrap();

    let call = session.prepare("never", ()).unwrap();
    assert!(matches!(
        session.batch(vec![call]).await,
        Err(Error::Transport(_))
    ));
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test]
async fn test_batching_disabled_autoconnects_before_sending() {
    let transport = ConnectableTransport::new();
    let session = ClientSession::builder(transport.clone())
        .batch_requests(false)
        .build()
        .unwrap();
    assert!(!session.is_connected());

    let a = session.prepare("echo", ["a"]).unwrap();
    let b = session.prepare("echo", ["b"]).unwrap();
    let responses = session.batch(vec![a, b]).await.unwrap().into_list().unwrap();

    assert_eq!(responses[0], Response::success(json!(["a"])));
    assert_eq!(responses[1], Response::success(json!(["b"])));
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.sends.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_batching_disabled_without_autoconnect_fails() {
    let transport = ConnectableTransport::new();
    let session = ClientSession::builder(transport.clone())
        .batch_requests(false)
        .auto_connect(false)
        .build()
        .unwrap();

    let call = session.prepare("echo", ["a"]).unwrap();
    assert!(matches!(
        session.batch(vec![call]).await,
        Err(Error::Connection(_))
    ));
    while session.pending_calls() > 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.connect_count(), 0);
    assert_eq!(transport.sends.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_autoconnects() {
    let transport = ConnectableTransport::new();
    let session = ClientSession::new(transport.clone()).unwrap();

    let responses = session
        .batch([session.prepare("echo", [1]).unwrap()])
        .await
        .unwrap();

    assert!(responses.all_success());
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test]
async fn test_dropped_prepared_call_is_unregistered() {
    let session = ClientSession::new(EchoTransport::new()).unwrap();

    let prepared = session.prepare("echo", ()).unwrap();
    assert_eq!(session.pending_calls(), 1);
    drop(prepared);
    assert_eq!(session.pending_calls(), 0);
}
