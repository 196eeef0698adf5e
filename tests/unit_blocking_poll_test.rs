// tests/unit_blocking_poll_test.rs

mod support;

use bytes::Bytes;
use spinel_client::core::commands::builtin::BLPOP;
use spinel_client::core::types::Value;
use spinel_client::{RespValue, SpinelClientError};
use std::time::Duration;
use support::{cluster, executor_with, fast_config, single_node};

#[tokio::test]
async fn test_standalone_forwards_the_native_blocking_pop() {
    let (manager, node) = single_node();
    node.set_handler(|_, _| {
        Ok(RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"q1")),
            RespValue::BulkString(Bytes::from_static(b"job")),
        ]))
    });
    let exec = executor_with(manager, fast_config());

    let result = exec
        .poll_from_any_async(
            &BLPOP,
            5,
            vec![
                Bytes::from_static(b"q1"),
                Bytes::from_static(b"q2"),
                Bytes::from_static(b"q3"),
            ],
        )
        .await
        .unwrap();

    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "BLPOP");
    assert_eq!(
        calls[0].1,
        vec![
            Bytes::from_static(b"q1"),
            Bytes::from_static(b"q2"),
            Bytes::from_static(b"q3"),
            Bytes::from_static(b"5"),
        ]
    );
    assert_eq!(
        result,
        Value::List(vec![
            Value::Bytes(Bytes::from_static(b"q1")),
            Value::Bytes(Bytes::from_static(b"job")),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn test_cluster_rotation_times_out_with_null() {
    let (manager, nodes) = cluster(2);
    for node in &nodes {
        node.set_handler(|_, _| Ok(RespValue::Null));
    }
    let exec = executor_with(manager, fast_config());

    let started = tokio::time::Instant::now();
    let result = exec
        .poll_from_any_async(
            &BLPOP,
            3,
            vec![Bytes::from_static(b"q1"), Bytes::from_static(b"q2")],
        )
        .await
        .unwrap();

    assert_eq!(result, Value::Null);

    // One second of budget per polled position.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "waited {elapsed:?}");

    let polls: usize = nodes.iter().map(|n| n.command_count("LPOP")).sum();
    assert_eq!(polls, 3);
    let blocking: usize = nodes.iter().map(|n| n.command_count("BLPOP")).sum();
    assert_eq!(blocking, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cluster_rotation_completes_early_on_a_value() {
    let (manager, nodes) = cluster(2);
    for node in &nodes {
        node.set_handler(|_, args| {
            if args.first().map(|a| a.as_ref()) == Some(b"q2".as_ref()) {
                Ok(RespValue::Array(vec![RespValue::BulkString(
                    Bytes::from_static(b"job"),
                )]))
            } else {
                Ok(RespValue::Null)
            }
        });
    }
    let exec = executor_with(manager, fast_config());

    let started = tokio::time::Instant::now();
    let result = exec
        .poll_from_any_async(
            &BLPOP,
            30,
            vec![Bytes::from_static(b"q1"), Bytes::from_static(b"q2")],
        )
        .await
        .unwrap();

    assert_eq!(result, Value::Bytes(Bytes::from_static(b"job")));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_cluster_rotation_fails_on_transport_error() {
    let (manager, nodes) = cluster(2);
    for node in &nodes {
        node.set_handler(|_, _| Ok(RespValue::Error("ERR wrong kind of value".to_string())));
    }
    let exec = executor_with(manager, fast_config());

    let err = exec
        .poll_from_any_async(
            &BLPOP,
            3,
            vec![Bytes::from_static(b"q1"), Bytes::from_static(b"q2")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SpinelClientError::ServerError(_)));
}

#[tokio::test]
async fn test_empty_queue_list_is_rejected() {
    let (manager, _node) = single_node();
    let exec = executor_with(manager, fast_config());

    let err = exec
        .poll_from_any_async(&BLPOP, 1, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, SpinelClientError::InvalidArgument(_)));
}
