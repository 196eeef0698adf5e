// tests/unit_redirect_test.rs

mod support;

use bytes::Bytes;
use spinel_client::RespValue;
use spinel_client::core::cluster::slot::get_slot;
use spinel_client::core::commands::builtin::SET;
use spinel_client::core::types::Value;
use support::{cluster, executor_with, fast_config};

#[tokio::test]
async fn test_moved_redirect_is_followed_without_consuming_retries() {
    let (manager, nodes) = cluster(2);
    let key = "alpha";
    let slot = get_slot(key.as_bytes());
    manager.assign_slot(slot, 0);

    // Zero retry budget: a redirect must still be followed.
    let mut config = fast_config();
    config.retry_attempts = 0;
    let exec = executor_with(manager, config);

    nodes[0].push_reply(Ok(RespValue::Error(format!("MOVED {slot} 127.0.0.1:7001"))));

    exec.write_async(key, &SET, vec![Value::from(key), Value::from("v")])
        .await
        .unwrap();

    assert_eq!(nodes[0].command_count("SET"), 1);
    assert_eq!(nodes[1].command_count("SET"), 1);
}

#[tokio::test]
async fn test_ask_redirect_prepends_asking_on_the_target() {
    let (manager, nodes) = cluster(2);
    let key = "alpha";
    let slot = get_slot(key.as_bytes());
    manager.assign_slot(slot, 0);
    let exec = executor_with(manager, fast_config());

    nodes[0].push_reply(Ok(RespValue::Error(format!("ASK {slot} 127.0.0.1:7001"))));

    exec.write_async(key, &SET, vec![Value::from(key), Value::from("v")])
        .await
        .unwrap();

    let target_calls = nodes[1].calls();
    assert_eq!(target_calls.len(), 2);
    assert_eq!(target_calls[0].0, "ASKING");
    assert!(target_calls[0].1.is_empty());
    assert_eq!(target_calls[1].0, "SET");
    assert_eq!(
        target_calls[1].1,
        vec![Bytes::from_static(b"alpha"), Bytes::from_static(b"v")]
    );
}

#[tokio::test]
async fn test_chained_redirects_keep_only_the_latest_target() {
    let (manager, nodes) = cluster(3);
    let key = "alpha";
    let slot = get_slot(key.as_bytes());
    manager.assign_slot(slot, 0);
    let exec = executor_with(manager, fast_config());

    nodes[0].push_reply(Ok(RespValue::Error(format!("MOVED {slot} 127.0.0.1:7001"))));
    nodes[1].push_reply(Ok(RespValue::Error(format!("MOVED {slot} 127.0.0.1:7002"))));

    exec.write_async(key, &SET, vec![Value::from(key), Value::from("v")])
        .await
        .unwrap();

    assert_eq!(nodes[0].command_count("SET"), 1);
    assert_eq!(nodes[1].command_count("SET"), 1);
    assert_eq!(nodes[2].command_count("SET"), 1);
}
