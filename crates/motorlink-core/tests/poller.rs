//! Poller behaviour against an in-memory board

use motorlink_core::prelude::*;
use motorlink_core::protocol::STATUS_START_BYTE;
use std::sync::Arc;
use std::time::Duration;

fn status_bytes(control_mode: i32, message: Option<&str>) -> Vec<u8> {
    let mut bytes = StatusFrame {
        start_byte: STATUS_START_BYTE,
        control_mode,
        x_angle: 10.0,
        y_angle: 20.0,
        x_speed: 0.0,
        y_speed: 0.0,
        x_desired_angle: 10.0,
        y_desired_angle: 20.0,
        message: message.map(str::to_string),
    }
    .to_bytes();
    bytes.push(b'\n');
    bytes
}

fn texts(entries: &[ConsoleEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.text.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_mixed_traffic_in_arrival_order() {
    let mock = MockChannel::new();
    let ctx = Arc::new(GatewayContext::default());
    ctx.install_device(Box::new(mock.clone()));

    mock.inject_read(b"boot\r\n");
    mock.inject_read(&status_bytes(1, None));
    mock.inject_read(b"armed\n");
    mock.inject_read(&status_bytes(2, Some("tracking")));

    let handle = Poller::new(ctx.clone()).spawn();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(texts(&ctx.console_snapshot().await), vec!["boot", "armed"]);
    let raw = ctx.latest_status().await.expect("status stored");
    let frame = decode_status(&raw).unwrap();
    assert_eq!(frame.control_mode, 2);
    assert_eq!(frame.message.as_deref(), Some("tracking"));
    assert_eq!(mock.pending(), 0);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_keeps_running_after_read_failure() {
    let mock = MockChannel::new();
    let ctx = Arc::new(GatewayContext::default());
    ctx.install_device(Box::new(mock.clone()));

    mock.inject_read(b"before\n");
    mock.set_fail_reads(true);
    let handle = Poller::new(ctx.clone()).spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(ctx.console_snapshot().await.is_empty());

    mock.set_fail_reads(false);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(texts(&ctx.console_snapshot().await), vec!["before"]);

    mock.inject_read(b"after\n");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        texts(&ctx.console_snapshot().await),
        vec!["before", "after"]
    );
    assert!(!handle.is_finished());

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_device() {
    let ctx = Arc::new(GatewayContext::default());
    let handle = Poller::new(ctx.clone()).spawn();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mock = MockChannel::new();
    mock.inject_read(b"hello\n");
    ctx.install_device(Box::new(mock));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(texts(&ctx.console_snapshot().await), vec!["hello"]);
    handle.abort();
}

#[tokio::test]
async fn test_console_overflow_keeps_latest_ten() {
    let mock = MockChannel::new();
    let ctx = Arc::new(GatewayContext::default());
    ctx.install_device(Box::new(mock.clone()));

    for i in 0..14 {
        mock.inject_read(format!("line {i}\n").as_bytes());
    }
    let poller = Poller::new(ctx.clone());
    while poller.poll_once().await.unwrap() != PollOutcome::Idle {}

    let snapshot = ctx.console_snapshot().await;
    let expected: Vec<String> = (4..14).map(|i| format!("line {i}")).collect();
    assert_eq!(texts(&snapshot), expected);
}
