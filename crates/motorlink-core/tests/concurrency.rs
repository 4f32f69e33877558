//! Poller and API traffic sharing one device handle

use motorlink_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_while_polling() {
    let mock = MockChannel::with_responder(|written| {
        let frame = CommandFrame::from_bytes(written).ok()?;
        Some(format!("ack {}\n", frame.value).into_bytes())
    });
    let timing = GatewayTiming {
        poll_idle: Duration::from_millis(1),
        ..Default::default()
    };
    let ctx = Arc::new(GatewayContext::new(timing));
    ctx.install_device(Box::new(mock.clone()));
    let poller = Poller::new(ctx.clone()).spawn();

    let gateway = Gateway::new(ctx.clone());
    let senders: Vec<_> = (0..40)
        .map(|i| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.send(2, (i % 3) as u8, i).await })
        })
        .collect();

    let joined = tokio::time::timeout(Duration::from_secs(5), async {
        for sender in senders {
            sender.await.expect("task panicked").expect("send failed");
        }
    })
    .await;
    assert!(joined.is_ok(), "Senders deadlocked or timed out");

    // Every write landed as a whole frame
    let written = mock.written();
    assert_eq!(written.len(), 40 * 8);
    let mut values: Vec<i32> = written
        .chunks(8)
        .map(|chunk| CommandFrame::from_bytes(chunk).expect("intact frame").value)
        .collect();
    values.sort_unstable();
    assert_eq!(values, (0..40).collect::<Vec<i32>>());

    // The poller saw the acks; only the newest ten are kept
    tokio::time::sleep(Duration::from_millis(200)).await;
    poller.abort();
    let console = ctx.console_snapshot().await;
    assert_eq!(console.len(), 10);
    assert!(console.iter().all(|e| e.text.starts_with("ack ")));
}
