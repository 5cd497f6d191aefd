//! Listener against a loopback call monitor

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::timeout;

use callmon_core::events::{EventHub, MonitorMessage, MonitorReceiver};
use callmon_core::listener::{EventListener, ListenerState, MAX_LINE_LEN};

async fn next(queue: &mut MonitorReceiver) -> MonitorMessage {
    timeout(Duration::from_secs(5), queue.recv())
        .await
        .expect("no message within 5s")
        .expect("queue closed")
}

#[tokio::test]
async fn test_lines_fan_out_and_reconnect() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = server.local_addr().unwrap().to_string();

    let hub = Arc::new(EventHub::new());
    let mut search = hub.subscribe();
    let mut absence = hub.subscribe();

    let listener = EventListener::with_endpoint(
        endpoint,
        Duration::from_secs(1),
        Duration::from_millis(50),
        hub.clone(),
    );
    let task = listener.spawn();

    // First connection: two lines split over writes, then the gateway hangs up
    let (mut socket, _) = server.accept().await.unwrap();
    socket
        .write_all(b"18.10.26 09:14:02;RING;0;0612345678;987654;SIP0;\r\n18.10.26 09:14")
        .await
        .unwrap();
    socket.write_all(b":09;DISCONNECT;0;0;\r\n\r\n").await.unwrap();
    drop(socket);

    for queue in [&mut search, &mut absence] {
        assert_eq!(
            next(queue).await,
            MonitorMessage::line("18.10.26 09:14:02;RING;0;0612345678;987654;SIP0;")
        );
        assert_eq!(
            next(queue).await,
            MonitorMessage::line("18.10.26 09:14:09;DISCONNECT;0;0;")
        );
        assert_eq!(next(queue).await, MonitorMessage::ConnectionLost);
    }

    // The listener comes back after its backoff
    let (mut socket, _) = timeout(Duration::from_secs(5), server.accept())
        .await
        .expect("no reconnect")
        .unwrap();
    socket.write_all(b"RING;1;0613;987654;SIP0;\n").await.unwrap();
    assert_eq!(next(&mut search).await, MonitorMessage::line("RING;1;0613;987654;SIP0;"));
    assert_eq!(next(&mut absence).await, MonitorMessage::line("RING;1;0613;987654;SIP0;"));

    task.abort();
}

#[tokio::test]
async fn test_overlong_line_dropped() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = server.local_addr().unwrap().to_string();

    let hub = Arc::new(EventHub::new());
    let mut queue = hub.subscribe();
    let task = EventListener::with_endpoint(
        endpoint,
        Duration::from_secs(1),
        Duration::from_millis(50),
        hub.clone(),
    )
    .spawn();

    let (mut socket, _) = server.accept().await.unwrap();
    let garbage = vec![b'x'; MAX_LINE_LEN * 3];
    socket.write_all(&garbage).await.unwrap();
    socket.write_all(b"\nRING;1;0613;987654;SIP0;\n").await.unwrap();

    // The connection survives and the next line arrives intact
    assert_eq!(next(&mut queue).await, MonitorMessage::line("RING;1;0613;987654;SIP0;"));
    task.abort();
}

#[tokio::test]
async fn test_unreachable_gateway_keeps_retrying() {
    // Bind and drop to get a port nobody listens on
    let endpoint = {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        server.local_addr().unwrap().to_string()
    };

    let hub = Arc::new(EventHub::new());
    let mut queue = hub.subscribe();
    let listener = EventListener::with_endpoint(
        endpoint,
        Duration::from_millis(200),
        Duration::from_millis(20),
        hub,
    );
    let mut state = listener.state();
    let task = listener.spawn();

    // Every attempt moves the state on; a stopped loop would time out here
    for _ in 0..4 {
        timeout(Duration::from_secs(5), state.changed())
            .await
            .expect("listener stopped retrying")
            .unwrap();
    }
    assert_ne!(*state.borrow(), ListenerState::Connected);

    // A failed connect never produced a connection, so nothing was published
    assert!(queue.try_recv().is_err());
    task.abort();
}
