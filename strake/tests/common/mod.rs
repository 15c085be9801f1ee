//! Shared scaffolding for the integration suites: unique test addresses
//! per transport and the socket options every test socket uses.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use strake::{Message, Socket, SocketOptions};

/// Generous deadline so a wedged runtime fails the test instead of
/// hanging it.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn test_options() -> SocketOptions {
    SocketOptions::default()
        .with_recv_timeout(Some(TEST_TIMEOUT))
        .with_send_timeout(Some(TEST_TIMEOUT))
        .with_reconnect_ivl(Duration::from_millis(25))
        .with_reconnect_ivl_max(Duration::from_secs(1))
        .with_linger(Duration::from_millis(200))
}

pub fn tcp_addr() -> String {
    let port = portpicker::pick_unused_port().expect("no free TCP port");
    format!("tcp://127.0.0.1:{port}")
}

pub fn ipc_addr() -> String {
    format!(
        "ipc:///tmp/strake-test-{}-{}.sock",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

pub fn inproc_addr() -> String {
    format!(
        "inproc://test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// Send `count` sequence-tagged messages and expect them back, byte for
/// byte and in order.
pub fn round_trip(client: &Socket, count: u8) {
    for i in 0..count {
        client
            .send(Message::from_body(&[i]))
            .unwrap_or_else(|e| panic!("send {i}: {e}"));
    }
    for i in 0..count {
        let msg = client
            .recv()
            .unwrap_or_else(|e| panic!("recv {i}: {e}"));
        assert_eq!(msg.body(), &[i], "message {i} came back different");
    }
}
