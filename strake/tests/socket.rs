//! Socket runtime behavior: close semantics, dial retry, pair
//! exclusivity, handshake protocol checks, and option errors.

mod common;

use common::*;
use std::time::{Duration, Instant};
use strake::{
    add_standard_transports, pair, publisher, rep, req, subscriber, Error, Message, Socket,
};

fn pair_socket() -> Socket {
    let s = pair::with_options(test_options()).unwrap();
    add_standard_transports(&s).unwrap();
    s
}

#[test]
fn test_close_unblocks_recv() {
    let socket = pair::socket().unwrap();
    let handle = {
        let socket = socket.clone();
        std::thread::spawn(move || socket.recv_timeout(None))
    };

    std::thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    socket.close();
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(Error::Closed)));
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "close took unbounded time"
    );
}

#[test]
fn test_close_is_idempotent() {
    let socket = pair_socket();
    socket.close();
    socket.close();
    socket.close();

    assert!(matches!(socket.listen("inproc://after-close"), Err(Error::Closed)));
    assert!(matches!(
        socket.send(Message::from_body(b"x")),
        Err(Error::Closed)
    ));
    assert!(matches!(socket.recv(), Err(Error::Closed)));
}

#[test]
fn test_close_unblocks_parked_send() {
    // No peer ever attaches, so the send parks until close.
    let socket = pair_socket();
    let handle = {
        let socket = socket.clone();
        std::thread::spawn(move || socket.send_timeout(Message::from_body(b"x"), None))
    };
    std::thread::sleep(Duration::from_millis(100));
    socket.close();
    assert!(matches!(handle.join().unwrap(), Err(Error::Closed)));
}

#[test]
fn test_dial_retries_until_listener_appears() {
    let addr = tcp_addr();

    let client = pair_socket();
    client.dial(&addr).unwrap();

    // Nothing is listening yet; the dial loop must keep retrying.
    std::thread::sleep(Duration::from_millis(300));

    let server = pair_socket();
    server.listen(&addr).unwrap();

    client.send(Message::from_body(b"made it")).unwrap();
    let msg = server.recv().unwrap();
    assert_eq!(msg.body(), b"made it");

    client.close();
    server.close();
}

#[test]
fn test_pair_rejects_second_peer() {
    let addr = inproc_addr();
    let server = pair_socket();
    server.listen(&addr).unwrap();

    let first = pair_socket();
    first.dial(&addr).unwrap();
    first.send(Message::from_body(b"one")).unwrap();
    assert_eq!(server.recv().unwrap().body(), b"one");

    // Second peer: its connections are rejected while the first is live.
    // A send may report local success (bytes handed to a connection the
    // listener is about to cut) but must never reach the server.
    let second = pair_socket();
    second.dial(&addr).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    match second.send_timeout(Message::from_body(b"two"), Some(Duration::from_millis(300))) {
        Ok(()) | Err(Error::Timeout) => {}
        Err(e) => panic!("unexpected error for rejected peer: {e}"),
    }

    // The existing pairing is not corrupted by the rejected peer, and
    // nothing from the rejected one ever surfaces.
    first.send(Message::from_body(b"three")).unwrap();
    assert_eq!(server.recv().unwrap().body(), b"three");

    first.close();
    second.close();
    server.close();
}

#[test]
fn test_handshake_rejects_wrong_protocol() {
    let addr = tcp_addr();
    let server = add_with(rep::with_options(test_options()).unwrap());
    server.listen(&addr).unwrap();

    // A pair socket dialing a rep listener fails the SP handshake and
    // keeps retrying in the background without hurting the listener.
    let intruder = pair_socket();
    intruder.dial(&addr).unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let client = add_with(req::with_options(test_options()).unwrap());
    client.dial(&addr).unwrap();
    client.send(Message::from_body(b"legit")).unwrap();
    assert_eq!(server.recv().unwrap().body(), b"legit");

    intruder.close();
    client.close();
    server.close();
}

#[test]
fn test_recv_deadline_expires() {
    let socket = pair_socket();
    let started = Instant::now();
    match socket.recv_timeout(Some(Duration::from_millis(100))) {
        Err(Error::Timeout) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_listen_addr_in_use() {
    let addr = inproc_addr();
    let first = pair_socket();
    first.listen(&addr).unwrap();

    let second = pair_socket();
    match second.listen(&addr) {
        Err(Error::AddrInUse) => {}
        other => panic!("expected AddrInUse, got {other:?}"),
    }

    first.close();
    second.close();
}

#[test]
fn test_listen_without_transport_is_invalid() {
    let socket = pair::socket().unwrap(); // no transports registered
    match socket.listen("tcp://127.0.0.1:4444") {
        Err(Error::AddrInvalid(_)) => {}
        other => panic!("expected AddrInvalid, got {other:?}"),
    }
    socket.close();
}

#[test]
fn test_bad_address_is_invalid() {
    let socket = pair_socket();
    assert!(matches!(
        socket.dial("carrier-pigeon://roof"),
        Err(Error::AddrInvalid(_))
    ));
    assert!(matches!(
        socket.listen("tcp://not-an-address"),
        Err(Error::AddrInvalid(_))
    ));
    socket.close();
}

#[test]
fn test_protocol_asymmetry_errors() {
    let sub = subscriber::socket().unwrap();
    assert!(matches!(
        sub.send(Message::from_body(b"x")),
        Err(Error::NotSupported)
    ));
    sub.close();

    let publisher = publisher::socket().unwrap();
    assert!(matches!(publisher.recv(), Err(Error::NotSupported)));
    publisher.close();
}

fn add_with(s: Socket) -> Socket {
    add_standard_transports(&s).unwrap();
    s
}
