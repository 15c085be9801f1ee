//! Request/reply integration: direct correlation, and replies retracing a
//! device hop via the backtrace header.

mod common;

use common::*;
use strake::{add_standard_transports, rep, req, Device, Message, Socket};

fn socket_with_transports(s: Socket) -> Socket {
    add_standard_transports(&s).unwrap();
    s
}

#[test]
fn test_req_rep_direct() {
    let addr = tcp_addr();
    let server = socket_with_transports(rep::with_options(test_options()).unwrap());
    server.listen(&addr).unwrap();

    let client = socket_with_transports(req::with_options(test_options()).unwrap());
    client.dial(&addr).unwrap();

    for round in 0..5u8 {
        client
            .send(Message::from_body(format!("ask-{round}")))
            .unwrap();
        let question = server.recv().unwrap();
        assert_eq!(question.body(), format!("ask-{round}").as_bytes());
        assert!(question.header().is_empty(), "backtrace must be stripped");

        server
            .send(Message::from_body(format!("answer-{round}")))
            .unwrap();
        let answer = client.recv().unwrap();
        assert_eq!(answer.body(), format!("answer-{round}").as_bytes());
    }

    client.close();
    server.close();
}

/// req client -> [raw rep leg | device | raw req leg] -> rep server.
/// The reply must retrace the request's path through the device.
#[test]
fn test_req_rep_through_device() {
    let front = tcp_addr();
    let back = inproc_addr();

    let server = socket_with_transports(rep::with_options(test_options()).unwrap());
    server.listen(&back).unwrap();

    let dev_rep = socket_with_transports(rep::with_options(test_options()).unwrap());
    dev_rep.listen(&front).unwrap();
    let dev_req = socket_with_transports(req::with_options(test_options()).unwrap());
    dev_req.dial(&back).unwrap();

    let device = Device::new(Some(dev_rep.clone()), Some(dev_req.clone())).unwrap();
    device.start().unwrap();

    let client = socket_with_transports(req::with_options(test_options()).unwrap());
    client.dial(&front).unwrap();

    for round in 0..10u8 {
        client.send(Message::from_body(&[round])).unwrap();
        let question = server.recv().unwrap();
        assert_eq!(question.body(), &[round]);

        server.send(Message::from_body(&[round, round])).unwrap();
        let answer = client.recv().unwrap();
        assert_eq!(answer.body(), &[round, round]);
    }

    device.stop();
    client.close();
    server.close();
    dev_rep.close();
    dev_req.close();
}
