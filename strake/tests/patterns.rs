//! Fan-out and fan-in patterns end to end: pub/sub filtering, push/pull
//! distribution, bus broadcast, and a survey round.

mod common;

use common::*;
use std::time::Duration;
use strake::{
    add_standard_transports, bus, publisher, pull, push, subscriber, survey, Error, Message,
    Socket, SocketOption,
};

fn with_transports(s: Socket) -> Socket {
    add_standard_transports(&s).unwrap();
    s
}

/// Give background dial/accept loops time to attach their pipes.
fn settle() {
    std::thread::sleep(Duration::from_millis(500));
}

#[test]
fn test_pubsub_topic_filtering() {
    let addr = tcp_addr();
    let publisher = with_transports(publisher::with_options(test_options()).unwrap());
    publisher.listen(&addr).unwrap();

    let weather = with_transports(subscriber::with_options(test_options()).unwrap());
    weather
        .set_option(SocketOption::Subscribe(bytes::Bytes::from_static(
            b"weather/",
        )))
        .unwrap();
    weather.dial(&addr).unwrap();

    let sports = with_transports(subscriber::with_options(test_options()).unwrap());
    sports
        .set_option(SocketOption::Subscribe(bytes::Bytes::from_static(b"sports/")))
        .unwrap();
    sports.dial(&addr).unwrap();

    settle();

    publisher
        .send(Message::from_body(b"weather/oslo cold"))
        .unwrap();
    publisher
        .send(Message::from_body(b"sports/final 2-1"))
        .unwrap();
    publisher
        .send(Message::from_body(b"politics/quiet day"))
        .unwrap();

    assert_eq!(weather.recv().unwrap().body(), b"weather/oslo cold");
    assert_eq!(sports.recv().unwrap().body(), b"sports/final 2-1");

    // The unmatched topic was dropped on the subscriber side.
    for s in [&weather, &sports] {
        match s.recv_timeout(Some(Duration::from_millis(300))) {
            Err(Error::Timeout) => {}
            other => panic!("expected silence, got {other:?}"),
        }
    }

    publisher.close();
    weather.close();
    sports.close();
}

#[test]
fn test_push_pull_round_robin() {
    let addr = inproc_addr();
    let head = with_transports(push::with_options(test_options()).unwrap());
    head.listen(&addr).unwrap();

    let workers: Vec<Socket> = (0..2)
        .map(|_| {
            let w = with_transports(pull::with_options(test_options()).unwrap());
            w.dial(&addr).unwrap();
            w
        })
        .collect();
    settle();

    for i in 0..10u8 {
        head.send(Message::from_body(&[i])).unwrap();
    }

    // Strict rotation over two stable pipes: five messages each.
    for worker in &workers {
        let mut got = 0;
        while worker
            .recv_timeout(Some(Duration::from_millis(500)))
            .is_ok()
        {
            got += 1;
        }
        assert_eq!(got, 5, "uneven pipeline distribution");
    }

    head.close();
    for w in workers {
        w.close();
    }
}

#[test]
fn test_bus_broadcast() {
    let addr = inproc_addr();
    let hub = with_transports(bus::with_options(test_options()).unwrap());
    hub.listen(&addr).unwrap();

    let spoke_a = with_transports(bus::with_options(test_options()).unwrap());
    spoke_a.dial(&addr).unwrap();
    let spoke_b = with_transports(bus::with_options(test_options()).unwrap());
    spoke_b.dial(&addr).unwrap();
    settle();

    hub.send(Message::from_body(b"to-everyone")).unwrap();
    assert_eq!(spoke_a.recv().unwrap().body(), b"to-everyone");
    assert_eq!(spoke_b.recv().unwrap().body(), b"to-everyone");

    // A spoke's message reaches the hub but not the other spoke (no
    // rebroadcast without a device).
    spoke_a.send(Message::from_body(b"from-a")).unwrap();
    assert_eq!(hub.recv().unwrap().body(), b"from-a");
    match spoke_b.recv_timeout(Some(Duration::from_millis(300))) {
        Err(Error::Timeout) => {}
        other => panic!("expected silence on the other spoke, got {other:?}"),
    }

    hub.close();
    spoke_a.close();
    spoke_b.close();
}

#[test]
fn test_survey_round() {
    let addr = inproc_addr();
    let surveyor = with_transports(survey::surveyor_with_options(test_options()).unwrap());
    surveyor.listen(&addr).unwrap();

    let respondents: Vec<Socket> = (0..2)
        .map(|_| {
            let r = with_transports(survey::respondent_with_options(test_options()).unwrap());
            r.dial(&addr).unwrap();
            r
        })
        .collect();
    settle();

    surveyor.send(Message::from_body(b"who is awake?")).unwrap();

    for (i, r) in respondents.iter().enumerate() {
        let question = r.recv().unwrap();
        assert_eq!(question.body(), b"who is awake?");
        r.send(Message::from_body(&[i as u8])).unwrap();
    }

    let mut answers: Vec<u8> = (0..2)
        .map(|_| surveyor.recv().unwrap().body()[0])
        .collect();
    answers.sort_unstable();
    assert_eq!(answers, vec![0, 1]);

    surveyor.close();
    for r in respondents {
        r.close();
    }
}
