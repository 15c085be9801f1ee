//! Topic-filtered publish/subscribe over TCP.
//!
//! Run with: `cargo run --example pubsub`

use strake::{add_standard_transports, publisher, subscriber, Message, SocketOption, SocketOptions};
use std::time::Duration;

fn main() -> strake::Result<()> {
    strake::dev_tracing::init_tracing();
    let addr = "tcp://127.0.0.1:5557";

    let feed = publisher::socket()?;
    add_standard_transports(&feed)?;
    feed.listen(addr)?;

    let listener = subscriber::with_options(
        SocketOptions::default().with_recv_timeout(Some(Duration::from_secs(2))),
    )?;
    add_standard_transports(&listener)?;
    listener.set_option(SocketOption::Subscribe(bytes::Bytes::from_static(b"news/")))?;
    listener.dial(addr)?;

    // Let the subscriber's pipe attach before publishing.
    std::thread::sleep(Duration::from_millis(500));

    feed.send(Message::from_body(b"news/rust release day"))?;
    feed.send(Message::from_body(b"weather/rain again"))?;
    feed.send(Message::from_body(b"news/ferris spotted"))?;

    for _ in 0..2 {
        let msg = listener.recv()?;
        println!("delivered: {}", String::from_utf8_lossy(msg.body()));
    }

    listener.close();
    feed.close();
    Ok(())
}
