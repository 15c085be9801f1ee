//! Loop-back device demo: one pair socket reflects everything a remote
//! peer sends at it.
//!
//! Run with: `cargo run --example pair_reflect`

use strake::{add_standard_transports, pair, Device, Message, SocketOptions};
use std::time::Duration;

fn main() -> strake::Result<()> {
    strake::dev_tracing::init_tracing();
    let addr = "tcp://127.0.0.1:5555";

    let reflector = pair::socket()?;
    add_standard_transports(&reflector)?;
    reflector.listen(addr)?;

    let device = Device::new(Some(reflector.clone()), Some(reflector.clone()))?;
    device.start()?;

    let client = pair::with_options(
        SocketOptions::default()
            .with_recv_timeout(Some(Duration::from_secs(2)))
            .with_send_timeout(Some(Duration::from_secs(2))),
    )?;
    add_standard_transports(&client)?;
    client.dial(addr)?;

    for i in 0..5u32 {
        let body = format!("echo {i}");
        client.send(Message::from_body(&body))?;
        let msg = client.recv()?;
        println!("reflected: {}", String::from_utf8_lossy(msg.body()));
    }

    device.stop();
    client.close();
    reflector.close();
    Ok(())
}
