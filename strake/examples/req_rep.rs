//! Minimal request/reply over IPC (TCP on non-Unix platforms).
//!
//! Run with: `cargo run --example req_rep`

use strake::{add_standard_transports, rep, req, Message, SocketOptions};
use std::time::Duration;

fn main() -> strake::Result<()> {
    strake::dev_tracing::init_tracing();

    #[cfg(unix)]
    let addr = "ipc:///tmp/strake-req-rep.sock";
    #[cfg(not(unix))]
    let addr = "tcp://127.0.0.1:5556";

    let options = SocketOptions::default()
        .with_recv_timeout(Some(Duration::from_secs(2)))
        .with_send_timeout(Some(Duration::from_secs(2)));

    let server = rep::with_options(options.clone())?;
    add_standard_transports(&server)?;
    server.listen(addr)?;

    let responder = {
        let server = server.clone();
        std::thread::spawn(move || -> strake::Result<()> {
            for _ in 0..3 {
                let question = server.recv()?;
                let mut reply = Message::from_body(b"pong: ");
                reply.append_body(question.body());
                server.send(reply)?;
            }
            Ok(())
        })
    };

    let client = req::with_options(options)?;
    add_standard_transports(&client)?;
    client.dial(addr)?;

    for i in 0..3u32 {
        client.send(Message::from_body(format!("ping {i}")))?;
        let reply = client.recv()?;
        println!("{}", String::from_utf8_lossy(reply.body()));
    }

    responder.join().expect("responder panicked")?;
    client.close();
    server.close();
    Ok(())
}
