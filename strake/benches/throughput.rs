//! Round-trip throughput over the inproc transport.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::time::Duration;
use strake::{add_standard_transports, pair, Message, SocketOptions};

fn pair_inproc_roundtrip(c: &mut Criterion) {
    let addr = "inproc://bench-pair";
    let options = SocketOptions::default()
        .with_recv_timeout(Some(Duration::from_secs(5)))
        .with_send_timeout(Some(Duration::from_secs(5)));

    let server = pair::with_options(options.clone()).unwrap();
    add_standard_transports(&server).unwrap();
    server.listen(addr).unwrap();

    let echo = {
        let server = server.clone();
        std::thread::spawn(move || {
            while let Ok(msg) = server.recv() {
                if server.send(msg).is_err() {
                    break;
                }
            }
        })
    };

    let client = pair::with_options(options).unwrap();
    add_standard_transports(&client).unwrap();
    client.dial(addr).unwrap();

    let payload = vec![0u8; 64];
    let mut group = c.benchmark_group("pair");
    group.throughput(Throughput::Elements(1));
    group.bench_function("inproc_roundtrip_64b", |b| {
        b.iter(|| {
            client.send(Message::from_body(&payload)).unwrap();
            client.recv().unwrap()
        });
    });
    group.finish();

    client.close();
    server.close();
    let _ = echo.join();
}

criterion_group!(benches, pair_inproc_roundtrip);
criterion_main!(benches);
