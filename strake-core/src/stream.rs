//! Shared IO pumps for stream-oriented transports.
//!
//! TCP and IPC pipes are driven by a pair of detached tasks on the
//! socket's driver runtime: a write pump draining outbound frames onto the
//! stream, and a read pump feeding the frame decoder. The two halves run
//! on `try_clone`d handles of the same stream; a halt channel ties their
//! lifetimes together so the file descriptor is fully released as soon as
//! either side stops.

use crate::options::LinkConfig;
use crate::transport::Conn;
use crate::wire::{encode_frame, parse_sp_header, sp_header, FrameDecoder, SP_HEADER_LEN};
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use compio::runtime::TryClone;
use futures::{select, FutureExt};
use std::io;
use tracing::trace;

/// Exchange SP connection headers with the peer, both sides sending first.
///
/// # Errors
///
/// Fails on IO errors, a malformed header, a peer announcing the wrong
/// protocol number, or the handshake deadline elapsing.
pub async fn exchange_sp_handshake<S>(stream: &mut S, config: &LinkConfig) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let required = config.peer_proto;
    let exchange = async {
        let BufResult(res, _) = stream.write_all(sp_header(config.self_proto)).await;
        res?;

        let buf = vec![0u8; SP_HEADER_LEN];
        let BufResult(res, buf) = stream.read_exact(buf).await;
        res?;

        let peer = parse_sp_header(&buf)?;
        if peer != required {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("peer announced protocol {peer}, required {required}"),
            ));
        }
        Ok(())
    };

    match compio::time::timeout(config.handshake_timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "SP handshake timed out",
        )),
    }
}

/// Wrap a handshaken stream into a [`Conn`], spawning its IO pumps.
///
/// # Errors
///
/// Fails if the stream cannot be cloned for the read half.
pub fn spawn_duplex<S>(stream: S, config: &LinkConfig) -> io::Result<Conn>
where
    S: AsyncRead + AsyncWrite + TryClone + Unpin + 'static,
{
    let reader = stream.try_clone()?;
    let writer = stream;

    let (in_tx, in_rx) = flume::unbounded();
    let (out_tx, out_rx) = flume::unbounded();
    // Never carries data; dropping the sender is the read pump's halt signal.
    let (halt_tx, halt_rx) = flume::bounded::<()>(0);

    let max_frame = config.max_recv_size;
    let chunk = config.read_buffer_size;
    compio::runtime::spawn(read_pump(reader, in_tx, halt_rx, max_frame, chunk)).detach();
    compio::runtime::spawn(write_pump(writer, out_rx, halt_tx)).detach();

    Ok(Conn {
        tx: out_tx,
        rx: in_rx,
    })
}

async fn read_pump<S>(
    mut stream: S,
    in_tx: flume::Sender<Bytes>,
    halt_rx: flume::Receiver<()>,
    max_frame: Option<usize>,
    chunk: usize,
) where
    S: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(max_frame);
    // Boxed so the opaque compio read future satisfies select!'s Unpin
    // requirement; the halt future is polled across iterations.
    let mut halted = Box::pin(halt_rx.recv_async().fuse());
    'pump: loop {
        let buf = vec![0u8; chunk];
        let mut read = Box::pin(AsyncRead::read(&mut stream, buf).fuse());
        let res = select! {
            _ = halted => break 'pump,
            res = read => res,
        };
        match res {
            BufResult(Ok(0), _) => {
                trace!("[stream] EOF from peer");
                break 'pump;
            }
            BufResult(Ok(n), buf) => {
                decoder.extend(&buf[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(frame)) => {
                            if in_tx.send_async(frame).await.is_err() {
                                break 'pump;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            trace!("[stream] framing error: {e}");
                            break 'pump;
                        }
                    }
                }
            }
            BufResult(Err(e), _) => {
                trace!("[stream] read error: {e}");
                break 'pump;
            }
        }
    }
}

async fn write_pump<S>(mut stream: S, out_rx: flume::Receiver<Bytes>, _halt_tx: flume::Sender<()>)
where
    S: AsyncWrite + Unpin,
{
    // recv_async keeps yielding already-queued frames after the socket
    // side disconnects, which is the bounded close-time drain.
    while let Ok(frame) = out_rx.recv_async().await {
        let buf = encode_frame(&frame);
        let BufResult(res, _) = stream.write_all(buf).await;
        if let Err(e) = res {
            trace!("[stream] write error: {e}");
            break;
        }
    }
    // _halt_tx drops here, releasing the read half as well.
}
