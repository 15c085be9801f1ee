//! Device: a raw bridge joining two sockets (or one socket to itself).
//!
//! A device forwards whole messages between its legs without applying
//! either socket's user-facing protocol semantics: both legs are switched
//! into raw mode, so headers (and with them the Req/Rep backtrace) travel
//! verbatim. The only protocol knowledge a device has is the one-time
//! peer-compatibility check at construction.
//!
//! Forwarding survives pipe churn — the sockets already hide individual
//! connection failures behind their own send/recv contract — and a leg
//! terminates only when its socket is closed or the device is stopped.

use crate::socket::{Socket, SocketOption};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use strake_core::error::{Error, Result};
use tracing::{debug, trace};

/// Poll granularity of the forwarding loops; bounds how long `stop` and
/// socket close take to be observed.
const FORWARD_POLL: Duration = Duration::from_millis(100);

/// A message bridge between two sockets.
pub struct Device {
    front: Option<Socket>,
    back: Option<Socket>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Device {
    /// Join two sockets into a device.
    ///
    /// Exactly one `None` leg builds a one-directional sink: the present
    /// socket is drained and its messages discarded. Passing the same
    /// socket twice builds a loop-back reflector, which is permitted for
    /// any protocol pair with identical numbers even though a protocol is
    /// not its own declared peer.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when both legs are `None`; [`Error::BadProto`]
    /// when both are present and the protocols are neither mutual peers
    /// nor identical.
    pub fn new(front: Option<Socket>, back: Option<Socket>) -> Result<Self> {
        match (&front, &back) {
            (None, None) => return Err(Error::Closed),
            (Some(f), Some(b)) => {
                let mutual_peers =
                    f.peer_number() == b.number() && b.peer_number() == f.number();
                let loopback = f.number() == b.number();
                if !mutual_peers && !loopback {
                    return Err(Error::BadProto);
                }
            }
            _ => {} // one-legged sink, nothing to check
        }
        Ok(Self {
            front,
            back,
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Switch the legs into raw mode and start forwarding.
    ///
    /// Idempotent: calling `start` on a running device does nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if a leg's socket was already closed.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.launch() {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    fn launch(&self) -> Result<()> {
        for leg in [&self.front, &self.back].into_iter().flatten() {
            leg.set_option(SocketOption::Raw(true))?;
        }

        let mut threads = self.threads.lock();
        if let (Some(f), Some(b)) = (&self.front, &self.back) {
            if Socket::same_socket(f, b) {
                // One loop reflects; two would interleave and break ordering.
                let socket = f.clone();
                threads.push(spawn_leg(socket.clone(), Some(socket), self.running.clone())?);
                debug!("[device] loop-back reflector started");
                return Ok(());
            }
        }

        for (src, dst) in [
            (&self.front, &self.back),
            (&self.back, &self.front),
        ] {
            let Some(src) = src.clone() else { continue };
            if !src.can_recv() {
                continue; // nothing can ever arrive on this leg
            }
            threads.push(spawn_leg(src, dst.clone(), self.running.clone())?);
        }
        debug!("[device] forwarding started");
        Ok(())
    }

    /// Halt forwarding. The sockets stay open; stopping twice is a no-op.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }
        debug!("[device] stopped");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_leg(
    src: Socket,
    dst: Option<Socket>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("strake-device".into())
        .spawn(move || forward(&src, dst.as_ref(), &running))
        .map_err(Error::Transport)
}

/// Pump messages from `src` into `dst` (or the void) until the device
/// stops or `src` closes.
fn forward(src: &Socket, dst: Option<&Socket>, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        let msg = match src.recv_timeout(Some(FORWARD_POLL)) {
            Ok(msg) => msg,
            Err(Error::Timeout) => continue,
            Err(Error::Closed) => break,
            Err(e) => {
                trace!("[device] recv error absorbed: {e}");
                continue;
            }
        };

        let Some(dst) = dst else {
            continue; // one-legged device: drain and discard
        };
        if !dst.can_send() {
            continue;
        }

        // Retry through pipe churn; a message is dropped only when its
        // destination socket closes or the device is stopped mid-send.
        loop {
            match dst.send_timeout(msg.clone(), Some(FORWARD_POLL)) {
                Ok(()) => break,
                Err(Error::Timeout) => {
                    if !running.load(Ordering::Relaxed) {
                        return;
                    }
                }
                Err(Error::Closed) => return,
                Err(e) => {
                    trace!("[device] send error absorbed: {e}");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pair, publisher, pull, push, rep, req, subscriber};

    #[test]
    fn test_both_nil_is_closed() {
        assert!(matches!(Device::new(None, None), Err(Error::Closed)));
    }

    #[test]
    fn test_single_leg_is_valid() {
        let s = pair::socket().unwrap();
        assert!(Device::new(Some(s.clone()), None).is_ok());
        assert!(Device::new(None, Some(s)).is_ok());
    }

    #[test]
    fn test_mutual_peers_accepted() {
        let a = req::socket().unwrap();
        let b = rep::socket().unwrap();
        assert!(Device::new(Some(a), Some(b)).is_ok());

        let a = push::socket().unwrap();
        let b = pull::socket().unwrap();
        assert!(Device::new(Some(a), Some(b)).is_ok());

        let a = subscriber::socket().unwrap();
        let b = publisher::socket().unwrap();
        assert!(Device::new(Some(a), Some(b)).is_ok());
    }

    #[test]
    fn test_mismatched_protocols_rejected() {
        let a = req::socket().unwrap();
        let b = pair::socket().unwrap();
        assert!(matches!(
            Device::new(Some(a), Some(b)),
            Err(Error::BadProto)
        ));

        let a = publisher::socket().unwrap();
        let b = pull::socket().unwrap();
        assert!(matches!(
            Device::new(Some(a), Some(b)),
            Err(Error::BadProto)
        ));
    }

    #[test]
    fn test_identical_protocols_are_loopback() {
        // Loop-back exception: same protocol on both legs is allowed even
        // when the protocol is not its own peer.
        let a = req::socket().unwrap();
        let b = req::socket().unwrap();
        assert!(Device::new(Some(a), Some(b)).is_ok());

        let s = pair::socket().unwrap();
        assert!(Device::new(Some(s.clone()), Some(s)).is_ok());
    }
}
