//! The socket hub: one task that owns the protocol and the pipe set.
//!
//! Every socket runs exactly one hub on its driver runtime. The hub
//! multiplexes two queues — user commands and pipe events — through
//! `futures::select!`, so all mutation of the active-pipe set and all
//! protocol calls are serialized by construction: a pipe being removed can
//! never be handed a message concurrently, and fan-out iteration never
//! races an attach.
//!
//! Accept loops, dial loops and per-pipe pumps are detached tasks on the
//! same runtime. They hold clones of a stop receiver whose sender lives in
//! the hub; dropping that sender at shutdown is the broadcast that winds
//! everything down.

use crate::pipe::{inbound_pump, PipeEvent, PipeHandle, PipeId};
use crate::proto::{Protocol, SendPlan};
use crate::socket::{Cmd, SocketOption};
use futures::{select, FutureExt};
use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strake_core::endpoint::Endpoint;
use strake_core::error::{Error, Result};
use strake_core::message::Message;
use strake_core::options::{LinkConfig, SocketOptions};
use strake_core::transport::{Listener, Transport};
use tracing::{debug, trace, warn};

/// Pause after a failed accept so a broken listener cannot spin the loop.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

pub(crate) struct Hub {
    proto: Box<dyn Protocol>,
    options: Arc<Mutex<SocketOptions>>,
    transports: Vec<Arc<dyn Transport>>,
    pipes: HashMap<PipeId, PipeHandle>,
    next_pipe: u32,
    /// Sends waiting for an eligible pipe, oldest first.
    pending: VecDeque<(Message, flume::Sender<Result<()>>)>,
    cmd_rx: flume::Receiver<Cmd>,
    events_tx: flume::Sender<PipeEvent>,
    events_rx: flume::Receiver<PipeEvent>,
    recv_tx: Option<flume::Sender<Message>>,
    /// Dropping this ends every accept loop, dial loop and pipe pump.
    stop_tx: Option<flume::Sender<()>>,
    stop_rx: flume::Receiver<()>,
}

impl Hub {
    pub(crate) fn new(
        proto: Box<dyn Protocol>,
        options: Arc<Mutex<SocketOptions>>,
        cmd_rx: flume::Receiver<Cmd>,
        recv_tx: flume::Sender<Message>,
    ) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        let (stop_tx, stop_rx) = flume::bounded(0);
        Self {
            proto,
            options,
            transports: Vec::new(),
            pipes: HashMap::new(),
            next_pipe: 1,
            pending: VecDeque::new(),
            cmd_rx,
            events_tx,
            events_rx,
            recv_tx: Some(recv_tx),
            stop_tx: Some(stop_tx),
            stop_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("[hub] {} socket up", self.proto.name());
        let close_ack = loop {
            select! {
                cmd = self.cmd_rx.recv_async().fuse() => match cmd {
                    Ok(Cmd::Close(ack)) => break Some(ack),
                    Ok(cmd) => self.handle_cmd(cmd).await,
                    // Every user handle dropped: close implicitly.
                    Err(_) => break None,
                },
                ev = self.events_rx.recv_async().fuse() => match ev {
                    Ok(ev) => self.handle_event(ev),
                    // Unreachable: the hub keeps an events_tx clone alive.
                    Err(_) => break None,
                },
            }
        };
        self.shutdown().await;
        if let Some(ack) = close_ack {
            let _ = ack.send(());
        }
        debug!("[hub] {} socket down", self.proto.name());
    }

    async fn handle_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::AddTransport(transport) => {
                // Last registration for a scheme wins.
                self.transports
                    .retain(|t| t.scheme() != transport.scheme());
                self.transports.push(transport);
            }
            Cmd::Listen(endpoint, reply) => {
                let result = self.start_listener(&endpoint).await;
                let _ = reply.send(result);
            }
            Cmd::Dial(endpoint, reply) => {
                let result = self.start_dialer(&endpoint);
                let _ = reply.send(result);
            }
            Cmd::Send(msg, done) => {
                if done.is_disconnected() {
                    return; // sender already gave up
                }
                if !self.proto.can_send() {
                    let _ = done.send(Err(Error::NotSupported));
                    return;
                }
                let raw = self.raw();
                let plan = self.proto.prep_send(msg, raw);
                self.execute_plan(plan, done);
            }
            Cmd::SetOption(option, reply) => {
                let _ = reply.send(self.apply_option(option));
            }
            Cmd::Close(_) => unreachable!("close is handled in run()"),
        }
    }

    fn handle_event(&mut self, event: PipeEvent) {
        match event {
            PipeEvent::Attached { conn, death } => {
                let id = self.alloc_pipe_id();
                if !self.proto.add_pipe(id) {
                    debug!(
                        "[hub] {} rejected pipe {id}, closing it",
                        self.proto.name()
                    );
                    return; // conn drops here, closing the connection
                }
                let (halt_tx, halt_rx) = flume::bounded(0);
                compio::runtime::spawn(inbound_pump(
                    id,
                    conn.rx,
                    self.events_tx.clone(),
                    halt_rx,
                ))
                .detach();
                self.pipes.insert(
                    id,
                    PipeHandle {
                        tx: conn.tx,
                        _death: death,
                        _halt: halt_tx,
                    },
                );
                trace!("[hub] pipe {id} attached ({} live)", self.pipes.len());
                self.flush_pending();
            }
            PipeEvent::Inbound { pipe, frame } => {
                if !self.pipes.contains_key(&pipe) {
                    return; // raced a close; the pipe is already gone
                }
                let raw = self.raw();
                let msg = Message::from_wire(frame);
                if let Some(delivered) = self.proto.accept_recv(pipe, msg, raw) {
                    if let Some(tx) = &self.recv_tx {
                        let _ = tx.send(delivered);
                    }
                }
            }
            PipeEvent::Down { pipe } => self.drop_pipe(pipe),
        }
    }

    async fn start_listener(&mut self, endpoint: &Endpoint) -> Result<()> {
        let transport = self.find_transport(endpoint)?;
        let config = self.link_config();
        let listener = transport
            .listen(endpoint, &config)
            .await
            .map_err(Error::from_io)?;
        compio::runtime::spawn(accept_loop(
            listener,
            self.events_tx.clone(),
            self.stop_rx.clone(),
        ))
        .detach();
        Ok(())
    }

    fn start_dialer(&mut self, endpoint: &Endpoint) -> Result<()> {
        let transport = self.find_transport(endpoint)?;
        let config = self.link_config();
        let opts = self.options.lock();
        let (base, ceiling) = (opts.reconnect_ivl, opts.reconnect_ivl_max);
        drop(opts);
        compio::runtime::spawn(dial_loop(
            transport,
            endpoint.clone(),
            config,
            base,
            ceiling,
            self.events_tx.clone(),
            self.stop_rx.clone(),
        ))
        .detach();
        Ok(())
    }

    fn find_transport(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        self.transports
            .iter()
            .find(|t| t.scheme() == endpoint.scheme())
            .cloned()
            .ok_or_else(|| {
                Error::AddrInvalid(format!(
                    "no transport registered for scheme '{}'",
                    endpoint.scheme()
                ))
            })
    }

    fn link_config(&self) -> LinkConfig {
        LinkConfig::new(
            self.proto.number().as_u16(),
            self.proto.peer_number().as_u16(),
            &self.options.lock(),
        )
    }

    fn raw(&self) -> bool {
        self.options.lock().raw
    }

    fn apply_option(&mut self, option: SocketOption) -> Result<()> {
        let mut opts = self.options.lock();
        match &option {
            SocketOption::RecvTimeout(d) => opts.recv_timeout = *d,
            SocketOption::SendTimeout(d) => opts.send_timeout = *d,
            SocketOption::Linger(d) => opts.linger = *d,
            SocketOption::ReconnectIvl(d) => opts.reconnect_ivl = *d,
            SocketOption::ReconnectIvlMax(d) => opts.reconnect_ivl_max = *d,
            SocketOption::MaxRecvSize(n) => opts.max_recv_size = *n,
            SocketOption::Raw(flag) => opts.raw = *flag,
            SocketOption::Subscribe(_) | SocketOption::Unsubscribe(_) => {
                drop(opts);
                return self.proto.set_option(&option);
            }
        }
        Ok(())
    }

    fn alloc_pipe_id(&mut self) -> PipeId {
        // 31-bit ids, never zero, skipping any id still live after a wrap.
        loop {
            let id = self.next_pipe;
            self.next_pipe = if self.next_pipe >= 0x7FFF_FFFF {
                1
            } else {
                self.next_pipe + 1
            };
            if !self.pipes.contains_key(&PipeId(id)) {
                return PipeId(id);
            }
        }
    }

    fn drop_pipe(&mut self, pipe: PipeId) {
        if self.pipes.remove(&pipe).is_some() {
            trace!("[hub] pipe {pipe} detached ({} live)", self.pipes.len());
        }
        self.proto.remove_pipe(pipe);
    }

    /// Carry out one send plan, re-planning through pipe churn.
    fn execute_plan(&mut self, mut plan: SendPlan, done: flume::Sender<Result<()>>) {
        loop {
            match plan {
                SendPlan::Unicast(pipe, msg) => {
                    let delivered = self
                        .pipes
                        .get(&pipe)
                        .is_some_and(|h| h.tx.send(msg.to_wire()).is_ok());
                    if delivered {
                        let _ = done.send(Ok(()));
                        return;
                    }
                    // The planned pipe died underneath us; forget it and
                    // let the protocol choose again.
                    self.drop_pipe(pipe);
                    let raw = self.raw();
                    plan = self.proto.replan_send(msg, raw);
                }
                SendPlan::UnicastOrDrop(pipe, msg) => {
                    if let Some(handle) = self.pipes.get(&pipe) {
                        if handle.tx.send(msg.to_wire()).is_err() {
                            self.drop_pipe(pipe);
                        }
                    } else {
                        trace!("[hub] reply path {pipe} is gone, dropping");
                    }
                    let _ = done.send(Ok(()));
                    return;
                }
                SendPlan::Broadcast(pipes, msg) => {
                    let frame = msg.to_wire();
                    let mut dead: SmallVec<[PipeId; 4]> = SmallVec::new();
                    for pipe in pipes {
                        if let Some(handle) = self.pipes.get(&pipe) {
                            if handle.tx.send(frame.clone()).is_err() {
                                dead.push(pipe);
                            }
                        }
                    }
                    for pipe in dead {
                        self.drop_pipe(pipe);
                    }
                    let _ = done.send(Ok(()));
                    return;
                }
                SendPlan::Queue(msg) => {
                    self.pending.push_back((msg, done));
                    return;
                }
                SendPlan::Discard => {
                    let _ = done.send(Ok(()));
                    return;
                }
            }
        }
    }

    /// Retry parked sends after a pipe attached.
    fn flush_pending(&mut self) {
        let raw = self.raw();
        while let Some((msg, done)) = self.pending.pop_front() {
            if done.is_disconnected() {
                continue; // sender timed out; the message dies unsent
            }
            match self.proto.replan_send(msg, raw) {
                SendPlan::Queue(msg) => {
                    self.pending.push_front((msg, done));
                    break;
                }
                plan => self.execute_plan(plan, done),
            }
        }
    }

    async fn shutdown(&mut self) {
        // Unblock receivers and parked senders first.
        self.recv_tx = None;
        self.pending.clear();
        // Stop accept loops, dial loops and pipe pumps.
        self.stop_tx = None;

        // Give already-queued outbound frames up to the linger interval to
        // reach the transport write pumps.
        let linger = self.options.lock().linger;
        let deadline = Instant::now() + linger;
        loop {
            let queued: usize = self.pipes.values().map(|h| h.tx.len()).sum();
            if queued == 0 || Instant::now() >= deadline {
                if queued > 0 {
                    warn!("[hub] linger elapsed with {queued} frames unflushed");
                }
                break;
            }
            compio::time::sleep(Duration::from_millis(5)).await;
        }
        // One more beat so a frame picked up by a write pump finishes its
        // final write before the runtime is torn down.
        compio::time::sleep(Duration::from_millis(10)).await;

        let pipes: Vec<PipeId> = self.pipes.keys().copied().collect();
        for pipe in pipes {
            self.drop_pipe(pipe);
        }
    }
}

async fn accept_loop(
    mut listener: Box<dyn Listener>,
    events: flume::Sender<PipeEvent>,
    stop: flume::Receiver<()>,
) {
    loop {
        select! {
            _ = stop.recv_async().fuse() => break,
            accepted = listener.accept().fuse() => match accepted {
                Ok(conn) => {
                    if events
                        .send_async(PipeEvent::Attached { conn, death: None })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    debug!("[accept] {e}");
                    // Boxed: compio's sleep future is not Unpin.
                    let mut pause = Box::pin(compio::time::sleep(ACCEPT_RETRY).fuse());
                    select! {
                        _ = stop.recv_async().fuse() => break,
                        _ = pause => {}
                    }
                }
            },
        }
    }
    trace!("[accept] loop ended");
}

async fn dial_loop(
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    config: LinkConfig,
    base: Duration,
    ceiling: Duration,
    events: flume::Sender<PipeEvent>,
    stop: flume::Receiver<()>,
) {
    let mut backoff = strake_core::backoff::Backoff::new(base, ceiling);
    loop {
        match transport.dial(&endpoint, &config).await {
            Ok(conn) => {
                backoff.reset();
                let (death_tx, death_rx) = flume::bounded(0);
                if events
                    .send_async(PipeEvent::Attached {
                        conn,
                        death: Some(death_tx),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
                // Park until the pipe dies (its handle, holding our death
                // sender, is dropped) or the socket closes.
                select! {
                    _ = stop.recv_async().fuse() => break,
                    _ = death_rx.recv_async().fuse() => {
                        debug!("[dial] pipe to {endpoint} went down, redialing");
                    }
                }
            }
            Err(e) => trace!("[dial] {endpoint}: {e}"),
        }
        let delay = backoff.next_delay();
        let mut pause = Box::pin(compio::time::sleep(delay).fuse());
        select! {
            _ = stop.recv_async().fuse() => break,
            _ = pause => {}
        }
    }
    trace!("[dial] loop for {endpoint} ended");
}
