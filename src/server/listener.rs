use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::sys::epoll::{EpollEvent, EpollFlags};
use signal_hook::consts::{SIGINT, SIGTERM};
use slab::Slab;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::connection::{Connection, Next, Readiness};
use crate::pool::{SubmitError, ThreadPool};
use crate::server::poller::{Interest, Poller};
use crate::timer::{TimerId, TimerList};

const LISTENER: u64 = u64::MAX;
const SIGNAL: u64 = u64::MAX - 1;
const WAKE: u64 = u64::MAX - 2;

const MAX_EVENTS: usize = 1024;

type HttpConnection = Connection<TcpStream>;

/// A connection handed to a worker together with the readiness it reported.
///
/// The task owns the connection while it is in flight, so no other thread
/// can reach it until the worker hands it back.
struct Task {
    token: usize,
    conn: Box<HttpConnection>,
    readiness: Readiness,
}

impl Task {
    fn run(mut self) -> Completion {
        let next = self.conn.handle(self.readiness);
        Completion {
            token: self.token,
            conn: self.conn,
            next,
        }
    }
}

struct Completion {
    token: usize,
    conn: Box<HttpConnection>,
    next: Next,
}

struct Slot {
    /// `None` while a worker holds the connection
    conn: Option<Box<HttpConnection>>,
    timer: Option<TimerId>,
    /// Timed out while in flight; closed when the worker returns it
    expired: bool,
    peer: SocketAddr,
}

/// Stops a running [`Server`] from another thread.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: UnixStream,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        notify(&self.tx)
    }
}

/// The event loop: owns the listener, the multiplexer, the connection
/// table and the idle timers, and feeds ready connections to the worker pool.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    poller: Poller,
    pool: ThreadPool<Task>,
    completions: Receiver<Completion>,
    wake_rx: UnixStream,
    signal_rx: UnixStream,
    signal_tx: UnixStream,
    connections: Slab<Slot>,
    timers: TimerList<usize>,
    doc_root: Arc<Path>,
    tick: Duration,
    idle_timeout: Duration,
    max_connections: usize,
    stopping: bool,
}

impl Server {
    /// Binds the listening socket and builds the loop, the pool and the pipes.
    pub fn bind(cfg: &Config) -> Result<Self> {
        cfg.validate()?;

        let listener = TcpListener::bind(&cfg.server.listen_addr)
            .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let poller = Poller::new().context("failed to create readiness multiplexer")?;
        poller.register(&listener, LISTENER, Interest::Readable, false)?;

        let (signal_rx, signal_tx) = self_pipe()?;
        poller.register(&signal_rx, SIGNAL, Interest::Readable, false)?;

        let (wake_rx, wake_tx) = self_pipe()?;
        poller.register(&wake_rx, WAKE, Interest::Readable, false)?;

        let (done_tx, completions) = mpsc::channel();
        let pool = ThreadPool::new(cfg.pool.workers, cfg.pool.max_requests, move |task: Task| {
            let completion = task.run();
            // The loop is gone once the receiver is dropped; the connection
            // closes with the completion.
            if done_tx.send(completion).is_ok() {
                if let Err(e) = notify(&wake_tx) {
                    warn!(error = %e, "Failed to wake event loop");
                }
            }
        })?;

        Ok(Self {
            listener,
            local_addr,
            poller,
            pool,
            completions,
            wake_rx,
            signal_rx,
            signal_tx,
            connections: Slab::new(),
            timers: TimerList::new(),
            doc_root: Arc::from(cfg.server.doc_root.as_path()),
            tick: cfg.timer.tick(),
            idle_timeout: cfg.timer.idle_timeout(),
            max_connections: cfg.server.max_connections,
            stopping: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn live_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            tx: self.signal_tx.try_clone()?,
        })
    }

    /// Routes SIGINT and SIGTERM into the loop as shutdown events.
    pub fn install_signal_handlers(&self) -> Result<()> {
        for signal in [SIGINT, SIGTERM] {
            let tx = self.signal_tx.try_clone().context("failed to clone signal pipe")?;
            signal_hook::low_level::pipe::register(signal, tx)
                .with_context(|| format!("failed to install handler for signal {signal}"))?;
        }
        Ok(())
    }

    /// Runs until a shutdown event arrives.
    ///
    /// The wait is bounded by the tick interval so idle timers are swept
    /// even when no descriptor is ready.
    pub fn run(&mut self) -> Result<()> {
        info!(addr = %self.local_addr, doc_root = %self.doc_root.display(), "Listening");

        let mut events = vec![EpollEvent::empty(); MAX_EVENTS];
        let mut next_tick = Instant::now() + self.tick;

        while !self.stopping {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            let n = self.poller.wait(&mut events, timeout).context("readiness wait failed")?;

            for event in &events[..n] {
                match event.data() {
                    LISTENER => self.accept(),
                    SIGNAL => self.on_signal(),
                    WAKE => self.drain_completions(),
                    token => self.dispatch(token as usize, event.events()),
                }
            }

            let now = Instant::now();
            if now >= next_tick {
                self.sweep(now);
                next_tick = now + self.tick;
            }
        }

        self.shutdown();
        Ok(())
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    return;
                }
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.connections.len() >= self.max_connections {
            warn!(peer = %peer, live = self.connections.len(), "Too many connections, rejecting");
            return;
        }
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(peer = %peer, error = %e, "Failed to make socket non-blocking");
            return;
        }

        let entry = self.connections.vacant_entry();
        let token = entry.key();
        if let Err(e) = self.poller.register(&stream, token as u64, Interest::Readable, true) {
            warn!(peer = %peer, error = %e, "Failed to register connection");
            return;
        }

        let timer = self.timers.insert(Instant::now() + self.idle_timeout, token);
        let conn = Connection::new(stream, Arc::clone(&self.doc_root));
        entry.insert(Slot {
            conn: Some(Box::new(conn)),
            timer: Some(timer),
            expired: false,
            peer,
        });

        debug!(peer = %peer, token, live = self.connections.len(), "Accepted connection");
    }

    fn on_signal(&mut self) {
        drain(&self.signal_rx);
        info!("Shutdown requested");
        self.stopping = true;
    }

    fn dispatch(&mut self, token: usize, flags: EpollFlags) {
        let Some(slot) = self.connections.get_mut(token) else {
            return;
        };

        if flags.intersects(EpollFlags::EPOLLRDHUP | EpollFlags::EPOLLHUP | EpollFlags::EPOLLERR) {
            debug!(peer = %slot.peer, "Peer hung up");
            self.close(token);
            return;
        }

        let readiness = if flags.contains(EpollFlags::EPOLLIN) {
            Readiness::Readable
        } else if flags.contains(EpollFlags::EPOLLOUT) {
            Readiness::Writable
        } else {
            return;
        };

        let Some(conn) = slot.conn.take() else {
            warn!(peer = %slot.peer, "Event for a connection already in flight");
            return;
        };

        if let Some(timer) = slot.timer {
            self.timers.reschedule(timer, Instant::now() + self.idle_timeout);
        }

        let task = Task { token, conn, readiness };
        match self.pool.submit(task) {
            Ok(()) => {}
            Err(SubmitError::Full(task)) => {
                warn!(pending = self.pool.pending(), "Worker pool saturated, processing inline");
                let completion = task.run();
                self.complete(completion);
            }
            Err(SubmitError::Stopped(task)) => {
                self.complete(Completion {
                    token,
                    conn: task.conn,
                    next: Next::Close,
                });
            }
        }
    }

    fn drain_completions(&mut self) {
        drain(&self.wake_rx);
        while let Ok(done) = self.completions.try_recv() {
            self.complete(done);
        }
    }

    /// Puts a connection back in its slot and re-arms it for the next event.
    fn complete(&mut self, done: Completion) {
        let Completion { token, conn, next } = done;
        let Some(slot) = self.connections.get_mut(token) else {
            warn!(token, "Completion for an unknown connection");
            return;
        };

        let interest = match next {
            _ if slot.expired => None,
            Next::Read => Some(Interest::Readable),
            Next::Write => Some(Interest::Writable),
            Next::Close => None,
        };

        let armed = match interest {
            Some(interest) => match self.poller.modify(conn.stream(), token as u64, interest) {
                Ok(()) => true,
                Err(e) => {
                    warn!(peer = %slot.peer, error = %e, "Failed to re-arm connection");
                    false
                }
            },
            None => false,
        };

        slot.conn = Some(conn);
        if !armed {
            self.close(token);
        }
    }

    /// Deregisters and drops a connection and cancels its timer.
    fn close(&mut self, token: usize) {
        let Some(slot) = self.connections.get_mut(token) else {
            return;
        };
        if slot.conn.is_none() {
            slot.expired = true;
            return;
        }

        let slot = self.connections.remove(token);
        if let Some(timer) = slot.timer {
            self.timers.remove(timer);
        }
        if let Some(conn) = slot.conn {
            if let Err(e) = self.poller.deregister(conn.stream()) {
                debug!(peer = %slot.peer, error = %e, "Failed to deregister connection");
            }
        }

        debug!(peer = %slot.peer, live = self.connections.len(), "Closed connection");
    }

    fn sweep(&mut self, now: Instant) {
        let mut expired = Vec::new();
        let fired = self.timers.sweep(now, |token| expired.push(token));
        if fired == 0 {
            return;
        }

        for token in expired {
            if let Some(slot) = self.connections.get_mut(token) {
                slot.timer = None;
                info!(peer = %slot.peer, "Closing idle connection");
            }
            self.close(token);
        }
    }

    fn shutdown(&mut self) {
        info!(live = self.connections.len(), "Shutting down");
        self.pool.shutdown();

        while let Ok(done) = self.completions.try_recv() {
            drop(done);
        }
        for slot in self.connections.drain() {
            if let Some(conn) = slot.conn {
                if let Err(e) = self.poller.deregister(conn.stream()) {
                    debug!(peer = %slot.peer, error = %e, "Failed to deregister connection");
                }
            }
        }
        self.timers = TimerList::new();
    }
}

fn self_pipe() -> io::Result<(UnixStream, UnixStream)> {
    let (rx, tx) = UnixStream::pair()?;
    rx.set_nonblocking(true)?;
    tx.set_nonblocking(true)?;
    Ok((rx, tx))
}

/// Writes one wake-up byte. A full pipe already holds a pending wake-up.
fn notify(pipe: &UnixStream) -> io::Result<()> {
    let mut pipe = pipe;
    match pipe.write(&[1]) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(e),
    }
}

fn drain(pipe: &UnixStream) {
    let mut pipe = pipe;
    let mut buf = [0u8; 64];
    while let Ok(n) = pipe.read(&mut buf) {
        if n == 0 {
            break;
        }
    }
}
