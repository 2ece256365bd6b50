//! Readiness multiplexer.
//!
//! A thin wrapper over epoll. Connection descriptors are always registered
//! edge-triggered and oneshot: after an event is delivered the descriptor
//! stays silent until it is re-armed with [`Poller::modify`].

use std::io;
use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::PollTimeout;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

impl Interest {
    fn flags(self) -> EpollFlags {
        let base = EpollFlags::EPOLLET | EpollFlags::EPOLLRDHUP;
        match self {
            Interest::Readable => base | EpollFlags::EPOLLIN,
            Interest::Writable => base | EpollFlags::EPOLLOUT,
        }
    }
}

#[derive(Debug)]
pub struct Poller {
    epoll: Epoll,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll })
    }

    /// Adds `fd` under `token`.
    pub fn register<F: AsFd>(&self, fd: F, token: u64, interest: Interest, oneshot: bool) -> io::Result<()> {
        let mut flags = interest.flags();
        if oneshot {
            flags |= EpollFlags::EPOLLONESHOT;
        }
        self.epoll.add(fd, EpollEvent::new(flags, token))?;
        Ok(())
    }

    /// Re-arms a oneshot registration for `interest`.
    pub fn modify<F: AsFd>(&self, fd: F, token: u64, interest: Interest) -> io::Result<()> {
        let mut event = EpollEvent::new(interest.flags() | EpollFlags::EPOLLONESHOT, token);
        self.epoll.modify(fd, &mut event)?;
        Ok(())
    }

    pub fn deregister<F: AsFd>(&self, fd: F) -> io::Result<()> {
        self.epoll.delete(fd)?;
        Ok(())
    }

    /// Waits up to `timeout` for events. An interrupted wait reports none.
    ///
    /// The timeout is rounded up to whole milliseconds, so a wait shorter
    /// than one millisecond still sleeps instead of returning at once.
    pub fn wait(&self, events: &mut [EpollEvent], timeout: Duration) -> io::Result<usize> {
        let timeout = PollTimeout::try_from(ceil_millis(timeout)).unwrap_or(u16::MAX.into());
        match self.epoll.wait(events, timeout) {
            Ok(n) => Ok(n),
            Err(Errno::EINTR) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

fn ceil_millis(timeout: Duration) -> Duration {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_millisecond_timeout_rounds_up() {
        assert_eq!(ceil_millis(Duration::ZERO), Duration::ZERO);
        assert_eq!(ceil_millis(Duration::from_micros(300)), Duration::from_millis(1));
        assert_eq!(ceil_millis(Duration::from_micros(1200)), Duration::from_millis(2));
        assert_eq!(ceil_millis(Duration::from_millis(5)), Duration::from_millis(5));
    }

    #[test]
    fn short_wait_sleeps() {
        let poller = Poller::new().unwrap();
        let mut events = vec![EpollEvent::empty(); 4];
        let start = std::time::Instant::now();

        assert_eq!(poller.wait(&mut events, Duration::from_micros(100)).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_micros(900));
    }
}
