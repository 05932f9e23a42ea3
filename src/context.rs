//! Deadlines and cancellation for blocking deliveries
//!
//! A [`Context`] bounds a whole delivery: the dial, every command and every
//! reply. Clones share the same cancellation state, so a [`CancelHandle`]
//! taken before starting a delivery can stop it from another thread. Once a
//! connection is open, cancelling shuts its socket down, which wakes up any
//! blocked read or write. Deliveries running concurrently under one context
//! each register their own socket.

use std::{
    net::{Shutdown, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use crate::transport::smtp::{error, Error};

/// Deadline and cancellation state for a delivery
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    state: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    /// Open sockets of every delivery sharing the context
    streams: Mutex<Vec<(u64, TcpStream)>>,
}

/// Cancels every delivery running under a [`Context`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context without deadline, cancellable only through its handle
    pub fn background() -> Self {
        Self {
            deadline: None,
            state: Arc::default(),
        }
    }

    /// A context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context expiring at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            state: Arc::default(),
        }
    }

    /// The instant after which operations fail with a timeout
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true once [`CancelHandle::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// A handle cancelling this context and all its clones
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Fails if the context is cancelled or past its deadline
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(error::cancelled());
        }
        match self.remaining() {
            Some(remaining) if remaining.is_zero() => Err(error::timeout("deadline exceeded")),
            _ => Ok(()),
        }
    }

    /// Time budget for the next blocking operation
    pub(crate) fn budget(&self, default: Duration) -> Result<Duration, Error> {
        self.check()?;
        Ok(self
            .remaining()
            .map_or(default, |remaining| remaining.min(default)))
    }

    /// Registers a connected socket so that cancelling can interrupt it
    ///
    /// The returned id removes this socket, and only this one, through
    /// [`Context::unregister`].
    pub(crate) fn register(&self, stream: &TcpStream) -> Option<u64> {
        let clone = stream.try_clone().ok()?;
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut streams) = self.state.streams.lock() {
            streams.push((id, clone));
        }
        // cancel() may have run between the caller's check and the push
        if self.is_cancelled() {
            self.state.shutdown();
        }
        Some(id)
    }

    pub(crate) fn unregister(&self, id: u64) {
        if let Ok(mut streams) = self.state.streams.lock() {
            streams.retain(|(registered, _)| *registered != id);
        }
    }
}

impl CancelHandle {
    /// Cancels the context, interrupting any blocked network operation
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.shutdown();
    }
}

impl CancelState {
    fn shutdown(&self) {
        if let Ok(mut streams) = self.streams.lock() {
            for (_, stream) in streams.drain(..) {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}
