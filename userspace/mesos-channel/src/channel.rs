// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Command channel: FIFO queue paired with a signal stream
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - Channel::with_config(): create queue and signal stream together
//!   - Channel::send(): enqueue a command and write its name as one signal line
//!   - Channel::recv() / recv_with() / recv_cancellable(): wait for a line, pop the head
//!   - Channel::close(): release the write end; readers drain, then see the sentinel
//!   - Channel::commands(): iterator that ends at the sentinel
//!
//! INVARIANTS:
//!   - Producers are serialized on the sink lock, and each append lands in the
//!     queue before its signal line is written, so the Nth line always belongs
//!     to the Nth queued command, whatever the number of producers
//!   - The queue lock is only held for a push or a pop, never across a signal
//!     write, so a producer blocked on a full pipe cannot stall the consumer
//!   - Consumers are serialized on the source lock (lock order: source, queue)
//!   - A closed and drained channel returns the sentinel on every recv
//!   - Teardown discards undelivered commands
//!
//! ERROR CONDITIONS:
//!   - ChannelError::ResourceExhausted: signal stream could not be created
//!   - ChannelError::ReservedName / InvalidName: name cannot travel as one line
//!   - ChannelError::Closed: send after close
//!   - ChannelError::Desync: signal line and queue head disagree

use std::collections::VecDeque;
#[cfg(unix)]
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use core::fmt;

use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::signal::{self, SignalSink, SignalSource};
use crate::{CancelToken, ChannelConfig, ChannelError, Command, Result, Wait};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle shared by the producing and consuming sides of a session.
pub type SharedChannel = Arc<Channel>;

/// Process-unique channel identifier used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Exposes the raw numeric value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan#{}", self.0)
    }
}

/// In-order, at-most-once command hand-off between a producer and a consumer.
pub struct Channel {
    id: ChannelId,
    sink: Mutex<Option<Box<dyn SignalSink>>>,
    pending: Mutex<VecDeque<Command>>,
    source: Mutex<Box<dyn SignalSource>>,
    closed: AtomicBool,
    verify_order: bool,
    cancel_poll: Duration,
    #[cfg(unix)]
    readiness: Option<OwnedFd>,
}

impl Channel {
    /// Creates a channel with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(&ChannelConfig::default())
    }

    /// Creates the queue and the signal stream selected by `config`.
    pub fn with_config(config: &ChannelConfig) -> Result<Self> {
        let (sink, source) = signal::open(config)?;
        let channel = Self::with_signal(sink, source, config)?;
        info!(
            "mesos-channel: {} open (backend={}, read-mode={:?})",
            channel.id,
            config.backend.as_str(),
            config.read_mode
        );
        Ok(channel)
    }

    /// Creates a channel over a caller-provided signal stream.
    ///
    /// On unix the source's readiness descriptor is duplicated so it can be
    /// handed out without taking the consumer lock.
    pub fn with_signal(
        sink: Box<dyn SignalSink>,
        source: Box<dyn SignalSource>,
        config: &ChannelConfig,
    ) -> Result<Self> {
        #[cfg(unix)]
        let readiness = source
            .readiness_fd()
            .map(|fd| fd.try_clone_to_owned())
            .transpose()
            .map_err(ChannelError::ResourceExhausted)?;
        Ok(Self {
            id: ChannelId::next(),
            sink: Mutex::new(Some(sink)),
            pending: Mutex::new(VecDeque::new()),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
            verify_order: config.verify_order,
            cancel_poll: config.cancel_poll_interval(),
            #[cfg(unix)]
            readiness,
        })
    }

    /// Creates a reference-counted channel for sharing across threads.
    pub fn shared(config: &ChannelConfig) -> Result<SharedChannel> {
        Self::with_config(config).map(Arc::new)
    }

    /// Returns the channel identifier.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Appends `command` to the queue and signals its name.
    ///
    /// Blocks only while the signal stream is full, until the consumer drains it.
    pub fn send(&self, command: Command) -> Result<()> {
        validate_name(command.name())?;

        let mut producer = self.sink.lock();
        let Some(sink) = producer.as_mut() else {
            return Err(ChannelError::Closed);
        };

        let name = command.name().to_owned();
        let depth = {
            let mut pending = self.pending.lock();
            pending.push_back(command);
            pending.len()
        };
        if let Err(err) = sink.notify(&name) {
            // keep one queue entry per signal line; later producers wait on the sink lock
            self.pending.lock().pop_back();
            warn!("mesos-channel: {} signal write failed: {err}", self.id);
            return Err(err);
        }
        debug!("mesos-channel: {} sent {name} (pending {depth})", self.id);
        Ok(())
    }

    /// Blocks until a command is available; returns the sentinel once closed.
    pub fn recv(&self) -> Result<Command> {
        self.recv_with(Wait::Blocking)
    }

    /// Receives the next command honouring `wait`.
    pub fn recv_with(&self, wait: Wait) -> Result<Command> {
        let started = Instant::now();
        let (mut source, wait) = self.lock_source(wait, started)?;

        let Some(line) = source.wait_line(wait)? else {
            return Ok(Command::sentinel());
        };

        let command = self.pending.lock().pop_front();
        drop(source);
        let Some(command) = command else {
            warn!("mesos-channel: {} signal {line:?} without a queued command", self.id);
            return Err(ChannelError::Desync { signalled: line, queued: None });
        };
        if self.verify_order && command.name() != line {
            warn!(
                "mesos-channel: {} signal {line:?} does not match queue head {:?}",
                self.id,
                command.name()
            );
            return Err(ChannelError::Desync {
                signalled: line,
                queued: Some(command.into_parts().0),
            });
        }
        debug!("mesos-channel: {} received {}", self.id, command.name());
        Ok(command)
    }

    /// Blocks like [`Channel::recv`] but gives up once `cancel` fires.
    ///
    /// The token is checked every `cancel-poll-ms`.
    pub fn recv_cancellable(&self, cancel: &CancelToken) -> Result<Command> {
        loop {
            if cancel.is_cancelled() {
                return Err(ChannelError::Cancelled);
            }
            match self.recv_with(Wait::Timeout(self.cancel_poll)) {
                Err(ChannelError::Timeout) => continue,
                other => return other,
            }
        }
    }

    /// Releases the write end. Signalled commands stay receivable; idempotent.
    ///
    /// Waits for an in-flight [`Channel::send`] to finish its signal write.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let sink = self.sink.lock().take();
        if sink.is_some() {
            debug!("mesos-channel: {} closed", self.id);
        }
    }

    /// Returns `true` once [`Channel::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Iterates received commands until the sentinel or the first error.
    pub fn commands(&self) -> Commands<'_> {
        Commands { channel: self, done: false }
    }

    /// Descriptor of the signal read end for external event loops.
    ///
    /// Only the pipe backend has one. With `read-mode = "buffered"` lines may be
    /// held in userspace, so readiness is exact only for unbuffered reads.
    #[cfg(unix)]
    pub fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        self.readiness.as_ref().map(AsFd::as_fd)
    }

    fn lock_source(
        &self,
        wait: Wait,
        started: Instant,
    ) -> Result<(MutexGuard<'_, Box<dyn SignalSource>>, Wait)> {
        match wait {
            Wait::Blocking => Ok((self.source.lock(), wait)),
            Wait::NonBlocking => {
                self.source.try_lock().map(|guard| (guard, wait)).ok_or(ChannelError::WouldBlock)
            }
            Wait::Timeout(timeout) => {
                let guard = self.source.try_lock_for(timeout).ok_or(ChannelError::Timeout)?;
                Ok((guard, Wait::Timeout(timeout.saturating_sub(started.elapsed()))))
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        let discarded = self.pending.get_mut().len();
        if discarded > 0 {
            warn!("mesos-channel: {} torn down, discarding {discarded} pending command(s)", self.id);
        } else {
            debug!("mesos-channel: {} torn down", self.id);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("verify_order", &self.verify_order)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`Channel::commands`].
pub struct Commands<'a> {
    channel: &'a Channel,
    done: bool,
}

impl Iterator for Commands<'_> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.channel.recv() {
            Ok(command) if command.is_sentinel() => {
                self.done = true;
                None
            }
            Ok(command) => Some(Ok(command)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChannelError::ReservedName);
    }
    if name.contains(['\n', '\r']) {
        return Err(ChannelError::InvalidName(name.to_owned()));
    }
    Ok(())
}
