// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Signal stream abstraction used as a line-counted semaphore
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - SignalSink: write end, one line per queued command
//!   - SignalSource: read end, yields one line per wait or `None` once closed
//!   - open(): build the pair selected by [`ChannelConfig::backend`]
//!
//! BACKENDS:
//!   - pipe (unix): OS pipe, unbuffered writes, optional buffered reads
//!   - memory: in-process line stream on a condvar
//!
//! Dropping a sink closes the stream. A source drains every line written before
//! the close and then reports `None` on each further wait.

#[cfg(unix)]
use std::os::fd::BorrowedFd;

use crate::{ChannelConfig, Result, SignalBackend, Wait};

pub mod memory;
#[cfg(unix)]
pub mod pipe;

pub use memory::{line_stream, MemorySink, MemorySource};
#[cfg(unix)]
pub use pipe::{pipe_stream, PipeSink, PipeSource};

/// Write end of a signal stream.
pub trait SignalSink: Send {
    /// Writes `name` as one line; the line must be visible to the source on return.
    fn notify(&mut self, name: &str) -> Result<()>;
}

/// Read end of a signal stream.
pub trait SignalSource: Send {
    /// Waits for the next line. Returns `Ok(None)` once the stream is closed and drained.
    fn wait_line(&mut self, wait: Wait) -> Result<Option<String>>;

    /// Descriptor that turns readable when a line is pending, if the backend has one.
    #[cfg(unix)]
    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }
}

/// Boxed sink/source pair.
pub type SignalPair = (Box<dyn SignalSink>, Box<dyn SignalSource>);

/// Creates the signal stream selected by `config`.
pub fn open(config: &ChannelConfig) -> Result<SignalPair> {
    match config.backend {
        SignalBackend::Memory => {
            let (sink, source) = line_stream();
            Ok((Box::new(sink), Box::new(source)))
        }
        #[cfg(unix)]
        SignalBackend::Pipe => {
            let (sink, source) = pipe_stream(config.read_mode)?;
            Ok((Box::new(sink), Box::new(source)))
        }
        #[cfg(not(unix))]
        SignalBackend::Pipe => Err(crate::ChannelError::Unsupported(SignalBackend::Pipe.as_str())),
    }
}
