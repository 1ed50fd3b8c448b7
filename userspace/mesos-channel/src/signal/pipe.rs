// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: OS pipe signal stream
//!
//! OWNERS: @runtime
//!
//! INVARIANTS:
//!   - Writes are unbuffered: a line is in the pipe when `notify` returns
//!   - Lines are read into a growable buffer; name length never truncates a line
//!   - In `ReadMode::Unbuffered` nothing is held in userspace, so the readiness
//!     fd is readable exactly while a line is pending
//!   - Timed waits poll against the deadline before every read, including
//!     between the pieces of a line longer than `PIPE_BUF`
//!
//! ERROR CONDITIONS:
//!   - ChannelError::ResourceExhausted: pipe creation failed
//!   - ChannelError::WouldBlock / Timeout: no line within the requested wait
//!   - ChannelError::Io: read/write/poll failure, or a line that is not UTF-8

use std::io::{self, BufRead, BufReader, PipeReader, PipeWriter, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use super::{SignalSink, SignalSource};
use crate::{ChannelError, ReadMode, Result, Wait};

/// Creates a pipe-backed sink/source pair.
pub fn pipe_stream(read_mode: ReadMode) -> Result<(PipeSink, PipeSource)> {
    let (reader, writer) = io::pipe().map_err(ChannelError::ResourceExhausted)?;
    Ok((PipeSink { writer }, PipeSource::new(reader, read_mode)))
}

/// Write end of the signal pipe. Dropping it closes the stream.
pub struct PipeSink {
    writer: PipeWriter,
}

impl SignalSink for PipeSink {
    fn notify(&mut self, name: &str) -> Result<()> {
        let mut line = Vec::with_capacity(name.len() + 1);
        line.extend_from_slice(name.as_bytes());
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }
}

enum LineReader {
    Unbuffered(PipeReader),
    Buffered(BufReader<PipeReader>),
}

impl LineReader {
    fn fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Unbuffered(reader) => reader.as_fd(),
            Self::Buffered(reader) => reader.get_ref().as_fd(),
        }
    }

    /// Bytes that can be consumed without touching the fd.
    fn has_buffered_bytes(&self) -> bool {
        match self {
            Self::Unbuffered(_) => false,
            Self::Buffered(reader) => !reader.buffer().is_empty(),
        }
    }

    /// Moves bytes up to and including the next newline into `line`, issuing at
    /// most one `read` on the fd. Returns 0 at end of stream.
    fn read_chunk(&mut self, line: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Self::Buffered(reader) => {
                let available = loop {
                    match reader.fill_buf() {
                        Ok(available) => break available,
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err),
                    }
                };
                let taken = match available.iter().position(|byte| *byte == b'\n') {
                    Some(newline) => newline + 1,
                    None => available.len(),
                };
                line.extend_from_slice(&available[..taken]);
                reader.consume(taken);
                Ok(taken)
            }
            Self::Unbuffered(reader) => {
                let mut byte = [0u8; 1];
                loop {
                    match reader.read(&mut byte) {
                        Ok(read) => {
                            line.extend_from_slice(&byte[..read]);
                            return Ok(read);
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }
}

/// Read end of the signal pipe.
///
/// A line that arrives in pieces is assembled across waits: a timed or
/// non-blocking wait that expires mid-line keeps the bytes read so far.
pub struct PipeSource {
    reader: LineReader,
    partial: Vec<u8>,
    closed: bool,
}

impl PipeSource {
    fn new(reader: PipeReader, read_mode: ReadMode) -> Self {
        let reader = match read_mode {
            ReadMode::Unbuffered => LineReader::Unbuffered(reader),
            ReadMode::Buffered => LineReader::Buffered(BufReader::new(reader)),
        };
        Self { reader, partial: Vec::new(), closed: false }
    }

    fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::from_millis(u64::from(u16::MAX)),
            };
            let mut fds = [PollFd::new(self.reader.fd(), PollFlags::POLLIN)];
            match poll(&mut fds, poll_millis(remaining)) {
                Ok(0) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Ok(false);
                    }
                }
                // POLLHUP also lands here; the following read observes EOF
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(io::Error::from(err).into()),
            }
        }
    }

    /// Checks readiness for `wait` before the next fd read.
    fn ready_for(&self, wait: Wait, deadline: Option<Instant>) -> Result<()> {
        match wait {
            Wait::Blocking => Ok(()),
            Wait::NonBlocking if self.poll_readable(Duration::ZERO)? => Ok(()),
            Wait::NonBlocking => Err(ChannelError::WouldBlock),
            Wait::Timeout(timeout) => {
                let remaining = match deadline {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => timeout,
                };
                if self.poll_readable(remaining)? {
                    Ok(())
                } else {
                    Err(ChannelError::Timeout)
                }
            }
        }
    }

    fn take_line(&mut self) -> Result<String> {
        let mut line = std::mem::take(&mut self.partial);
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        String::from_utf8(line)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }
}

impl SignalSource for PipeSource {
    fn wait_line(&mut self, wait: Wait) -> Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }
        let deadline = match wait {
            Wait::Timeout(timeout) => Instant::now().checked_add(timeout),
            _ => None,
        };
        loop {
            if !self.reader.has_buffered_bytes() {
                self.ready_for(wait, deadline)?;
            }
            if self.reader.read_chunk(&mut self.partial)? == 0 {
                self.closed = true;
                // a trailing line without its newline still counts
                if self.partial.is_empty() {
                    return Ok(None);
                }
                return self.take_line().map(Some);
            }
            if self.partial.last() == Some(&b'\n') {
                return self.take_line().map(Some);
            }
        }
    }

    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        Some(self.reader.fd())
    }
}

/// Rounds up to whole milliseconds so sub-millisecond remainders still sleep.
fn poll_millis(remaining: Duration) -> u16 {
    let millis = remaining.as_nanos().div_ceil(1_000_000);
    millis.min(u128::from(u16::MAX)) as u16
}
