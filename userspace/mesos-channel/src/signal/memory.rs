// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process signal stream for hosts without pipes and for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::{SignalSink, SignalSource};
use crate::{ChannelError, Result, Wait};

/// Creates a connected in-memory sink/source pair.
pub fn line_stream() -> (MemorySink, MemorySource) {
    let shared = Arc::new(Shared::default());
    (MemorySink { shared: Arc::clone(&shared) }, MemorySource { shared })
}

#[derive(Default)]
struct Shared {
    state: Mutex<LineState>,
    ready: Condvar,
}

#[derive(Default)]
struct LineState {
    lines: VecDeque<String>,
    closed: bool,
}

impl LineState {
    fn has_progress(&self) -> bool {
        !self.lines.is_empty() || self.closed
    }
}

/// Write end of an in-memory signal stream. Dropping it closes the stream.
pub struct MemorySink {
    shared: Arc<Shared>,
}

impl SignalSink for MemorySink {
    fn notify(&mut self, name: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        state.lines.push_back(name.to_owned());
        drop(state);
        self.shared.ready.notify_one();
        Ok(())
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

/// Read end of an in-memory signal stream.
pub struct MemorySource {
    shared: Arc<Shared>,
}

impl SignalSource for MemorySource {
    fn wait_line(&mut self, wait: Wait) -> Result<Option<String>> {
        let mut state = self.shared.state.lock();
        match wait {
            Wait::NonBlocking => {
                if !state.has_progress() {
                    return Err(ChannelError::WouldBlock);
                }
            }
            Wait::Blocking => {
                while !state.has_progress() {
                    self.shared.ready.wait(&mut state);
                }
            }
            Wait::Timeout(timeout) => match Instant::now().checked_add(timeout) {
                Some(deadline) => {
                    while !state.has_progress() {
                        if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                    if !state.has_progress() {
                        return Err(ChannelError::Timeout);
                    }
                }
                None => {
                    while !state.has_progress() {
                        self.shared.ready.wait(&mut state);
                    }
                }
            },
        }
        // closed and drained yields None; lines written before the close still come first
        Ok(state.lines.pop_front())
    }
}
