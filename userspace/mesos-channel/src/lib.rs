// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Command dispatch channel between a scheduler driver and a command host
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests per module, `tests/channel_protocol.rs`, `tests/channel_e2e`
//!
//! PUBLIC API:
//!   - Command / CommandArg: immutable command envelope and positional arguments
//!   - Channel: FIFO queue paired with a line-oriented signal stream
//!   - bridge(): duplex driver/host pairing over two channels
//!   - ChannelConfig: TOML-backed channel configuration
//!   - Wait: wait behaviour for receive operations
//!   - ChannelError: channel error types
//!
//! DEPENDENCIES:
//!   - parking_lot: queue and consumer locks, in-memory signal condvar
//!   - nix (unix): readiness polling on the signal pipe
//!   - log: diagnostics
//!
//! The signal stream only ever carries command names, one per line. It acts as a
//! counting semaphore for the queue: each line stands for exactly one queued
//! command, and the structured payload never crosses the stream.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::time::Duration;

pub mod bridge;
pub mod cancel;
pub mod channel;
pub mod command;
pub mod config;
pub mod signal;

pub use bridge::{bridge, DriverEnd, HostEnd};
pub use cancel::CancelToken;
pub use channel::{Channel, ChannelId, Commands, SharedChannel};
pub use command::{ArgKind, ArgValue, Command, CommandArg, CommandBuilder, DEFAULT_TYPE_TAG};
pub use config::{ChannelConfig, ConfigError, ReadMode, SignalBackend};

/// Result type returned by channel operations.
pub type Result<T> = core::result::Result<T, ChannelError>;

/// Behaviour of a blocking call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until the operation completes.
    Blocking,
    /// Return immediately if no progress can be made.
    NonBlocking,
    /// Block until either the operation completes or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    /// Returns `true` when the caller requested a non-blocking attempt.
    pub const fn is_non_blocking(self) -> bool {
        matches!(self, Self::NonBlocking)
    }

    /// Converts a [`Wait::Timeout`] variant into its [`Duration`].
    pub const fn timeout(self) -> Option<Duration> {
        match self {
            Self::Timeout(duration) => Some(duration),
            Self::Blocking | Self::NonBlocking => None,
        }
    }
}

/// Errors produced by the channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The signal stream could not be created; the channel is unusable.
    #[error("signal stream unavailable: {0}")]
    ResourceExhausted(#[source] std::io::Error),
    /// The command name would break the one-name-per-line signal format.
    #[error("command name {0:?} contains a line terminator")]
    InvalidName(String),
    /// The empty name is reserved for the closed-channel sentinel.
    #[error("empty command name is reserved for the closed-channel sentinel")]
    ReservedName,
    /// The signal stream was closed before the send.
    #[error("channel closed")]
    Closed,
    /// Operation could not progress without blocking.
    #[error("operation would block")]
    WouldBlock,
    /// The caller exceeded the requested timeout.
    #[error("operation timed out")]
    Timeout,
    /// The wait was cancelled through a [`CancelToken`].
    #[error("wait cancelled")]
    Cancelled,
    /// A signal line did not line up with the queue head.
    #[error("signal/queue desync: signalled {signalled:?}, queued {queued:?}")]
    Desync {
        /// Name read from the signal stream.
        signalled: String,
        /// Name at the queue head, if the queue was not empty.
        queued: Option<String>,
    },
    /// Reading or writing the signal stream failed.
    #[error("signal stream i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The requested signal backend is not available on this platform.
    #[error("{0} signal backend unsupported on this platform")]
    Unsupported(&'static str),
}
