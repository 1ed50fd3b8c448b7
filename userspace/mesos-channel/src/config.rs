// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Channel configuration loaded from TOML
//! INTENT: Pick the signal backend, read buffering and wait granularity per session
//! DEPS: serde, toml, std::fs
//!
//! ```toml
//! backend = "pipe"          # or "memory"
//! read-mode = "unbuffered"  # or "buffered"
//! cancel-poll-ms = 50
//! verify-order = true
//! ```

use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CANCEL_POLL_MS: u64 = 50;

/// Signal stream implementation backing a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalBackend {
    /// OS pipe; the read end can be handed to an external event loop.
    Pipe,
    /// In-process line stream guarded by a condvar.
    Memory,
}

impl SignalBackend {
    /// Returns the backend name used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Memory => "memory",
        }
    }
}

impl Default for SignalBackend {
    fn default() -> Self {
        if cfg!(unix) {
            Self::Pipe
        } else {
            Self::Memory
        }
    }
}

/// Buffering applied on the consumer's read of the signal stream.
///
/// Writes are always unbuffered. `Unbuffered` reads keep the readiness fd exact,
/// which external event loops rely on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// Read byte by byte; nothing is held back in userspace.
    #[default]
    Unbuffered,
    /// Read through a userspace buffer.
    Buffered,
}

/// Channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChannelConfig {
    /// Signal stream implementation.
    pub backend: SignalBackend,
    /// Consumer-side read buffering (pipe backend only).
    pub read_mode: ReadMode,
    /// Slice length, in milliseconds, between cancellation checks in `recv_cancellable`.
    pub cancel_poll_ms: u64,
    /// Reject a dequeued command whose name differs from its signal line.
    pub verify_order: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backend: SignalBackend::default(),
            read_mode: ReadMode::default(),
            cancel_poll_ms: DEFAULT_CANCEL_POLL_MS,
            verify_order: true,
        }
    }
}

/// Errors raised while loading a [`ChannelConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read channel config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse channel config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// Inline TOML could not be parsed.
    #[error("invalid channel config: {0}")]
    Invalid(#[from] toml::de::Error),
    /// A zero poll interval would turn cancellable waits into busy loops.
    #[error("cancel-poll-ms must be greater than zero")]
    ZeroPollInterval,
}

impl ChannelConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self = toml::from_str(&data)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()
    }

    /// Returns a copy using `backend`.
    pub fn with_backend(mut self, backend: SignalBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Returns a copy using `read_mode`.
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    /// Returns the cancellation slice as a [`Duration`].
    pub fn cancel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_ms.max(1))
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.cancel_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(self)
    }
}
