// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Duplex pairing of two channels for a driver/host session
//!
//! The driver end sends callbacks (`registered`, `resourceOffers`, ...) and
//! receives calls (`launchTasks`, `killTask`, ...); the host end mirrors it.
//! Dropping or closing an end closes its outbound channel, so the peer's next
//! receive returns the sentinel once everything already sent has been drained.

use crate::{CancelToken, Channel, ChannelConfig, Command, Result, SharedChannel, Wait};

/// Creates a connected driver/host pair over two fresh channels.
pub fn bridge(config: &ChannelConfig) -> Result<(DriverEnd, HostEnd)> {
    let to_host = Channel::shared(config)?;
    let to_driver = Channel::shared(config)?;
    Ok((
        DriverEnd(Endpoint { outbound: to_host.clone(), inbound: to_driver.clone() }),
        HostEnd(Endpoint { outbound: to_driver, inbound: to_host }),
    ))
}

struct Endpoint {
    outbound: SharedChannel,
    inbound: SharedChannel,
}

impl Endpoint {
    fn close(&self) {
        self.outbound.close();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

macro_rules! endpoint_api {
    ($ty:ident, $peer:literal) => {
        impl $ty {
            #[doc = concat!("Sends `command` to the ", $peer, ".")]
            pub fn send(&self, command: Command) -> Result<()> {
                self.0.outbound.send(command)
            }

            #[doc = concat!("Blocks for the next command from the ", $peer, "; sentinel once it closed.")]
            pub fn recv(&self) -> Result<Command> {
                self.0.inbound.recv()
            }

            /// Receives the next inbound command honouring `wait`.
            pub fn recv_with(&self, wait: Wait) -> Result<Command> {
                self.0.inbound.recv_with(wait)
            }

            /// Receives the next inbound command unless `cancel` fires first.
            pub fn recv_cancellable(&self, cancel: &CancelToken) -> Result<Command> {
                self.0.inbound.recv_cancellable(cancel)
            }

            #[doc = concat!("Stops sending; the ", $peer, " drains and then sees the sentinel.")]
            pub fn close(&self) {
                self.0.close();
            }

            /// Channel carrying commands away from this end.
            pub fn outbound(&self) -> &SharedChannel {
                &self.0.outbound
            }

            /// Channel carrying commands towards this end.
            pub fn inbound(&self) -> &SharedChannel {
                &self.0.inbound
            }
        }
    };
}

/// Scheduler-driver side of a bridge.
pub struct DriverEnd(Endpoint);

/// Command-host side of a bridge.
pub struct HostEnd(Endpoint);

endpoint_api!(DriverEnd, "host");
endpoint_api!(HostEnd, "driver");
