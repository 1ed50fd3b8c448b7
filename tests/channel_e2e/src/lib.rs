// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: End-to-end harness pairing a simulated scheduler driver with a command host
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: `tests/session_roundtrip.rs`
//!
//! The driver side emits framework callbacks and collects the calls the host
//! answers with; the host side runs a consume loop that stops at the sentinel.

use log::{debug, info};
use mesos_channel::{ArgKind, ChannelError, Command, CommandArg, DriverEnd, HostEnd};
use thiserror::Error;

/// Callback sent once the framework is registered.
pub const REGISTERED: &str = "registered";
/// Callback carrying offer ids.
pub const RESOURCE_OFFERS: &str = "resourceOffers";
/// Callback sent before the driver goes away.
pub const DISCONNECTED: &str = "disconnected";
/// Call answering an offer.
pub const LAUNCH_TASKS: &str = "launchTasks";
/// Call declining an offer.
pub const DECLINE_OFFER: &str = "declineOffer";

/// Errors surfaced by the simulated session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Channel failure on either side.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    /// A command did not have the expected shape.
    #[error("malformed {name}: {reason}")]
    Malformed {
        /// Offending command name.
        name: String,
        /// What was wrong.
        reason: &'static str,
    },
    /// The peer closed before the exchange finished.
    #[error("peer closed early")]
    PeerClosed,
}

/// Result alias for the harness.
pub type Result<T> = core::result::Result<T, SessionError>;

/// Outcome of a host consume loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostReport {
    /// Callback names in arrival order.
    pub callbacks: Vec<String>,
    /// Tasks launched, one per accepted offer.
    pub launched: Vec<String>,
    /// Offers declined.
    pub declined: Vec<String>,
}

/// Builds the `resourceOffers` callback for `offer_ids`.
pub fn offers_command(offer_ids: &[String]) -> Command {
    Command::builder(RESOURCE_OFFERS)
        .arg(CommandArg::array(offer_ids.iter().cloned()).with_type("OfferArray"))
        .build()
}

/// Runs the driver side: register, emit `rounds` offer batches, collect answers, disconnect.
///
/// Returns the calls received from the host in arrival order.
pub fn run_driver(driver: DriverEnd, rounds: usize, offers_per_round: usize) -> Result<Vec<Command>> {
    driver.send(Command::builder(REGISTERED).typed("fw-1", "FrameworkID").build())?;

    let mut calls = Vec::new();
    for round in 0..rounds {
        let offers: Vec<String> =
            (0..offers_per_round).map(|idx| format!("offer-{round}-{idx}")).collect();
        driver.send(offers_command(&offers))?;
        for _ in 0..offers_per_round {
            let call = driver.recv()?;
            if call.is_sentinel() {
                return Err(SessionError::PeerClosed);
            }
            calls.push(call);
        }
    }

    driver.send(Command::new(DISCONNECTED, Vec::new()))?;
    info!("e2e: driver finished {rounds} round(s), {} call(s)", calls.len());
    Ok(calls)
}

/// Runs the host consume loop until the driver's channel closes.
///
/// Even-indexed offers in a batch are accepted, odd ones declined.
pub fn run_host(host: HostEnd) -> Result<HostReport> {
    let mut report = HostReport::default();
    loop {
        let callback = host.recv()?;
        if callback.is_sentinel() {
            break;
        }
        debug!("e2e: host got {callback}");
        report.callbacks.push(callback.name().to_string());
        if callback.name() != RESOURCE_OFFERS {
            continue;
        }
        for (idx, offer) in offer_ids(&callback)?.iter().enumerate() {
            if idx % 2 == 0 {
                let task = format!("task-for-{offer}");
                host.send(
                    Command::builder(LAUNCH_TASKS)
                        .arg(CommandArg::array([offer.as_str()]).with_type("OfferIDArray"))
                        .typed(task.clone(), "TaskInfo")
                        .build(),
                )?;
                report.launched.push(task);
            } else {
                host.send(Command::builder(DECLINE_OFFER).typed(offer.clone(), "OfferID").build())?;
                report.declined.push(offer.clone());
            }
        }
    }
    Ok(report)
}

fn offer_ids(command: &Command) -> Result<&[String]> {
    let malformed = |reason| SessionError::Malformed { name: command.name().to_string(), reason };
    let arg = command.args().first().ok_or_else(|| malformed("missing offers"))?;
    if arg.kind() != ArgKind::Array {
        return Err(malformed("offers must be an array"));
    }
    arg.array_value().ok_or_else(|| malformed("offers must be an array"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_command_is_typed_array() {
        let cmd = offers_command(&["o1".to_string(), "o2".to_string()]);
        assert_eq!(cmd.name(), RESOURCE_OFFERS);
        assert_eq!(cmd.args()[0].type_tag(), "OfferArray");
        assert_eq!(offer_ids(&cmd).unwrap(), &["o1".to_string(), "o2".to_string()]);
    }

    #[test]
    fn scalar_offers_are_malformed() {
        let cmd = Command::builder(RESOURCE_OFFERS).scalar("o1").build();
        assert!(matches!(offer_ids(&cmd), Err(SessionError::Malformed { .. })));
    }
}
