// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Driver/host session over a bridge on separate threads
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCENARIOS:
//!   - session_roundtrip_per_backend(): full offer cycle for each configured backend
//!   - host_stops_when_driver_drops(): consume loop ends at the sentinel
//!   - cancelled_host_wait(): host blocked on an idle driver is cancelled
//!   - readiness_fd_signals_event_loop(): pipe fd turns readable on send (unix)

use std::thread;
use std::time::Duration;

use mesos_channel::{bridge, CancelToken, ChannelConfig, ChannelError, Command, SignalBackend};
use mesos_channel_e2e::{
    run_driver, run_host, DECLINE_OFFER, DISCONNECTED, LAUNCH_TASKS, REGISTERED, RESOURCE_OFFERS,
};

fn config_from_file(body: &str) -> ChannelConfig {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("channel.toml");
    std::fs::write(&path, body).expect("write config");
    ChannelConfig::load(&path).expect("load config")
}

#[test]
fn session_roundtrip_per_backend() {
    let mut bodies = vec!["backend = \"memory\"\n"];
    if cfg!(unix) {
        bodies.push("backend = \"pipe\"\nread-mode = \"unbuffered\"\n");
        bodies.push("backend = \"pipe\"\nread-mode = \"buffered\"\n");
    }

    for body in bodies {
        let config = config_from_file(body);
        let (driver, host) = bridge(&config).expect("bridge");
        let host_thread = thread::spawn(move || run_host(host));
        let calls = run_driver(driver, 3, 4).expect("driver run");
        let report = host_thread.join().expect("host thread").expect("host run");

        assert_eq!(report.callbacks.first().map(String::as_str), Some(REGISTERED));
        assert_eq!(report.callbacks.last().map(String::as_str), Some(DISCONNECTED));
        assert_eq!(report.callbacks.iter().filter(|name| *name == RESOURCE_OFFERS).count(), 3);

        assert_eq!(calls.len(), 12);
        let launched: Vec<&str> = calls
            .iter()
            .filter(|call| call.name() == LAUNCH_TASKS)
            .map(|call| call.args()[1].scalar_value().expect("task arg"))
            .collect();
        let expected: Vec<&str> = report.launched.iter().map(String::as_str).collect();
        assert_eq!(launched, expected);
        assert_eq!(calls.iter().filter(|call| call.name() == DECLINE_OFFER).count(), 6);
        assert_eq!(report.declined.len(), 6);
        assert_eq!(calls[0].args()[0].array_value().expect("offer ids"), &["offer-0-0".to_string()]);
    }
}

#[test]
fn host_stops_when_driver_drops() {
    let (driver, host) = bridge(&ChannelConfig::default()).expect("bridge");
    let host_thread = thread::spawn(move || run_host(host));
    driver.send(Command::new(REGISTERED, Vec::new())).expect("send");
    drop(driver);
    let report = host_thread.join().expect("host thread").expect("host run");
    assert_eq!(report.callbacks, vec![REGISTERED.to_string()]);
    assert!(report.launched.is_empty());
}

#[test]
fn cancelled_host_wait() {
    let config = ChannelConfig { cancel_poll_ms: 5, ..ChannelConfig::default() };
    let (driver, host) = bridge(&config).expect("bridge");
    let token = CancelToken::new();
    let waiter = {
        let token = token.clone();
        thread::spawn(move || host.recv_cancellable(&token))
    };
    thread::sleep(Duration::from_millis(25));
    token.cancel();
    assert!(matches!(waiter.join().expect("waiter"), Err(ChannelError::Cancelled)));
    drop(driver);
}

#[cfg(unix)]
#[test]
fn readiness_fd_signals_event_loop() {
    use mesos_channel::Wait;
    use nix::poll::{poll, PollFd, PollFlags};

    fn readable(fd: std::os::fd::BorrowedFd<'_>) -> bool {
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        poll(&mut fds, 0u16).expect("poll") == 1
    }

    let config = ChannelConfig::default().with_backend(SignalBackend::Pipe);
    let (driver, host) = bridge(&config).expect("bridge");
    let fd = host.inbound().readiness_fd().expect("pipe backend exposes fd");
    assert!(!readable(fd));

    driver.send(Command::new(RESOURCE_OFFERS, Vec::new())).expect("send");
    assert!(readable(fd));

    let received = host.recv_with(Wait::NonBlocking).expect("line ready");
    assert_eq!(received.name(), RESOURCE_OFFERS);
    assert!(!readable(fd));
}
