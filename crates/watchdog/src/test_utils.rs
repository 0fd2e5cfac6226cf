//! Test utilities for usb-watchdog
//!
//! Hardware-free stand-ins for the USB link, the device locator, the pause
//! source and the status sink, so the supervisor can be driven through
//! unplug/replug scenarios deterministically.
//!
//! # Example
//!
//! ```
//! use watchdog::test_utils::{MockLink, watchdog_endpoints};
//! use watchdog::usb::EndpointChannel;
//! use protocol::Packet;
//!
//! let link = MockLink::echo();
//! let mut channel = EndpointChannel::new(link.clone(), watchdog_endpoints());
//! assert!(channel.send_and_compare(Packet::Ping).unwrap());
//! assert_eq!(link.writes(), vec![vec![0x1e, 0x00]]);
//! ```

use crate::config::Settings;
use crate::logging::LogSettings;
use crate::session::Mode;
use crate::supervisor::{StatusSink, SupervisorEvent};
use crate::usb::{DeviceLocator, EndpointChannel, UsbLink};
use crate::{Error, Pause, Result};
use protocol::{DeviceIdentity, Endpoint, EndpointPair, TransferKind};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Endpoint pair matching the common watchdog module (interrupt 0x02 / 0x81)
pub fn watchdog_endpoints() -> EndpointPair {
    EndpointPair {
        outbound: Endpoint::new(0x02, TransferKind::Interrupt, 8),
        inbound: Endpoint::new(0x81, TransferKind::Interrupt, 8),
    }
}

/// Settings with the default identity, ping mode and a 10 second interval
pub fn test_settings() -> Settings {
    Settings {
        identity: DeviceIdentity::default(),
        interval: Duration::from_secs(10),
        mode: Mode::Ping,
        log: LogSettings::default(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kinds of call recorded by [`MockLink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    Write,
    Read,
    Release,
    Reset,
}

#[derive(Debug, Clone)]
enum Reply {
    Echo,
    Fixed(Vec<u8>),
    Silent,
}

#[derive(Debug)]
struct MockState {
    reply: Reply,
    stale: VecDeque<Vec<u8>>,
    pending: Option<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    calls: Vec<LinkCall>,
    write_failure: Option<(usize, rusb::Error)>,
    release_failure: Option<rusb::Error>,
    reset_failure: Option<rusb::Error>,
}

/// Scripted fake device
///
/// Clones share state, so a test can keep a clone to inspect what the code
/// under test did with the one it was handed.
#[derive(Debug, Clone)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    fn with_reply(reply: Reply) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                reply,
                stale: VecDeque::new(),
                pending: None,
                writes: Vec::new(),
                calls: Vec::new(),
                write_failure: None,
                release_failure: None,
                reset_failure: None,
            })),
        }
    }

    /// Device that echoes every write
    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    /// Device that answers every write with `reply`
    pub fn replying(reply: Vec<u8>) -> Self {
        Self::with_reply(Reply::Fixed(reply))
    }

    /// Device that accepts writes but never answers
    pub fn silent() -> Self {
        Self::with_reply(Reply::Silent)
    }

    /// Queue data the device had buffered before we attached
    pub fn queue_stale(&self, chunks: Vec<Vec<u8>>) {
        lock(&self.state).stale.extend(chunks);
    }

    /// Let `successful` writes through, then fail every write with `error`
    pub fn fail_writes_after(&self, successful: usize, error: rusb::Error) {
        lock(&self.state).write_failure = Some((successful, error));
    }

    pub fn fail_release(&self, error: rusb::Error) {
        lock(&self.state).release_failure = Some(error);
    }

    pub fn fail_reset(&self, error: rusb::Error) {
        lock(&self.state).reset_failure = Some(error);
    }

    /// Successful writes, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Number of read attempts, successful or not
    pub fn reads(&self) -> usize {
        self.calls_of(LinkCall::Read)
    }

    pub fn calls_of(&self, kind: LinkCall) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| **call == kind)
            .count()
    }
}

impl UsbLink for MockLink {
    fn write(
        &mut self,
        _endpoint: &Endpoint,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = lock(&self.state);
        state.calls.push(LinkCall::Write);

        if let Some((successful, error)) = state.write_failure
            && state.writes.len() >= successful
        {
            return Err(error);
        }

        state.writes.push(data.to_vec());
        let pending = match &state.reply {
            Reply::Echo => Some(data.to_vec()),
            Reply::Fixed(reply) => Some(reply.clone()),
            Reply::Silent => None,
        };
        state.pending = pending;
        Ok(data.len())
    }

    fn read(
        &mut self,
        _endpoint: &Endpoint,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = lock(&self.state);
        state.calls.push(LinkCall::Read);

        let data = match state.stale.pop_front() {
            Some(chunk) => chunk,
            None => state.pending.take().ok_or(rusb::Error::Timeout)?,
        };

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn release(&mut self) -> rusb::Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(LinkCall::Release);
        state.release_failure.map_or(Ok(()), Err)
    }

    fn reset(&mut self) -> rusb::Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(LinkCall::Reset);
        state.reset_failure.map_or(Ok(()), Err)
    }
}

/// One scripted outcome of [`ScriptedLocator::acquire`]
#[derive(Debug, Clone)]
pub enum Acquisition {
    NotFound,
    PermissionDenied,
    Malformed,
    Usb(rusb::Error),
    Device(MockLink),
}

/// Locator that replays a fixed list of outcomes, then reports `NotFound`
#[derive(Debug, Default)]
pub struct ScriptedLocator {
    script: VecDeque<Acquisition>,
    attempts: usize,
}

impl ScriptedLocator {
    pub fn new(script: Vec<Acquisition>) -> Self {
        Self {
            script: script.into(),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl DeviceLocator for ScriptedLocator {
    type Link = MockLink;

    fn acquire(&mut self, identity: DeviceIdentity) -> Result<EndpointChannel<MockLink>> {
        self.attempts += 1;

        match self.script.pop_front().unwrap_or(Acquisition::NotFound) {
            Acquisition::NotFound => Err(Error::NotFound(identity)),
            Acquisition::PermissionDenied => Err(Error::usb("open device", rusb::Error::Access)),
            Acquisition::Malformed => Err(Error::MalformedDescriptor(
                "interface 0 lacks an IN and OUT endpoint".to_string(),
            )),
            Acquisition::Usb(error) => Err(Error::usb("claim interface", error)),
            Acquisition::Device(link) => {
                let mut channel = EndpointChannel::new(link, watchdog_endpoints());
                channel.drain();
                Ok(channel)
            }
        }
    }
}

/// Pause source that returns immediately and records what it was asked
///
/// With [`RecordingPause::interrupt_after`], the first `n` pauses succeed and
/// every later pause or checkpoint reports [`Error::Interrupted`], as if
/// Ctrl+C had arrived during pause number `n + 1`.
#[derive(Debug, Default)]
pub struct RecordingPause {
    durations: Mutex<Vec<Duration>>,
    interrupt_after: Option<usize>,
}

impl RecordingPause {
    /// Never interrupts
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt_after(successful: usize) -> Self {
        Self {
            durations: Mutex::new(Vec::new()),
            interrupt_after: Some(successful),
        }
    }

    /// Every requested duration, including an interrupted one
    pub fn durations(&self) -> Vec<Duration> {
        lock(&self.durations).clone()
    }

    fn interrupted(&self, requested: usize) -> bool {
        self.interrupt_after
            .is_some_and(|successful| requested > successful)
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) -> Result<()> {
        let mut durations = lock(&self.durations);
        durations.push(duration);
        if self.interrupted(durations.len()) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    fn checkpoint(&self) -> Result<()> {
        let requested = lock(&self.durations).len();
        if self.interrupted(requested) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Checker for `tracing_test::logs_assert`: exactly `expected` captured
/// lines at `level` contain `needle`
///
/// `level` is matched as it appears in formatted output, e.g. `"WARN"`.
pub fn logged(
    level: &'static str,
    needle: &'static str,
    expected: usize,
) -> impl Fn(&[&str]) -> std::result::Result<(), String> {
    move |lines: &[&str]| {
        let found = lines
            .iter()
            .filter(|line| line.contains(level) && line.contains(needle))
            .count();
        if found == expected {
            Ok(())
        } else {
            Err(format!(
                "expected {} {} line(s) containing {:?}, found {}",
                expected, level, needle, found
            ))
        }
    }
}

/// Sink that keeps every event
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SupervisorEvent> {
        lock(&self.events).clone()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&SupervisorEvent) -> bool,
    {
        lock(&self.events).iter().filter(|e| predicate(e)).count()
    }

    /// Number of protocol exchanges seen
    pub fn exchanges(&self) -> usize {
        self.count(|e| matches!(e, SupervisorEvent::Exchange { .. }))
    }
}

impl StatusSink for RecordingSink {
    fn publish(&self, event: &SupervisorEvent) {
        lock(&self.events).push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_counts_matching_level_only() {
        let lines = [
            " WARN watchdog: mismatch",
            "DEBUG watchdog: mismatch",
            " WARN watchdog: other",
        ];
        assert!(logged("WARN", "mismatch", 1)(&lines).is_ok());
        assert!(logged("WARN", "mismatch", 2)(&lines).is_err());
    }

    #[test]
    fn test_recording_pause_interrupts_after_limit() {
        let pause = RecordingPause::interrupt_after(1);
        assert!(pause.checkpoint().is_ok());
        assert!(pause.pause(Duration::from_secs(1)).is_ok());
        assert!(pause.checkpoint().is_ok());
        assert!(pause.pause(Duration::from_secs(1)).is_err());
        assert!(pause.checkpoint().is_err());
        assert_eq!(pause.durations().len(), 2);
    }

    #[test]
    fn test_scripted_locator_falls_back_to_not_found() {
        let mut locator = ScriptedLocator::new(vec![Acquisition::PermissionDenied]);
        let identity = DeviceIdentity::default();

        assert!(locator.acquire(identity).unwrap_err().is_permission_denied());
        assert!(matches!(
            locator.acquire(identity),
            Err(Error::NotFound(_))
        ));
        assert_eq!(locator.attempts(), 2);
    }
}
