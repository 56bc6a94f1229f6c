//! Recording mock lines for driving a complete link on the host.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::digital::{Error, ErrorKind, ErrorType, OutputPin};
use embedded_hal_async::digital::Wait;
use pico_vectron::{
    Level, LineClaims, LineRole, LinkConfig, LinkLines, LinkPinConfig, RecoveryPolicy, SampleLink,
};

/// Everything that happens on the lines, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An output line was driven.
    Set(LineRole, bool),

    /// The link started waiting on the ack line.
    AckWaitStart(WaitKind),

    /// The peripheral acked.
    Ack,
}

/// Which [`Wait`] method the link called on the ack line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    High,
    Low,
    Rising,
    Falling,
    Any,
}

pub type Log = Rc<RefCell<Vec<Event>>>;
pub type Faults = Rc<RefCell<Vec<LineRole>>>;

#[derive(Debug)]
pub struct MockError;

impl Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct MockOutput {
    role: LineRole,
    log: Log,
    faults: Faults,
}

impl MockOutput {
    fn set(&mut self, high: bool) -> Result<(), MockError> {
        if self.faults.borrow().contains(&self.role) {
            return Err(MockError);
        }
        self.log.borrow_mut().push(Event::Set(self.role, high));
        Ok(())
    }
}

impl ErrorType for MockOutput {
    type Error = MockError;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), MockError> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), MockError> {
        self.set(true)
    }
}

/// How the mock peripheral responds to each ack wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ack,
    Never,
}

/// The ack line.  Responds to each wait from its script, and acks once the
/// script runs out.
pub struct MockAck {
    log: Log,
    script: VecDeque<Response>,
}

impl MockAck {
    async fn edge(&mut self, kind: WaitKind) -> Result<(), MockError> {
        self.log.borrow_mut().push(Event::AckWaitStart(kind));
        match self.script.pop_front().unwrap_or(Response::Ack) {
            Response::Ack => {
                self.log.borrow_mut().push(Event::Ack);
                Ok(())
            }
            Response::Never => core::future::pending().await,
        }
    }
}

impl ErrorType for MockAck {
    type Error = MockError;
}

impl Wait for MockAck {
    async fn wait_for_high(&mut self) -> Result<(), MockError> {
        self.edge(WaitKind::High).await
    }

    async fn wait_for_low(&mut self) -> Result<(), MockError> {
        self.edge(WaitKind::Low).await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), MockError> {
        self.edge(WaitKind::Rising).await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), MockError> {
        self.edge(WaitKind::Falling).await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), MockError> {
        self.edge(WaitKind::Any).await
    }
}

pub type TestLink<R> = SampleLink<MockOutput, MockOutput, MockOutput, MockOutput, MockAck, R>;

pub struct Harness<R> {
    pub log: Log,
    pub faults: Faults,
    pub link: TestLink<R>,
}

impl<R> Harness<R> {
    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    /// Make every further write to `role` fail.
    pub fn break_line(&self, role: LineRole) {
        self.faults.borrow_mut().push(role);
    }

    /// Undo [`Harness::break_line`].
    pub fn heal_line(&self, role: LineRole) {
        self.faults.borrow_mut().retain(|r| *r != role);
    }
}

/// A link over mock lines, with the log cleared of the start-up writes.
pub fn harness<R: RecoveryPolicy>(
    script: &[Response],
    config: LinkConfig,
    policy: R,
) -> Harness<R> {
    let log = Log::default();
    let faults = Faults::default();
    let pins = LinkPinConfig::default();
    let mut claims = LineClaims::new();

    let mut output = |num, role, level| {
        let pin = MockOutput {
            role,
            log: log.clone(),
            faults: faults.clone(),
        };
        claims.output(num, role, pin, level).unwrap()
    };
    let data = output(pins.data, LineRole::Data, Level::Low);
    let clock = output(pins.clock, LineRole::Clock, Level::Low);
    let latch = output(pins.latch, LineRole::Latch, Level::Low);
    let interrupt = output(pins.interrupt, LineRole::Interrupt, Level::High);

    let ack = MockAck {
        log: log.clone(),
        script: script.iter().copied().collect(),
    };
    let ack = claims.input(pins.ack, LineRole::Ack, ack).unwrap();

    let lines = LinkLines {
        data,
        clock,
        latch,
        interrupt,
        ack,
    };
    let link = SampleLink::from_config(lines, config, policy).unwrap();
    log.borrow_mut().clear();

    Harness { log, faults, link }
}

/// Config with short timeouts, so failing tests don't hang.
pub fn config(ack_timeout_ms: u64) -> LinkConfig {
    LinkConfig {
        ack_timeout: Some(embassy_time::Duration::from_millis(ack_timeout_ms)),
        ..LinkConfig::default()
    }
}

/// The bytes latched, rebuilt from the data line's level at each rising
/// clock edge.
pub fn latched_bytes(events: &[Event]) -> Vec<u8> {
    let mut data = false;
    let mut byte = 0u8;
    let mut bytes = Vec::new();
    for event in events {
        match event {
            Event::Set(LineRole::Data, high) => data = *high,
            Event::Set(LineRole::Clock, true) => byte = (byte << 1) | u8::from(data),
            Event::Set(LineRole::Latch, true) => {
                bytes.push(byte);
                byte = 0;
            }
            _ => (),
        }
    }
    bytes
}

/// Rising clock edges between each latch.
pub fn clocks_per_latch(events: &[Event]) -> Vec<usize> {
    let mut clocks = 0;
    let mut counts = Vec::new();
    for event in events {
        match event {
            Event::Set(LineRole::Clock, true) => clocks += 1,
            Event::Set(LineRole::Latch, true) => {
                counts.push(clocks);
                clocks = 0;
            }
            _ => (),
        }
    }
    counts
}

pub fn count(events: &[Event], wanted: Event) -> usize {
    events.iter().filter(|e| **e == wanted).count()
}
