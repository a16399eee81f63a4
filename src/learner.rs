//! Learner (C5): sits on the receive path for DECIDE only, with no acceptor state
//! of its own.
//!
//! Unlike the teacher's `Learner<T>`, which tracks learned values per Paxos
//! instance in a `HashMap` and delivers them in total order (a multi-decree
//! concern), this learner is single-decree: it records at most one value and
//! terminates on the first DECIDE it observes.

use std::time::Duration;

use log::info;

use crate::message::Message;
use crate::transport::{ReceiveOutcome, Transport};

/// Outcome of running a learner to completion or giving up at a caller-chosen
/// budget. The spec leaves "no DECIDE within a test-defined budget" unspecified
/// beyond "reported as did-not-learn"; `run_with_deadline` reports it this way
/// rather than blocking forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    Learned(i32),
    DidNotLearn,
}

pub struct Learner<T: Transport> {
    id: usize,
    transport: T,
    learned: Option<(u64, i32)>,
}

impl<T: Transport> Learner<T> {
    pub fn new(id: usize, transport: T) -> Self {
        Learner {
            id,
            transport,
            learned: None,
        }
    }

    pub fn learned_value(&self) -> Option<i32> {
        self.learned.map(|(_, v)| v)
    }

    /// Blocks until the first DECIDE is observed, per the spec's unbounded
    /// learner loop.
    pub fn run(&mut self, timeout: Duration) -> i32 {
        info!("[learner {}] waiting for DECIDE", self.id);
        loop {
            match self.transport.receive(timeout) {
                ReceiveOutcome::Received(Message::Decide { n, v, .. }) => {
                    return self.absorb(n, v);
                }
                ReceiveOutcome::Received(_) | ReceiveOutcome::Timeout | ReceiveOutcome::Malformed => continue,
            }
        }
    }

    /// Bounded variant for tests and CLI launchers: gives up once `deadline`
    /// has elapsed without a DECIDE, rather than blocking forever.
    pub fn run_with_deadline(&mut self, receive_timeout: Duration, deadline: Duration) -> LearnOutcome {
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() >= deadline {
                return LearnOutcome::DidNotLearn;
            }
            match self.transport.receive(receive_timeout) {
                ReceiveOutcome::Received(Message::Decide { n, v, .. }) => {
                    return LearnOutcome::Learned(self.absorb(n, v));
                }
                ReceiveOutcome::Received(_) | ReceiveOutcome::Timeout | ReceiveOutcome::Malformed => continue,
            }
        }
    }

    /// Records the decided value, asserting against divergent DECIDEs replayed
    /// for the same instance -- a safety violation that must surface loudly
    /// rather than be silently overwritten.
    fn absorb(&mut self, n: u64, v: i32) -> i32 {
        if let Some((_, prior_v)) = self.learned {
            assert_eq!(
                prior_v, v,
                "[learner {}] divergent DECIDE observed: learned {} then {}",
                self.id, prior_v, v
            );
            return prior_v;
        }
        self.learned = Some((n, v));
        info!("[learner {}] aprendeu o valor: {}", self.id, v);
        v
    }
}
