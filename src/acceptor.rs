//! Acceptor state machine (C3): the reactive core that every acceptor-capable node
//! runs, whether it's a standalone acceptor or a proposer's dual role.
//!
//! `AcceptorState` is deliberately separate from `Acceptor` (the standalone node
//! that owns a transport and a receive loop): the state machine itself is pure and
//! transport-agnostic so a `Proposer` can embed one and drive it from its own
//! receive loop without duplicating the promise/accept logic.

use std::time::Duration;

use log::{debug, info};

use crate::message::Message;
use crate::transport::{ReceiveOutcome, Transport};

/// The persistent-ish state of one acceptor, held for the process lifetime.
///
/// Invariant A1: `accepted_n <= promised_n` always holds after construction.
/// Invariant A2: once `decided` is true, `accepted_v` never changes again.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptorState {
    promised_n: u64,
    accepted_n: u64,
    accepted_v: Option<i32>,
    decided: bool,
}

impl AcceptorState {
    pub fn new() -> Self {
        AcceptorState::default()
    }

    pub fn promised_n(&self) -> u64 {
        self.promised_n
    }

    pub fn accepted_n(&self) -> u64 {
        self.accepted_n
    }

    pub fn accepted_v(&self) -> Option<i32> {
        self.accepted_v
    }

    pub fn is_decided(&self) -> bool {
        self.decided
    }

    /// Handles PREPARE(n), returning the PROMISE to send back, or `None` if the
    /// ballot is stale and the message is silently dropped (no NACK).
    ///
    /// `promised_n` and `accepted_n` are tracked as two distinct fields on purpose:
    /// a PREPARE only ever raises `promised_n`, never `accepted_n`. Conflating the
    /// two -- retroactively promoting `accepted_n` on PREPARE -- breaks invariant A1
    /// and is the unsafe behavior this implementation must not reproduce.
    pub fn on_prepare(&mut self, id: usize, n: u64, from: usize) -> Option<Message> {
        if n <= self.promised_n {
            debug!("[acceptor {}] dropping stale PREPARE(n={}) from {}", id, n, from);
            return None;
        }
        self.promised_n = n;
        let had_prior = self.accepted_v.is_some();
        let reply = if had_prior {
            Message::Promise {
                sender_id: id,
                n: self.accepted_n,
                v: self.accepted_v,
                had_prior: true,
            }
        } else {
            Message::Promise {
                sender_id: id,
                n: self.promised_n,
                v: None,
                had_prior: false,
            }
        };
        debug!("[acceptor {}] promised n={} to {}", id, self.promised_n, from);
        Some(reply)
    }

    /// Handles ACCEPT(n, v), returning the ACCEPTED to send back, or `None` if the
    /// ballot is stale. Uses `n >= promised_n` (not strict `>`): a proposer whose
    /// own PREPARE was just promised at `n` must be allowed to ACCEPT at that `n`.
    pub fn on_accept(&mut self, id: usize, n: u64, v: i32, from: usize) -> Option<Message> {
        if n < self.promised_n {
            debug!("[acceptor {}] dropping stale ACCEPT(n={}) from {}", id, n, from);
            return None;
        }
        self.accepted_n = n;
        self.accepted_v = Some(v);
        debug!("[acceptor {}] accepted n={} v={} from {}", id, n, v, from);
        Some(Message::Accepted { sender_id: id, n })
    }

    /// Absorbs DECIDE(n, v): terminal, idempotent under replay.
    pub fn on_decide(&mut self, id: usize, n: u64, v: i32) {
        if self.decided {
            debug_assert_eq!(
                self.accepted_v,
                Some(v),
                "divergent DECIDE observed at acceptor {}: safety violation",
                id
            );
            return;
        }
        self.decided = true;
        self.accepted_n = n;
        self.accepted_v = Some(v);
        info!("[acceptor {}] decided value {}", id, v);
    }
}

/// A standalone acceptor-only node: owns a transport and drives `AcceptorState`
/// from its own receive loop until it observes DECIDE.
pub struct Acceptor<T: Transport> {
    id: usize,
    transport: T,
    state: AcceptorState,
}

impl<T: Transport> Acceptor<T> {
    pub fn new(id: usize, transport: T) -> Self {
        Acceptor {
            id,
            transport,
            state: AcceptorState::new(),
        }
    }

    pub fn state(&self) -> &AcceptorState {
        &self.state
    }

    /// Test-only hook to pre-seed state before `run`, e.g. to simulate an
    /// acceptor that already accepted a proposal in an earlier round.
    #[cfg(test)]
    pub fn seed_state_for_test(&mut self, seed: impl FnOnce(&mut AcceptorState)) {
        seed(&mut self.state);
    }

    /// Runs the reactive loop until DECIDE is observed.
    pub fn run(&mut self, timeout: Duration) {
        info!("[acceptor {}] waiting for PREPARE/ACCEPT/DECIDE", self.id);
        while !self.state.is_decided() {
            match self.transport.receive(timeout) {
                ReceiveOutcome::Received(msg) => self.dispatch(msg),
                ReceiveOutcome::Timeout => continue,
                ReceiveOutcome::Malformed => continue,
            }
        }
    }

    /// Bounded variant of `run`: gives up once `deadline` has elapsed without
    /// observing DECIDE, rather than blocking forever. Used by callers that need
    /// to terminate on their own budget (e.g. the local multi-node demo), not by
    /// the spec's own unbounded per-role launcher.
    pub fn run_with_deadline(&mut self, receive_timeout: Duration, deadline: Duration) -> bool {
        info!("[acceptor {}] waiting for PREPARE/ACCEPT/DECIDE", self.id);
        let start = std::time::Instant::now();
        while !self.state.is_decided() {
            if start.elapsed() >= deadline {
                return false;
            }
            match self.transport.receive(receive_timeout) {
                ReceiveOutcome::Received(msg) => self.dispatch(msg),
                ReceiveOutcome::Timeout => continue,
                ReceiveOutcome::Malformed => continue,
            }
        }
        true
    }

    fn dispatch(&mut self, msg: Message) {
        match msg {
            Message::Prepare { sender_id, n } => {
                if let Some(reply) = self.state.on_prepare(self.id, n, sender_id) {
                    let _ = self.transport.send(sender_id, &reply);
                }
            }
            Message::Accept { sender_id, n, v } => {
                if let Some(reply) = self.state.on_accept(self.id, n, v, sender_id) {
                    let _ = self.transport.send(sender_id, &reply);
                }
            }
            Message::Decide { n, v, .. } => self.state.on_decide(self.id, n, v),
            // Promise/Accepted are proposer-bound replies; an acceptor has nothing to
            // do with one and drops it, per the "unknown/irrelevant kind" policy.
            Message::Promise { .. } | Message::Accepted { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promised_and_accepted_stay_separate_on_prepare() {
        let mut state = AcceptorState::new();
        state.on_accept(0, 5, 99, 1);
        assert_eq!(state.accepted_n(), 5);

        // A PREPARE at a higher ballot must not retroactively change accepted_n.
        state.on_prepare(0, 10, 1);
        assert_eq!(state.promised_n(), 10);
        assert_eq!(state.accepted_n(), 5, "accepted_n must not be promoted by PREPARE");
    }

    #[test]
    fn prepare_reports_prior_value_when_present() {
        let mut state = AcceptorState::new();
        state.on_accept(0, 3, 10, 1);
        let reply = state.on_prepare(0, 4, 2).unwrap();
        match reply {
            Message::Promise { n, v, had_prior, .. } => {
                assert!(had_prior);
                assert_eq!(n, 3);
                assert_eq!(v, Some(10));
            }
            _ => panic!("expected Promise"),
        }
    }

    #[test]
    fn prepare_with_no_prior_value_reports_promised_n_and_no_value() {
        let mut state = AcceptorState::new();
        let reply = state.on_prepare(0, 4, 2).unwrap();
        match reply {
            Message::Promise { n, v, had_prior, .. } => {
                assert!(!had_prior);
                assert_eq!(n, 4);
                assert_eq!(v, None);
            }
            _ => panic!("expected Promise"),
        }
    }

    #[test]
    fn stale_prepare_is_dropped_without_nack() {
        let mut state = AcceptorState::new();
        state.on_prepare(0, 5, 1);
        assert!(state.on_prepare(0, 3, 2).is_none());
        assert_eq!(state.promised_n(), 5);
    }

    #[test]
    fn accept_at_exactly_promised_n_succeeds() {
        let mut state = AcceptorState::new();
        state.on_prepare(0, 5, 1);
        assert!(state.on_accept(0, 5, 42, 1).is_some());
        assert_eq!(state.accepted_n(), 5);
        assert_eq!(state.accepted_v(), Some(42));
    }

    #[test]
    fn accept_below_promised_n_is_dropped() {
        let mut state = AcceptorState::new();
        state.on_prepare(0, 5, 1);
        assert!(state.on_accept(0, 4, 42, 1).is_none());
        assert_eq!(state.accepted_n(), 0);
    }

    #[test]
    fn decide_is_idempotent_under_replay() {
        let mut state = AcceptorState::new();
        state.on_decide(0, 7, 42);
        assert!(state.is_decided());
        // Replaying the same DECIDE must not change anything after the first.
        state.on_decide(0, 7, 42);
        assert_eq!(state.accepted_v(), Some(42));
        assert_eq!(state.accepted_n(), 7);
    }

    #[test]
    fn monotonicity_holds_across_a_sequence_of_messages() {
        let mut state = AcceptorState::new();
        let mut last_promised = state.promised_n();
        let mut last_accepted = state.accepted_n();

        state.on_prepare(0, 1, 1);
        assert!(state.promised_n() >= last_promised);
        last_promised = state.promised_n();

        state.on_accept(0, 1, 7, 1);
        assert!(state.accepted_n() >= last_accepted);
        last_accepted = state.accepted_n();

        state.on_prepare(0, 2, 1);
        assert!(state.promised_n() >= last_promised);
        assert!(state.accepted_n() >= last_accepted);
    }

    #[test]
    fn run_with_deadline_gives_up_with_no_traffic() {
        use crate::transport::InMemoryNetwork;

        let network = InMemoryNetwork::new();
        let transport = network.node(0);
        let mut acceptor = Acceptor::new(0, transport);

        let decided = acceptor.run_with_deadline(Duration::from_millis(20), Duration::from_millis(60));
        assert!(!decided);
        assert!(!acceptor.state().is_decided());
    }
}
