//! Proposer driver (C4): generates a ballot, runs Phase 1 (Prepare) and Phase 2
//! (Accept), and on majority broadcasts DECIDE. Retries with a fresh ballot on
//! either phase's failure.
//!
//! A proposer is also a dual-role acceptor: while it waits on its own collection
//! loop it services inbound PREPARE/ACCEPT from competing proposers using the same
//! `AcceptorState` a standalone `Acceptor` would run. Without this, PREPAREs from
//! competing proposers are dropped by timeout and progress can livelock whenever
//! more than one proposer is active.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::acceptor::AcceptorState;
use crate::config::NodeConfig;
use crate::message::Message;
use crate::transport::{ReceiveOutcome, Transport};

/// Result of a full `propose` call (the outer retry loop), not a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// Consensus reached; carries the decided value (which may differ from the
    /// value this proposer originally wanted, per the adoption rule).
    Decided(i32),
    /// The configured `max_rounds` budget was exhausted without reaching majority.
    /// The spec's default retry budget is unbounded; this variant only appears
    /// when a caller opts into a bound via `with_max_rounds`.
    GaveUp,
}

enum RoundOutcome {
    Majority,
    NoMajority,
    /// Another proposer's DECIDE was observed mid-round; adopt it directly.
    AdoptedDecision(i32),
}

pub struct Proposer<T: Transport> {
    id: usize,
    config: NodeConfig,
    transport: T,
    /// Dual-role acceptor state, shared with any PREPARE/ACCEPT this node services
    /// while it is itself proposing.
    acceptor_state: AcceptorState,
    my_n: u64,
    max_rounds: Option<usize>,
}

impl<T: Transport> Proposer<T> {
    pub fn new(id: usize, config: NodeConfig, transport: T) -> Self {
        Proposer {
            id,
            config,
            transport,
            acceptor_state: AcceptorState::new(),
            my_n: 0,
            max_rounds: None,
        }
    }

    /// Opts into a bounded outer retry loop, purely a test/CLI convenience layered
    /// on top of the spec's unbounded default (see SPEC_FULL.md open question).
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn acceptor_state(&self) -> &AcceptorState {
        &self.acceptor_state
    }

    /// Runs the outer retry loop: generate a ballot, run one round, retry on
    /// failure with a bumped ballot, until majority or `max_rounds` is exhausted.
    pub fn propose(&mut self, initial_value: i32) -> ProposeOutcome {
        let mut rounds: usize = 0;
        loop {
            rounds += 1;
            if let Some(max) = self.max_rounds {
                if rounds > max {
                    warn!("[proposer {}] giving up after {} rounds", self.id, max);
                    return ProposeOutcome::GaveUp;
                }
            }

            let n = self.next_ballot();
            info!(
                "[proposer {}] starting proposal n={} value={}",
                self.id, n, initial_value
            );

            match self.run_round(n, initial_value) {
                RoundOutcome::Majority => {
                    info!("[proposer {}] consensus achieved with value {}", self.id, initial_value);
                    return ProposeOutcome::Decided(self.acceptor_state.accepted_v().unwrap());
                }
                RoundOutcome::AdoptedDecision(v) => {
                    info!("[proposer {}] adopted decision {} from a peer", self.id, v);
                    return ProposeOutcome::Decided(v);
                }
                RoundOutcome::NoMajority => {
                    warn!("[proposer {}] round n={} failed to reach majority, retrying", self.id, n);
                    continue;
                }
            }
        }
    }

    /// `my_n <- max(my_n, accepted_n) + 1`. Incorporating the acceptor's own
    /// `accepted_n` (kept current by the dual-role handling) reduces collisions
    /// with ballots this node has already participated in as an acceptor.
    fn next_ballot(&mut self) -> u64 {
        self.my_n = std::cmp::max(self.my_n, self.acceptor_state.accepted_n()) + 1;
        self.my_n
    }

    fn run_round(&mut self, n: u64, initial_value: i32) -> RoundOutcome {
        match self.phase1(n) {
            Phase1Result::Majority { value_to_propose } => match self.phase2(n, value_to_propose.unwrap_or(initial_value)) {
                Phase2Result::Majority(v) => {
                    self.decide(n, v);
                    RoundOutcome::Majority
                }
                Phase2Result::NoMajority => RoundOutcome::NoMajority,
                Phase2Result::AdoptedDecision(v) => RoundOutcome::AdoptedDecision(v),
            },
            Phase1Result::NoMajority => RoundOutcome::NoMajority,
            Phase1Result::AdoptedDecision(v) => RoundOutcome::AdoptedDecision(v),
        }
    }

    /// Phase 1: broadcast PREPARE(n), collect PROMISEs until majority or deadline.
    fn phase1(&mut self, n: u64) -> Phase1Result {
        for peer in self.config.acceptor_peers(self.id) {
            let _ = self.transport.send(peer, &Message::Prepare { sender_id: self.id, n });
        }

        let majority = self.config.majority();
        let deadline = Instant::now() + self.config.timeout;
        let mut promise_count = 0usize;
        let mut highest_prior_n = 0u64;
        let mut prior_v: Option<i32> = None;

        while promise_count < majority {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if d > Duration::from_millis(0) => d,
                _ => break,
            };
            match self.transport.receive(remaining) {
                ReceiveOutcome::Received(Message::Promise { n: p_n, v, had_prior, .. }) => {
                    promise_count += 1;
                    if had_prior && p_n > highest_prior_n {
                        highest_prior_n = p_n;
                        prior_v = v;
                    }
                }
                ReceiveOutcome::Received(Message::Decide { n: d_n, v, .. }) => {
                    self.acceptor_state.on_decide(self.id, d_n, v);
                    return Phase1Result::AdoptedDecision(v);
                }
                ReceiveOutcome::Received(other) => self.service_dual_role(other),
                ReceiveOutcome::Timeout | ReceiveOutcome::Malformed => continue,
            }
        }

        if promise_count >= majority {
            let value_to_propose = if highest_prior_n > 0 { prior_v } else { None };
            Phase1Result::Majority { value_to_propose }
        } else {
            Phase1Result::NoMajority
        }
    }

    /// Phase 2: broadcast ACCEPT(n, v), collect ACCEPTED for ballot `n` until
    /// majority or deadline. Only ACCEPTED replies naming this exact ballot count,
    /// per the spec's mandatory ballot check for this phase.
    fn phase2(&mut self, n: u64, value_to_propose: i32) -> Phase2Result {
        for peer in self.config.acceptor_peers(self.id) {
            let _ = self.transport.send(
                peer,
                &Message::Accept {
                    sender_id: self.id,
                    n,
                    v: value_to_propose,
                },
            );
        }

        let majority = self.config.majority();
        let deadline = Instant::now() + self.config.timeout;
        let mut accepted_count = 0usize;

        while accepted_count < majority {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if d > Duration::from_millis(0) => d,
                _ => break,
            };
            match self.transport.receive(remaining) {
                ReceiveOutcome::Received(Message::Accepted { n: a_n, .. }) if a_n == n => {
                    accepted_count += 1;
                }
                ReceiveOutcome::Received(Message::Decide { n: d_n, v, .. }) => {
                    self.acceptor_state.on_decide(self.id, d_n, v);
                    return Phase2Result::AdoptedDecision(v);
                }
                ReceiveOutcome::Received(other) => self.service_dual_role(other),
                ReceiveOutcome::Timeout | ReceiveOutcome::Malformed => continue,
            }
        }

        if accepted_count >= majority {
            Phase2Result::Majority(value_to_propose)
        } else {
            Phase2Result::NoMajority
        }
    }

    /// Services an inbound message as the dual-role acceptor would, replying as
    /// appropriate. Used while this proposer is itself mid-round.
    fn service_dual_role(&mut self, msg: Message) {
        match msg {
            Message::Prepare { sender_id, n } => {
                if let Some(reply) = self.acceptor_state.on_prepare(self.id, n, sender_id) {
                    let _ = self.transport.send(sender_id, &reply);
                }
            }
            Message::Accept { sender_id, n, v } => {
                if let Some(reply) = self.acceptor_state.on_accept(self.id, n, v, sender_id) {
                    let _ = self.transport.send(sender_id, &reply);
                }
            }
            // Promise/Accepted not matching this round, or arriving for a round
            // that already moved on: not actionable here.
            Message::Promise { .. } | Message::Accepted { .. } | Message::Decide { .. } => {}
        }
    }

    /// Marks self decided and broadcasts DECIDE to every acceptor and learner.
    fn decide(&mut self, n: u64, v: i32) {
        self.acceptor_state.on_decide(self.id, n, v);
        for peer in self.config.decide_recipients(self.id) {
            let _ = self.transport.send(peer, &Message::Decide { sender_id: self.id, n, v });
        }
    }
}

enum Phase1Result {
    Majority { value_to_propose: Option<i32> },
    NoMajority,
    AdoptedDecision(i32),
}

enum Phase2Result {
    Majority(i32),
    NoMajority,
    AdoptedDecision(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::Acceptor;
    use crate::transport::InMemoryNetwork;
    use std::thread;
    use std::time::Duration;

    fn test_config(total: usize, active_proposers: usize, learners: usize) -> NodeConfig {
        NodeConfig {
            total,
            active_proposers,
            learners,
            base_port: 0,
            timeout: Duration::from_millis(300),
        }
    }

    #[test]
    fn single_proposer_reaches_consensus_in_one_round() {
        let config = test_config(5, 1, 0);
        let network = InMemoryNetwork::new();

        let mut acceptor_handles = Vec::new();
        for id in 1..5 {
            let transport = network.node(id);
            acceptor_handles.push(thread::spawn(move || {
                let mut acceptor = Acceptor::new(id, transport);
                acceptor.run(Duration::from_secs(2));
                (id, *acceptor.state())
            }));
        }

        let proposer_transport = network.node(0);
        let mut proposer = Proposer::new(0, config, proposer_transport);
        let outcome = proposer.propose(42);

        assert_eq!(outcome, ProposeOutcome::Decided(42));

        for handle in acceptor_handles {
            let (id, state) = handle.join().unwrap();
            assert_eq!(state.accepted_v(), Some(42), "acceptor {} disagreed", id);
        }
    }

    #[test]
    fn proposer_adopts_prior_value_reported_by_majority() {
        // Acceptor 2 has already accepted (n=1, v=10) before this round starts;
        // seed that directly on its state machine rather than through a real
        // PREPARE/ACCEPT exchange, since only the resulting state matters here.
        let config = test_config(5, 1, 0);
        let network = InMemoryNetwork::new();

        let mut handles = Vec::new();
        for id in 1..5 {
            let transport = network.node(id);
            handles.push(thread::spawn(move || {
                let mut acceptor = Acceptor::new(id, transport);
                if id == 2 {
                    acceptor.seed_state_for_test(|state| {
                        state.on_prepare(id, 1, 0);
                        state.on_accept(id, 1, 10, 0);
                    });
                }
                acceptor.run(Duration::from_secs(2));
                (id, *acceptor.state())
            }));
        }

        let proposer_transport = network.node(0);
        let mut proposer = Proposer::new(0, config, proposer_transport);
        let outcome = proposer.propose(99);

        assert_eq!(outcome, ProposeOutcome::Decided(10));

        for handle in handles {
            let (id, state) = handle.join().unwrap();
            assert_eq!(state.accepted_v(), Some(10), "acceptor {} disagreed", id);
        }
    }

    /// Scenario 4: two proposers both start with `my_n = 1` and race each other.
    /// Safety (P1) requires that whichever value is chosen, every node that
    /// decides agrees on it -- even though the two proposers wanted different
    /// values and their first ballots collide.
    #[test]
    fn two_proposers_with_colliding_ballots_converge_on_one_value() {
        let network = InMemoryNetwork::new();
        let config = test_config(3, 2, 0);

        let plain_acceptor_transport = network.node(2);
        let plain_acceptor = thread::spawn(move || {
            let mut acceptor = Acceptor::new(2, plain_acceptor_transport);
            acceptor.run(Duration::from_secs(2));
            *acceptor.state()
        });

        let transport0 = network.node(0);
        let proposer0 = thread::spawn(move || {
            let mut proposer = Proposer::new(0, config, transport0);
            proposer.propose(10)
        });

        let transport1 = network.node(1);
        let proposer1 = thread::spawn(move || {
            let mut proposer = Proposer::new(1, config, transport1);
            proposer.propose(20)
        });

        let outcome0 = match proposer0.join().unwrap() {
            ProposeOutcome::Decided(v) => v,
            ProposeOutcome::GaveUp => panic!("proposer 0 gave up"),
        };
        let outcome1 = match proposer1.join().unwrap() {
            ProposeOutcome::Decided(v) => v,
            ProposeOutcome::GaveUp => panic!("proposer 1 gave up"),
        };

        assert_eq!(outcome0, outcome1, "proposers disagreed on the decided value");
        assert!(outcome0 == 10 || outcome0 == 20);

        let acceptor_state = plain_acceptor.join().unwrap();
        assert_eq!(acceptor_state.accepted_v(), Some(outcome0));
    }

    /// With no peer acceptors registered on the network, every PREPARE goes
    /// unanswered and phase 1 can never reach majority; `with_max_rounds` must
    /// cap the outer retry loop instead of looping forever.
    #[test]
    fn gives_up_after_max_rounds_with_no_quorum_available() {
        let config = test_config(5, 1, 0);
        let network = InMemoryNetwork::new();
        let transport = network.node(0);

        let mut proposer = Proposer::new(0, config, transport).with_max_rounds(2);
        let outcome = proposer.propose(7);

        assert_eq!(outcome, ProposeOutcome::GaveUp);
    }
}
