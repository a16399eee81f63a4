//! An example which simulates a full Paxos run locally (on one machine), launching every
//! acceptor, proposer and learner as a thread bound to its own UDP socket.
//!
//! Run this example as follows
//!     RUST_LOG=paxos_core=info TOTAL_PROCESSOS_NUM=5 PROPOSITORES_ATIVOS_NUM=1 \
//!         cargo run --example simulate
//!
//! Pass `--processo-com-erro <id>` to make the named node delay every send by `TIMEOUT + 2`
//! seconds, exercising the timeout paths of the slow-node scenario (§8 scenario 3).

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate paxos_core;
extern crate rand;

use std::env;
use std::process;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rand::Rng;

use paxos_core::acceptor::Acceptor;
use paxos_core::config::NodeConfig;
use paxos_core::learner::{LearnOutcome, Learner};
use paxos_core::proposer::{ProposeOutcome, Proposer};
use paxos_core::transport::UdpTransport;

/// Parses the optional `--processo-com-erro <id>` flag (§6 CLI surface).
fn faulty_node_id(args: &[String]) -> Option<usize> {
    args.iter()
        .position(|a| a == "--processo-com-erro")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn bind_node(id: usize, config: &NodeConfig, faulty_id: Option<usize>) -> UdpTransport {
    let transport = UdpTransport::bind(id, config.base_port).unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(1);
    });
    if faulty_id == Some(id) {
        transport.with_send_delay(config.timeout + Duration::from_secs(2))
    } else {
        transport
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let faulty_id = faulty_node_id(&args);

    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            process::exit(1);
        }
    };

    let total_nodes = config.total + config.learners;
    let barrier = Arc::new(Barrier::new(total_nodes));
    let mut handles: Vec<thread::JoinHandle<bool>> = Vec::new();

    // Acceptor-only nodes: every id in 0..total that isn't also a proposer.
    for id in config.active_proposers..config.total {
        let ready = barrier.clone();
        let transport = bind_node(id, &config, faulty_id);
        handles.push(thread::spawn(move || {
            ready.wait();
            let mut acceptor = Acceptor::new(id, transport);
            let decided = acceptor.run_with_deadline(config.timeout, config.timeout * 10);
            info!("[acceptor {}] finished with value {:?}", id, acceptor.state().accepted_v());
            decided
        }));
    }

    // Proposer (dual-role) nodes.
    for id in 0..config.active_proposers {
        let ready = barrier.clone();
        let transport = bind_node(id, &config, faulty_id);
        let proposed_value: i32 = rand::thread_rng().gen_range(1, 101);
        handles.push(thread::spawn(move || {
            ready.wait();
            let mut proposer = Proposer::new(id, config, transport);
            match proposer.propose(proposed_value) {
                ProposeOutcome::Decided(v) => {
                    info!("[proposer {}] Resultado final = {}", id, v);
                    true
                }
                ProposeOutcome::GaveUp => {
                    warn!("[proposer {}] Falha ao alcançar consenso", id);
                    false
                }
            }
        }));
    }

    // Learners.
    for id in config.total..config.total + config.learners {
        let ready = barrier.clone();
        let transport = bind_node(id, &config, faulty_id);
        handles.push(thread::spawn(move || {
            ready.wait();
            let mut learner = Learner::new(id, transport);
            // Unlike the per-role `start_learner` binary, this demo needs to terminate
            // on its own: give up after a bounded number of receive windows rather than
            // blocking forever if this learner never observes DECIDE.
            match learner.run_with_deadline(config.timeout, config.timeout * 10) {
                LearnOutcome::Learned(v) => {
                    info!("[learner {}] aprendeu o valor: {}", id, v);
                    true
                }
                LearnOutcome::DidNotLearn => {
                    warn!("[learner {}] did not learn a value within the demo budget", id);
                    false
                }
            }
        }));
    }

    info!("spawned {} node threads", handles.len());

    let mut all_ok = true;
    for handle in handles {
        if !handle.join().unwrap_or(false) {
            all_ok = false;
        }
    }

    process::exit(if all_ok { 0 } else { 1 });
}
