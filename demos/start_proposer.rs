//! A script used to start one proposer, which runs the two-phase ballot protocol for a single
//! value and then exits, reporting the outcome.
//!
//! You can run this example as follows
//!     RUST_LOG=paxos_core=info TOTAL_PROCESSOS_NUM=5 cargo run --example start_proposer -- <id> [value]
//! where <id> is a non-negative number which should be unique (among all nodes) and less than
//! PROPOSITORES_ATIVOS_NUM. If [value] is omitted a random value in [1,100] is proposed, matching
//! the original demo's `random.randint(1, 100)`.

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate paxos_core;
extern crate rand;

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use rand::Rng;

use paxos_core::config::NodeConfig;
use paxos_core::proposer::{ProposeOutcome, Proposer};
use paxos_core::transport::UdpTransport;

/// Fixed warm-up delay before the first PREPARE is sent. Acceptors and learners
/// are launched as independent OS processes with no shared readiness barrier, so
/// this gives their `bind()` calls a head start before this proposer starts
/// sending (§5 "Startup ordering" -- the per-role binaries' counterpart to the
/// `std::sync::Barrier` `demos/simulate.rs` uses for its in-process nodes). An
/// acceptor or learner's own sleep would buy nothing once its socket is already
/// bound, since the kernel buffers inbound datagrams regardless -- only the
/// sending side benefits from waiting.
const STARTUP_WARMUP: Duration = Duration::from_millis(500);

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    info!("{:?}", args);

    let id: usize = match args.get(1).and_then(|s| s.parse().ok()) {
        Some(id) => id,
        None => {
            eprintln!("Error: expected <id> as the first argument");
            process::exit(1);
        }
    };

    let value: i32 = match args.get(2) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("Error: value must be an integer");
                process::exit(1);
            }
        },
        None => rand::thread_rng().gen_range(1, 101),
    };

    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            process::exit(1);
        }
    };

    if !config.is_proposer(id) {
        eprintln!("id {} is not within the proposer range 0..{}", id, config.active_proposers);
        process::exit(1);
    }

    let transport = match UdpTransport::bind(id, config.base_port) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    info!("[proposer {}] proposing value {}", id, value);
    thread::sleep(STARTUP_WARMUP);
    let mut proposer = Proposer::new(id, config, transport);
    match proposer.propose(value) {
        ProposeOutcome::Decided(v) => {
            println!("Resultado final = {}", v);
        }
        ProposeOutcome::GaveUp => {
            println!("Falha ao alcançar consenso");
            process::exit(1);
        }
    }
}
