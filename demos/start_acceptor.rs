//! A script used to start one acceptor, which will infinitely listen to incoming messages (from
//! proposers) until it observes DECIDE.
//!
//! You can run this example as follows
//!     RUST_LOG=paxos_core=info TOTAL_PROCESSOS_NUM=5 cargo run --example start_acceptor -- <id>
//! where <id> is a non-negative number which should be unique (among all nodes) and less than
//! TOTAL_PROCESSOS_NUM.

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate paxos_core;

use std::env;
use std::process;

use paxos_core::acceptor::Acceptor;
use paxos_core::config::NodeConfig;
use paxos_core::transport::UdpTransport;

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

    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            process::exit(1);
        }
    };

    if !config.is_acceptor(id) {
        eprintln!("id {} is not within the acceptor range 0..{}", id, config.total);
        process::exit(1);
    }

    let transport = match UdpTransport::bind(id, config.base_port) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    info!("[acceptor {}] starting, timeout={:?}", id, config.timeout);
    let mut acceptor = Acceptor::new(id, transport);
    acceptor.run(config.timeout);
    info!("[acceptor {}] decided value {:?}", id, acceptor.state().accepted_v());
}
