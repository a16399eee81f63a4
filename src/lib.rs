extern crate bincode;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate rand;
extern crate serde;

pub mod acceptor;
pub mod config;
pub mod error;
pub mod learner;
pub mod message;
pub mod proposer;
pub mod transport;
