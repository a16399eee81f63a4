//! Configuration source for a Paxos node, read once at startup from the process
//! environment and passed by value into every node constructor.
//!
//! This replaces the teacher crate's `Config.toml` + `config`/`toml` file-based
//! source: the spec this crate implements names explicit environment variables
//! (`TOTAL_PROCESSOS_NUM`, `PROPOSITORES_ATIVOS_NUM`, `APRENDIZES_NUM`, `PORTA_BASE`,
//! `TIMEOUT`), matching the constants the original Python implementation read at
//! import time. No module-level statics: everything lives on this struct.

use std::env;
use std::time::Duration;

use crate::error::PaxosError;

const DEFAULT_BASE_PORT: u16 = 5000;
const DEFAULT_TIMEOUT_SECS: f64 = 2.0;

/// Node counts and network parameters for one run of the protocol.
///
/// Node ids are partitioned deterministically from this record:
/// - proposers: `0..active_proposers`
/// - acceptor-capable nodes: `0..total` (every proposer is also acceptor-capable)
/// - learners: `total..total + learners`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeConfig {
    pub total: usize,
    pub active_proposers: usize,
    pub learners: usize,
    pub base_port: u16,
    pub timeout: Duration,
}

impl NodeConfig {
    /// Builds a `NodeConfig` from `TOTAL_PROCESSOS_NUM`, `PROPOSITORES_ATIVOS_NUM`,
    /// `APRENDIZES_NUM`, `PORTA_BASE` and `TIMEOUT`. Missing optional variables fall
    /// back to the defaults the original implementation hard-coded as module constants.
    pub fn from_env() -> Result<Self, PaxosError> {
        let total = parse_required_usize("TOTAL_PROCESSOS_NUM")?;
        let active_proposers = parse_optional_usize("PROPOSITORES_ATIVOS_NUM", 1)?;
        let learners = parse_optional_usize("APRENDIZES_NUM", total)?;
        let base_port = parse_optional_u16("PORTA_BASE", DEFAULT_BASE_PORT)?;
        let timeout = parse_optional_timeout("TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

        let config = NodeConfig {
            total,
            active_proposers,
            learners,
            base_port,
            timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PaxosError> {
        if self.total < 3 {
            return Err(PaxosError::Config(format!(
                "TOTAL_PROCESSOS_NUM must be >= 3, got {}",
                self.total
            )));
        }
        if self.total % 2 == 0 {
            return Err(PaxosError::Config(format!(
                "TOTAL_PROCESSOS_NUM must be odd so that a strict majority is well-defined, got {}",
                self.total
            )));
        }
        if self.active_proposers > self.total {
            return Err(PaxosError::Config(format!(
                "PROPOSITORES_ATIVOS_NUM ({}) cannot exceed TOTAL_PROCESSOS_NUM ({})",
                self.active_proposers, self.total
            )));
        }
        Ok(())
    }

    /// Strict majority threshold: a proposer needs `majority()` replies, i.e. `N/2 + 1`.
    pub fn majority(&self) -> usize {
        self.total / 2 + 1
    }

    pub fn is_proposer(&self, id: usize) -> bool {
        id < self.active_proposers
    }

    pub fn is_acceptor(&self, id: usize) -> bool {
        id < self.total
    }

    pub fn is_learner(&self, id: usize) -> bool {
        id >= self.total && id < self.total + self.learners
    }

    /// All node ids that should receive a DECIDE broadcast: acceptors union learners.
    /// Specified explicitly per the redesign note on `_anunciar_decisao`'s `range(total * 2)`.
    pub fn decide_recipients(&self, exclude: usize) -> Vec<usize> {
        (0..self.total + self.learners)
            .filter(|&id| id != exclude)
            .collect()
    }

    /// Peer acceptor ids a proposer broadcasts PREPARE/ACCEPT to (all acceptors but self).
    pub fn acceptor_peers(&self, exclude: usize) -> Vec<usize> {
        (0..self.total).filter(|&id| id != exclude).collect()
    }

    pub fn address_port(&self, id: usize) -> u16 {
        self.base_port + id as u16
    }
}

fn parse_required_usize(key: &str) -> Result<usize, PaxosError> {
    let raw = env::var(key).map_err(|_| PaxosError::Config(format!("{} is not set", key)))?;
    raw.trim()
        .parse::<usize>()
        .map_err(|_| PaxosError::Config(format!("{} is not a valid non-negative integer: {:?}", key, raw)))
}

fn parse_optional_usize(key: &str, default: usize) -> Result<usize, PaxosError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| PaxosError::Config(format!("{} is not a valid non-negative integer: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_optional_u16(key: &str, default: u16) -> Result<u16, PaxosError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| PaxosError::Config(format!("{} is not a valid port: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_optional_timeout(key: &str, default_secs: f64) -> Result<Duration, PaxosError> {
    match env::var(key) {
        Ok(raw) => {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| PaxosError::Config(format!("{} is not a valid number of seconds: {:?}", key, raw)))?;
            if secs <= 0.0 {
                return Err(PaxosError::Config(format!("{} must be positive, got {}", key, secs)));
            }
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(Duration::from_secs_f64(default_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_is_strict_half_plus_one() {
        let config = NodeConfig {
            total: 5,
            active_proposers: 1,
            learners: 5,
            base_port: 5000,
            timeout: Duration::from_secs(2),
        };
        assert_eq!(config.majority(), 3);
    }

    #[test]
    fn roles_partition_ids_as_documented() {
        let config = NodeConfig {
            total: 5,
            active_proposers: 2,
            learners: 3,
            base_port: 5000,
            timeout: Duration::from_secs(2),
        };
        assert!(config.is_proposer(0));
        assert!(config.is_proposer(1));
        assert!(!config.is_proposer(2));
        assert!(config.is_acceptor(4));
        assert!(!config.is_acceptor(5));
        assert!(config.is_learner(5));
        assert!(config.is_learner(7));
        assert!(!config.is_learner(8));
    }

    #[test]
    fn decide_recipients_covers_acceptors_and_learners_explicitly() {
        let config = NodeConfig {
            total: 3,
            active_proposers: 1,
            learners: 2,
            base_port: 5000,
            timeout: Duration::from_secs(2),
        };
        let mut recipients = config.decide_recipients(0);
        recipients.sort_unstable();
        assert_eq!(recipients, vec![1, 2, 3, 4]);
    }

    #[test]
    fn even_total_is_rejected() {
        let config = NodeConfig {
            total: 4,
            active_proposers: 1,
            learners: 4,
            base_port: 5000,
            timeout: Duration::from_secs(2),
        };
        assert!(config.validate().is_err());
    }
}
