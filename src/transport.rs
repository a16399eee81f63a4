//! Transport contract (C2): bind, send-to-peer, receive-with-timeout over datagrams.
//!
//! Two implementations share the `Transport` trait: `UdpTransport`, which binds a
//! real UDP socket per node at the deterministic address `127.0.0.1:base_port+id`
//! (the production/demo path, grounded on the teacher's `NetNode`), and
//! `InMemoryTransport`, which routes through channels for deterministic,
//! socket-free tests, per the redesign note in the spec's design section.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::PaxosError;
use crate::message::{self, Message, MAX_FRAME_BYTES};

/// Outcome of a bounded `receive` call.
pub enum ReceiveOutcome {
    Received(Message),
    Timeout,
    /// A frame arrived but didn't decode; the caller treats this like "not received".
    Malformed,
}

/// What a node needs from the network: its own id, sending to a peer by id, and
/// receiving with a bounded wait. Addressing and delivery details are left to the
/// implementation.
pub trait Transport {
    fn id(&self) -> usize;

    /// Best-effort send. A failure is reported but never retried at this layer.
    fn send(&self, to: usize, msg: &Message) -> Result<(), PaxosError>;

    /// Blocks up to `timeout`; returns `Timeout` on expiry rather than erroring.
    fn receive(&self, timeout: Duration) -> ReceiveOutcome;
}

/// UDP transport. Each node exclusively owns one bound socket for the process
/// lifetime; peer addresses are computed deterministically from `base_port + id`.
pub struct UdpTransport {
    id: usize,
    base_port: u16,
    socket: UdpSocket,
    /// Fault-injection knob (`--processo-com-erro`): delay every send by this much.
    send_delay: Option<Duration>,
}

impl UdpTransport {
    /// Binds the node's endpoint. Bind failure is unrecoverable -- a node cannot run
    /// at all without it -- so it's surfaced as `PaxosError::Bind` for the caller's
    /// `main` to report and exit on, matching the teacher's bind-at-construction style.
    pub fn bind(id: usize, base_port: u16) -> Result<Self, PaxosError> {
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, base_port + id as u16);
        let socket = UdpSocket::bind(addr).map_err(PaxosError::Bind)?;
        Ok(UdpTransport {
            id,
            base_port,
            socket,
            send_delay: None,
        })
    }

    /// Returns a transport that sleeps for `delay` before every send, modeling the
    /// spec's `--processo-com-erro` fault-injection hook.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    fn peer_addr(&self, peer_id: usize) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.base_port + peer_id as u16)
    }
}

impl Transport for UdpTransport {
    fn id(&self) -> usize {
        self.id
    }

    fn send(&self, to: usize, msg: &Message) -> Result<(), PaxosError> {
        if let Some(delay) = self.send_delay {
            thread::sleep(delay);
        }
        let encoded = message::encode(msg);
        self.socket
            .send_to(&encoded, self.peer_addr(to))
            .map_err(PaxosError::Send)?;
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> ReceiveOutcome {
        if self.socket.set_read_timeout(Some(timeout)).is_err() {
            return ReceiveOutcome::Timeout;
        }
        let mut buf = [0u8; MAX_FRAME_BYTES];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _src)) => match message::decode(&buf[..len]) {
                Ok(msg) => ReceiveOutcome::Received(msg),
                Err(_) => ReceiveOutcome::Malformed,
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                ReceiveOutcome::Timeout
            }
            Err(_) => ReceiveOutcome::Timeout,
        }
    }
}

/// A shared routing table for `InMemoryTransport`: node id -> inbound channel.
/// Cloning a `InMemoryNetwork` handle gives every node a way to address every
/// other node registered on it.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    routes: Arc<Mutex<std::collections::HashMap<usize, Sender<Message>>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        InMemoryNetwork::default()
    }

    /// Registers `id` on the network and returns its transport handle.
    pub fn node(&self, id: usize) -> InMemoryTransport {
        let (tx, rx) = mpsc::channel();
        self.routes.lock().unwrap().insert(id, tx);
        InMemoryTransport {
            id,
            network: self.clone(),
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

/// In-memory transport used by protocol-level tests (C2b): same contract as
/// `UdpTransport`, routed through `mpsc` channels instead of real sockets, so
/// test runs are deterministic and fast.
pub struct InMemoryTransport {
    id: usize,
    network: InMemoryNetwork,
    rx: Arc<Mutex<Receiver<Message>>>,
}

impl Transport for InMemoryTransport {
    fn id(&self) -> usize {
        self.id
    }

    fn send(&self, to: usize, msg: &Message) -> Result<(), PaxosError> {
        let routes = self.network.routes.lock().unwrap();
        match routes.get(&to) {
            Some(tx) => tx
                .send(*msg)
                .map_err(|_| PaxosError::Send(io::Error::new(io::ErrorKind::NotConnected, "peer gone"))),
            // No such node registered: best-effort send, silently dropped.
            None => Ok(()),
        }
    }

    fn receive(&self, timeout: Duration) -> ReceiveOutcome {
        match self.rx.lock().unwrap().recv_timeout(timeout) {
            Ok(msg) => ReceiveOutcome::Received(msg),
            Err(_) => ReceiveOutcome::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_transport_delivers_across_nodes() {
        let network = InMemoryNetwork::new();
        let a = network.node(0);
        let b = network.node(1);

        a.send(1, &Message::Prepare { sender_id: 0, n: 1 }).unwrap();

        match b.receive(Duration::from_millis(100)) {
            ReceiveOutcome::Received(Message::Prepare { sender_id, n }) => {
                assert_eq!(sender_id, 0);
                assert_eq!(n, 1);
            }
            _ => panic!("expected to receive the Prepare message"),
        }
    }

    #[test]
    fn in_memory_transport_times_out_with_no_traffic() {
        let network = InMemoryNetwork::new();
        let a = network.node(0);
        assert!(matches!(a.receive(Duration::from_millis(20)), ReceiveOutcome::Timeout));
    }

    #[test]
    fn send_to_unregistered_peer_is_best_effort() {
        let network = InMemoryNetwork::new();
        let a = network.node(0);
        assert!(a.send(99, &Message::Prepare { sender_id: 0, n: 1 }).is_ok());
    }
}
