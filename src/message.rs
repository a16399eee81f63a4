//! Wire message definitions and framing for the Paxos protocol (C1).
//!
//! Each datagram carries exactly one `Message`, self-contained and self-describing:
//! the `kind` and the fields required for that kind are encoded as a single `enum`,
//! so a frame that names an unknown kind or omits a required field cannot be
//! constructed or decoded in the first place -- the type system carries the
//! validation the spec asks of the codec, rather than a hand-rolled field check.

use serde::{Deserialize, Serialize};

/// Maximum frame size in bytes, per the spec's datagram budget.
pub const MAX_FRAME_BYTES: usize = 1024;

/// A single Paxos protocol message. `sender_id` is taken from the payload, not the
/// packet source address -- the trust model is cooperative, not adversarial.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Phase 1a: proposer asks acceptors to promise ballot `n`.
    Prepare { sender_id: usize, n: u64 },

    /// Phase 1b: acceptor's promise. `had_prior` is true when `(n, v)` reports a
    /// previously accepted proposal rather than the acceptor's bare promised ballot.
    Promise {
        sender_id: usize,
        n: u64,
        v: Option<i32>,
        had_prior: bool,
    },

    /// Phase 2a: proposer asks acceptors to accept `(n, v)`.
    Accept { sender_id: usize, n: u64, v: i32 },

    /// Phase 2b: acceptor accepted ballot `n`.
    Accepted { sender_id: usize, n: u64 },

    /// Phase 3: a chosen value, broadcast to every acceptor and learner.
    Decide { sender_id: usize, n: u64, v: i32 },
}

impl Message {
    pub fn sender_id(&self) -> usize {
        match *self {
            Message::Prepare { sender_id, .. }
            | Message::Promise { sender_id, .. }
            | Message::Accept { sender_id, .. }
            | Message::Accepted { sender_id, .. }
            | Message::Decide { sender_id, .. } => sender_id,
        }
    }
}

/// A frame that failed to decode: either truncated/corrupt bytes or bytes that
/// don't correspond to any known message shape.
#[derive(Debug)]
pub struct MalformedFrame;

/// Encodes a message into its wire bytes. Callers are responsible for checking
/// the result stays within `MAX_FRAME_BYTES` if that matters for their transport.
pub fn encode(msg: &Message) -> Vec<u8> {
    bincode::serialize(msg).expect("Message serialization is infallible for this type")
}

/// Decodes a frame, rejecting anything that isn't a well-formed `Message`.
pub fn decode(bytes: &[u8]) -> Result<Message, MalformedFrame> {
    bincode::deserialize(bytes).map_err(|_| MalformedFrame)
}
