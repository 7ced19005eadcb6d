//! Peerview protocol - core types and the pong message wire codec
//!
//! Implements the rendezvous peerview membership wire format: XML
//! documents exchanged between rendezvous peers describing role, ring
//! position, and known partners/associates/candidates.

pub mod advertisement;
pub mod error;
pub mod id;
pub mod peer;
pub mod pong;
pub mod ring;
pub mod xml;

pub use advertisement::Advertisement;
pub use error::ProtocolError;
pub use id::PeerId;
pub use peer::{Peer, PeerInfo};
pub use pong::{PongAction, PongMessage, RendezvousState};
