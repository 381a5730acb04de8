//! Status Line Protocol
//!
//! One-line status records exchanged between peers.

mod codec;
mod snapshot;

pub use codec::*;
pub use snapshot::*;
