//! Sync Engine
//!
//! Broadcasting local state and reconciling with the remote peer's snapshots.

mod broadcaster;
mod mailbox;
mod reconciler;

pub use broadcaster::*;
pub use mailbox::*;
pub use reconciler::*;
