//! # Network — Replicated Instantiation
//!
//! Keeps cloned subtrees in step across peers without shipping the subtree
//! itself: only the original's guid and an [`IdProvider`](crate::IdProvider)
//! seed travel, and every peer replays the clone locally.
//!
//! - [`transport`]: the [`Transport`] seam plus the in-process [`MemoryHub`].
//! - [`message`]: serde wire types.
//! - [`bridge`]: `sync_instantiate`, `sync_destroy` and the inbox drained at
//!   the top of each tick.

pub mod bridge;
pub mod message;
pub mod transport;

pub use bridge::{NetworkBridge, PrefabProvider};
pub use message::{DestroyInstanceMessage, INSTANCE_CREATED, INSTANCE_DESTROYED, NewInstanceMessage};
pub use transport::{Envelope, MemoryHub, MemoryTransport, QueueMode, Transport};
