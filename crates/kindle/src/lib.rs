//! # Kindle — Component Lifecycle and Scene Runtime
//!
//! A per-frame runtime for component-based scenes: a node graph with
//! derived active state, components with a fixed lifecycle and per-phase
//! update hooks, cooperative coroutines, deterministic deep cloning of
//! subtrees and network-replicated instantiation.
//!
//! Start with `use kindle::prelude::*`, create a [`Context`], add nodes and
//! components, and call [`Context::tick`] once per frame.

pub mod arena;
pub mod backend;
pub mod component;
pub mod config;
pub mod context;
pub mod coroutine;
pub mod error;
pub mod guid;
pub mod instantiate;
pub mod lifecycle;
pub mod loader;
pub mod math;
pub mod network;
pub mod phase;
pub mod prelude;
pub mod scene;
pub mod time;

#[cfg(feature = "diagnostics")]
pub mod diag;

#[cfg(test)]
mod test_util;

pub use component::{Component, ComponentCx, ComponentId};
pub use context::Context;
pub use guid::{Guid, IdProvider};
