//! Collaborators the frame loop drives but does not implement.
//!
//! The context calls a [`PhysicsBackend`] between the pre- and post-physics
//! phases and a [`RenderBackend`] between the before- and after-render
//! phases. Neither is inspected beyond these calls.

use crate::scene::{NodeId, SceneGraph};

/// Fixed-function physics hook.
pub trait PhysicsBackend {
    /// Advance the simulation by `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Called right after `step`. Returns contacts to dispatch to components.
    fn post_step(&mut self) -> Vec<CollisionEvent> {
        Vec::new()
    }
}

pub trait RenderBackend {
    /// Draw the scene. World matrices are current.
    fn render(&mut self, graph: &SceneGraph);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Enter,
    Stay,
    Exit,
}

/// A contact reported by the physics backend, delivered to components on
/// `node` that declare [`Capabilities::COLLISION`](crate::phase::Capabilities).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub kind: CollisionKind,
    pub node: NodeId,
    pub other: NodeId,
}
