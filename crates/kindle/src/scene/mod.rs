//! The scene tree: nodes, hierarchy, active state and skinning data.

pub mod graph;
pub mod node;
pub mod skin;

pub use graph::SceneGraph;
pub use node::{MeshRef, NodeId, NodeKind, RenderFlags, SceneNode};
pub use skin::{Skeleton, SkinnedMesh};
