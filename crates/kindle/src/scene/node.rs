//! Scene nodes.

use std::fmt;

use crate::arena::Index;
use crate::component::ComponentId;
use crate::guid::Guid;
use crate::math::{Mat4, Transform};
use crate::scene::skin::SkinnedMesh;

/// Handle to a [`SceneNode`] in a [`SceneGraph`](super::SceneGraph).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) Index);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:?})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to mesh data owned by the render backend. Clones share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshRef(pub u32);

/// What a node is, beyond its place in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object,
    Bone,
    Mesh(MeshRef),
    SkinnedMesh(SkinnedMesh),
}

/// Flags the render backend reads. Copied verbatim on clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderFlags {
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub render_order: i32,
    /// Bit mask of render layers this node is drawn in.
    pub layers: u32,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            cast_shadow: false,
            receive_shadow: false,
            render_order: 0,
            layers: 1,
        }
    }
}

/// A node in the scene tree.
///
/// The parent owns the ordered `children` list; `parent` is a plain handle
/// back up the tree. Hierarchy links and the active flag are only changed
/// through [`SceneGraph`](super::SceneGraph) so the active-state cache and
/// guid index stay consistent.
#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub render: RenderFlags,
    pub(crate) guid: Guid,
    pub(crate) active: bool,
    pub(crate) active_in_hierarchy: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) global: Mat4,
}

impl SceneNode {
    pub(crate) fn new(name: impl Into<String>, guid: Guid) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Object,
            render: RenderFlags::default(),
            guid,
            active: true,
            active_in_hierarchy: false,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            global: Mat4::IDENTITY,
        }
    }

    /// Copy everything that describes this node alone: name, transform,
    /// kind, render flags and the own active flag. Links and components are
    /// left empty.
    pub(crate) fn shallow_clone(&self, guid: Guid) -> Self {
        Self {
            name: self.name.clone(),
            transform: self.transform,
            kind: self.kind.clone(),
            render: self.render,
            guid,
            active: self.active,
            active_in_hierarchy: false,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            global: self.global,
        }
    }

    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    /// The node's own active flag, ignoring ancestors.
    pub fn is_active_self(&self) -> bool {
        self.active
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attached components in attachment order.
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// World matrix as of the last transform propagation.
    pub fn global_matrix(&self) -> Mat4 {
        self.global
    }

    pub fn skinned_mesh(&self) -> Option<&SkinnedMesh> {
        match &self.kind {
            NodeKind::SkinnedMesh(skinned) => Some(skinned),
            _ => None,
        }
    }

    pub fn skinned_mesh_mut(&mut self) -> Option<&mut SkinnedMesh> {
        match &mut self.kind {
            NodeKind::SkinnedMesh(skinned) => Some(skinned),
            _ => None,
        }
    }
}
