//! # Scene Graph — Node Storage, Hierarchy and Active State
//!
//! [`SceneGraph`] owns every [`SceneNode`] in a generational arena and keeps
//! three derived structures in step with it:
//!
//! - the ordered list of root nodes,
//! - a guid → node index used by network replication and lookups,
//! - the per-node **active-in-hierarchy** cache (own flag AND every
//!   ancestor's flag).
//!
//! ## Active State
//!
//! ```text
//! root (active) ── a (inactive) ── b (active)    → b is inactive in hierarchy
//!              └─ c (active)                     → c is active in hierarchy
//! ```
//!
//! Any structural change or flag flip marks the cache dirty. While dirty,
//! [`SceneGraph::is_active_in_hierarchy`] walks the ancestors on demand; the
//! frame scheduler calls [`SceneGraph::recompute_active`] once per tick, which
//! refreshes the cache and reports every node whose state flipped so the
//! lifecycle manager can enable or disable its components.
//!
//! ## Transforms
//!
//! Local transforms live on each node. [`SceneGraph::propagate_transforms`]
//! computes world matrices breadth-first from the roots, so parents are
//! always resolved before children.

use std::collections::{HashMap, VecDeque};

use crate::arena::Arena;
use crate::component::ComponentId;
use crate::error::SceneError;
use crate::guid::Guid;
use crate::math::{Mat4, Quat, Transform, Vec3};
use crate::scene::node::{NodeId, SceneNode};

/// Arena-backed node tree.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Arena<SceneNode>,
    roots: Vec<NodeId>,
    guid_index: HashMap<Guid, NodeId>,
    active_dirty: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Spawning ─────────────────────────────────────────────────────────

    /// Spawn a root node with a random guid.
    pub fn spawn(&mut self, name: impl Into<String>) -> NodeId {
        self.spawn_with_guid(name, Guid::random())
    }

    /// Spawn a root node with a caller-supplied guid (loaders use this).
    pub fn spawn_with_guid(&mut self, name: impl Into<String>, guid: Guid) -> NodeId {
        self.insert_node(SceneNode::new(name, guid), None)
    }

    /// Spawn a node as the last child of `parent`.
    pub fn spawn_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::DeadNode(parent));
        }
        Ok(self.insert_node(SceneNode::new(name, Guid::random()), Some(parent)))
    }

    /// Insert a prepared node. `parent` must be alive if given.
    pub(crate) fn insert_node(&mut self, node: SceneNode, parent: Option<NodeId>) -> NodeId {
        let guid = node.guid.clone();
        let id = NodeId(self.nodes.insert(node));
        self.index_guid(guid, id);
        match parent.filter(|&p| self.contains(p)) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent.0) {
                    parent_node.children.push(id);
                }
                if let Some(node) = self.nodes.get_mut(id.0) {
                    node.parent = Some(parent);
                }
            }
            None => self.roots.push(id),
        }
        self.active_dirty = true;
        id
    }

    fn index_guid(&mut self, guid: Guid, id: NodeId) {
        if let Some(&existing) = self.guid_index.get(&guid) {
            if self.contains(existing) && existing != id {
                log::warn!("guid {guid} already used by node {existing}; node {id} not indexed");
                return;
            }
        }
        self.guid_index.insert(guid, id);
    }

    // ── Lookup ───────────────────────────────────────────────────────────

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn find_by_guid(&self, guid: &Guid) -> Option<NodeId> {
        self.guid_index
            .get(guid)
            .copied()
            .filter(|&id| self.contains(id))
    }

    /// First node named `name`, in pre-order from the roots.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .flat_map(|&root| self.descendants(root))
            .find(|&id| self.node(id).is_some_and(|n| n.name == name))
    }

    /// `id` and all of its descendants, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            // Reverse so the first child is visited first.
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Iterate all live nodes in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().map(|(index, node)| (NodeId(index), node))
    }

    // ── Hierarchy edits ──────────────────────────────────────────────────

    /// Move `child` under `parent` (appended last), or make it a root.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.contains(child) {
            return Err(SceneError::DeadNode(child));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(SceneError::DeadNode(parent));
            }
            if parent == child {
                return Err(SceneError::SelfParent(child));
            }
            if self.is_descendant_of(parent, child) {
                return Err(SceneError::Cycle { child, parent });
            }
        }

        self.detach(child);
        match parent {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent.0) {
                    parent_node.children.push(child);
                }
            }
            None => self.roots.push(child),
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = parent;
        }
        self.active_dirty = true;
        Ok(())
    }

    /// Unlink `id` from its parent's children list (or the root list).
    fn detach(&mut self, id: NodeId) {
        match self.parent(id) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent.0) {
                    parent_node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }
    }

    /// Replace a node's guid, keeping the index in sync.
    pub fn set_guid(&mut self, id: NodeId, guid: Guid) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id.0).ok_or(SceneError::DeadNode(id))?;
        let old = std::mem::replace(&mut node.guid, guid.clone());
        if self.guid_index.get(&old) == Some(&id) {
            self.guid_index.remove(&old);
        }
        self.index_guid(guid, id);
        Ok(())
    }

    /// Remove `id` and all of its descendants. Returns the removed handles in
    /// pre-order. Components must already have been torn down by the caller.
    pub(crate) fn despawn_recursive(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.detach(id);

        let removed = self.descendants(id);
        for &node_id in &removed {
            if let Some(node) = self.nodes.remove(node_id.0) {
                if self.guid_index.get(&node.guid) == Some(&node_id) {
                    self.guid_index.remove(&node.guid);
                }
            }
        }
        self.active_dirty = true;
        removed
    }

    pub(crate) fn attach_component(&mut self, id: NodeId, component: ComponentId) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) => {
                if !node.components.contains(&component) {
                    node.components.push(component);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach_component(&mut self, id: NodeId, component: ComponentId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.components.retain(|&c| c != component);
        }
    }

    // ── Active state ─────────────────────────────────────────────────────

    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id.0).ok_or(SceneError::DeadNode(id))?;
        if node.active != active {
            node.active = active;
            self.active_dirty = true;
        }
        Ok(())
    }

    pub fn is_active_self(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.active)
    }

    /// Own flag AND all ancestors' flags. Dead nodes are inactive.
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        if !self.active_dirty {
            return self.node(id).is_some_and(|n| n.active_in_hierarchy);
        }
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.node(node_id) {
                Some(node) if node.active => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Refresh the active-in-hierarchy cache for the whole graph. Returns
    /// every node whose cached state changed, in pre-order, with its new
    /// state.
    pub fn recompute_active(&mut self) -> Vec<(NodeId, bool)> {
        let mut transitions = Vec::new();
        let mut stack: Vec<(NodeId, bool)> =
            self.roots.iter().rev().map(|&root| (root, true)).collect();

        while let Some((id, parent_active)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id.0) else {
                continue;
            };
            let active = parent_active && node.active;
            if node.active_in_hierarchy != active {
                node.active_in_hierarchy = active;
                transitions.push((id, active));
            }
            stack.extend(node.children.iter().rev().map(|&child| (child, active)));
        }

        self.active_dirty = false;
        transitions
    }

    // ── Transforms ───────────────────────────────────────────────────────

    /// World matrix computed from the current local transforms.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    fn parent_world_matrix(&self, id: NodeId) -> Mat4 {
        self.parent(id)
            .map(|p| self.world_matrix(p))
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Place `id` at a world-space position, keeping its parent.
    pub fn set_world_position(&mut self, id: NodeId, position: Vec3) {
        let local = self.parent_world_matrix(id).inverse().transform_point3(position);
        if let Some(node) = self.node_mut(id) {
            node.transform.translation = local;
        }
    }

    pub fn set_world_rotation(&mut self, id: NodeId, rotation: Quat) {
        let parent = Transform::from_matrix(self.parent_world_matrix(id));
        if let Some(node) = self.node_mut(id) {
            node.transform.rotation = (parent.rotation.inverse() * rotation).normalize();
        }
    }

    pub fn set_world_scale(&mut self, id: NodeId, scale: Vec3) {
        let parent = Transform::from_matrix(self.parent_world_matrix(id));
        if let Some(node) = self.node_mut(id) {
            node.transform.scale = scale / parent.scale;
        }
    }

    /// Propagate local transforms down the hierarchy into each node's
    /// cached world matrix.
    pub fn propagate_transforms(&mut self) {
        let mut queue: VecDeque<(NodeId, Mat4)> =
            self.roots.iter().map(|&root| (root, Mat4::IDENTITY)).collect();

        while let Some((id, parent_matrix)) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(id.0) else {
                continue;
            };
            let global = parent_matrix * node.transform.matrix();
            node.global = global;
            queue.extend(node.children.iter().map(|&child| (child, global)));
        }
    }
}
