//! # Instantiate — Deep-Cloning Subtrees
//!
//! [`Context::instantiate`] copies a node, its descendants and every attached
//! component, then rewires the copies so they point at each other instead of
//! at the originals.
//!
//! ## Passes
//!
//! ```text
//! 1. structure   pre-order walk: shallow node copy + new guid, record
//!                original → clone, snapshot each component (clone_box)
//! 2. register    new guid per component copy, attach + register
//! 3. references  map_refs on every copy: node handles through the map,
//!                component handles to the copy at the same slot of the
//!                owner's component list
//! 4. skinning    rebind cloned skinned meshes to the cloned bones
//! ```
//!
//! All guids come from one [`IdProvider`]: nodes first in pre-order, then
//! components in the same order. Two peers cloning the same subtree with the
//! same seed therefore hand out the same guids.
//!
//! Handles that lead outside the cloned subtree are left alone. Values are
//! copied with `Clone`, so a copy never shares a `Vec` or any other owned
//! value with its original.
//!
//! ## Cloning From Inside a Hook
//!
//! A component whose hook is running (say, one that instantiates its own
//! node from `update`) cannot be read until the hook returns. Its copy still
//! gets its slot and guid in pass 2, so guid order matches a clone made
//! outside any hook. The slot stays empty and unscheduled until the hook
//! returns. Then it is filled from the source's state at that moment,
//! remapped, and registered.

use std::collections::HashMap;

use crate::component::{Component, ComponentId, RefVisitor};
use crate::context::Context;
use crate::error::InstantiateError;
use crate::guid::{Guid, IdProvider, Seed};
use crate::lifecycle::{self, PendingCopy};
use crate::math::{Quat, Vec3};
use crate::phase::Capabilities;
use crate::scene::{NodeId, Skeleton};

/// Where the clone's root is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentTarget {
    Node(NodeId),
    /// Resolved through the scene graph's guid index.
    Guid(Guid),
    /// Make the clone a root node.
    Root,
}

/// Knobs for [`Context::instantiate`]. Everything left `None` keeps the
/// original's value.
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    /// Source of the clone's guids. A randomly seeded provider if `None`.
    pub id_provider: Option<IdProvider>,
    /// `None` places the clone under the original's parent.
    pub parent: Option<ParentTarget>,
    /// World-space position of the clone's root.
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    /// Own active flag of the clone's root.
    pub visible: Option<bool>,
}

impl InstantiateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: Seed) -> Self {
        self.id_provider = Some(IdProvider::new(seed));
        self
    }

    pub fn id_provider(mut self, provider: IdProvider) -> Self {
        self.id_provider = Some(provider);
        self
    }

    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(ParentTarget::Node(parent));
        self
    }

    pub fn parent_guid(mut self, guid: impl Into<Guid>) -> Self {
        self.parent = Some(ParentTarget::Guid(guid.into()));
        self
    }

    pub fn unparented(mut self) -> Self {
        self.parent = Some(ParentTarget::Root);
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }
}

/// Original → clone handles produced by one instantiation.
#[derive(Debug, Default, Clone)]
pub struct ReferenceMap {
    nodes: HashMap<NodeId, NodeId>,
    components: HashMap<ComponentId, ComponentId>,
}

impl ReferenceMap {
    pub fn node(&self, original: NodeId) -> Option<NodeId> {
        self.nodes.get(&original).copied()
    }

    pub fn component(&self, original: ComponentId) -> Option<ComponentId> {
        self.components.get(&original).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Result of [`Context::instantiate_mapped`].
#[derive(Debug, Clone)]
pub struct Instantiated {
    pub root: NodeId,
    pub map: ReferenceMap,
}

/// A component snapshot waiting for registration.
struct PendingComponent {
    original: ComponentId,
    owner: NodeId,
    enabled: bool,
    snapshot: Snapshot,
}

/// `(copy, source, earlier maps)`.
type WaitingCopy = (ComponentId, ComponentId, Vec<ReferenceMap>);

enum Snapshot {
    Ready(Box<dyn Component>),
    /// The source's hook is running; copy it when the hook returns.
    Executing {
        source: ComponentId,
        caps: Capabilities,
        /// Maps of earlier clones still waiting on the same source.
        earlier: Vec<ReferenceMap>,
    },
}

impl Context {
    /// Deep-clone `root` and its subtree. Cloned components are registered
    /// and go through their lifecycle at the next drain.
    pub fn instantiate(
        &mut self,
        root: NodeId,
        options: InstantiateOptions,
    ) -> Result<NodeId, InstantiateError> {
        self.instantiate_mapped(root, options).map(|done| done.root)
    }

    /// Like [`instantiate`](Self::instantiate), also returning the
    /// original → clone map.
    pub fn instantiate_mapped(
        &mut self,
        root: NodeId,
        options: InstantiateOptions,
    ) -> Result<Instantiated, InstantiateError> {
        if !self.graph.contains(root) {
            return Err(InstantiateError::DeadSource(root));
        }
        let InstantiateOptions {
            id_provider,
            parent,
            position,
            rotation,
            scale,
            visible,
        } = options;
        let mut provider = id_provider.unwrap_or_else(IdProvider::random);
        let parent = self.resolve_parent(root, parent.as_ref());

        let mut map = ReferenceMap::default();
        let mut pending = Vec::new();
        let mut skinned = Vec::new();
        let clone_root = self.clone_structure(
            root,
            parent,
            &mut provider,
            &mut map,
            &mut pending,
            &mut skinned,
        );

        if let Some(visible) = visible {
            // The root was just inserted, so it is alive.
            let _ = self.graph.set_active(clone_root, visible);
        }
        if let Some(position) = position {
            self.graph.set_world_position(clone_root, position);
        }
        if let Some(rotation) = rotation {
            self.graph.set_world_rotation(clone_root, rotation);
        }
        if let Some(scale) = scale {
            self.graph.set_world_scale(clone_root, scale);
        }

        let (clones, executing) = self.register_copies(pending, &mut provider, &mut map);
        self.resolve_references(&clones, &map);
        self.rebind_skins(&skinned, &map);
        for (copy, source, mut maps) in executing {
            maps.push(map.clone());
            self.lifecycle.pending_copies.push(PendingCopy { source, copy, maps });
        }

        log::debug!(
            "instantiated {root} as {clone_root}: {} node(s), {} component(s), seed {}",
            map.node_count(),
            map.component_count(),
            provider.seed()
        );
        Ok(Instantiated {
            root: clone_root,
            map,
        })
    }

    fn resolve_parent(&self, root: NodeId, target: Option<&ParentTarget>) -> Option<NodeId> {
        let original_parent = self.graph.parent(root);
        match target {
            None => original_parent,
            Some(ParentTarget::Root) => None,
            Some(ParentTarget::Node(node)) if self.graph.contains(*node) => Some(*node),
            Some(ParentTarget::Node(node)) => {
                log::warn!("instantiate: parent node {node} is gone; using the original's parent");
                original_parent
            }
            Some(ParentTarget::Guid(guid)) => match self.graph.find_by_guid(guid) {
                Some(node) => Some(node),
                None => {
                    log::warn!("instantiate: no node with guid {guid}; using the original's parent");
                    original_parent
                }
            },
        }
    }

    // ── Pass 1: structure ────────────────────────────────────────────────

    fn clone_structure(
        &mut self,
        root: NodeId,
        parent: Option<NodeId>,
        provider: &mut IdProvider,
        map: &mut ReferenceMap,
        pending: &mut Vec<PendingComponent>,
        skinned: &mut Vec<(NodeId, NodeId)>,
    ) -> NodeId {
        let mut clone_root = None;
        let mut stack = vec![(root, parent)];

        while let Some((original, clone_parent)) = stack.pop() {
            let Some(node) = self.graph.node(original) else {
                continue;
            };
            let copy = node.shallow_clone(provider.next_guid());
            let children = node.children().to_vec();
            let components = node.components().to_vec();
            let is_skinned = node.skinned_mesh().is_some();
            let name = node.name.clone();

            let clone = self.graph.insert_node(copy, clone_parent);
            map.nodes.insert(original, clone);
            clone_root.get_or_insert(clone);
            if is_skinned {
                skinned.push((original, clone));
            }

            for id in components {
                let Some(slot) = self.lifecycle.slot(id) else {
                    continue;
                };
                let snapshot = match &slot.instance {
                    Some(instance) => Snapshot::Ready(instance.clone_box()),
                    None => {
                        // Either executing, or itself a copy of an executing
                        // component; both are read from the running source.
                        let waiting = self.lifecycle.pending_copies.iter().find(|p| p.copy == id);
                        let (source, earlier) = match waiting {
                            Some(p) => (p.source, p.maps.clone()),
                            None => (id, Vec::new()),
                        };
                        log::debug!(
                            "instantiate: component {id} on '{name}' is executing; copied when its hook returns"
                        );
                        Snapshot::Executing {
                            source,
                            caps: slot.caps,
                            earlier,
                        }
                    }
                };
                pending.push(PendingComponent {
                    original: id,
                    owner: clone,
                    enabled: slot.enabled,
                    snapshot,
                });
            }

            stack.extend(children.into_iter().rev().map(|child| (child, Some(clone))));
        }

        // The source root was checked alive, so the first iteration inserted it.
        clone_root.unwrap_or(root)
    }

    // ── Pass 2: registration ─────────────────────────────────────────────

    /// Returns the registered copies, and the copies left waiting on an
    /// executing source.
    fn register_copies(
        &mut self,
        pending: Vec<PendingComponent>,
        provider: &mut IdProvider,
        map: &mut ReferenceMap,
    ) -> (Vec<ComponentId>, Vec<WaitingCopy>) {
        let mut clones = Vec::with_capacity(pending.len());
        let mut executing = Vec::new();
        for copy in pending {
            let guid = provider.next_guid();
            let id = match copy.snapshot {
                Snapshot::Ready(instance) => {
                    let id = lifecycle::attach(self, copy.owner, instance, guid, copy.enabled);
                    clones.push(id);
                    id
                }
                Snapshot::Executing { source, caps, earlier } => {
                    let id = lifecycle::attach_awaiting_copy(self, copy.owner, caps, guid, copy.enabled);
                    executing.push((id, source, earlier));
                    id
                }
            };
            map.components.insert(copy.original, id);
        }
        // Register after every copy is attached so `registering` hooks see
        // complete component lists on the cloned nodes.
        for &id in &clones {
            lifecycle::register(self, id);
        }
        (clones, executing)
    }

    // ── Pass 3: references ───────────────────────────────────────────────

    fn resolve_references(&mut self, clones: &[ComponentId], map: &ReferenceMap) {
        for &id in clones {
            let Some(mut instance) = self
                .lifecycle
                .slot_mut(id)
                .and_then(|slot| slot.instance.take())
            else {
                continue;
            };
            remap_refs(self, instance.as_mut(), map);
            if let Some(slot) = self.lifecycle.slot_mut(id) {
                slot.instance = Some(instance);
            }
        }
    }

    // ── Pass 4: skinning ─────────────────────────────────────────────────

    fn rebind_skins(&mut self, skinned: &[(NodeId, NodeId)], map: &ReferenceMap) {
        for &(original, clone) in skinned {
            let Some(source) = self.graph.node(original).and_then(|n| n.skinned_mesh()) else {
                continue;
            };
            let Some(skeleton) = source.skeleton() else {
                log::warn!("instantiate: skinned mesh {original} has no skeleton; clone left unbound");
                continue;
            };
            let bones = skeleton
                .bones
                .iter()
                .map(|&bone| map.node(bone).unwrap_or(bone))
                .collect();
            let rebound = Skeleton::new(bones, skeleton.bone_inverses.clone());
            let bind_matrix = source.bind_matrix();

            if let Some(target) = self
                .graph
                .node_mut(clone)
                .and_then(|n| n.skinned_mesh_mut())
            {
                target.bind(rebound, bind_matrix);
            }
        }
    }
}

/// Point the handles `component` holds at their clones in `map`.
pub(crate) fn remap_refs(ctx: &Context, component: &mut dyn Component, map: &ReferenceMap) {
    component.map_refs(&mut Remapper { ctx, map });
}

/// Redirects handles held by a cloned component.
struct Remapper<'a> {
    ctx: &'a Context,
    map: &'a ReferenceMap,
}

impl RefVisitor for Remapper<'_> {
    fn node(&mut self, node: &mut NodeId) {
        if let Some(clone) = self.map.node(*node) {
            *node = clone;
        } else if !self.ctx.graph.contains(*node) {
            log::warn!("instantiate: reference to dead node {node} left as is");
        }
    }

    fn component(&mut self, component: &mut ComponentId) {
        if let Some(clone) = self.map.component(*component) {
            *component = clone;
            return;
        }
        match self.ctx.lifecycle.slot(*component) {
            None => log::warn!("instantiate: reference to dead component {component} left as is"),
            Some(slot) if self.map.nodes.contains_key(&slot.node) => log::warn!(
                "instantiate: component {component} was not copied; reference left pointing at the original"
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentCx;
    use crate::error::CallbackResult;
    use crate::math::{Mat4, Transform};
    use crate::phase::Capabilities;
    use crate::scene::{MeshRef, NodeKind, SkinnedMesh};
    use crate::test_util::{FRAME, Recorder, entries, new_log};

    #[derive(Clone, Default)]
    struct Pointer {
        target: Option<NodeId>,
        many: Vec<NodeId>,
        peer: Option<ComponentId>,
        values: Vec<f32>,
    }

    impl Component for Pointer {
        fn map_refs(&mut self, refs: &mut dyn RefVisitor) {
            refs.node_opt(&mut self.target);
            refs.nodes(&mut self.many);
            refs.component_opt(&mut self.peer);
        }
    }

    /// A → B → C with a `Pointer` on B aimed at C.
    fn chain(ctx: &mut Context) -> (NodeId, NodeId, NodeId, ComponentId) {
        let a = ctx.graph_mut().spawn("A");
        let b = ctx.graph_mut().spawn_child(a, "B").unwrap();
        let c = ctx.graph_mut().spawn_child(b, "C").unwrap();
        let pointer = ctx.add_component(
            b,
            Pointer {
                target: Some(c),
                ..Default::default()
            },
        );
        (a, b, c, pointer)
    }

    fn subtree_guids(ctx: &Context, root: NodeId) -> Vec<Guid> {
        let mut guids = Vec::new();
        for node in ctx.graph().descendants(root) {
            let node = ctx.graph().node(node).unwrap();
            guids.push(node.guid().clone());
            for &c in node.components() {
                guids.push(ctx.component_guid(c).unwrap().clone());
            }
        }
        guids
    }

    #[test]
    fn internal_references_point_at_clones() {
        let mut ctx = Context::new();
        let (a, b, c, pointer) = chain(&mut ctx);

        let done = ctx
            .instantiate_mapped(a, InstantiateOptions::new().seed(42))
            .unwrap();
        let b2 = done.map.node(b).unwrap();
        let c2 = done.map.node(c).unwrap();
        let pointer2 = done.map.component(pointer).unwrap();

        assert_eq!(ctx.component_node(pointer2), Some(b2));
        assert_eq!(ctx.component::<Pointer>(pointer2).unwrap().target, Some(c2));
        assert_eq!(ctx.component::<Pointer>(pointer).unwrap().target, Some(c));
        assert_eq!(ctx.graph().parent(c2), Some(b2));
        assert_eq!(ctx.graph().parent(done.root), None);
    }

    #[test]
    fn same_seed_gives_same_guids() {
        let mut ctx = Context::new();
        let (a, ..) = chain(&mut ctx);

        let first = ctx.instantiate(a, InstantiateOptions::new().seed(42)).unwrap();
        let second = ctx.instantiate(a, InstantiateOptions::new().seed(42)).unwrap();
        let third = ctx.instantiate(a, InstantiateOptions::new().seed(7)).unwrap();

        let first_guids = subtree_guids(&ctx, first);
        assert_eq!(first_guids.len(), 4);
        assert_eq!(first_guids, subtree_guids(&ctx, second));
        assert_ne!(first_guids, subtree_guids(&ctx, third));

        let mut expected = IdProvider::new(42);
        assert_eq!(first_guids[0], expected.next_guid());
    }

    #[test]
    fn clone_guids_are_unique() {
        let mut ctx = Context::new();
        let (a, ..) = chain(&mut ctx);
        let clone = ctx.instantiate(a, InstantiateOptions::new()).unwrap();

        let mut guids = subtree_guids(&ctx, a);
        guids.extend(subtree_guids(&ctx, clone));
        let total = guids.len();
        guids.sort();
        guids.dedup();
        assert_eq!(guids.len(), total);
    }

    #[test]
    fn external_references_are_untouched() {
        let mut ctx = Context::new();
        let outside = ctx.graph_mut().spawn("outside");
        let root = ctx.graph_mut().spawn("root");
        let inner = ctx.graph_mut().spawn_child(root, "inner").unwrap();
        ctx.add_component(
            root,
            Pointer {
                target: Some(outside),
                many: vec![inner, outside, inner],
                ..Default::default()
            },
        );

        let done = ctx.instantiate_mapped(root, InstantiateOptions::new()).unwrap();
        let inner2 = done.map.node(inner).unwrap();
        let copy = ctx.get_component::<Pointer>(done.root).unwrap();
        let copy = ctx.component::<Pointer>(copy).unwrap();
        assert_eq!(copy.target, Some(outside));
        assert_eq!(copy.many, vec![inner2, outside, inner2]);
    }

    #[test]
    fn component_references_follow_list_position() {
        let mut ctx = Context::new();
        let log = new_log();
        let root = ctx.graph_mut().spawn("root");
        let child = ctx.graph_mut().spawn_child(root, "child").unwrap();
        ctx.add_component(child, Recorder::new("first", &log));
        let second = ctx.add_component(child, Recorder::new("second", &log));
        let outside = ctx.graph_mut().spawn("outside");
        let external = ctx.add_component(outside, Recorder::new("external", &log));
        ctx.add_component(
            root,
            Pointer {
                peer: Some(second),
                ..Default::default()
            },
        );
        let external_pointer = ctx.add_component(
            root,
            Pointer {
                peer: Some(external),
                ..Default::default()
            },
        );

        let done = ctx.instantiate_mapped(root, InstantiateOptions::new()).unwrap();
        let child2 = done.map.node(child).unwrap();
        let copies = ctx.get_components::<Pointer>(done.root);
        assert_eq!(copies.len(), 2);

        let peer = ctx.component::<Pointer>(copies[0]).unwrap().peer.unwrap();
        assert_eq!(ctx.graph().node(child2).unwrap().components()[1], peer);
        assert_eq!(done.map.component(second), Some(peer));

        let external2 = done.map.component(external_pointer).unwrap();
        assert_eq!(ctx.component::<Pointer>(external2).unwrap().peer, Some(external));
    }

    #[test]
    fn values_are_not_shared() {
        let mut ctx = Context::new();
        let root = ctx.graph_mut().spawn("root");
        let original = ctx.add_component(
            root,
            Pointer {
                values: vec![1.0, 2.0],
                ..Default::default()
            },
        );
        let done = ctx.instantiate_mapped(root, InstantiateOptions::new()).unwrap();
        let copy = done.map.component(original).unwrap();

        ctx.component_mut::<Pointer>(copy).unwrap().values.push(3.0);
        assert_eq!(ctx.component::<Pointer>(original).unwrap().values, vec![1.0, 2.0]);
        assert_eq!(ctx.component::<Pointer>(copy).unwrap().values.len(), 3);
    }

    #[test]
    fn dead_references_are_left_alone() {
        let mut ctx = Context::new();
        let root = ctx.graph_mut().spawn("root");
        let doomed = ctx.graph_mut().spawn("doomed");
        ctx.add_component(
            root,
            Pointer {
                target: Some(doomed),
                ..Default::default()
            },
        );
        ctx.destroy(doomed);

        let clone = ctx.instantiate(root, InstantiateOptions::new()).unwrap();
        let copy = ctx.get_component::<Pointer>(clone).unwrap();
        assert_eq!(ctx.component::<Pointer>(copy).unwrap().target, Some(doomed));
    }

    fn rig(ctx: &mut Context, bind: bool) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = ctx.graph_mut().spawn("rig");
        let hip = ctx.graph_mut().spawn_child(root, "hip").unwrap();
        let knee = ctx.graph_mut().spawn_child(hip, "knee").unwrap();
        let mesh = ctx.graph_mut().spawn_child(root, "body").unwrap();
        ctx.graph_mut().node_mut(knee).unwrap().transform = Transform::from_xyz(0.0, -1.0, 0.0);
        ctx.graph_mut().node_mut(hip).unwrap().kind = NodeKind::Bone;
        ctx.graph_mut().node_mut(knee).unwrap().kind = NodeKind::Bone;

        let mut skinned = SkinnedMesh::new(MeshRef(3));
        if bind {
            let skeleton = Skeleton::from_current_pose(ctx.graph(), vec![hip, knee]);
            skinned.bind(skeleton, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        }
        ctx.graph_mut().node_mut(mesh).unwrap().kind = NodeKind::SkinnedMesh(skinned);
        (root, hip, knee, mesh)
    }

    #[test]
    fn skinned_mesh_is_rebound_to_cloned_bones() {
        let mut ctx = Context::new();
        let (root, hip, knee, mesh) = rig(&mut ctx, true);

        let done = ctx.instantiate_mapped(root, InstantiateOptions::new()).unwrap();
        let mesh2 = done.map.node(mesh).unwrap();
        let original = ctx.graph().node(mesh).unwrap().skinned_mesh().unwrap();
        let clone = ctx.graph().node(mesh2).unwrap().skinned_mesh().unwrap();
        let skeleton = clone.skeleton().unwrap();

        assert_eq!(
            skeleton.bones,
            vec![done.map.node(hip).unwrap(), done.map.node(knee).unwrap()]
        );
        assert_eq!(skeleton.bone_inverses, original.skeleton().unwrap().bone_inverses);
        assert_eq!(clone.bind_matrix(), original.bind_matrix());
        assert_eq!(clone.mesh, original.mesh);
        assert_eq!(original.skeleton().unwrap().bones, vec![hip, knee]);
    }

    #[test]
    fn unbound_skinned_mesh_stays_unbound() {
        let mut ctx = Context::new();
        let (root, _, _, mesh) = rig(&mut ctx, false);
        let done = ctx.instantiate_mapped(root, InstantiateOptions::new()).unwrap();
        let mesh2 = done.map.node(mesh).unwrap();
        let clone = ctx.graph().node(mesh2).unwrap().skinned_mesh().unwrap();
        assert!(clone.skeleton().is_none());
    }

    #[test]
    fn missing_parent_guid_falls_back_to_original_parent() {
        let mut ctx = Context::new();
        let holder = ctx.graph_mut().spawn("holder");
        let item = ctx.graph_mut().spawn_child(holder, "item").unwrap();

        let clone = ctx
            .instantiate(item, InstantiateOptions::new().parent_guid("no-such-guid"))
            .unwrap();
        assert_eq!(ctx.graph().parent(clone), Some(holder));
        assert_eq!(ctx.graph().children(holder).len(), 2);
    }

    #[test]
    fn parent_by_guid_and_unparented() {
        let mut ctx = Context::new();
        let holder = ctx.graph_mut().spawn("holder");
        let shelf = ctx.graph_mut().spawn_with_guid("shelf", Guid::from("shelf"));
        let item = ctx.graph_mut().spawn_child(holder, "item").unwrap();

        let on_shelf = ctx
            .instantiate(item, InstantiateOptions::new().parent_guid("shelf"))
            .unwrap();
        assert_eq!(ctx.graph().parent(on_shelf), Some(shelf));

        let loose = ctx
            .instantiate(item, InstantiateOptions::new().unparented())
            .unwrap();
        assert_eq!(ctx.graph().parent(loose), None);
        assert!(ctx.graph().roots().contains(&loose));
    }

    #[test]
    fn world_overrides_account_for_parent() {
        let mut ctx = Context::new();
        let parent = ctx.graph_mut().spawn("parent");
        ctx.graph_mut().node_mut(parent).unwrap().transform = Transform::from_xyz(10.0, 0.0, 0.0);
        let item = ctx.graph_mut().spawn("item");

        let clone = ctx
            .instantiate(
                item,
                InstantiateOptions::new()
                    .parent(parent)
                    .position(Vec3::new(1.0, 2.0, 3.0))
                    .visible(false),
            )
            .unwrap();

        let world = ctx.graph().world_matrix(clone).w_axis.truncate();
        assert!((world - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);
        let local = ctx.graph().node(clone).unwrap().transform.translation;
        assert!((local - Vec3::new(-9.0, 2.0, 3.0)).length() < 1e-4);
        assert!(!ctx.graph().is_active_self(clone));
    }

    #[test]
    fn dead_source_is_an_error() {
        let mut ctx = Context::new();
        let node = ctx.graph_mut().spawn("n");
        ctx.destroy(node);
        assert_eq!(
            ctx.instantiate(node, InstantiateOptions::new()),
            Err(InstantiateError::DeadSource(node))
        );
    }

    #[test]
    fn cloned_components_run_their_own_lifecycle() {
        let log = new_log();
        let mut ctx = Context::new();
        let root = ctx.graph_mut().spawn("root");
        let disabled = ctx.graph_mut().spawn_child(root, "off").unwrap();
        ctx.add_component(root, Recorder::new("r", &log));
        ctx.add_component_with(disabled, Recorder::new("d", &log), false);
        ctx.tick_with_delta(FRAME);
        log.borrow_mut().clear();

        ctx.instantiate(root, InstantiateOptions::new()).unwrap();
        ctx.tick_with_delta(FRAME);
        assert_eq!(
            entries(&log),
            vec!["r:awake", "r:enable", "d:awake", "r:start", "r:update", "r:update"]
        );
    }

    /// Clones its own node from `update` while `armed`.
    #[derive(Clone)]
    struct SelfCloner {
        armed: bool,
        home: Option<NodeId>,
        updates: u32,
    }

    impl Component for SelfCloner {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE
        }

        fn map_refs(&mut self, refs: &mut dyn RefVisitor) {
            refs.node_opt(&mut self.home);
        }

        fn update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
            self.updates += 1;
            if self.armed {
                self.armed = false;
                let node = cx.node();
                cx.instantiate(node, InstantiateOptions::new().seed(42).unparented())?;
            }
            Ok(())
        }
    }

    fn cloner_scene(ctx: &mut Context, armed: bool) -> NodeId {
        let log = new_log();
        let root = ctx.graph_mut().spawn("turret");
        let barrel = ctx.graph_mut().spawn_child(root, "barrel").unwrap();
        ctx.add_component(
            root,
            SelfCloner {
                armed,
                home: Some(root),
                updates: 0,
            },
        );
        ctx.add_component(barrel, Recorder::new("barrel", &log));
        root
    }

    #[test]
    fn cloning_from_own_hook_copies_the_running_component() {
        let mut inside = Context::new();
        let original = cloner_scene(&mut inside, true);
        inside.tick_with_delta(FRAME);
        let clone_inside = inside
            .graph()
            .roots()
            .iter()
            .copied()
            .find(|&n| n != original)
            .unwrap();

        let mut outside = Context::new();
        let source = cloner_scene(&mut outside, false);
        let clone_outside = outside
            .instantiate(source, InstantiateOptions::new().seed(42).unparented())
            .unwrap();

        assert_eq!(inside.graph().node(clone_inside).unwrap().components().len(), 1);
        assert_eq!(subtree_guids(&inside, clone_inside), subtree_guids(&outside, clone_outside));

        // Copied with the state the hook left behind, then scheduled as usual.
        let copy = inside.get_component::<SelfCloner>(clone_inside).unwrap();
        let cloner = inside.component::<SelfCloner>(copy).unwrap();
        assert!(!cloner.armed);
        assert_eq!(cloner.home, Some(clone_inside));
        inside.tick_with_delta(FRAME);
        assert_eq!(inside.component::<SelfCloner>(copy).unwrap().updates, 2);
        assert_eq!(inside.graph().roots().len(), 2);
    }

    #[test]
    fn copy_waiting_on_a_hook_is_dropped_with_its_node() {
        #[derive(Clone)]
        struct CloneThenDestroy;

        impl Component for CloneThenDestroy {
            fn capabilities(&self) -> Capabilities {
                Capabilities::UPDATE
            }

            fn update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
                let node = cx.node();
                let clone = cx.instantiate(node, InstantiateOptions::new().unparented())?;
                cx.destroy(clone);
                cx.destroy_self();
                Ok(())
            }
        }

        let mut ctx = Context::new();
        let node = ctx.graph_mut().spawn("n");
        ctx.add_component(node, CloneThenDestroy);
        ctx.tick_with_delta(FRAME);

        assert_eq!(ctx.component_count(), 0);
        assert_eq!(ctx.graph().len(), 1);
        assert!(ctx.lifecycle().pending_copies.is_empty());
    }
}
