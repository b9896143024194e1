//! # Components — Behaviour Attached to Scene Nodes
//!
//! A component is any `Clone + 'static` type implementing [`Component`]. It is
//! attached to exactly one [`SceneNode`](crate::scene::SceneNode) for its
//! whole life and is driven through a fixed lifecycle:
//!
//! ```text
//! registering → awake (once) → on_enable ⇄ on_disable → start (once)
//!                                   … phase hooks every frame …
//!                                            → on_destroy (terminal)
//! ```
//!
//! Every hook receives a [`ComponentCx`]: a mutable borrow of the owning
//! [`Context`] plus the component's own id and node. There is no global
//! "current context" to consult.
//!
//! ## Capabilities
//!
//! Trait methods always exist, so the scheduler cannot tell which phase hooks
//! a type actually overrides. Components declare them instead through
//! [`Component::capabilities`]; the flags are read once at attach time and
//! decide which per-phase arrays the component joins.
//!
//! ## References
//!
//! Components point at other nodes and components with [`NodeId`] and
//! [`ComponentId`] handles. So the instantiation engine can redirect those
//! handles when a subtree is cloned, components expose them through
//! [`Component::map_refs`]:
//!
//! ```ignore
//! fn map_refs(&mut self, refs: &mut dyn RefVisitor) {
//!     refs.node(&mut self.target);
//!     refs.components(&mut self.followers);
//! }
//! ```
//!
//! ## Comparison
//!
//! - **Unity-style engines**: detect overridden methods through
//!   reflection and walk fields by reflection when cloning.
//! - **bevy**: `MapEntities` derive for entity remapping; schedules are
//!   system based rather than per-component hooks.
//!
//! We sit in between: per-component hooks like Unity, explicit flag and
//! reference declarations like bevy.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::arena::Index;
use crate::backend::CollisionEvent;
use crate::context::Context;
use crate::coroutine::{Coroutine, CoroutineHandle};
use crate::error::CallbackResult;
use crate::phase::{Capabilities, FramePhase};
use crate::scene::NodeId;

/// Handle to a component owned by a [`Context`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) Index);

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({:?})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Behaviour attached to a scene node. All hooks default to no-ops.
#[allow(unused_variables)]
pub trait Component: ComponentClone + 'static {
    /// Which optional hooks this type implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Visit every node/component handle this component holds.
    fn map_refs(&mut self, refs: &mut dyn RefVisitor) {}

    /// Runs synchronously when the component is registered.
    fn registering(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    /// Runs once, the first time the owning node is active.
    fn awake(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_enable(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    /// Runs once, before the first frame in which the component is running.
    fn start(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_disable(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    /// Runs once on removal, only if `awake` ran.
    fn on_destroy(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn early_update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn late_update(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn pre_physics_step(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn post_physics_step(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_before_render(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    fn on_after_render(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
        Ok(())
    }

    /// Needs [`Capabilities::COLLISION`].
    fn on_collision(&mut self, cx: &mut ComponentCx<'_>, event: &CollisionEvent) -> CallbackResult {
        Ok(())
    }

    /// Needs [`Capabilities::PAUSED_CHANGED`].
    fn on_paused_changed(
        &mut self,
        cx: &mut ComponentCx<'_>,
        paused: bool,
        was_paused: bool,
    ) -> CallbackResult {
        Ok(())
    }
}

/// Object-safe helpers every component gets for free from `Clone + 'static`.
pub trait ComponentClone {
    /// Field-wise copy used by instantiation.
    fn clone_box(&self) -> Box<dyn Component>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Component + Clone> ComponentClone for T {
    fn clone_box(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn Component {
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Dispatch the hook for `phase`.
pub(crate) fn run_phase_hook(
    component: &mut dyn Component,
    phase: FramePhase,
    cx: &mut ComponentCx<'_>,
) -> CallbackResult {
    match phase {
        FramePhase::EarlyUpdate => component.early_update(cx),
        FramePhase::Update => component.update(cx),
        FramePhase::LateUpdate => component.late_update(cx),
        FramePhase::PrePhysicsStep => component.pre_physics_step(cx),
        FramePhase::PostPhysicsStep => component.post_physics_step(cx),
        FramePhase::OnBeforeRender => component.on_before_render(cx),
        FramePhase::OnAfterRender => component.on_after_render(cx),
    }
}

/// `my_game::enemy::Spawner<T>` → `Spawner`.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ── ComponentCx ──────────────────────────────────────────────────────────

/// What a hook or coroutine sees: the context plus "self".
pub struct ComponentCx<'a> {
    ctx: &'a mut Context,
    id: ComponentId,
    node: NodeId,
}

impl<'a> ComponentCx<'a> {
    pub(crate) fn new(ctx: &'a mut Context, id: ComponentId, node: NodeId) -> Self {
        Self { ctx, id, node }
    }

    /// The component this hook belongs to.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The node the component is attached to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Start a coroutine owned by this component.
    pub fn start_coroutine(
        &mut self,
        phase: FramePhase,
        routine: impl Coroutine,
    ) -> CoroutineHandle {
        self.ctx.start_coroutine(self.id, phase, routine)
    }

    /// Destroy this component. Takes effect when the current hook returns.
    pub fn destroy_self(&mut self) {
        self.ctx.destroy_component(self.id);
    }
}

impl Deref for ComponentCx<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for ComponentCx<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

// ── RefVisitor ───────────────────────────────────────────────────────────

/// Receives mutable access to the handles a component holds.
pub trait RefVisitor {
    fn node(&mut self, node: &mut NodeId);
    fn component(&mut self, component: &mut ComponentId);

    fn node_opt(&mut self, node: &mut Option<NodeId>) {
        if let Some(node) = node {
            self.node(node);
        }
    }

    fn nodes(&mut self, nodes: &mut [NodeId]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn component_opt(&mut self, component: &mut Option<ComponentId>) {
        if let Some(component) = component {
            self.component(component);
        }
    }

    fn components(&mut self, components: &mut [ComponentId]) {
        for component in components {
            self.component(component);
        }
    }
}

/// Collects handles without changing them.
#[derive(Debug, Default)]
pub struct RefCollector {
    pub nodes: Vec<NodeId>,
    pub components: Vec<ComponentId>,
}

impl RefVisitor for RefCollector {
    fn node(&mut self, node: &mut NodeId) {
        self.nodes.push(*node);
    }

    fn component(&mut self, component: &mut ComponentId) {
        self.components.push(*component);
    }
}
