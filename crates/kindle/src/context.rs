//! # Context — The Per-Frame Driver
//!
//! A [`Context`] owns one scene: the node graph, every component, the
//! coroutine scheduler, frame timing and the optional physics, render and
//! network collaborators. The host calls [`Context::tick`] once per display
//! refresh.
//!
//! ## Frame Layout
//!
//! ```text
//! tick()
//!  ├─ apply network inbox
//!  ├─ pause check ─────────────── paused? → stop here (edge → on_paused_changed)
//!  ├─ advance Time (clamped delta)
//!  ├─ drain new components → recompute active state → promote pending starts
//!  ├─ EarlyUpdate      + coroutines(EarlyUpdate)
//!  ├─ Update           + coroutines(Update)
//!  ├─ LateUpdate       + coroutines(LateUpdate)
//!  ├─ PrePhysicsStep   + coroutines(PrePhysicsStep)
//!  ├─ physics.step(dt), physics.post_step() → collision hooks
//!  ├─ PostPhysicsStep  + coroutines(PostPhysicsStep)
//!  ├─ propagate world matrices
//!  ├─ OnBeforeRender   + coroutines(OnBeforeRender)
//!  ├─ renderer.render(graph)
//!  ├─ OnAfterRender    + coroutines(OnAfterRender)
//!  └─ end-of-frame flush (deferred destroys, queued network messages)
//! ```
//!
//! Each phase runs, in array order, the running components on active nodes
//! that declared that phase.
//!
//! ## No Global Context
//!
//! Hooks and coroutines receive the context they belong to through
//! [`ComponentCx`](crate::ComponentCx). Any number of contexts can live in one
//! process and tick independently.

use std::time::Duration;

use crate::backend::{CollisionEvent, PhysicsBackend, RenderBackend};
use crate::component::{Component, ComponentId, run_phase_hook};
use crate::config::ContextConfig;
use crate::coroutine::{self, Coroutine, CoroutineHandle, CoroutineScheduler};
use crate::guid::Guid;
use crate::lifecycle::{self, Hook, LifecycleManager};
use crate::network::NetworkBridge;
use crate::phase::{Capabilities, FramePhase};
use crate::scene::{NodeId, SceneGraph};
use crate::time::Time;

/// One scene plus everything that drives it.
pub struct Context {
    pub(crate) graph: SceneGraph,
    pub(crate) lifecycle: LifecycleManager,
    pub(crate) coroutines: CoroutineScheduler,
    pub(crate) network: NetworkBridge,
    time: Time,
    config: ContextConfig,
    physics: Option<Box<dyn PhysicsBackend>>,
    renderer: Option<Box<dyn RenderBackend>>,
    paused: bool,
    visible: bool,
    immersive: bool,
    was_paused: bool,
    current_phase: Option<FramePhase>,
    pending_destroy: Vec<NodeId>,
    #[cfg(feature = "diagnostics")]
    pub(crate) stats: crate::diag::FrameStats,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("{err}; the frame loop substitutes a safe value");
        }
        Self {
            graph: SceneGraph::new(),
            lifecycle: LifecycleManager::new(),
            coroutines: CoroutineScheduler::new(),
            network: NetworkBridge::default(),
            time: Time::new(),
            config,
            physics: None,
            renderer: None,
            paused: false,
            visible: true,
            immersive: false,
            was_paused: false,
            current_phase: None,
            pending_destroy: Vec::new(),
            #[cfg(feature = "diagnostics")]
            stats: crate::diag::FrameStats::default(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ContextConfig {
        &mut self.config
    }

    /// The phase currently executing, if inside a tick.
    pub fn current_phase(&self) -> Option<FramePhase> {
        self.current_phase
    }

    pub fn set_physics(&mut self, physics: impl PhysicsBackend + 'static) {
        self.physics = Some(Box::new(physics));
    }

    pub fn set_renderer(&mut self, renderer: impl RenderBackend + 'static) {
        self.renderer = Some(Box::new(renderer));
    }

    // ── Pause and visibility ─────────────────────────────────────────────

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Host view visibility (a hidden browser tab, a minimised window).
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether an immersive (XR) session is running. Keeps the loop alive
    /// while the regular view is hidden.
    pub fn set_immersive(&mut self, immersive: bool) {
        self.immersive = immersive;
    }

    /// True if the next tick will stop before `EarlyUpdate`.
    pub fn is_paused(&self) -> bool {
        self.paused || (!self.visible && !self.config.run_in_background && !self.immersive)
    }

    // ── Components ───────────────────────────────────────────────────────

    /// Attach `component` to `node` and register it. It is processed at the
    /// start of the next tick (or by [`Context::process_new_components`]).
    pub fn add_component<C: Component>(&mut self, node: NodeId, component: C) -> ComponentId {
        self.add_boxed_component(node, Box::new(component), true)
    }

    /// Like [`add_component`](Self::add_component) with an explicit initial
    /// enabled flag.
    pub fn add_component_with<C: Component>(
        &mut self,
        node: NodeId,
        component: C,
        enabled: bool,
    ) -> ComponentId {
        self.add_boxed_component(node, Box::new(component), enabled)
    }

    pub fn add_boxed_component(
        &mut self,
        node: NodeId,
        component: Box<dyn Component>,
        enabled: bool,
    ) -> ComponentId {
        let id = lifecycle::attach(self, node, component, Guid::random(), enabled);
        lifecycle::register(self, id);
        id
    }

    /// Drain the new-component queue now.
    pub fn process_new_components(&mut self) {
        lifecycle::process_new_components(self);
    }

    pub fn set_enabled(&mut self, id: ComponentId, enabled: bool) {
        lifecycle::set_enabled(self, id, enabled);
    }

    /// The component's own enabled flag.
    pub fn is_enabled(&self, id: ComponentId) -> bool {
        self.lifecycle.slot(id).is_some_and(|s| s.enabled)
    }

    /// Enabled, running, and on a node that is active in the hierarchy.
    pub fn is_active_and_enabled(&self, id: ComponentId) -> bool {
        self.lifecycle
            .slot(id)
            .is_some_and(|s| s.enabled && s.running && self.graph.is_active_in_hierarchy(s.node))
    }

    /// Node of `id` if the component currently runs.
    pub(crate) fn running_component_node(&self, id: ComponentId) -> Option<NodeId> {
        let slot = self.lifecycle.slot(id)?;
        (slot.running && self.graph.is_active_in_hierarchy(slot.node)).then_some(slot.node)
    }

    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.lifecycle.slot(id).is_some()
    }

    pub fn component_count(&self) -> usize {
        self.lifecycle.len()
    }

    /// Borrow a component as its concrete type. `None` while one of its own
    /// hooks is running.
    pub fn component<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.component_dyn(id)?.downcast_ref::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.lifecycle
            .slot_mut(id)?
            .instance
            .as_deref_mut()?
            .downcast_mut::<T>()
    }

    pub fn component_dyn(&self, id: ComponentId) -> Option<&dyn Component> {
        self.lifecycle.slot(id)?.instance.as_deref()
    }

    pub fn component_guid(&self, id: ComponentId) -> Option<&Guid> {
        self.lifecycle.slot(id).map(|s| &s.guid)
    }

    pub fn component_node(&self, id: ComponentId) -> Option<NodeId> {
        self.lifecycle.slot(id).map(|s| s.node)
    }

    pub fn find_component_by_guid(&self, guid: &Guid) -> Option<ComponentId> {
        self.lifecycle
            .guid_index
            .get(guid)
            .copied()
            .filter(|&id| self.contains_component(id))
    }

    /// First component of type `T` on `node`.
    pub fn get_component<T: Component>(&self, node: NodeId) -> Option<ComponentId> {
        self.graph
            .node(node)?
            .components()
            .iter()
            .copied()
            .find(|&id| self.component::<T>(id).is_some())
    }

    /// All components of type `T` on `node`, in attachment order.
    pub fn get_components<T: Component>(&self, node: NodeId) -> Vec<ComponentId> {
        self.graph
            .node(node)
            .map(|n| {
                n.components()
                    .iter()
                    .copied()
                    .filter(|&id| self.component::<T>(id).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Destruction ──────────────────────────────────────────────────────

    /// Tear down one component: `on_disable` if running, `on_destroy` if
    /// awoken. From inside the component's own hook, teardown happens when
    /// the hook returns.
    pub fn destroy_component(&mut self, id: ComponentId) {
        lifecycle::remove(self, id);
    }

    /// Destroy `node`, its descendants and all their components.
    pub fn destroy(&mut self, node: NodeId) {
        if !self.graph.contains(node) {
            return;
        }
        for id in self.graph.descendants(node) {
            let components = self
                .graph
                .node(id)
                .map(|n| n.components().to_vec())
                .unwrap_or_default();
            for component in components {
                lifecycle::remove(self, component);
            }
        }
        let removed = self.graph.despawn_recursive(node);
        log::debug!("destroyed {} node(s) under {node}", removed.len());
    }

    /// Destroy `node` at the end of the current frame.
    pub fn destroy_deferred(&mut self, node: NodeId) {
        if !self.pending_destroy.contains(&node) {
            self.pending_destroy.push(node);
        }
    }

    // ── Coroutines ───────────────────────────────────────────────────────

    pub fn start_coroutine(
        &mut self,
        owner: ComponentId,
        phase: FramePhase,
        routine: impl Coroutine,
    ) -> CoroutineHandle {
        self.coroutines.register(owner, phase, Box::new(routine))
    }

    pub fn stop_coroutine(&mut self, handle: CoroutineHandle) {
        self.coroutines.stop(handle);
    }

    pub fn stop_all_coroutines(&mut self, owner: ComponentId) {
        self.coroutines.stop_all(owner);
    }

    pub fn coroutine_count(&self) -> usize {
        self.coroutines.len()
    }

    // ── Frame loop ───────────────────────────────────────────────────────

    /// Run one frame using wall-clock time since the previous tick.
    pub fn tick(&mut self) {
        let raw = self.time.measure();
        self.tick_with_delta(raw);
    }

    /// Run one frame with an explicit raw delta.
    pub fn tick_with_delta(&mut self, raw_delta: Duration) {
        self.poll_network();

        let paused = self.is_paused();
        if paused != self.was_paused {
            let was_paused = self.was_paused;
            self.was_paused = paused;
            log::info!("context {}", if paused { "paused" } else { "resumed" });
            self.notify_paused_changed(paused, was_paused);
        }
        if paused {
            return;
        }

        #[cfg(feature = "diagnostics")]
        self.begin_frame_stats();

        self.time
            .advance(raw_delta, self.config.max_delta(), self.config.time_scale);

        lifecycle::process_new_components(self);
        lifecycle::apply_active_changes(self);
        lifecycle::promote_pending_starts(self);

        self.run_phase(FramePhase::EarlyUpdate);
        self.run_phase(FramePhase::Update);
        self.run_phase(FramePhase::LateUpdate);
        self.run_phase(FramePhase::PrePhysicsStep);
        self.step_physics();
        self.run_phase(FramePhase::PostPhysicsStep);

        self.graph.propagate_transforms();
        self.run_phase(FramePhase::OnBeforeRender);
        self.render();
        self.run_phase(FramePhase::OnAfterRender);

        self.current_phase = None;
        self.flush_end_of_frame();

        #[cfg(feature = "diagnostics")]
        self.end_frame_stats();
    }

    fn run_phase(&mut self, phase: FramePhase) {
        #[cfg(feature = "diagnostics")]
        let started = std::time::Instant::now();

        self.current_phase = Some(phase);
        let order = self.lifecycle.phases[phase.index()].clone();
        for id in order {
            if self.running_component_node(id).is_some() {
                lifecycle::invoke(self, id, Hook::Phase(phase), |c, cx| {
                    run_phase_hook(c, phase, cx)
                });
            }
        }
        coroutine::advance(self, phase);

        #[cfg(feature = "diagnostics")]
        self.stats.record_phase(phase, started.elapsed());
    }

    fn step_physics(&mut self) {
        let Some(mut physics) = self.physics.take() else {
            return;
        };
        physics.step(self.time.delta_secs());
        let events = physics.post_step();
        self.physics = Some(physics);

        for event in events {
            self.dispatch_collision(event);
        }
    }

    fn dispatch_collision(&mut self, event: CollisionEvent) {
        let Some(node) = self.graph.node(event.node) else {
            return;
        };
        let components = node.components().to_vec();
        for id in components {
            let listens = self
                .lifecycle
                .slot(id)
                .is_some_and(|s| s.caps.contains(Capabilities::COLLISION));
            if listens && self.running_component_node(id).is_some() {
                lifecycle::invoke(self, id, Hook::Collision, |c, cx| c.on_collision(cx, &event));
            }
        }
    }

    fn render(&mut self) {
        let Some(mut renderer) = self.renderer.take() else {
            return;
        };
        renderer.render(&self.graph);
        self.renderer = Some(renderer);
    }

    fn notify_paused_changed(&mut self, paused: bool, was_paused: bool) {
        let listeners: Vec<ComponentId> = self
            .lifecycle
            .components
            .iter()
            .filter(|(_, s)| s.running && s.caps.contains(Capabilities::PAUSED_CHANGED))
            .map(|(index, _)| ComponentId(index))
            .collect();
        for id in listeners {
            lifecycle::invoke(self, id, Hook::PausedChanged, |c, cx| {
                c.on_paused_changed(cx, paused, was_paused)
            });
        }
    }

    fn flush_end_of_frame(&mut self) {
        let nodes = std::mem::take(&mut self.pending_destroy);
        for node in nodes {
            self.destroy(node);
        }
        self.network.flush();
    }
}
