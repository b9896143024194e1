//! # Component Lifecycle — Registration, Enable/Disable and Teardown
//!
//! The [`LifecycleManager`] owns every component instance of a
//! [`Context`] together with the bookkeeping that drives them:
//!
//! ```text
//! add_component ─► new_components ──drain──► awake / on_enable ─► pending_start
//!                                                 │                    │
//!                                                 ▼                    ▼
//!                                        phase arrays (running)     start (once)
//! ```
//!
//! - **new_components**: registered but not yet processed. Drained at the top
//!   of every tick (and by [`Context::process_new_components`]).
//! - **pending_start**: awaiting their one `start` call, which happens the
//!   first time they are running on an active node.
//! - **phase arrays**: one per [`FramePhase`], holding the running
//!   components that declared that phase, in enable order. Disabling removes
//!   a component; enabling again appends it at the end.
//!
//! ## Extract / Reinsert
//!
//! Hooks need `&mut Context` while the component itself lives inside the
//! context. Each invocation takes the boxed instance out of its slot, runs the
//! hook with a [`ComponentCx`], and puts it back. A component asked to be
//! destroyed while its own hook is running is flagged and torn down as soon
//! as the hook returns.
//!
//! ## Fault Isolation
//!
//! Every hook call is guarded: an `Err` return or a panic is logged with the
//! component's type, guid and node, and the component is stripped from all
//! scheduling without further callbacks. The rest of the batch or phase
//! carries on.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::arena::Arena;
use crate::component::{Component, ComponentCx, ComponentId, short_type_name};
use crate::context::Context;
use crate::error::CallbackResult;
use crate::guid::Guid;
use crate::instantiate::{self, ReferenceMap};
use crate::phase::{Capabilities, FramePhase};
use crate::scene::NodeId;

/// Internal record for one component.
pub(crate) struct ComponentSlot {
    pub guid: Guid,
    pub node: NodeId,
    pub caps: Capabilities,
    pub enabled: bool,
    pub awake_called: bool,
    pub started: bool,
    pub running: bool,
    pub destroy_requested: bool,
    /// A clone of a component whose hook was running when it was copied.
    /// Filled in, and only then registered, once that hook returns.
    pub awaiting_copy: bool,
    /// `None` while one of its hooks is executing, or while `awaiting_copy`.
    pub instance: Option<Box<dyn Component>>,
}

/// Component storage and scheduling lists of a context.
#[derive(Default)]
pub struct LifecycleManager {
    pub(crate) components: Arena<ComponentSlot>,
    pub(crate) guid_index: HashMap<Guid, ComponentId>,
    pub(crate) new_components: Vec<ComponentId>,
    pub(crate) pending_start: Vec<ComponentId>,
    pub(crate) phases: [Vec<ComponentId>; FramePhase::COUNT],
    pub(crate) pending_copies: Vec<PendingCopy>,
    /// Components registered this frame (diagnostics only).
    #[cfg(feature = "diagnostics")]
    pub(crate) registered_this_frame: usize,
    /// Components removed this frame (diagnostics only).
    #[cfg(feature = "diagnostics")]
    pub(crate) removed_this_frame: usize,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components scheduled for `phase`, in execution order.
    pub fn phase_order(&self, phase: FramePhase) -> &[ComponentId] {
        &self.phases[phase.index()]
    }

    /// Components registered but not yet processed.
    pub fn queued(&self) -> usize {
        self.new_components.len()
    }

    pub(crate) fn slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.components.get(id.0)
    }

    pub(crate) fn slot_mut(&mut self, id: ComponentId) -> Option<&mut ComponentSlot> {
        self.components.get_mut(id.0)
    }
}

/// A clone slot waiting for its source component's hook to return.
pub(crate) struct PendingCopy {
    pub source: ComponentId,
    pub copy: ComponentId,
    /// Applied in order to the copy's references.
    pub maps: Vec<ReferenceMap>,
}

/// Which hook is being invoked. Used in fault logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    Registering,
    Awake,
    OnEnable,
    Start,
    OnDisable,
    OnDestroy,
    Phase(FramePhase),
    Collision,
    PausedChanged,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Registering => f.write_str("registering"),
            Hook::Awake => f.write_str("awake"),
            Hook::OnEnable => f.write_str("on_enable"),
            Hook::Start => f.write_str("start"),
            Hook::OnDisable => f.write_str("on_disable"),
            Hook::OnDestroy => f.write_str("on_destroy"),
            Hook::Phase(phase) => write!(f, "{phase:?}"),
            Hook::Collision => f.write_str("on_collision"),
            Hook::PausedChanged => f.write_str("on_paused_changed"),
        }
    }
}

/// Run `f`, turning a panic into its message.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        }
    })
}

// ── Attach / register ────────────────────────────────────────────────────

/// Store a component and attach it to `node`. Does not register it.
pub(crate) fn attach(
    ctx: &mut Context,
    node: NodeId,
    instance: Box<dyn Component>,
    guid: Guid,
    enabled: bool,
) -> ComponentId {
    let caps = instance.capabilities();
    insert_slot(ctx, node, Some(instance), caps, guid, enabled)
}

/// Store an empty slot for a copy of a component whose hook is running.
/// It stays out of every schedule until
/// [`complete_pending_copies`] fills it in.
pub(crate) fn attach_awaiting_copy(
    ctx: &mut Context,
    node: NodeId,
    caps: Capabilities,
    guid: Guid,
    enabled: bool,
) -> ComponentId {
    insert_slot(ctx, node, None, caps, guid, enabled)
}

fn insert_slot(
    ctx: &mut Context,
    node: NodeId,
    instance: Option<Box<dyn Component>>,
    caps: Capabilities,
    guid: Guid,
    enabled: bool,
) -> ComponentId {
    let awaiting_copy = instance.is_none();
    let id = ComponentId(ctx.lifecycle.components.insert(ComponentSlot {
        guid: guid.clone(),
        node,
        caps,
        enabled,
        awake_called: false,
        started: false,
        running: false,
        destroy_requested: false,
        awaiting_copy,
        instance,
    }));
    ctx.graph.attach_component(node, id);
    if let Some(existing) = ctx.lifecycle.guid_index.insert(guid.clone(), id) {
        if existing != id && ctx.lifecycle.components.contains(existing.0) {
            log::warn!("component guid {guid} reused by {id}; lookups now resolve to the newer one");
        }
    }
    id
}

/// Queue a component for processing and run its `registering` hook.
pub(crate) fn register(ctx: &mut Context, id: ComponentId) {
    if !ctx.lifecycle.components.contains(id.0) {
        return;
    }
    if !ctx.lifecycle.new_components.contains(&id) {
        ctx.lifecycle.new_components.push(id);
    }
    #[cfg(feature = "diagnostics")]
    {
        ctx.lifecycle.registered_this_frame += 1;
    }
    invoke(ctx, id, Hook::Registering, |c, cx| c.registering(cx));
}

// ── Processing ───────────────────────────────────────────────────────────

/// Drain the new-component queue, then promote pending starts.
pub(crate) fn process_new_components(ctx: &mut Context) {
    loop {
        let batch = std::mem::take(&mut ctx.lifecycle.new_components);
        if batch.is_empty() {
            break;
        }
        for id in batch {
            process_one(ctx, id);
        }
    }
    promote_pending_starts(ctx);
}

fn process_one(ctx: &mut Context, id: ComponentId) {
    let Some(slot) = ctx.lifecycle.slot(id) else {
        // Destroyed before it was processed.
        return;
    };
    let node = slot.node;
    if !ctx.graph.contains(node) {
        let type_name = slot
            .instance
            .as_ref()
            .map(|c| short_type_name(c.type_name()))
            .unwrap_or("<executing>");
        log::error!(
            "component {type_name} (guid {}) has no owning node; dropped",
            slot.guid
        );
        strip(ctx, id);
        return;
    }
    ctx.graph.attach_component(node, id);

    if ctx.graph.is_active_in_hierarchy(node) {
        activate(ctx, id);
    }

    if let Some(slot) = ctx.lifecycle.slot(id) {
        if !slot.started && !ctx.lifecycle.pending_start.contains(&id) {
            ctx.lifecycle.pending_start.push(id);
        }
    }
}

/// Call `start` on every pending component that is now running.
pub(crate) fn promote_pending_starts(ctx: &mut Context) {
    let pending = std::mem::take(&mut ctx.lifecycle.pending_start);
    let mut waiting = Vec::new();
    for id in pending {
        let Some(slot) = ctx.lifecycle.slot_mut(id) else {
            continue;
        };
        if slot.started {
            continue;
        }
        let node = slot.node;
        if slot.running && ctx.graph.is_active_in_hierarchy(node) {
            if let Some(slot) = ctx.lifecycle.slot_mut(id) {
                slot.started = true;
            }
            invoke(ctx, id, Hook::Start, |c, cx| c.start(cx));
        } else {
            waiting.push(id);
        }
    }
    // Anything queued by a `start` hook goes after the ones still waiting.
    waiting.append(&mut ctx.lifecycle.pending_start);
    ctx.lifecycle.pending_start = waiting;
}

/// Refresh active state and apply enable/disable for flipped nodes.
pub(crate) fn apply_active_changes(ctx: &mut Context) {
    let transitions = ctx.graph.recompute_active();
    for (node, active) in transitions {
        let components = ctx
            .graph
            .node(node)
            .map(|n| n.components.clone())
            .unwrap_or_default();
        for id in components {
            if active {
                activate(ctx, id);
            } else {
                stop_running(ctx, id);
            }
        }
    }
}

/// The node of `id` became (or is) active: awake once, then enable if the
/// component's own flag allows.
fn activate(ctx: &mut Context, id: ComponentId) {
    if ctx.lifecycle.slot(id).is_none_or(|s| s.awaiting_copy) {
        return;
    }
    ensure_awake(ctx, id);
    let enabled = ctx.lifecycle.slot(id).is_some_and(|s| s.enabled && !s.running);
    if enabled {
        start_running(ctx, id);
    }
}

fn ensure_awake(ctx: &mut Context, id: ComponentId) {
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return;
    };
    if slot.awake_called {
        return;
    }
    slot.awake_called = true;
    invoke(ctx, id, Hook::Awake, |c, cx| c.awake(cx));
}

fn start_running(ctx: &mut Context, id: ComponentId) {
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return;
    };
    if slot.running {
        return;
    }
    slot.running = true;
    let caps = slot.caps;
    for phase in FramePhase::ALL {
        if caps.contains(phase.capability()) {
            ctx.lifecycle.phases[phase.index()].push(id);
        }
    }
    invoke(ctx, id, Hook::OnEnable, |c, cx| c.on_enable(cx));
}

fn stop_running(ctx: &mut Context, id: ComponentId) {
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return;
    };
    if !slot.running {
        return;
    }
    slot.running = false;
    for list in &mut ctx.lifecycle.phases {
        list.retain(|&c| c != id);
    }
    ctx.coroutines.stop_all(id);
    invoke(ctx, id, Hook::OnDisable, |c, cx| c.on_disable(cx));
}

/// Flip a component's own enabled flag.
pub(crate) fn set_enabled(ctx: &mut Context, id: ComponentId, enabled: bool) {
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return;
    };
    slot.enabled = enabled;
    let node = slot.node;
    if enabled {
        // Not yet processed components are enabled by the drain.
        let queued = ctx.lifecycle.new_components.contains(&id);
        if !queued && ctx.graph.is_active_in_hierarchy(node) {
            activate(ctx, id);
        }
    } else {
        stop_running(ctx, id);
    }
}

// ── Removal ──────────────────────────────────────────────────────────────

/// `on_disable` if running, `on_destroy` if awoken, then strip.
pub(crate) fn remove(ctx: &mut Context, id: ComponentId) {
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return;
    };
    if slot.instance.is_none() {
        // Its own hook is running; finish when it returns.
        slot.destroy_requested = true;
        return;
    }
    let awake = slot.awake_called;

    stop_running(ctx, id);
    if awake {
        invoke(ctx, id, Hook::OnDestroy, |c, cx| c.on_destroy(cx));
    }
    strip(ctx, id);
}

/// Drop a component from every list without callbacks.
pub(crate) fn strip(ctx: &mut Context, id: ComponentId) {
    let lifecycle = &mut ctx.lifecycle;
    for list in &mut lifecycle.phases {
        list.retain(|&c| c != id);
    }
    lifecycle.pending_start.retain(|&c| c != id);
    lifecycle.new_components.retain(|&c| c != id);
    lifecycle.pending_copies.retain(|p| p.copy != id);
    ctx.coroutines.stop_all(id);

    let Some(slot) = lifecycle.components.remove(id.0) else {
        return;
    };
    if lifecycle.guid_index.get(&slot.guid) == Some(&id) {
        lifecycle.guid_index.remove(&slot.guid);
    }
    #[cfg(feature = "diagnostics")]
    {
        lifecycle.removed_this_frame += 1;
    }
    ctx.graph.detach_component(slot.node, id);
}

// ── Invocation ───────────────────────────────────────────────────────────

/// Run one hook with fault isolation. Returns `true` if the hook succeeded
/// and the component is still alive afterwards.
pub(crate) fn invoke<F>(ctx: &mut Context, id: ComponentId, hook: Hook, f: F) -> bool
where
    F: FnOnce(&mut dyn Component, &mut ComponentCx<'_>) -> CallbackResult,
{
    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return false;
    };
    let node = slot.node;
    let Some(mut instance) = slot.instance.take() else {
        log::debug!("{hook} skipped for component {id}: one of its hooks is already running");
        return false;
    };

    let outcome = {
        let mut cx = ComponentCx::new(ctx, id, node);
        catch_panic(|| f(instance.as_mut(), &mut cx))
    };
    if !ctx.lifecycle.pending_copies.is_empty() {
        complete_pending_copies(ctx, id, instance.as_ref());
    }
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(panic) => Some(format!("panicked: {panic}")),
    };

    if let Some(failure) = failure {
        fault(ctx, id, instance.as_ref(), hook, &failure);
        return false;
    }

    let Some(slot) = ctx.lifecycle.slot_mut(id) else {
        return false;
    };
    slot.instance = Some(instance);
    if slot.destroy_requested {
        slot.destroy_requested = false;
        remove(ctx, id);
        return false;
    }
    true
}

/// Fill every copy of `source` taken while its hook ran, then register it.
fn complete_pending_copies(ctx: &mut Context, source: ComponentId, instance: &dyn Component) {
    let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut ctx.lifecycle.pending_copies)
        .into_iter()
        .partition(|p| p.source == source);
    ctx.lifecycle.pending_copies = waiting;

    for pending in ready {
        let Some(slot) = ctx.lifecycle.slot_mut(pending.copy) else {
            continue;
        };
        slot.awaiting_copy = false;
        let owner = slot.node;
        if slot.destroy_requested || !ctx.graph.contains(owner) {
            strip(ctx, pending.copy);
            continue;
        }
        let mut copy = instance.clone_box();
        for map in &pending.maps {
            instantiate::remap_refs(ctx, copy.as_mut(), map);
        }
        if let Some(slot) = ctx.lifecycle.slot_mut(pending.copy) {
            slot.instance = Some(copy);
        }
        register(ctx, pending.copy);
    }
}

fn fault(ctx: &mut Context, id: ComponentId, instance: &dyn Component, hook: Hook, failure: &str) {
    let (guid, node) = match ctx.lifecycle.slot(id) {
        Some(slot) => (slot.guid.to_string(), slot.node),
        None => return,
    };
    let node_name = ctx
        .graph
        .node(node)
        .map(|n| n.name.as_str())
        .unwrap_or("<destroyed>");
    log::error!(
        "{hook} failed on {} (guid {guid}) attached to '{node_name}': {failure}; component removed from scheduling",
        short_type_name(instance.type_name()),
    );
    strip(ctx, id);
}
