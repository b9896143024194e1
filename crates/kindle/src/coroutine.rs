//! # Coroutines — Cooperative Tasks Bound to Frame Phases
//!
//! A coroutine is a resumable task owned by a component and bound to one
//! [`FramePhase`]. After the scheduler runs a phase's component hooks it
//! advances every task of that phase exactly once.
//!
//! ```text
//! frame N:   Update hooks → advance(Update) → LateUpdate hooks → advance(LateUpdate) …
//!                               │
//!                               └─ task.resume(cx) → Yield | Call(nested) | Complete
//! ```
//!
//! ## Chaining
//!
//! Returning [`Step::Call`] suspends the task until the nested coroutine
//! completes. Nested tasks live on a per-task stack; each visit resumes only
//! the innermost one. When it completes it is popped and its parent resumes
//! within the same visit, like returning from a sub-routine.
//!
//! ```text
//! visit 1: main → Call(wait)        chain = [wait]
//! visit 2: wait → Yield             chain = [wait]
//! visit 3: wait → Complete, main → Yield    chain = []
//! ```
//!
//! ## Removal
//!
//! A task is dropped when it completes, when its owner is destroyed or stops
//! running (disabled or deactivated), or when it is stopped by handle. The
//! liveness check happens before every resume, including between the steps
//! of a chain cascade, so a destroyed owner never sees another advance.
//!
//! Rust has no stable generators, so tasks are explicit state machines
//! implementing [`Coroutine`]; any `FnMut(&mut ComponentCx) -> Step` closure
//! qualifies.

use std::collections::HashSet;

use crate::component::{ComponentCx, ComponentId};
use crate::context::Context;
use crate::lifecycle::catch_panic;
use crate::phase::FramePhase;

/// Result of resuming a coroutine once.
pub enum Step {
    /// Suspend until the next visit of the phase.
    Yield,
    /// Suspend until the nested coroutine completes.
    Call(Box<dyn Coroutine>),
    /// Finished.
    Complete,
}

impl Step {
    pub fn call(routine: impl Coroutine) -> Self {
        Step::Call(Box::new(routine))
    }
}

/// A resumable task.
pub trait Coroutine: 'static {
    fn resume(&mut self, cx: &mut ComponentCx<'_>) -> Step;
}

impl<F> Coroutine for F
where
    F: FnMut(&mut ComponentCx<'_>) -> Step + 'static,
{
    fn resume(&mut self, cx: &mut ComponentCx<'_>) -> Step {
        (self)(cx)
    }
}

/// Completes on the `frames`-th visit after it is first scheduled (at
/// least one).
pub struct WaitFrames {
    remaining: u32,
}

pub fn wait_frames(frames: u32) -> WaitFrames {
    WaitFrames {
        remaining: frames.max(1),
    }
}

impl Coroutine for WaitFrames {
    fn resume(&mut self, _cx: &mut ComponentCx<'_>) -> Step {
        self.remaining -= 1;
        if self.remaining == 0 {
            Step::Complete
        } else {
            Step::Yield
        }
    }
}

/// Completes once the accumulated scaled frame time reaches `seconds`.
pub struct WaitSeconds {
    remaining: f32,
}

pub fn wait_seconds(seconds: f32) -> WaitSeconds {
    WaitSeconds { remaining: seconds }
}

impl Coroutine for WaitSeconds {
    fn resume(&mut self, cx: &mut ComponentCx<'_>) -> Step {
        self.remaining -= cx.time().delta_secs();
        if self.remaining <= 0.0 {
            Step::Complete
        } else {
            Step::Yield
        }
    }
}

/// Identifies one started coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineHandle(u64);

struct Task {
    handle: CoroutineHandle,
    owner: ComponentId,
    routine: Box<dyn Coroutine>,
    chain: Vec<Box<dyn Coroutine>>,
}

/// Per-phase task lists.
#[derive(Default)]
pub struct CoroutineScheduler {
    phases: [Vec<Task>; FramePhase::COUNT],
    next_handle: u64,
    // Tasks taken out for the phase currently advancing are invisible to
    // `stop`/`stop_all`; these record what to skip when they are reached.
    // Only filled while `advancing` is set.
    advancing: bool,
    cancelled: HashSet<CoroutineHandle>,
    cancelled_owners: HashSet<ComponentId>,
}

impl CoroutineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        owner: ComponentId,
        phase: FramePhase,
        routine: Box<dyn Coroutine>,
    ) -> CoroutineHandle {
        let handle = CoroutineHandle(self.next_handle);
        self.next_handle += 1;
        self.phases[phase.index()].push(Task {
            handle,
            owner,
            routine,
            chain: Vec::new(),
        });
        handle
    }

    pub fn stop(&mut self, handle: CoroutineHandle) {
        for tasks in &mut self.phases {
            tasks.retain(|t| t.handle != handle);
        }
        if self.advancing {
            self.cancelled.insert(handle);
        }
    }

    /// Remove every task owned by `owner`.
    pub fn stop_all(&mut self, owner: ComponentId) {
        for tasks in &mut self.phases {
            tasks.retain(|t| t.owner != owner);
        }
        if self.advancing {
            self.cancelled_owners.insert(owner);
        }
    }

    /// Total number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_in(&self, phase: FramePhase) -> usize {
        self.phases[phase.index()].len()
    }

    fn is_cancelled(&self, task: &Task) -> bool {
        self.cancelled.contains(&task.handle) || self.cancelled_owners.contains(&task.owner)
    }
}

/// Advance every task bound to `phase` once.
pub(crate) fn advance(ctx: &mut Context, phase: FramePhase) {
    let index = phase.index();
    let tasks = std::mem::take(&mut ctx.coroutines.phases[index]);
    if tasks.is_empty() {
        return;
    }
    ctx.coroutines.advancing = true;

    let mut survivors = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        if ctx.coroutines.is_cancelled(&task) {
            continue;
        }
        let Some(node) = ctx.running_component_node(task.owner) else {
            continue;
        };

        let mut cx = ComponentCx::new(ctx, task.owner, node);
        let outcome = catch_panic(|| resume_task(&mut task, &mut cx));
        match outcome {
            Ok(true) => {}
            Ok(false) => {
                if !ctx.coroutines.is_cancelled(&task)
                    && ctx.running_component_node(task.owner).is_some()
                {
                    survivors.push(task);
                }
            }
            Err(message) => {
                log::error!(
                    "coroutine owned by component {} panicked and was stopped: {message}",
                    task.owner
                );
            }
        }
    }

    // Coroutines started during this advance run from the next visit on.
    let started = std::mem::take(&mut ctx.coroutines.phases[index]);
    survivors.extend(started);
    ctx.coroutines.phases[index] = survivors;
    ctx.coroutines.advancing = false;
    ctx.coroutines.cancelled.clear();
    ctx.coroutines.cancelled_owners.clear();
}

/// Resume the innermost routine of `task`, cascading into parents while
/// nested routines complete. Returns `true` once the top-level routine is
/// done.
fn resume_task(task: &mut Task, cx: &mut ComponentCx<'_>) -> bool {
    loop {
        let step = match task.chain.last_mut() {
            Some(inner) => inner.resume(cx),
            None => task.routine.resume(cx),
        };
        match step {
            Step::Yield => return false,
            Step::Call(nested) => {
                task.chain.push(nested);
                return false;
            }
            Step::Complete => {
                if task.chain.pop().is_none() {
                    return true;
                }
                // The parent continues now, unless its owner went away.
                if cx.running_component_node(task.owner).is_none()
                    || cx.coroutines.is_cancelled(task)
                {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::component::Component;
    use crate::error::CallbackResult;

    const FRAME: Duration = Duration::from_millis(16);

    /// Starts the coroutine produced by `make` from its `start` hook.
    #[derive(Clone)]
    struct Runner {
        phase: FramePhase,
        make: Rc<dyn Fn() -> Box<dyn Coroutine>>,
    }

    impl Component for Runner {
        fn start(&mut self, cx: &mut ComponentCx<'_>) -> CallbackResult {
            let routine = (self.make)();
            cx.start_coroutine(self.phase, BoxedRoutine(routine));
            Ok(())
        }
    }

    struct BoxedRoutine(Box<dyn Coroutine>);

    impl Coroutine for BoxedRoutine {
        fn resume(&mut self, cx: &mut ComponentCx<'_>) -> Step {
            self.0.resume(cx)
        }
    }

    fn counting(log: Rc<RefCell<Vec<String>>>, label: &'static str) -> Box<dyn Coroutine> {
        let mut n = 0;
        Box::new(move |cx: &mut ComponentCx<'_>| {
            n += 1;
            log.borrow_mut()
                .push(format!("{label}{n}@{}", cx.time().frame_count()));
            Step::Yield
        })
    }

    fn spawn_runner(
        ctx: &mut Context,
        phase: FramePhase,
        make: impl Fn() -> Box<dyn Coroutine> + 'static,
    ) -> ComponentId {
        let node = ctx.graph_mut().spawn("runner");
        ctx.add_component(
            node,
            Runner {
                phase,
                make: Rc::new(make),
            },
        )
    }

    #[test]
    fn advances_once_per_visit_of_its_phase() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let l = log.clone();
        spawn_runner(&mut ctx, FramePhase::LateUpdate, move || {
            counting(l.clone(), "late")
        });

        for _ in 0..3 {
            ctx.tick_with_delta(FRAME);
        }
        assert_eq!(*log.borrow(), vec!["late1@1", "late2@2", "late3@3"]);
        assert_eq!(ctx.coroutine_count(), 1);
    }

    #[test]
    fn nested_call_suspends_parent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let l = log.clone();
        spawn_runner(&mut ctx, FramePhase::Update, move || {
            let log = l.clone();
            let mut stage = 0;
            Box::new(move |cx: &mut ComponentCx<'_>| {
                stage += 1;
                log.borrow_mut()
                    .push(format!("main{stage}@{}", cx.time().frame_count()));
                match stage {
                    1 => Step::call(wait_frames(2)),
                    _ => Step::Complete,
                }
            })
        });

        for _ in 0..5 {
            ctx.tick_with_delta(FRAME);
        }
        // Called on frame 1, wait completes on frame 3 and main resumes then.
        assert_eq!(*log.borrow(), vec!["main1@1", "main2@3"]);
        assert_eq!(ctx.coroutine_count(), 0);
    }

    #[test]
    fn destroying_owner_mid_chain_stops_advancing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let l = log.clone();
        let owner = spawn_runner(&mut ctx, FramePhase::Update, move || {
            let outer = l.clone();
            let inner = l.clone();
            let mut called = false;
            Box::new(move |_cx: &mut ComponentCx<'_>| {
                if called {
                    outer.borrow_mut().push("outer-resumed".to_string());
                    return Step::Yield;
                }
                called = true;
                Step::Call(counting(inner.clone(), "inner"))
            })
        });

        ctx.tick_with_delta(FRAME); // main calls inner
        ctx.tick_with_delta(FRAME); // inner1
        ctx.destroy_component(owner);
        ctx.tick_with_delta(FRAME);
        ctx.tick_with_delta(FRAME);

        assert_eq!(*log.borrow(), vec!["inner1@2"]);
        assert_eq!(ctx.coroutine_count(), 0);
    }

    #[test]
    fn disabling_owner_removes_tasks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let l = log.clone();
        let owner = spawn_runner(&mut ctx, FramePhase::Update, move || {
            counting(l.clone(), "u")
        });

        ctx.tick_with_delta(FRAME);
        ctx.set_enabled(owner, false);
        ctx.tick_with_delta(FRAME);
        ctx.set_enabled(owner, true);
        ctx.tick_with_delta(FRAME);

        assert_eq!(*log.borrow(), vec!["u1@1"]);
        assert_eq!(ctx.coroutine_count(), 0);
    }

    #[test]
    fn stop_by_handle() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let node = ctx.graph_mut().spawn("n");
        let owner = ctx.add_component(node, Plain);
        ctx.tick_with_delta(FRAME);

        let handle = ctx.start_coroutine(owner, FramePhase::Update, {
            let l = log.clone();
            move |_cx: &mut ComponentCx<'_>| {
                l.borrow_mut().push("tick".to_string());
                Step::Yield
            }
        });
        ctx.tick_with_delta(FRAME);
        ctx.stop_coroutine(handle);
        ctx.tick_with_delta(FRAME);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn coroutine_can_stop_a_sibling_in_the_same_phase() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let node = ctx.graph_mut().spawn("n");
        let owner = ctx.add_component(node, Plain);
        ctx.tick_with_delta(FRAME);

        let victim_slot = Rc::new(RefCell::new(None::<CoroutineHandle>));
        let slot = victim_slot.clone();
        ctx.start_coroutine(owner, FramePhase::Update, move |cx: &mut ComponentCx<'_>| {
            if let Some(handle) = slot.borrow_mut().take() {
                cx.stop_coroutine(handle);
            }
            Step::Yield
        });
        let l = log.clone();
        let victim = ctx.start_coroutine(owner, FramePhase::Update, move |_cx: &mut ComponentCx<'_>| {
            l.borrow_mut().push("victim".to_string());
            Step::Yield
        });
        *victim_slot.borrow_mut() = Some(victim);

        ctx.tick_with_delta(FRAME);
        ctx.tick_with_delta(FRAME);
        assert!(log.borrow().is_empty());
        assert_eq!(ctx.coroutine_count(), 1);
    }

    #[test]
    fn wait_seconds_uses_frame_time() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = Context::new();
        let l = log.clone();
        spawn_runner(&mut ctx, FramePhase::Update, move || {
            let log = l.clone();
            let mut waited = false;
            Box::new(move |cx: &mut ComponentCx<'_>| {
                if waited {
                    log.borrow_mut().push(cx.time().frame_count());
                    return Step::Complete;
                }
                waited = true;
                Step::call(wait_seconds(0.05))
            })
        });

        for _ in 0..6 {
            ctx.tick_with_delta(Duration::from_millis(20));
        }
        // Scheduled on frame 1; 20ms accrue on frames 2, 3, 4.
        assert_eq!(*log.borrow(), vec![4]);
    }

    #[test]
    fn cancellations_outside_an_advance_are_not_retained() {
        let mut ctx = Context::new();
        let node = ctx.graph_mut().spawn("n");
        for _ in 0..100 {
            let id = ctx.add_component(node, Plain);
            ctx.destroy_component(id);
        }
        ctx.tick_with_delta(FRAME);
        assert!(ctx.coroutines.cancelled_owners.is_empty());
        assert!(ctx.coroutines.cancelled.is_empty());

        let owner = ctx.add_component(node, Plain);
        ctx.tick_with_delta(FRAME);
        let handle = ctx.start_coroutine(owner, FramePhase::Update, |_cx: &mut ComponentCx<'_>| Step::Yield);
        ctx.stop_coroutine(handle);
        ctx.set_enabled(owner, false);
        assert!(ctx.coroutines.cancelled.is_empty());
        assert!(ctx.coroutines.cancelled_owners.is_empty());
    }

    #[derive(Clone)]
    struct Plain;

    impl Component for Plain {}
}
