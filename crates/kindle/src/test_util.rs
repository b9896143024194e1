//! Shared fixtures for unit tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::component::{Component, ComponentCx};
use crate::error::CallbackResult;
use crate::phase::{Capabilities, FramePhase};

pub(crate) const FRAME: Duration = Duration::from_millis(16);

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// Records every hook it receives as `"{name}:{hook}"`.
#[derive(Clone)]
pub(crate) struct Recorder {
    pub name: &'static str,
    pub log: Log,
    pub caps: Capabilities,
    /// Return an error from the n-th `update` call (1-based).
    pub fail_update_on: Option<u32>,
    pub updates: u32,
}

impl Recorder {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            caps: Capabilities::UPDATE,
            fail_update_on: None,
            updates: 0,
        }
    }

    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn failing_on(mut self, call: u32) -> Self {
        self.fail_update_on = Some(call);
        self
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{hook}", self.name));
    }
}

impl Component for Recorder {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn awake(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("awake");
        Ok(())
    }

    fn on_enable(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("enable");
        Ok(())
    }

    fn start(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("start");
        Ok(())
    }

    fn on_disable(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("disable");
        Ok(())
    }

    fn on_destroy(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("destroy");
        Ok(())
    }

    fn early_update(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("early");
        Ok(())
    }

    fn update(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.updates += 1;
        if self.fail_update_on == Some(self.updates) {
            return Err(format!("{} gave up on update {}", self.name, self.updates).into());
        }
        self.record("update");
        Ok(())
    }

    fn late_update(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("late");
        Ok(())
    }

    fn pre_physics_step(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("pre_physics");
        Ok(())
    }

    fn post_physics_step(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("post_physics");
        Ok(())
    }

    fn on_before_render(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("before_render");
        Ok(())
    }

    fn on_after_render(&mut self, _cx: &mut ComponentCx<'_>) -> CallbackResult {
        self.record("after_render");
        Ok(())
    }

    fn on_paused_changed(
        &mut self,
        _cx: &mut ComponentCx<'_>,
        paused: bool,
        _was_paused: bool,
    ) -> CallbackResult {
        self.record(if paused { "paused" } else { "resumed" });
        Ok(())
    }
}

/// Every phase capability.
pub(crate) fn all_phases() -> Capabilities {
    FramePhase::ALL
        .iter()
        .fold(Capabilities::empty(), |acc, p| acc | p.capability())
}
