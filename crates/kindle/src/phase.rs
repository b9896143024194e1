//! Frame phases and component capability flags.

use bitflags::bitflags;
use serde::Serialize;

/// The per-frame phases, in execution order. Component update hooks and
/// coroutines are bound to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FramePhase {
    EarlyUpdate,
    Update,
    LateUpdate,
    PrePhysicsStep,
    PostPhysicsStep,
    OnBeforeRender,
    OnAfterRender,
}

impl FramePhase {
    pub const COUNT: usize = 7;

    /// All phases in the order the scheduler runs them.
    pub const ALL: [FramePhase; Self::COUNT] = [
        FramePhase::EarlyUpdate,
        FramePhase::Update,
        FramePhase::LateUpdate,
        FramePhase::PrePhysicsStep,
        FramePhase::PostPhysicsStep,
        FramePhase::OnBeforeRender,
        FramePhase::OnAfterRender,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// The capability a component must declare to run in this phase.
    pub fn capability(self) -> Capabilities {
        match self {
            FramePhase::EarlyUpdate => Capabilities::EARLY_UPDATE,
            FramePhase::Update => Capabilities::UPDATE,
            FramePhase::LateUpdate => Capabilities::LATE_UPDATE,
            FramePhase::PrePhysicsStep => Capabilities::PRE_PHYSICS_STEP,
            FramePhase::PostPhysicsStep => Capabilities::POST_PHYSICS_STEP,
            FramePhase::OnBeforeRender => Capabilities::BEFORE_RENDER,
            FramePhase::OnAfterRender => Capabilities::AFTER_RENDER,
        }
    }
}

bitflags! {
    /// Optional hooks a component implements. Read once when the component
    /// is attached; only declared phase hooks are scheduled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const EARLY_UPDATE = 1 << 0;
        const UPDATE = 1 << 1;
        const LATE_UPDATE = 1 << 2;
        const PRE_PHYSICS_STEP = 1 << 3;
        const POST_PHYSICS_STEP = 1 << 4;
        const BEFORE_RENDER = 1 << 5;
        const AFTER_RENDER = 1 << 6;
        const COLLISION = 1 << 7;
        const PAUSED_CHANGED = 1 << 8;
    }
}
