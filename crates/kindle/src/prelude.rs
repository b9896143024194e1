//! Convenience re-exports: `use kindle::prelude::*` for the common items.

// Core
pub use crate::backend::{CollisionEvent, CollisionKind, PhysicsBackend, RenderBackend};
pub use crate::component::{Component, ComponentCx, ComponentId, RefVisitor};
pub use crate::config::ContextConfig;
pub use crate::context::Context;
pub use crate::coroutine::{Coroutine, CoroutineHandle, Step, wait_frames, wait_seconds};
pub use crate::error::{CallbackResult, InstantiateError, LoadError, NetworkError, SceneError};
pub use crate::guid::{Guid, IdProvider};
pub use crate::instantiate::{InstantiateOptions, ParentTarget};
pub use crate::loader::{AssetLoader, JsonSceneLoader, LoadedScene};
pub use crate::math::{Mat4, Quat, Transform, Vec2, Vec3, Vec4};
pub use crate::phase::{Capabilities, FramePhase};
pub use crate::scene::{MeshRef, NodeId, NodeKind, SceneGraph, Skeleton, SkinnedMesh};
pub use crate::time::Time;

// Networking
pub use crate::network::{MemoryHub, QueueMode, Transport};

// Diagnostics (feature-gated)
#[cfg(feature = "diagnostics")]
pub use crate::diag::DiagSnapshot;
