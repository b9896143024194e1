//! Error types.
//!
//! Structural problems inside a frame are logged and degraded around; the
//! enums here cover the public operations that can refuse outright.

use thiserror::Error;

use crate::guid::Guid;
use crate::scene::NodeId;

/// Boxed error returned by component hooks and loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a lifecycle or update hook. `Err` removes the component from
/// scheduling.
pub type CallbackResult = Result<(), BoxError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("node {0} is not alive")]
    DeadNode(NodeId),
    #[error("cannot parent node {0} to itself")]
    SelfParent(NodeId),
    #[error("cannot parent node {child} under its own descendant {parent}")]
    Cycle { child: NodeId, parent: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiateError {
    #[error("cannot instantiate: source node {0} is not alive")]
    DeadSource(NodeId),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Instantiate(#[from] InstantiateError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("failed to encode or decode network message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("no node with guid {0}")]
    UnknownGuid(Guid),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid context config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("max_delta_secs must be finite and positive, got {0}")]
    MaxDelta(f32),
    #[error("time_scale must be finite and not negative, got {0}")]
    TimeScale(f32),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("asset '{0}' not found")]
    NotFound(String),
    #[error("loader failed for '{source_name}': {cause}")]
    Loader { source_name: String, cause: BoxError },
    #[error("loader returned dead root node {0}")]
    DeadRoot(NodeId),
}
