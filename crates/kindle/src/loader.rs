//! # Loader — Building Scenes From Assets
//!
//! An [`AssetLoader`] turns a source name into nodes and components inside a
//! [`Context`]. Components it creates go through the usual registration, so
//! they are queued by the time `load` returns and run their lifecycle at the
//! next tick.
//!
//! [`JsonSceneLoader`] is the built-in loader: scenes are JSON node trees,
//! components are looked up by short type name in a registry of
//! deserialize functions.
//!
//! ```ignore
//! let mut loader = JsonSceneLoader::new();
//! loader.register::<Spin>();
//! loader.add_source("crate", r#"{
//!     "name": "crate",
//!     "guid": "crate-prefab",
//!     "components": [{ "type": "Spin", "data": { "speed": 2.0 } }],
//!     "children": [{ "name": "lid" }]
//! }"#);
//! let root = ctx.load(&mut loader, "crate")?;
//! ```

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::component::{Component, short_type_name};
use crate::context::Context;
use crate::error::LoadError;
use crate::guid::Guid;
use crate::math::Transform;
use crate::scene::{NodeId, SceneNode};

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScene {
    pub root: NodeId,
}

pub trait AssetLoader {
    fn load(&mut self, ctx: &mut Context, source: &str) -> Result<LoadedScene, LoadError>;
}

impl Context {
    /// Load `source` with `loader` and return the scene's root.
    pub fn load(&mut self, loader: &mut dyn AssetLoader, source: &str) -> Result<NodeId, LoadError> {
        let scene = loader.load(self, source)?;
        if !self.graph.contains(scene.root) {
            return Err(LoadError::DeadRoot(scene.root));
        }
        log::info!(
            "loaded '{source}': {} node(s)",
            self.graph.descendants(scene.root).len()
        );
        Ok(scene.root)
    }
}

// ── Scene description (JSON format) ─────────────────────────────────────

fn yes() -> bool {
    true
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "yes")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDescription {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
    #[serde(default = "yes")]
    pub enabled: bool,
}

// ── JsonSceneLoader ──────────────────────────────────────────────────────

type DeserializeFn = fn(serde_json::Value) -> Result<Box<dyn Component>, serde_json::Error>;

/// Loads JSON scene descriptions registered under a source name.
#[derive(Default)]
pub struct JsonSceneLoader {
    sources: HashMap<String, String>,
    factories: HashMap<String, DeserializeFn>,
}

impl JsonSceneLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `json` loadable as `name`.
    pub fn add_source(&mut self, name: impl Into<String>, json: impl Into<String>) {
        self.sources.insert(name.into(), json.into());
    }

    /// Allow components of type `T` in scenes, keyed by its short type name.
    pub fn register<T>(&mut self)
    where
        T: Component + DeserializeOwned,
    {
        let name = short_type_name(std::any::type_name::<T>()).to_owned();
        let factory: DeserializeFn = |data| {
            let component: T = serde_json::from_value(data)?;
            Ok(Box::new(component) as Box<dyn Component>)
        };
        self.factories.insert(name, factory);
    }

    fn spawn(
        &self,
        ctx: &mut Context,
        source: &str,
        desc: &NodeDescription,
        parent: Option<NodeId>,
        root: &mut Option<NodeId>,
    ) -> Result<NodeId, LoadError> {
        let guid = desc.guid.clone().unwrap_or_else(Guid::random);
        let mut node = SceneNode::new(desc.name.clone(), guid);
        node.transform = desc.transform;
        node.active = desc.active;
        let id = ctx.graph.insert_node(node, parent);
        root.get_or_insert(id);

        for component in &desc.components {
            let Some(factory) = self.factories.get(&component.type_name) else {
                log::warn!(
                    "'{source}': unknown component type '{}' on '{}'; skipped",
                    component.type_name,
                    desc.name
                );
                continue;
            };
            let instance = factory(component.data.clone()).map_err(|err| LoadError::Loader {
                source_name: source.to_owned(),
                cause: Box::new(err),
            })?;
            ctx.add_boxed_component(id, instance, component.enabled);
        }

        for child in &desc.children {
            self.spawn(ctx, source, child, Some(id), root)?;
        }
        Ok(id)
    }
}

impl AssetLoader for JsonSceneLoader {
    fn load(&mut self, ctx: &mut Context, source: &str) -> Result<LoadedScene, LoadError> {
        let json = self
            .sources
            .get(source)
            .ok_or_else(|| LoadError::NotFound(source.to_owned()))?;
        let desc: NodeDescription =
            serde_json::from_str(json).map_err(|err| LoadError::Loader {
                source_name: source.to_owned(),
                cause: Box::new(err),
            })?;

        let mut built = None;
        match self.spawn(ctx, source, &desc, None, &mut built) {
            Ok(root) => Ok(LoadedScene { root }),
            Err(err) => {
                // Roll back whatever part of the tree was built.
                if let Some(partial) = built {
                    ctx.destroy(partial);
                }
                Err(err)
            }
        }
    }
}
