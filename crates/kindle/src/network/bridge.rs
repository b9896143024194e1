//! Replicated instantiate and destroy.
//!
//! ```text
//! sender                                         receiver
//! ──────                                         ────────
//! sync_instantiate(root)
//!   seed = random
//!   instantiate(root, IdProvider(seed))
//!   send "instance-created" ───────────────────► poll_network
//!                                                  original = prefab provider
//!                                                             or guid lookup
//!                                                  instantiate(original, IdProvider(seed))
//! sync_destroy(node)
//!   destroy locally
//!   send "instance-destroyed" ─────────────────► destroy by guid (no re-send)
//! ```
//!
//! Both sides walk the same subtree with the same seed, so the clone's nodes
//! and components end up with identical guids everywhere. Messages are
//! applied in the order the transport delivers them.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};

use crate::context::Context;
use crate::error::{NetworkError, SceneError};
use crate::guid::{Guid, IdProvider};
use crate::instantiate::{InstantiateOptions, ParentTarget};
use crate::network::message::{
    DestroyInstanceMessage, INSTANCE_CREATED, INSTANCE_DESTROYED, NewInstanceMessage,
};
use crate::network::transport::{Envelope, QueueMode, Transport};
use crate::scene::NodeId;

/// Resolves an original guid to a node to clone, typically by loading a
/// prefab into the context.
pub type PrefabProvider = Box<dyn FnMut(&mut Context, &Guid) -> Option<NodeId>>;

/// Network state owned by a [`Context`].
#[derive(Default)]
pub struct NetworkBridge {
    transport: Option<Box<dyn Transport>>,
    inbox: Option<Receiver<Envelope>>,
    prefab_providers: Vec<PrefabProvider>,
    host_data: HashMap<Guid, serde_json::Value>,
}

impl NetworkBridge {
    fn send(&mut self, key: &str, payload: serde_json::Value) -> Result<bool, NetworkError> {
        match &mut self.transport {
            Some(transport) => {
                transport.send(key, payload, QueueMode::Queued)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn flush(&mut self) {
        if let Some(transport) = &mut self.transport {
            if let Err(err) = transport.flush() {
                log::warn!("network flush failed: {err}");
            }
        }
    }
}

impl Context {
    /// Attach a transport and start listening for replication messages.
    pub fn enable_networking(&mut self, mut transport: impl Transport + 'static) {
        let (sink, inbox) = mpsc::channel();
        transport.begin_listen(INSTANCE_CREATED, sink.clone());
        transport.begin_listen(INSTANCE_DESTROYED, sink);
        self.network.transport = Some(Box::new(transport));
        self.network.inbox = Some(inbox);
        log::info!("networking enabled");
    }

    /// Detach the transport. Messages not yet polled are discarded.
    pub fn disable_networking(&mut self) -> Option<Box<dyn Transport>> {
        self.network.inbox = None;
        self.network.transport.take()
    }

    pub fn is_networked(&self) -> bool {
        self.network.transport.is_some()
    }

    /// Providers are asked in registration order before falling back to a
    /// guid search of the scene.
    pub fn register_prefab_provider(
        &mut self,
        provider: impl FnMut(&mut Context, &Guid) -> Option<NodeId> + 'static,
    ) {
        self.network.prefab_providers.push(Box::new(provider));
    }

    /// Host data that arrived with the remote spawn of `guid`.
    pub fn remote_host_data(&self, guid: &Guid) -> Option<&serde_json::Value> {
        self.network.host_data.get(guid)
    }

    /// Instantiate locally and tell every peer to do the same.
    ///
    /// Any id provider in `options` is replaced by a freshly seeded one so
    /// the seed can travel with the message.
    pub fn sync_instantiate(
        &mut self,
        root: NodeId,
        options: InstantiateOptions,
    ) -> Result<NodeId, NetworkError> {
        self.sync_instantiate_with_data(root, options, None)
    }

    pub fn sync_instantiate_with_data(
        &mut self,
        root: NodeId,
        mut options: InstantiateOptions,
        host_data: Option<serde_json::Value>,
    ) -> Result<NodeId, NetworkError> {
        let original_guid = self
            .graph
            .node(root)
            .map(|n| n.guid().clone())
            .ok_or(SceneError::DeadNode(root))?;
        let seed = IdProvider::generate_seed();
        options.id_provider = Some(IdProvider::new(seed));

        let (parent, unparented) = match &options.parent {
            None => (None, false),
            Some(ParentTarget::Root) => (None, true),
            Some(ParentTarget::Guid(guid)) => (Some(guid.clone()), false),
            Some(ParentTarget::Node(node)) => (self.graph.node(*node).map(|n| n.guid().clone()), false),
        };
        let message = NewInstanceMessage {
            original_guid,
            guid: Guid::new(""),
            seed,
            position: options.position,
            rotation: options.rotation,
            scale: options.scale,
            parent,
            unparented,
            visible: options.visible,
            host_data,
        };

        let clone = self.instantiate(root, options)?;
        let guid = self
            .graph
            .node(clone)
            .map(|n| n.guid().clone())
            .ok_or(SceneError::DeadNode(clone))?;
        let message = NewInstanceMessage { guid, ..message };

        let payload = serde_json::to_value(&message)?;
        if self.network.send(INSTANCE_CREATED, payload)? {
            log::debug!("sync_instantiate {} → {} (seed {seed})", message.original_guid, message.guid);
        } else {
            log::warn!("sync_instantiate without a transport; {} cloned locally only", message.original_guid);
        }
        Ok(clone)
    }

    /// Destroy `node` here and on every peer.
    pub fn sync_destroy(&mut self, node: NodeId) -> Result<(), NetworkError> {
        let guid = self
            .graph
            .node(node)
            .map(|n| n.guid().clone())
            .ok_or(SceneError::DeadNode(node))?;
        self.destroy(node);

        let payload = serde_json::to_value(DestroyInstanceMessage { guid: guid.clone() })?;
        if !self.network.send(INSTANCE_DESTROYED, payload)? {
            log::warn!("sync_destroy without a transport; {guid} destroyed locally only");
        }
        Ok(())
    }

    /// Apply every message received since the last poll. Runs at the top of
    /// each tick.
    pub fn poll_network(&mut self) {
        let Some(inbox) = &self.network.inbox else {
            return;
        };
        let envelopes: Vec<Envelope> = inbox.try_iter().collect();
        for envelope in envelopes {
            let result = match envelope.key.as_str() {
                INSTANCE_CREATED => serde_json::from_value::<NewInstanceMessage>(envelope.payload)
                    .map_err(NetworkError::from)
                    .and_then(|message| self.apply_remote_instantiate(message).map(|_| ())),
                INSTANCE_DESTROYED => serde_json::from_value::<DestroyInstanceMessage>(envelope.payload)
                    .map_err(NetworkError::from)
                    .and_then(|message| self.apply_remote_destroy(message)),
                other => {
                    log::debug!("ignoring network message '{other}'");
                    Ok(())
                }
            };
            if let Err(err) = result {
                log::warn!("dropped '{}' message: {err}", envelope.key);
            }
        }
    }

    fn apply_remote_instantiate(&mut self, message: NewInstanceMessage) -> Result<NodeId, NetworkError> {
        let original = self
            .find_prefab(&message.original_guid)
            .or_else(|| self.graph.find_by_guid(&message.original_guid))
            .ok_or_else(|| NetworkError::UnknownGuid(message.original_guid.clone()))?;

        let mut options = InstantiateOptions::new().seed(message.seed);
        options.parent = if message.unparented {
            Some(ParentTarget::Root)
        } else {
            message.parent.map(ParentTarget::Guid)
        };
        options.position = message.position;
        options.rotation = message.rotation;
        options.scale = message.scale;
        options.visible = message.visible;

        let clone = self.instantiate(original, options)?;
        log::debug!("remote instantiate {} → {}", message.original_guid, message.guid);
        if let Some(data) = message.host_data {
            self.network.host_data.insert(message.guid, data);
        }
        Ok(clone)
    }

    fn apply_remote_destroy(&mut self, message: DestroyInstanceMessage) -> Result<(), NetworkError> {
        self.network.host_data.remove(&message.guid);
        let node = self
            .graph
            .find_by_guid(&message.guid)
            .ok_or(NetworkError::UnknownGuid(message.guid))?;
        self.destroy(node);
        Ok(())
    }

    fn find_prefab(&mut self, guid: &Guid) -> Option<NodeId> {
        let mut providers = std::mem::take(&mut self.network.prefab_providers);
        let found = providers.iter_mut().find_map(|provider| provider(self, guid));
        // Keep providers registered from inside a provider.
        providers.append(&mut self.network.prefab_providers);
        self.network.prefab_providers = providers;
        found
    }
}
