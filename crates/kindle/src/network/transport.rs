//! Message transport abstraction and an in-process implementation.
//!
//! The replication bridge only needs two things from a network: send a keyed
//! JSON payload to every other peer, and deliver incoming payloads for a key
//! into a channel. [`MemoryHub`] wires any number of peers together inside
//! one process, which is what tests and the demos use.
//!
//! ```text
//!   peer A ── send(key, payload) ──► MemoryHub ──► sink of every other peer
//!                                                  listening on `key`
//! ```

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::NetworkError;

/// When a message leaves the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Held until the end of the current frame.
    #[default]
    Queued,
    /// Delivered right away.
    Immediate,
}

/// A keyed message as it travels between peers.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub key: String,
    pub payload: serde_json::Value,
}

pub trait Transport {
    fn send(
        &mut self,
        key: &str,
        payload: serde_json::Value,
        mode: QueueMode,
    ) -> Result<(), NetworkError>;

    /// Deliver every incoming message for `key` into `sink`.
    fn begin_listen(&mut self, key: &str, sink: Sender<Envelope>);

    /// Push out queued messages. Called by the context at the end of each
    /// frame.
    fn flush(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }
}

// ── MemoryHub ────────────────────────────────────────────────────────────

struct Listener {
    peer: usize,
    key: String,
    sink: Sender<Envelope>,
}

#[derive(Default)]
struct HubState {
    next_peer: usize,
    listeners: Vec<Listener>,
}

/// In-process message switch. Clones share the same hub.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the hub as a new peer.
    pub fn connect(&self) -> MemoryTransport {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let peer = state.next_peer;
        state.next_peer += 1;
        MemoryTransport {
            hub: self.clone(),
            peer,
            outbox: Vec::new(),
        }
    }

    /// Hand `envelope` to every listener on its key except the sender's own.
    /// Listeners whose receiving side is gone are dropped.
    fn deliver(&self, from: usize, envelope: &Envelope) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        state.listeners.retain(|listener| {
            if listener.peer == from || listener.key != envelope.key {
                return true;
            }
            match listener.sink.send(envelope.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::debug!("peer {} stopped listening on '{}'", listener.peer, listener.key);
                    false
                }
            }
        });
        delivered
    }
}

/// One peer's connection to a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    peer: usize,
    outbox: Vec<Envelope>,
}

impl MemoryTransport {
    pub fn peer(&self) -> usize {
        self.peer
    }

    /// Messages waiting for the next flush.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }
}

impl Transport for MemoryTransport {
    fn send(
        &mut self,
        key: &str,
        payload: serde_json::Value,
        mode: QueueMode,
    ) -> Result<(), NetworkError> {
        let envelope = Envelope {
            key: key.to_owned(),
            payload,
        };
        match mode {
            QueueMode::Queued => self.outbox.push(envelope),
            QueueMode::Immediate => {
                self.hub.deliver(self.peer, &envelope);
            }
        }
        Ok(())
    }

    fn begin_listen(&mut self, key: &str, sink: Sender<Envelope>) {
        let mut state = self.hub.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.listeners.push(Listener {
            peer: self.peer,
            key: key.to_owned(),
            sink,
        });
    }

    fn flush(&mut self) -> Result<(), NetworkError> {
        for envelope in std::mem::take(&mut self.outbox) {
            self.hub.deliver(self.peer, &envelope);
        }
        Ok(())
    }
}
