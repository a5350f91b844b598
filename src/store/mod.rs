//! Persistence abstraction.
//!
//! Two interchangeable backends satisfy the same contract: a local
//! JSON-file store and a remote document store. Documents travel as flat
//! JSON field objects plus an opaque identifier; `update` merges fields, it
//! never replaces the whole document. Subscribing delivers the current
//! snapshot immediately, then the full collection again after every
//! mutation; consumers replace their state wholesale, there is no diffing
//! contract.

pub mod local;
pub mod remote;

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::Collection;

/// A stored record: opaque id plus flat field object.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Flatten into a single JSON object with the id injected, the shape
    /// records travel in exports and CLI output.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }

    /// Inverse of [`Document::to_value`]: pull the id out of a flat record
    /// object, if it has one.
    pub fn from_object(mut object: Map<String, Value>) -> Option<Self> {
        let id = match object.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return None,
        };
        Some(Self { id, fields: object })
    }
}

/// Snapshot callback invoked by the store on subscription and after every
/// mutation to the subscribed collection.
pub type Listener = Arc<dyn Fn(&[Document]) + Send + Sync>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>>;

    /// Store a new document; the store assigns and returns its identifier.
    async fn add(&self, collection: Collection, fields: Map<String, Value>) -> Result<String>;

    /// Shallow-merge `patch` into the document's fields.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<()>;

    async fn remove(&self, collection: Collection, id: &str) -> Result<()>;

    /// Invoke `listener` with the current snapshot before returning, then
    /// after every subsequent mutation to `collection`. The returned handle
    /// is a real registration: `unsubscribe` removes it.
    async fn subscribe(&self, collection: Collection, listener: Listener)
        -> Result<Subscription>;
}

/// Handle for a live subscription. Explicitly calling
/// [`Subscription::unsubscribe`] removes the registration; merely dropping
/// the handle keeps it alive for the lifetime of the store.
pub struct Subscription {
    hub: Weak<ListenerHub>,
    token: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.token);
        }
    }
}

#[derive(Default)]
struct HubInner {
    next_token: u64,
    registrations: Vec<(u64, Collection, Listener)>,
}

/// Listener registry shared by both backends.
#[derive(Default)]
pub(crate) struct ListenerHub {
    inner: Mutex<HubInner>,
}

impl ListenerHub {
    pub(crate) fn register(self: &Arc<Self>, collection: Collection, listener: Listener) -> Subscription {
        let mut inner = self.inner.lock().unwrap();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.registrations.push((token, collection, listener));
        Subscription {
            hub: Arc::downgrade(self),
            token,
        }
    }

    pub(crate) fn notify(&self, collection: Collection, snapshot: &[Document]) {
        // Clone the listener list so callbacks run outside the lock and may
        // themselves subscribe or unsubscribe.
        let listeners: Vec<Listener> = {
            let inner = self.inner.lock().unwrap();
            inner
                .registrations
                .iter()
                .filter(|(_, c, _)| *c == collection)
                .map(|(_, _, listener)| listener.clone())
                .collect()
        };
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn remove(&self, token: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.registrations.retain(|(t, _, _)| *t != token);
    }
}
