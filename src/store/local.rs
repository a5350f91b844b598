//! Local JSON-file backend.
//!
//! Each collection is one JSON array file under the data dir, mirrored in
//! memory and rewritten atomically (temp file + rename) on every mutation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Document, Listener, ListenerHub, Store, Subscription};
use crate::error::{Error, Result};
use crate::model::Collection;

const COLLECTIONS: [Collection; 2] = [Collection::Errors, Collection::Stock];

pub struct LocalStore {
    data_dir: PathBuf,
    collections: Mutex<HashMap<Collection, Vec<Document>>>,
    hub: Arc<ListenerHub>,
}

impl LocalStore {
    /// Open the store, loading any existing collection files.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|err| {
            Error::persistence(format!(
                "failed to create data dir {}: {err}",
                data_dir.display()
            ))
        })?;

        let mut collections = HashMap::new();
        for collection in COLLECTIONS {
            let docs = load_collection(&collection_path(&data_dir, collection))?;
            debug!(
                collection = collection.name(),
                records = docs.len(),
                "collection loaded"
            );
            collections.insert(collection, docs);
        }

        Ok(Self {
            data_dir,
            collections: Mutex::new(collections),
            hub: Arc::default(),
        })
    }

    fn snapshot(&self, collection: Collection) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn persist_and_notify(&self, collection: Collection) -> Result<()> {
        let snapshot = self.snapshot(collection);
        let records: Vec<Value> = snapshot.iter().map(Document::to_value).collect();
        let payload = serde_json::to_string_pretty(&records)
            .map_err(|err| Error::persistence(format!("failed to serialize collection: {err}")))?;
        write_atomic(&collection_path(&self.data_dir, collection), payload.as_bytes())?;
        self.hub.notify(collection, &snapshot);
        Ok(())
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>> {
        Ok(self.snapshot(collection))
    }

    async fn add(&self, collection: Collection, fields: Map<String, Value>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        {
            let mut collections = self.collections.lock().unwrap();
            collections.entry(collection).or_default().push(Document {
                id: id.clone(),
                fields,
            });
        }
        self.persist_and_notify(collection)?;
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<()> {
        {
            let mut collections = self.collections.lock().unwrap();
            let docs = collections.entry(collection).or_default();
            let doc = docs.iter_mut().find(|doc| doc.id == id).ok_or_else(|| {
                Error::persistence(format!(
                    "no document {id} in collection {}",
                    collection.name()
                ))
            })?;
            for (key, value) in patch {
                doc.fields.insert(key, value);
            }
        }
        self.persist_and_notify(collection)
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<()> {
        let removed = {
            let mut collections = self.collections.lock().unwrap();
            let docs = collections.entry(collection).or_default();
            let before = docs.len();
            docs.retain(|doc| doc.id != id);
            docs.len() != before
        };
        if removed {
            self.persist_and_notify(collection)?;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        listener: Listener,
    ) -> Result<Subscription> {
        listener(&self.snapshot(collection));
        Ok(self.hub.register(collection, listener))
    }
}

fn collection_path(data_dir: &Path, collection: Collection) -> PathBuf {
    data_dir.join(format!("{}.json", collection.name()))
}

fn load_collection(path: &Path) -> Result<Vec<Document>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| Error::persistence(format!("failed to read {}: {err}", path.display())))?;
    let records: Vec<Map<String, Value>> = serde_json::from_str(&raw)
        .map_err(|err| Error::persistence(format!("corrupt collection file {}: {err}", path.display())))?;

    let mut docs = Vec::with_capacity(records.len());
    for record in records {
        match Document::from_object(record) {
            Some(doc) => docs.push(doc),
            None => warn!(path = %path.display(), "skipping record without id"),
        }
    }
    Ok(docs)
}

/// Write via a temp file in the same directory, then rename over the target.
fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::persistence(format!("target path has no parent: {}", target.display())))?;
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("collection.json");
    let temp_path = parent.join(format!(".{file_name}.tmp"));

    fs::write(&temp_path, data).map_err(|err| {
        Error::persistence(format!("failed to write {}: {err}", temp_path.display()))
    })?;
    fs::rename(&temp_path, target).map_err(|err| {
        Error::persistence(format!("failed to replace {}: {err}", target.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn add_assigns_unique_ids() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let a = store
            .add(Collection::Errors, fields(&[("brand", "LG")]))
            .await
            .unwrap();
        let b = store
            .add(Collection::Errors, fields(&[("brand", "Acme")]))
            .await
            .unwrap();
        assert_ne!(a, b);

        let docs = store.get_all(Collection::Errors).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].fields["brand"], "LG");
    }

    #[tokio::test]
    async fn update_merges_instead_of_replacing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let id = store
            .add(
                Collection::Stock,
                fields(&[("partName", "Pump"), ("partBrand", "Acme")]),
            )
            .await
            .unwrap();
        store
            .update(Collection::Stock, &id, fields(&[("partName", "Drain pump")]))
            .await
            .unwrap();

        let docs = store.get_all(Collection::Stock).await.unwrap();
        assert_eq!(docs[0].fields["partName"], "Drain pump");
        // Untouched fields survive the merge.
        assert_eq!(docs[0].fields["partBrand"], "Acme");
    }

    #[tokio::test]
    async fn update_unknown_id_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let result = store
            .update(Collection::Errors, "missing", Map::new())
            .await;
        assert!(matches!(result, Err(Error::Persistence { .. })));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = LocalStore::open(dir.path()).unwrap();
            store
                .add(Collection::Errors, fields(&[("brand", "LG")]))
                .await
                .unwrap()
        };

        let reopened = LocalStore::open(dir.path()).unwrap();
        let docs = reopened.get_all(Collection::Errors).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
    }

    #[tokio::test]
    async fn subscribe_delivers_immediately_and_after_mutations() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let deliveries = Arc::new(AtomicUsize::new(0));
        let seen = deliveries.clone();
        let subscription = store
            .subscribe(
                Collection::Errors,
                Arc::new(move |_snapshot| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);

        store
            .add(Collection::Errors, fields(&[("brand", "LG")]))
            .await
            .unwrap();
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);

        // Mutations to the other collection stay silent.
        store
            .add(Collection::Stock, fields(&[("partName", "Pump")]))
            .await
            .unwrap();
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        store
            .add(Collection::Errors, fields(&[("brand", "Acme")]))
            .await
            .unwrap();
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let id = store
            .add(Collection::Errors, fields(&[("brand", "LG")]))
            .await
            .unwrap();

        store.remove(Collection::Errors, &id).await.unwrap();
        store.remove(Collection::Errors, &id).await.unwrap();
        assert!(store.get_all(Collection::Errors).await.unwrap().is_empty());
    }
}
