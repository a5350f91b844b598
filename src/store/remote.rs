//! Remote document-store backend.
//!
//! Speaks a plain JSON REST dialect: `GET /{collection}` lists records as a
//! flat array, `POST /{collection}` creates one and answers `{"id": ...}`,
//! `PATCH /{collection}/{id}` merges fields, `DELETE /{collection}/{id}`
//! removes. The protocol has no push channel, so subscription callbacks
//! fire for mutations made through this store; [`RemoteStore::refresh`]
//! re-pulls a collection and notifies on demand.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::{Document, Listener, ListenerHub, Store, Subscription};
use crate::error::{Error, Result};
use crate::model::Collection;

pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    hub: Arc<ListenerHub>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            hub: Arc::default(),
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.name())
    }

    fn document_url(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection.name(), id)
    }

    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Document>> {
        let records: Vec<Map<String, Value>> = self
            .client
            .get(self.collection_url(collection))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(store_error)?
            .json()
            .await
            .map_err(store_error)?;

        let mut docs = Vec::with_capacity(records.len());
        for record in records {
            match Document::from_object(record) {
                Some(doc) => docs.push(doc),
                None => warn!(
                    collection = collection.name(),
                    "skipping remote record without id"
                ),
            }
        }
        Ok(docs)
    }

    /// Re-pull a collection from the server and notify subscribers with the
    /// fresh snapshot.
    pub async fn refresh(&self, collection: Collection) -> Result<Vec<Document>> {
        let snapshot = self.fetch_all(collection).await?;
        self.hub.notify(collection, &snapshot);
        Ok(snapshot)
    }
}

#[async_trait]
impl Store for RemoteStore {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Document>> {
        self.fetch_all(collection).await
    }

    async fn add(&self, collection: Collection, fields: Map<String, Value>) -> Result<String> {
        let created: Created = self
            .client
            .post(self.collection_url(collection))
            .json(&Value::Object(fields))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(store_error)?
            .json()
            .await
            .map_err(store_error)?;
        self.refresh(collection).await?;
        Ok(created.id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<()> {
        self.client
            .patch(self.document_url(collection, id))
            .json(&Value::Object(patch))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(store_error)?;
        self.refresh(collection).await?;
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<()> {
        self.client
            .delete(self.document_url(collection, id))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(store_error)?;
        self.refresh(collection).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        listener: Listener,
    ) -> Result<Subscription> {
        let snapshot = self.fetch_all(collection).await?;
        listener(&snapshot);
        Ok(self.hub.register(collection, listener))
    }
}

fn store_error(err: reqwest::Error) -> Error {
    Error::persistence(format!("remote store request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_rooted_at_the_base() {
        let store = RemoteStore::new("https://example.test/api/");
        assert_eq!(
            store.collection_url(Collection::Errors),
            "https://example.test/api/error_codes"
        );
        assert_eq!(
            store.document_url(Collection::Stock, "d1"),
            "https://example.test/api/stock_parts/d1"
        );
    }
}
