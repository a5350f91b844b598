//! JSON export/import.
//!
//! Export writes the full collection as a pretty-printed JSON array, ids
//! included. Import parses the whole file up front (malformed input aborts
//! before anything is written), then reassigns identifiers and skips every
//! record whose de-duplication key already exists in the collection.

use serde_json::{Map, Value};
use tracing::info;

use crate::error::Result;
use crate::model::Collection;
use crate::store::{Document, Store};

/// Counts reported back to the user after an import.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
}

/// The tuple of fields deciding whether an imported record already exists.
/// Comparison is case-sensitive; absent fields count as empty.
pub fn dedup_key(collection: Collection, fields: &Map<String, Value>) -> (String, String, String) {
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match collection {
        Collection::Errors => (text("errorCode"), text("brand"), text("model")),
        Collection::Stock => (text("partName"), text("forModel"), text("partBrand")),
    }
}

/// Serialize the full collection. Returns the record count alongside the
/// JSON payload.
pub async fn export(store: &dyn Store, collection: Collection) -> Result<(usize, String)> {
    let docs = store.get_all(collection).await?;
    let records: Vec<Value> = docs.iter().map(Document::to_value).collect();
    let payload = serde_json::to_string_pretty(&records)
        .map_err(|err| crate::error::Error::persistence(format!("export serialization failed: {err}")))?;
    Ok((docs.len(), payload))
}

/// Import a JSON array of records. Identifiers in the input are discarded;
/// the store assigns fresh ones. Duplicates are judged against the
/// collection as it stood when the import began.
pub async fn import(
    store: &dyn Store,
    collection: Collection,
    raw: &str,
) -> Result<ImportReport> {
    // Parse everything before touching the store: a malformed file aborts
    // the whole import.
    let incoming: Vec<Map<String, Value>> = serde_json::from_str(raw)?;

    let existing = store.get_all(collection).await?;
    let known: std::collections::HashSet<_> = existing
        .iter()
        .map(|doc| dedup_key(collection, &doc.fields))
        .collect();

    let mut report = ImportReport::default();
    for mut fields in incoming {
        fields.remove("id");
        if known.contains(&dedup_key(collection, &fields)) {
            report.skipped += 1;
            continue;
        }
        store.add(collection, fields).await?;
        report.added += 1;
    }

    info!(
        collection = collection.name(),
        added = report.added,
        skipped = report.skipped,
        "import finished"
    );
    Ok(report)
}
