//! Catalog entities and field selectors.
//!
//! Two record kinds live in the store: device error codes and spare-part
//! stock. Both are flat records; serde renames keep the wire field names of
//! the original document store (`errorCode`, `partName`, `qty`, ...) so
//! exported files stay interchangeable with older exports.
//!
//! Search-field selection is an enum per record kind rather than a runtime
//! string index into the record; unknown selector names are rejected at the
//! boundary with [`Error::UnknownField`].

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::candidates;
use crate::error::{Error, Result};
use crate::store::Document;

/// Per-record cap on stored image references.
pub const MAX_IMAGES: usize = 8;

/// Collections in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Errors,
    Stock,
}

impl Collection {
    /// Collection name on the wire and on disk.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Errors => "error_codes",
            Collection::Stock => "stock_parts",
        }
    }
}

/// Behavior shared by both record kinds: identity, typed field access,
/// validation, and photo-candidate derivation.
pub trait Entry:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Field: Copy + Eq + FromStr<Err = Error> + Send + Sync + 'static;

    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// Value of the selected field, empty string when unset.
    fn field(&self, field: Self::Field) -> &str;

    /// Whether the field takes part in the record's identity (the fields the
    /// search engine may pin resolved matching to).
    fn is_identity(field: Self::Field) -> bool;

    /// Wire name of the field, as stored and exported.
    fn field_wire_name(field: Self::Field) -> &'static str;

    /// Accessor used when resolved matching is pinned to an identity field.
    fn identity_value(&self, field: Self::Field) -> &str {
        self.field(field)
    }

    fn validate(&self) -> Result<()>;

    fn images(&self) -> &[String];

    /// Ordered, de-duplicated photo file-name bases for this record.
    fn photo_bases(&self) -> Vec<String>;

    /// One-line rendering for CLI listings.
    fn label(&self) -> String;
}

/// A catalogued device error code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorEntry {
    pub id: String,
    pub brand: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub model: String,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    pub parts: String,
    #[serde(rename = "checkList")]
    pub check_list: String,
    pub solution: String,
    pub images: Vec<String>,
}

/// Searchable fields of an [`ErrorEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorField {
    Brand,
    DeviceType,
    Model,
    ErrorCode,
    Parts,
    CheckList,
    Solution,
}

impl FromStr for ErrorField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brand" => Ok(ErrorField::Brand),
            "type" | "deviceType" | "device-type" => Ok(ErrorField::DeviceType),
            "model" => Ok(ErrorField::Model),
            "errorCode" | "error-code" => Ok(ErrorField::ErrorCode),
            "parts" => Ok(ErrorField::Parts),
            "checkList" | "check-list" => Ok(ErrorField::CheckList),
            "solution" => Ok(ErrorField::Solution),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

impl Entry for ErrorEntry {
    type Field = ErrorField;

    const COLLECTION: Collection = Collection::Errors;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, field: ErrorField) -> &str {
        match field {
            ErrorField::Brand => &self.brand,
            ErrorField::DeviceType => &self.device_type,
            ErrorField::Model => &self.model,
            ErrorField::ErrorCode => &self.error_code,
            ErrorField::Parts => &self.parts,
            ErrorField::CheckList => &self.check_list,
            ErrorField::Solution => &self.solution,
        }
    }

    fn is_identity(field: ErrorField) -> bool {
        matches!(
            field,
            ErrorField::Brand | ErrorField::Model | ErrorField::ErrorCode
        )
    }

    fn field_wire_name(field: ErrorField) -> &'static str {
        match field {
            ErrorField::Brand => "brand",
            ErrorField::DeviceType => "type",
            ErrorField::Model => "model",
            ErrorField::ErrorCode => "errorCode",
            ErrorField::Parts => "parts",
            ErrorField::CheckList => "checkList",
            ErrorField::Solution => "solution",
        }
    }

    fn identity_value(&self, field: ErrorField) -> &str {
        // Pinned accessor: identity fields always answer with their own
        // stored value, mirroring the source's explicit brand/model/errorCode
        // overrides.
        match field {
            ErrorField::Brand => &self.brand,
            ErrorField::Model => &self.model,
            ErrorField::ErrorCode => &self.error_code,
            other => self.field(other),
        }
    }

    fn validate(&self) -> Result<()> {
        let required: [(&'static str, &str); 4] = [
            ("brand", &self.brand),
            ("type", &self.device_type),
            ("model", &self.model),
            ("errorCode", &self.error_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation { field });
            }
        }
        Ok(())
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn photo_bases(&self) -> Vec<String> {
        candidates::error_bases(self)
    }

    fn label(&self) -> String {
        format!(
            "{}  {} {} [{}]  {}",
            self.id, self.brand, self.model, self.error_code, self.device_type
        )
    }
}

/// A spare part in stock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockEntry {
    pub id: String,
    #[serde(rename = "partName")]
    pub part_name: String,
    #[serde(rename = "forModel")]
    pub for_model: String,
    #[serde(rename = "partBrand")]
    pub part_brand: String,
    #[serde(rename = "qty")]
    pub quantity: u32,
    #[serde(rename = "partNote")]
    pub note: String,
    pub images: Vec<String>,
}

/// Searchable fields of a [`StockEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockField {
    PartName,
    ForModel,
    PartBrand,
    Note,
}

impl FromStr for StockField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "partName" | "part-name" => Ok(StockField::PartName),
            "forModel" | "for-model" => Ok(StockField::ForModel),
            "partBrand" | "part-brand" => Ok(StockField::PartBrand),
            "partNote" | "note" => Ok(StockField::Note),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

impl Entry for StockEntry {
    type Field = StockField;

    const COLLECTION: Collection = Collection::Stock;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, field: StockField) -> &str {
        match field {
            StockField::PartName => &self.part_name,
            StockField::ForModel => &self.for_model,
            StockField::PartBrand => &self.part_brand,
            StockField::Note => &self.note,
        }
    }

    fn is_identity(_field: StockField) -> bool {
        // The identity-pinning quirk is specific to the error collection.
        false
    }

    fn field_wire_name(field: StockField) -> &'static str {
        match field {
            StockField::PartName => "partName",
            StockField::ForModel => "forModel",
            StockField::PartBrand => "partBrand",
            StockField::Note => "partNote",
        }
    }

    fn validate(&self) -> Result<()> {
        if self.part_name.trim().is_empty() {
            return Err(Error::Validation { field: "partName" });
        }
        Ok(())
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn photo_bases(&self) -> Vec<String> {
        candidates::stock_bases(self)
    }

    fn label(&self) -> String {
        let context = if self.for_model.is_empty() {
            self.part_brand.clone()
        } else {
            self.for_model.clone()
        };
        format!("{}  {} ({})  x{}", self.id, self.part_name, context, self.quantity)
    }
}

/// Serialize an entry into a store field object, id stripped (the store owns
/// identifier assignment).
pub fn to_fields<E: Entry>(entry: &E) -> Result<Map<String, Value>> {
    match serde_json::to_value(entry) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            Ok(map)
        }
        Ok(_) => Err(Error::persistence("record did not serialize to an object")),
        Err(err) => Err(Error::persistence(format!("record serialization failed: {err}"))),
    }
}

/// Rebuild a typed entry from a stored document.
pub fn from_document<E: Entry>(doc: &Document) -> Result<E> {
    let mut entry: E = serde_json::from_value(Value::Object(doc.fields.clone()))
        .map_err(|err| {
            Error::persistence(format!(
                "malformed {} document {}: {err}",
                E::COLLECTION.name(),
                doc.id
            ))
        })?;
    entry.set_id(doc.id.clone());
    Ok(entry)
}
