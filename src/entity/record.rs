use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

use super::Kind;

/// Flat key/value form of an entity as written to a collection.
pub type Record = serde_json::Map<String, Value>;

pub const KIND_KEY: &str = "kind";
pub const CLASS_KEY: &str = "class";

/// Conversion between a concrete entity type and its [`Record`].
///
/// `to_record` flattens the embedded base fields next to the type's own and
/// tags the result with its kind and class. Inflation fills any missing field
/// with its zero value, so records written by older builds still load.
pub trait Recordable: Serialize + DeserializeOwned {
    const KIND: Kind;
    const TYPE_NAME: &'static str;

    fn to_record(&self) -> Result<Record> {
        let value = serde_json::to_value(self).map_err(|source| Error::DataFormat {
            type_name: Self::TYPE_NAME,
            op: "marshal",
            source,
        })?;
        let mut record = match value {
            Value::Object(map) => map,
            _ => {
                return Err(Error::DataFormat {
                    type_name: Self::TYPE_NAME,
                    op: "marshal",
                    source: <serde_json::Error as serde::ser::Error>::custom(
                        "entity did not serialize to a map",
                    ),
                });
            }
        };
        record.insert(
            KIND_KEY.to_string(),
            Value::String(Self::KIND.collection_name().to_string()),
        );
        record.insert(
            CLASS_KEY.to_string(),
            Value::String(Self::KIND.class().to_string()),
        );
        Ok(record)
    }

    fn from_record(bytes: &[u8]) -> Result<Self> {
        let record: Record = serde_json::from_slice(bytes).map_err(|source| Error::DataFormat {
            type_name: Self::TYPE_NAME,
            op: "unmarshal",
            source,
        })?;
        Self::from_map(record)
    }

    fn from_map(record: Record) -> Result<Self> {
        if let Some(found) = record.get(KIND_KEY) {
            if found.as_str() != Some(Self::KIND.collection_name()) {
                return Err(Error::KindMismatch {
                    expected: Self::KIND.collection_name(),
                    found: found.to_string(),
                });
            }
        }
        serde_json::from_value(Value::Object(record)).map_err(|source| Error::DataFormat {
            type_name: Self::TYPE_NAME,
            op: "unmarshal",
            source,
        })
    }
}
