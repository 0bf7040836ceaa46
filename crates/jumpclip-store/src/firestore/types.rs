//! Firestore REST wire types and the JSON <-> `Value` codec.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Record attributes stored as Firestore timestamps rather than strings.
pub const TIMESTAMP_FIELDS: &[&str] = &["queuedAt", "startedAt", "finishedAt", "updatedAt", "createdAt"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// Firestore sends integers as strings
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

impl StructuredQuery {
    pub fn collection(collection_id: &str) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection_id.to_string(),
            }],
            ..Self::default()
        }
    }

    /// Single equality filter.
    pub fn where_eq(mut self, field: &str, value: Value) -> Self {
        self.filter = Some(Filter {
            field_filter: FieldFilter {
                field: FieldReference::new(field),
                op: "EQUAL".to_string(),
                value,
            },
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(Order {
            field: FieldReference::new(field),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(i32::try_from(limit).unwrap_or(i32::MAX));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_filter: FieldFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

impl FieldReference {
    fn new(path: &str) -> Self {
        Self {
            field_path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: Direction,
}

// ============================================================================
// Codec
// ============================================================================

pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Value::IntegerValue(u.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_value(v)))
                    .collect(),
            ),
        }),
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s)
        | Value::StringValue(s)
        | Value::BytesValue(s)
        | Value::ReferenceValue(s) => serde_json::Value::String(s.clone()),
        Value::GeoPointValue(p) => serde_json::json!({
            "latitude": p.latitude,
            "longitude": p.longitude,
        }),
        Value::ArrayValue(a) => serde_json::Value::Array(
            a.values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(m) => serde_json::Value::Object(fields_to_json(m.fields.as_ref())),
    }
}

fn fields_to_json(fields: Option<&HashMap<String, Value>>) -> serde_json::Map<String, serde_json::Value> {
    fields
        .map(|f| f.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect())
        .unwrap_or_default()
}

/// Encode a record as document fields. Top-level timestamp attributes
/// become `timestampValue` so they order chronologically.
pub fn to_fields<T: Serialize>(record: &T) -> serde_json::Result<HashMap<String, Value>> {
    let serde_json::Value::Object(map) = serde_json::to_value(record)? else {
        return Err(serde::ser::Error::custom("record must serialize to an object"));
    };
    Ok(map
        .iter()
        .map(|(key, json)| {
            let value = match json {
                serde_json::Value::String(s) if TIMESTAMP_FIELDS.contains(&key.as_str()) => {
                    Value::TimestampValue(s.clone())
                }
                other => json_to_value(other),
            };
            (key.clone(), value)
        })
        .collect())
}

/// Decode a document into a record.
///
/// When `id_field` is given and the stored fields lack it, the document id
/// fills it in.
pub fn from_document<T: DeserializeOwned>(
    doc: &Document,
    id_field: Option<&str>,
) -> serde_json::Result<T> {
    let mut map = fields_to_json(doc.fields.as_ref());
    if let (Some(field), Some(id)) = (id_field, doc.id()) {
        map.entry(field.to_string())
            .or_insert_with(|| serde_json::Value::String(id.to_string()));
    }
    serde_json::from_value(serde_json::Value::Object(map))
}
