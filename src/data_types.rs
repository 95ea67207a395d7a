use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

pub type UploadId = i64;
pub type Timestamp = DateTime<Utc>;
pub type JsonObject = serde_json::Map<String, Value>;

/// Name of the geometry column in tables derived from GeoJSON uploads
pub const GEOMETRY_COLUMN: &str = "geom";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
pub enum UploadKind {
    #[serde(rename = "geojson")]
    #[strum(serialize = "geojson")]
    GeoJson,
    #[serde(rename = "json")]
    #[strum(serialize = "json")]
    Json,
}

impl UploadKind {
    pub fn table_prefix(&self) -> &'static str {
        match self {
            UploadKind::GeoJson => "geojson_",
            UploadKind::Json => "json_",
        }
    }

    /// Directory (relative to the media root) the blobs of this kind live in
    pub fn blob_dir(&self) -> &'static str {
        match self {
            UploadKind::GeoJson => "geojson_files",
            UploadKind::Json => "json_files",
        }
    }

    pub fn table_name(&self, record_name: &str) -> String {
        format!("{}{}", self.table_prefix(), record_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub kind: UploadKind,
    pub name: String,
    /// Blob path relative to the media directory
    pub file: Option<String>,
    pub uploaded_time: Timestamp,
    /// Optional WKT geometry attached to the record itself (SRID 4326)
    pub geometry: Option<String>,
}

impl UploadRecord {
    pub fn table_name(&self) -> String {
        self.kind.table_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUploadRecord {
    pub kind: UploadKind,
    pub name: String,
    pub file: Option<String>,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Text,
    Geometry { srid: i32 },
}

impl ColumnType {
    pub fn to_sql(&self) -> String {
        match self {
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Geometry { srid } => format!("geometry(GEOMETRY, {srid})"),
        }
    }

    /// Coerce a JSON cell into the value this column actually stores.
    /// Geometry cells hold WKT text.
    pub fn coerce(&self, value: &Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Boolean, Value::Bool(_)) => value.clone(),
            (ColumnType::BigInt, Value::Number(n)) if n.is_i64() => {
                value.clone()
            }
            (ColumnType::Double, Value::Number(n)) => {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
            (ColumnType::Text | ColumnType::Geometry { .. }, Value::String(_)) => {
                value.clone()
            }
            (ColumnType::Text, other) => Value::String(other.to_string()),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// A flat row set ready to be written out as a table. Every row has exactly
/// one cell per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}
