//! Attaching per-feature tables keyed by feature id.
//!
//! Tables are JSON objects mapping an id to its values, either as an array
//! or as an object keyed by period number:
//!
//! ```json
//! { "02_NA": [1.5, 2.0, 0.0], "03_SA": { "1": 4.0, "2": 3.5 } }
//! ```

use std::path::Path;

use serde_json::{Map, Value};

use crate::IngestError;
use crate::features::feature_id;

/// Reads a join table from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON object.
pub fn read_table(path: &Path) -> Result<Map<String, Value>, IngestError> {
    log::info!("Reading join table {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    match value {
        Value::Object(table) => Ok(table),
        other => Err(IngestError::Conversion {
            message: format!(
                "join table {} must be a JSON object keyed by id, found {}",
                path.display(),
                json_type(&other)
            ),
        }),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Copies each feature's table row into property `field`. Features whose
/// id is missing from the table are dropped.
#[must_use]
pub fn attach_table(
    features: Vec<geojson::Feature>,
    id_field: &str,
    table: &Map<String, Value>,
    field: &str,
) -> Vec<geojson::Feature> {
    let total = features.len();
    let joined: Vec<_> = features
        .into_iter()
        .filter_map(|mut feature| {
            let id = feature_id(&feature, id_field)?;
            let Some(row) = table.get(&id) else {
                log::debug!("No '{field}' row for {id_field} {id}");
                return None;
            };
            feature.set_property(field, row.clone());
            Some(feature)
        })
        .collect();

    if joined.len() < total {
        log::warn!(
            "Dropped {} of {total} features with no '{field}' row in the join table",
            total - joined.len()
        );
    }

    joined
}
