//! Reading `GeoJSON` features and coercing their properties into typed
//! payloads.

use std::path::Path;

use geo::Geometry;
use geohex_grid::{Feature, PointFeature};
use geohex_grid_models::{FieldKind, FieldValue, Payload};
use geojson::{FeatureCollection, GeoJson};
use serde_json::Value;

use crate::IngestError;
use crate::config::FieldSpec;

/// Reads a `GeoJSON` `FeatureCollection` from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a
/// `FeatureCollection`.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, IngestError> {
    log::info!("Reading features from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let geojson: GeoJson = text.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;
    log::info!("Read {} features", collection.features.len());
    Ok(collection)
}

/// Returns the feature's identifier as a string, if it has a non-empty
/// one.
#[must_use]
pub fn feature_id(feature: &geojson::Feature, id_field: &str) -> Option<String> {
    match feature.property(id_field)? {
        Value::String(s) => Some(s.trim())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drops features without a usable `id_field` value.
#[must_use]
pub fn retain_identified(
    features: Vec<geojson::Feature>,
    id_field: &str,
) -> Vec<geojson::Feature> {
    let total = features.len();
    let kept: Vec<_> = features
        .into_iter()
        .filter(|feature| feature_id(feature, id_field).is_some())
        .collect();

    if kept.len() < total {
        log::warn!(
            "Dropped {} of {total} features without a '{id_field}' value",
            total - kept.len()
        );
    }

    kept
}

/// Coerces one JSON property to the declared shape.
///
/// * `Scalar`: numbers, or strings holding a number
/// * `Series`: arrays of scalars, or objects keyed by integers (ordered by
///   key; other keys are ignored)
/// * `Category`: strings, or numbers rendered as strings
///
/// # Errors
///
/// Returns a description of the mismatch if the value has the wrong shape.
pub fn coerce(value: &Value, kind: FieldKind) -> Result<FieldValue, String> {
    match kind {
        FieldKind::Scalar => coerce_scalar(value).map(FieldValue::Scalar),
        FieldKind::Series => coerce_series(value).map(FieldValue::Series),
        FieldKind::Category => match value {
            Value::String(s) => Ok(FieldValue::Category(s.clone())),
            Value::Number(n) => Ok(FieldValue::Category(n.to_string())),
            other => Err(format!("expected a category label, found {other}")),
        },
    }
}

fn coerce_scalar(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number {n} is not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected a number, found \"{s}\"")),
        other => Err(format!("expected a number, found {other}")),
    }
}

fn coerce_series(value: &Value) -> Result<Vec<f64>, String> {
    match value {
        Value::Array(items) => items.iter().map(coerce_scalar).collect(),
        Value::Object(entries) => {
            let mut indexed = entries
                .iter()
                .filter_map(|(key, value)| key.trim().parse::<i64>().ok().map(|i| (i, value)))
                .collect::<Vec<_>>();
            indexed.sort_by_key(|(i, _)| *i);
            indexed.into_iter().map(|(_, v)| coerce_scalar(v)).collect()
        }
        other => Err(format!("expected an array of numbers, found {other}")),
    }
}

/// Builds the payload of a feature from the declared fields, keyed by each
/// field's output name.
///
/// Returns `None` if any declared property is absent or `null`; such
/// features are left out of the run.
///
/// # Errors
///
/// Returns [`IngestError::Conversion`] naming the feature and field if a
/// property has the wrong shape.
pub fn payload(
    feature: &geojson::Feature,
    index: usize,
    fields: &[FieldSpec],
) -> Result<Option<Payload>, IngestError> {
    let mut payload = Payload::new();

    for field in fields {
        let Some(value) = feature.property(&field.name).filter(|v| !v.is_null()) else {
            log::debug!("Skipping feature {index}: no '{}' property", field.name);
            return Ok(None);
        };

        let coerced = coerce(value, field.kind).map_err(|message| IngestError::Conversion {
            message: format!(
                "feature {index}, field '{}' ({}): {message}",
                field.name, field.kind
            ),
        })?;
        payload.insert(field.output_name().to_string(), coerced);
    }

    Ok(Some(payload))
}

fn warn_incomplete(incomplete: usize, total: usize) {
    if incomplete > 0 {
        log::warn!("Dropped {incomplete} of {total} features missing a declared field");
    }
}

fn geometry(
    feature: &geojson::Feature,
    index: usize,
) -> Result<Option<Geometry<f64>>, IngestError> {
    let Some(geometry) = feature.geometry.clone() else {
        log::warn!("Skipping feature {index}: no geometry");
        return Ok(None);
    };

    Ok(Some(geometry.try_into()?))
}

/// Converts `Polygon` and `MultiPolygon` features. Features with other
/// geometry types, or missing a declared field, are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if a geometry is malformed or a property cannot be
/// coerced.
pub fn polygon_features(
    features: &[geojson::Feature],
    fields: &[FieldSpec],
) -> Result<Vec<Feature>, IngestError> {
    let mut converted = Vec::with_capacity(features.len());
    let mut incomplete = 0;

    for (index, feature) in features.iter().enumerate() {
        let polygons = match geometry(feature, index)? {
            Some(Geometry::Polygon(polygon)) => geo::MultiPolygon(vec![polygon]),
            Some(Geometry::MultiPolygon(polygons)) => polygons,
            Some(_) => {
                log::warn!("Skipping feature {index}: not a polygon");
                continue;
            }
            None => continue,
        };

        let Some(payload) = payload(feature, index, fields)? else {
            incomplete += 1;
            continue;
        };

        converted.push(Feature::new(polygons, payload));
    }

    warn_incomplete(incomplete, features.len());
    Ok(converted)
}

/// Converts `Point` features. Features with other geometry types, or
/// missing a declared field, are skipped with a warning.
///
/// # Errors
///
/// Returns an error if a geometry is malformed or a property cannot be
/// coerced.
pub fn point_features(
    features: &[geojson::Feature],
    fields: &[FieldSpec],
) -> Result<Vec<PointFeature>, IngestError> {
    let mut converted = Vec::with_capacity(features.len());
    let mut incomplete = 0;

    for (index, feature) in features.iter().enumerate() {
        let point = match geometry(feature, index)? {
            Some(Geometry::Point(point)) => point,
            Some(_) => {
                log::warn!("Skipping feature {index}: not a point");
                continue;
            }
            None => continue,
        };

        let Some(payload) = payload(feature, index, fields)? else {
            incomplete += 1;
            continue;
        };

        converted.push(PointFeature {
            lng: point.x(),
            lat: point.y(),
            payload,
        });
    }

    warn_incomplete(incomplete, features.len());
    Ok(converted)
}
