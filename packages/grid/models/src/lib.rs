#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Payload and aggregate types for hex grid aggregation.
//!
//! A feature's attributes are held as a [`Payload`] of typed
//! [`FieldValue`]s. Reducing the payloads that fall into one hex cell
//! produces an [`AggregateRecord`], which is what gets written to the
//! per-resolution JSON artifacts read by the front end.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field name under which sampled elevation is merged into records.
pub const ELEVATION_FIELD: &str = "Elevation";

/// The declared shape of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Fixed-length ordered sequence of numbers (e.g. monthly groundwater
    /// levels).
    Series,
    /// A single number (e.g. detection confidence).
    Scalar,
    /// A single categorical label (e.g. land-use class).
    Category,
}

impl FieldKind {
    /// Returns the lowercase label used in configuration files.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Scalar => "scalar",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single attribute value attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single number.
    Scalar(f64),
    /// An ordered numeric array.
    Series(Vec<f64>),
    /// A categorical label.
    Category(String),
}

impl FieldValue {
    /// Returns the [`FieldKind`] of this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Series(_) => FieldKind::Series,
            Self::Category(_) => FieldKind::Category,
        }
    }

    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Self::Series(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(label) => Some(label),
            _ => None,
        }
    }
}

/// Named attribute values attached to one feature or point detection.
pub type Payload = BTreeMap<String, FieldValue>;

/// A reduced value for one field of one hex cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// Mean of scalar values (or an injected scalar such as elevation).
    Scalar(f64),
    /// Element-wise mean of series values.
    Series(Vec<f64>),
    /// Distinct category labels, most frequent first.
    Ranked(Vec<String>),
}

impl AggregateValue {
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Self::Series(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ranked(&self) -> Option<&[String]> {
        match self {
            Self::Ranked(labels) => Some(labels),
            _ => None,
        }
    }
}

/// The reduced attributes of one hex cell.
///
/// Serializes as a flat JSON object keyed by field name. Fields are kept
/// in name order so repeated runs write identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateRecord(BTreeMap<String, AggregateValue>);

impl AggregateRecord {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets `field` to `value`, returning the previous value if any.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: AggregateValue,
    ) -> Option<AggregateValue> {
        self.0.insert(field.into(), value)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&AggregateValue> {
        self.0.get(field)
    }

    /// Copies every field of `other` into this record, overwriting fields
    /// that already exist.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }
}

impl FromIterator<(String, AggregateValue)> for AggregateRecord {
    fn from_iter<T: IntoIterator<Item = (String, AggregateValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inclusive range of H3 resolutions to aggregate at.
///
/// Written in configuration as a two-element array, e.g.
/// `resolutions = [7, 9]`. Bounds are validated against the H3 library by
/// the grid engine, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 2]", into = "[u8; 2]")]
pub struct ResolutionRange {
    min: u8,
    max: u8,
}

impl ResolutionRange {
    #[must_use]
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// A range containing a single resolution.
    #[must_use]
    pub const fn single(resolution: u8) -> Self {
        Self::new(resolution, resolution)
    }

    #[must_use]
    pub const fn min(&self) -> u8 {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> u8 {
        self.max
    }

    /// Iterates resolutions from coarsest to finest.
    pub fn levels(&self) -> impl Iterator<Item = u8> {
        self.min..=self.max
    }
}

impl From<[u8; 2]> for ResolutionRange {
    fn from([min, max]: [u8; 2]) -> Self {
        Self::new(min, max)
    }
}

impl From<ResolutionRange> for [u8; 2] {
    fn from(range: ResolutionRange) -> Self {
        [range.min, range.max]
    }
}

impl fmt::Display for ResolutionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_kinds() {
        assert_eq!(FieldValue::Scalar(1.0).kind(), FieldKind::Scalar);
        assert_eq!(FieldValue::Series(vec![1.0]).kind(), FieldKind::Series);
        assert_eq!(
            FieldValue::Category("Urban".to_string()).kind(),
            FieldKind::Category
        );
    }

    #[test]
    fn field_value_deserializes_by_shape() {
        let payload: Payload =
            serde_json::from_str(r#"{"a": 3, "b": [1, 2.5], "c": "Native"}"#).unwrap();
        assert_eq!(payload["a"], FieldValue::Scalar(3.0));
        assert_eq!(payload["b"], FieldValue::Series(vec![1.0, 2.5]));
        assert_eq!(payload["c"], FieldValue::Category("Native".to_string()));
    }

    #[test]
    fn aggregate_record_serializes_flat() {
        let mut record = AggregateRecord::new();
        record.insert("Groundwater", AggregateValue::Series(vec![2.0, 3.0]));
        record.insert(ELEVATION_FIELD, AggregateValue::Scalar(12.5));
        record.insert(
            "LandUse",
            AggregateValue::Ranked(vec!["Urban".to_string(), "Crops".to_string()]),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"Elevation":12.5,"Groundwater":[2.0,3.0],"LandUse":["Urban","Crops"]}"#
        );

        let back: AggregateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn merge_overwrites_existing_fields() {
        let mut base: AggregateRecord = [
            ("a".to_string(), AggregateValue::Scalar(1.0)),
            ("b".to_string(), AggregateValue::Scalar(2.0)),
        ]
        .into_iter()
        .collect();
        let overlay: AggregateRecord = [("b".to_string(), AggregateValue::Scalar(5.0))]
            .into_iter()
            .collect();

        base.merge(overlay);

        assert_eq!(base.len(), 2);
        assert_eq!(base.get("b").and_then(AggregateValue::as_scalar), Some(5.0));
    }

    #[test]
    fn resolution_range_levels_are_inclusive() {
        let range: ResolutionRange = serde_json::from_str("[7, 9]").unwrap();
        assert_eq!(range.levels().collect::<Vec<_>>(), vec![7, 8, 9]);
        assert_eq!(ResolutionRange::single(5).levels().count(), 1);
        assert_eq!(serde_json::to_string(&range).unwrap(), "[7,9]");
    }
}
