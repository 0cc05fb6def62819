//! Reducers that collapse the payloads of one hex cell into an
//! [`AggregateRecord`].
//!
//! Every reducer sums left to right in bin order and divides once, so the
//! same bin always produces bit-identical output.

use std::collections::BTreeMap;

use geohex_grid_models::{AggregateRecord, AggregateValue, FieldKind, FieldValue, Payload};
use thiserror::Error;

/// Errors raised when payloads don't match what a reducer was configured
/// for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// A payload lacks the field being reduced.
    #[error("Field '{field}' is missing from a payload")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A payload holds the field with a different shape.
    #[error("Field '{field}' holds a {found} value, expected {expected}")]
    FieldType {
        /// Field name.
        field: String,
        /// Kind the reducer expects.
        expected: FieldKind,
        /// Kind found in the payload.
        found: FieldKind,
    },

    /// Series values in one cell have different lengths.
    #[error("Field '{field}' has series length {found}, expected {expected}")]
    LengthMismatch {
        /// Field name.
        field: String,
        /// Length of the first series in the cell.
        expected: usize,
        /// Length of the offending series.
        found: usize,
    },
}

/// Collapses the payloads of one cell into a record.
///
/// Implementations receive the payload of every sample in the cell, in bin
/// order, including repeats of the same feature.
pub trait Reducer {
    /// Reduces `payloads` into one record.
    ///
    /// # Errors
    ///
    /// Returns a [`ReduceError`] if a payload does not fit the reducer's
    /// configuration.
    fn reduce(&self, payloads: &[&Payload]) -> Result<AggregateRecord, ReduceError>;
}

/// Arithmetic mean, or `0` for no values.
#[must_use]
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let count = count as f64;
        sum / count
    }
}

/// Element-wise mean of equal-length series.
///
/// # Errors
///
/// Returns [`ReduceError::LengthMismatch`] if any series differs in length
/// from the first one.
pub fn series_mean(field: &str, series: &[&[f64]]) -> Result<Vec<f64>, ReduceError> {
    let Some(first) = series.first() else {
        return Ok(Vec::new());
    };

    if let Some(mismatch) = series.iter().find(|s| s.len() != first.len()) {
        return Err(ReduceError::LengthMismatch {
            field: field.to_string(),
            expected: first.len(),
            found: mismatch.len(),
        });
    }

    Ok((0..first.len())
        .map(|j| mean(series.iter().map(|s| s[j])))
        .collect())
}

/// Distinct labels ordered by descending count. Ties keep first-seen
/// order.
#[must_use]
pub fn rank_categories<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for label in labels {
        match positions.get(label) {
            Some(&position) => counts[position].1 += 1,
            None => {
                positions.insert(label, counts.len());
                counts.push((label, 1));
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(label, _)| label.to_string())
        .collect()
}

/// Reduces a single payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldReducer {
    /// Element-wise mean of a [`FieldKind::Series`] field.
    SeriesMean {
        /// Field name.
        field: String,
    },
    /// Mean of a [`FieldKind::Scalar`] field.
    ScalarMean {
        /// Field name.
        field: String,
    },
    /// Frequency ranking of a [`FieldKind::Category`] field.
    CategoryRank {
        /// Field name.
        field: String,
    },
}

impl FieldReducer {
    /// The default reducer for a field of the given kind.
    #[must_use]
    pub fn for_kind(kind: FieldKind, field: impl Into<String>) -> Self {
        let field = field.into();
        match kind {
            FieldKind::Series => Self::SeriesMean { field },
            FieldKind::Scalar => Self::ScalarMean { field },
            FieldKind::Category => Self::CategoryRank { field },
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::SeriesMean { field }
            | Self::ScalarMean { field }
            | Self::CategoryRank { field } => field,
        }
    }

    /// The payload kind this reducer accepts.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::SeriesMean { .. } => FieldKind::Series,
            Self::ScalarMean { .. } => FieldKind::Scalar,
            Self::CategoryRank { .. } => FieldKind::Category,
        }
    }

    /// Looks up this reducer's field in every payload, checking its kind.
    fn values<'a>(
        &self,
        payloads: &[&'a Payload],
    ) -> Result<Vec<&'a FieldValue>, ReduceError> {
        let field = self.field();
        let expected = self.kind();

        payloads
            .iter()
            .map(|&payload| {
                let value = payload
                    .get(field)
                    .ok_or_else(|| ReduceError::MissingField {
                        field: field.to_string(),
                    })?;

                if value.kind() == expected {
                    Ok(value)
                } else {
                    Err(ReduceError::FieldType {
                        field: field.to_string(),
                        expected,
                        found: value.kind(),
                    })
                }
            })
            .collect()
    }

    /// Reduces this reducer's field across `payloads`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReduceError`] if a payload is missing the field, holds a
    /// different kind, or (for series) has a different length.
    pub fn reduce_field(&self, payloads: &[&Payload]) -> Result<AggregateValue, ReduceError> {
        let values = self.values(payloads)?;

        Ok(match self {
            Self::SeriesMean { field } => {
                let series: Vec<&[f64]> =
                    values.iter().filter_map(|v| v.as_series()).collect();
                AggregateValue::Series(series_mean(field, &series)?)
            }
            Self::ScalarMean { .. } => {
                AggregateValue::Scalar(mean(values.iter().filter_map(|v| v.as_scalar())))
            }
            Self::CategoryRank { .. } => AggregateValue::Ranked(rank_categories(
                values.iter().filter_map(|v| v.as_category()),
            )),
        })
    }
}

impl Reducer for FieldReducer {
    fn reduce(&self, payloads: &[&Payload]) -> Result<AggregateRecord, ReduceError> {
        let mut record = AggregateRecord::new();
        record.insert(self.field(), self.reduce_field(payloads)?);
        Ok(record)
    }
}

/// Applies several field reducers independently and merges their output
/// into one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeReducer {
    reducers: Vec<FieldReducer>,
}

impl CompositeReducer {
    #[must_use]
    pub const fn new(reducers: Vec<FieldReducer>) -> Self {
        Self { reducers }
    }

    /// Builds a composite with the default reducer for each `(field, kind)`.
    #[must_use]
    pub fn from_fields<S: Into<String>>(
        fields: impl IntoIterator<Item = (S, FieldKind)>,
    ) -> Self {
        Self::new(
            fields
                .into_iter()
                .map(|(field, kind)| FieldReducer::for_kind(kind, field))
                .collect(),
        )
    }

    #[must_use]
    pub fn with(mut self, reducer: FieldReducer) -> Self {
        self.reducers.push(reducer);
        self
    }

    #[must_use]
    pub fn reducers(&self) -> &[FieldReducer] {
        &self.reducers
    }
}

impl Reducer for CompositeReducer {
    fn reduce(&self, payloads: &[&Payload]) -> Result<AggregateRecord, ReduceError> {
        let mut record = AggregateRecord::new();
        for reducer in &self.reducers {
            record.insert(reducer.field(), reducer.reduce_field(payloads)?);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(field: &str, value: FieldValue) -> Payload {
        [(field.to_string(), value)].into_iter().collect()
    }

    fn scalars(field: &str, values: &[f64]) -> Vec<Payload> {
        values
            .iter()
            .map(|&v| payload(field, FieldValue::Scalar(v)))
            .collect()
    }

    fn refs(payloads: &[Payload]) -> Vec<&Payload> {
        payloads.iter().collect()
    }

    #[test]
    fn scalar_mean() {
        let payloads = scalars("x", &[2.0, 4.0, 6.0]);
        let reducer = FieldReducer::ScalarMean {
            field: "x".to_string(),
        };

        let record = reducer.reduce(&refs(&payloads)).unwrap();
        assert_eq!(record.get("x"), Some(&AggregateValue::Scalar(4.0)));
    }

    #[test]
    fn scalar_mean_of_nothing_is_zero() {
        let reducer = FieldReducer::ScalarMean {
            field: "x".to_string(),
        };
        let record = reducer.reduce(&[]).unwrap();
        assert_eq!(record.get("x"), Some(&AggregateValue::Scalar(0.0)));
        assert!(mean(std::iter::empty()).abs() < f64::EPSILON);
    }

    #[test]
    fn series_mean_is_element_wise() {
        let payloads = vec![
            payload("a", FieldValue::Series(vec![1.0, 2.0])),
            payload("a", FieldValue::Series(vec![3.0, 4.0])),
        ];
        let reducer = FieldReducer::SeriesMean {
            field: "a".to_string(),
        };

        let record = reducer.reduce(&refs(&payloads)).unwrap();
        assert_eq!(record.get("a"), Some(&AggregateValue::Series(vec![2.0, 3.0])));
    }

    #[test]
    fn series_length_mismatch_fails() {
        let payloads = vec![
            payload("a", FieldValue::Series(vec![1.0, 2.0])),
            payload("a", FieldValue::Series(vec![3.0, 4.0, 5.0])),
        ];
        let reducer = FieldReducer::SeriesMean {
            field: "a".to_string(),
        };

        assert_eq!(
            reducer.reduce(&refs(&payloads)),
            Err(ReduceError::LengthMismatch {
                field: "a".to_string(),
                expected: 2,
                found: 3,
            })
        );
    }

    #[test]
    fn category_ranking_breaks_ties_by_first_seen() {
        let payloads: Vec<Payload> = ["A", "B", "A", "A", "C"]
            .iter()
            .map(|label| payload("LandUse", FieldValue::Category((*label).to_string())))
            .collect();
        let reducer = FieldReducer::CategoryRank {
            field: "LandUse".to_string(),
        };

        let record = reducer.reduce(&refs(&payloads)).unwrap();
        assert_eq!(
            record.get("LandUse").and_then(AggregateValue::as_ranked),
            Some(&["A".to_string(), "B".to_string(), "C".to_string()][..])
        );

        assert_eq!(rank_categories(["C", "B", "B", "C", "A"]), vec!["C", "B", "A"]);
    }

    #[test]
    fn missing_field_fails() {
        let payloads = vec![payload("x", FieldValue::Scalar(1.0)), Payload::new()];
        let reducer = FieldReducer::ScalarMean {
            field: "x".to_string(),
        };

        assert!(matches!(
            reducer.reduce(&refs(&payloads)),
            Err(ReduceError::MissingField { .. })
        ));
    }

    #[test]
    fn wrong_kind_fails() {
        let payloads = vec![payload("x", FieldValue::Category("high".to_string()))];
        let reducer = FieldReducer::ScalarMean {
            field: "x".to_string(),
        };

        assert_eq!(
            reducer.reduce(&refs(&payloads)),
            Err(ReduceError::FieldType {
                field: "x".to_string(),
                expected: FieldKind::Scalar,
                found: FieldKind::Category,
            })
        );
    }

    #[test]
    fn composite_combines_fields() {
        let payloads: Vec<Payload> = [(80.0, 1.5), (90.0, 2.5)]
            .iter()
            .map(|&(confidence, power)| {
                [
                    ("confidence".to_string(), FieldValue::Scalar(confidence)),
                    ("power".to_string(), FieldValue::Scalar(power)),
                    (
                        "Groundwater".to_string(),
                        FieldValue::Series(vec![confidence, power]),
                    ),
                ]
                .into_iter()
                .collect()
            })
            .collect();

        let reducer = CompositeReducer::from_fields([
            ("confidence", FieldKind::Scalar),
            ("power", FieldKind::Scalar),
        ])
        .with(FieldReducer::SeriesMean {
            field: "Groundwater".to_string(),
        });

        let record = reducer.reduce(&refs(&payloads)).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("confidence"), Some(&AggregateValue::Scalar(85.0)));
        assert_eq!(record.get("power"), Some(&AggregateValue::Scalar(2.0)));
        assert_eq!(
            record.get("Groundwater"),
            Some(&AggregateValue::Series(vec![85.0, 2.0]))
        );
    }

    #[test]
    fn field_reducer_config_shape() {
        let reducer = FieldReducer::for_kind(FieldKind::Category, "LandUse");
        assert_eq!(
            reducer,
            FieldReducer::CategoryRank {
                field: "LandUse".to_string()
            }
        );
        assert_eq!(reducer.kind(), FieldKind::Category);
    }
}
