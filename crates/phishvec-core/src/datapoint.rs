use std::collections::HashMap;

use phishvec_schema::EmailRecord;
use phishvec_store::VectorPoint;
use serde::Serialize;
use serde::ser::Error as _;
use uuid::Uuid;

use crate::error::DatapointError;
use crate::orchestrator::EmbeddedUnit;

/// Metadata stored next to each vector. Stores reject null values, so an
/// absent label is written as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatapointMetadata {
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub body: String,
    pub urls: Vec<String>,
    pub label: String,
    pub dataset: String,
    pub chunk_index: usize,
}

impl DatapointMetadata {
    #[must_use]
    pub fn from_record(record: &EmailRecord, chunk_index: usize) -> Self {
        Self {
            sender: record.sender.clone(),
            receiver: record.receiver.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            urls: record.urls.clone(),
            label: record.label_or_empty().to_owned(),
            dataset: record.dataset.clone(),
            chunk_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: DatapointMetadata,
}

impl Datapoint {
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Convert to the store-facing point, flattening metadata into a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be encoded as a JSON object.
    pub fn into_point(self) -> Result<VectorPoint, serde_json::Error> {
        let serde_json::Value::Object(map) = serde_json::to_value(&self.metadata)? else {
            return Err(serde_json::Error::custom("metadata is not a JSON object"));
        };
        Ok(VectorPoint {
            id: self.id,
            vector: self.values,
            payload: map.into_iter().collect::<HashMap<_, _>>(),
        })
    }
}

/// One datapoint per embedded unit, joined to its record through `record_index`.
///
/// # Errors
///
/// Returns [`DatapointError::DanglingUnit`] if a unit points past `records`.
pub fn build_datapoints(
    records: &[EmailRecord],
    units: Vec<EmbeddedUnit>,
) -> Result<Vec<Datapoint>, DatapointError> {
    units
        .into_iter()
        .map(|unit| {
            let record = records
                .get(unit.record_index)
                .ok_or(DatapointError::DanglingUnit {
                    record_index: unit.record_index,
                    records: records.len(),
                })?;
            Ok(Datapoint {
                id: Uuid::new_v4().to_string(),
                values: unit.vector,
                metadata: DatapointMetadata::from_record(record, unit.chunk_index),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn record(subject: &str, label: Option<&str>) -> EmailRecord {
        EmailRecord {
            sender: "a@example.com".into(),
            receiver: "b@example.com".into(),
            subject: subject.into(),
            body: format!("body of {subject}"),
            urls: vec!["http://example.com".into()],
            label: label.map(str::to_owned),
            dataset: "generic".into(),
        }
    }

    fn unit(record_index: usize, chunk_index: usize) -> EmbeddedUnit {
        EmbeddedUnit {
            record_index,
            chunk_index,
            vector: vec![0.5; 4],
        }
    }

    #[test]
    fn metadata_comes_from_referenced_record() {
        let records = vec![record("first", Some("spam")), record("second", None)];
        let points = build_datapoints(&records, vec![unit(1, 0), unit(0, 2)]).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metadata.subject, "second");
        assert_eq!(points[0].metadata.label, "");
        assert_eq!(points[1].metadata.subject, "first");
        assert_eq!(points[1].metadata.label, "spam");
        assert_eq!(points[1].metadata.chunk_index, 2);
    }

    #[test]
    fn ids_are_distinct_uuids() {
        let records = vec![record("one", None)];
        let units = (0..50).map(|i| unit(0, i)).collect();
        let points = build_datapoints(&records, units).unwrap();
        let ids: HashSet<_> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 50);
        assert!(points.iter().all(|p| Uuid::parse_str(&p.id).is_ok()));
    }

    #[test]
    fn dangling_unit_is_an_error() {
        let records = vec![record("only", None)];
        let err = build_datapoints(&records, vec![unit(0, 0), unit(3, 0)]).unwrap_err();
        assert!(matches!(
            err,
            DatapointError::DanglingUnit {
                record_index: 3,
                records: 1
            }
        ));
    }

    #[test]
    fn no_units_no_datapoints() {
        assert!(build_datapoints(&[record("x", None)], Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn point_payload_has_no_nulls() {
        let records = vec![record("subject", None)];
        let point = build_datapoints(&records, vec![unit(0, 0)])
            .unwrap()
            .remove(0)
            .into_point()
            .unwrap();

        assert_eq!(point.vector.len(), 4);
        assert_eq!(point.payload["label"], serde_json::json!(""));
        assert_eq!(point.payload["subject"], serde_json::json!("subject"));
        assert_eq!(point.payload["urls"], serde_json::json!(["http://example.com"]));
        assert_eq!(point.payload["chunk_index"], serde_json::json!(0));
        assert!(point.payload.values().all(|v| !v.is_null()));
    }
}
