use crate::error::MergeConflictError;
use crate::extraction::extractor::EntityRow;
use crate::extraction::header::EntityIdentity;
use crate::schema::{SchemaModel, TableSpec};
use crate::types::{EntityLevel, FieldValue};
use log::{debug, error, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// One entity of one table, merged from every source that contributed a row
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct EntityRecord {
    pub table: String,
    pub level: EntityLevel,
    pub key: String,
    pub identity: EntityIdentity,
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub sources: BTreeSet<String>,

    /// Rows merged in from a source other than the first one
    pub duplicate_sources: usize,

    /// Non-identifying fields where a later source disagreed with the kept value
    pub disagreements: usize,

    /// Names of the fields counted in `disagreements`
    pub disagreed_fields: BTreeSet<String>,
}

/// What happened to a row handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First row for this key
    Inserted,
    /// Merged into an existing entity
    Merged {
        new_source: bool,
        disagreements: usize,
    },
}

impl EntityRecord {
    fn from_row(row: EntityRow) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(row.source);
        Self {
            table: row.table,
            level: row.level,
            key: row.key,
            identity: row.identity,
            fields: row.fields,
            sources,
            duplicate_sources: 0,
            disagreements: 0,
            disagreed_fields: BTreeSet::new(),
        }
    }

    /// Value of a field, if present and not null
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }

    /// Merges a row with the same key
    ///
    /// The first non-null value seen for a field is kept. A different
    /// non-null value for a unique or required field is a conflict: the
    /// record is left untouched and the row is not merged. Other differing
    /// values are counted as disagreements and logged with both values.
    pub fn merge(
        &mut self,
        row: EntityRow,
        table: Option<&TableSpec>,
    ) -> Result<MergeOutcome, MergeConflictError> {
        let mut disagreements = 0;

        for (name, incoming) in &row.fields {
            let (Some(existing), Some(incoming)) = (self.get(name), incoming.as_ref()) else {
                continue;
            };
            if existing == incoming {
                continue;
            }

            let identifying = table
                .and_then(|t| t.field(name))
                .is_some_and(|f| f.is_identifying());
            if identifying {
                return Err(MergeConflictError {
                    table: self.table.clone(),
                    key: self.key.clone(),
                    field: name.clone(),
                    existing: existing.clone(),
                    existing_sources: self.sources.iter().cloned().collect(),
                    incoming: incoming.clone(),
                    incoming_source: row.source.clone(),
                });
            }
            warn!(
                "{}[{}]: {} keeps '{}' from {}, ignoring '{}' from {}",
                self.table,
                self.key,
                name,
                existing,
                self.sources.iter().cloned().collect::<Vec<_>>().join(", "),
                incoming,
                row.source
            );
            self.disagreed_fields.insert(name.clone());
            disagreements += 1;
        }

        for (name, incoming) in row.fields {
            let slot = self.fields.entry(name).or_insert(None);
            if slot.is_none() {
                *slot = incoming;
            }
        }

        fill_missing(&mut self.identity.patient, row.identity.patient);
        fill_missing(&mut self.identity.study, row.identity.study);
        fill_missing(&mut self.identity.series, row.identity.series);
        fill_missing(&mut self.identity.instance, row.identity.instance);

        let new_source = self.sources.insert(row.source);
        if new_source {
            self.duplicate_sources += 1;
        }
        self.disagreements += disagreements;

        Ok(MergeOutcome::Merged {
            new_source,
            disagreements,
        })
    }
}

fn fill_missing(slot: &mut Option<String>, incoming: Option<String>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

type EntityKey = (String, String);

/// Concurrent upsert point for extracted rows
///
/// Lookups take the map's read lock; only the first row of a new key takes
/// the write lock. Merging into an existing entity locks that entity alone.
pub struct EntityStore<'a> {
    schema: &'a SchemaModel,
    entries: RwLock<HashMap<EntityKey, Arc<Mutex<EntityRecord>>>>,
}

impl<'a> EntityStore<'a> {
    pub fn new(schema: &'a SchemaModel) -> Self {
        Self {
            schema,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a row or merges it into the entity with the same key
    pub fn upsert(&self, row: EntityRow) -> Result<MergeOutcome, MergeConflictError> {
        let key = (row.table.clone(), row.key.clone());

        let existing = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
                match entries.get(&key) {
                    Some(entry) => entry.clone(),
                    None => {
                        entries.insert(key, Arc::new(Mutex::new(EntityRecord::from_row(row))));
                        return Ok(MergeOutcome::Inserted);
                    }
                }
            }
        };

        let table = self.schema.table(&row.table);
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = record.merge(row, table);
        match &outcome {
            Ok(MergeOutcome::Merged {
                new_source: true,
                ..
            }) => debug!("{}[{}]: merged duplicate source", record.table, record.key),
            Err(e) => error!("{}", e),
            _ => {}
        }
        outcome
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freezes the store once every row has been upserted
    ///
    /// Consuming the store is the completion barrier: no further merges can
    /// happen once a snapshot exists.
    pub fn into_snapshot(self) -> EntitySnapshot {
        let order: HashMap<&str, usize> = self
            .schema
            .tables()
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let entries = self
            .entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut records: Vec<EntityRecord> = entries
            .into_values()
            .map(|entry| match Arc::try_unwrap(entry) {
                Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
                Err(shared) => shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            })
            .collect();

        records.sort_by(|a, b| {
            let pos_a = order.get(a.table.as_str()).copied().unwrap_or(usize::MAX);
            let pos_b = order.get(b.table.as_str()).copied().unwrap_or(usize::MAX);
            pos_a
                .cmp(&pos_b)
                .then_with(|| a.table.cmp(&b.table))
                .then_with(|| a.key.cmp(&b.key))
        });

        EntitySnapshot { records }
    }
}

/// Read-only view of every merged entity, in table order then key order
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    records: Vec<EntityRecord>,
}

impl EntitySnapshot {
    /// Merged rows of one table, ordered by key
    pub fn rows(&self, table: &str) -> Vec<&EntityRecord> {
        self.records.iter().filter(|r| r.table == table).collect()
    }

    pub fn record(&self, table: &str, key: &str) -> Option<&EntityRecord> {
        self.records
            .iter()
            .find(|r| r.table == table && r.key == key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total of rows merged in from additional sources
    pub fn duplicate_sources(&self) -> usize {
        self.records.iter().map(|r| r.duplicate_sources).sum()
    }

    /// Total of non-identifying disagreements resolved by first-seen
    pub fn disagreements(&self) -> usize {
        self.records.iter().map(|r| r.disagreements).sum()
    }

    /// Groups every series-level and image-level entity by series
    ///
    /// Images are attached through their series identity link; series
    /// without a series-level row still appear when images reference them.
    pub fn series_records(&self) -> Vec<AggregatedSeriesRecord> {
        let mut series: BTreeMap<&str, AggregatedSeriesRecord> = BTreeMap::new();
        let mut images: BTreeMap<&str, BTreeMap<&str, ImageAttributes>> = BTreeMap::new();

        for record in &self.records {
            let series_uid = match record.level {
                EntityLevel::Series => record.key.as_str(),
                EntityLevel::Image => match record.identity.series.as_deref() {
                    Some(uid) => uid,
                    None => continue,
                },
                _ => continue,
            };

            let aggregated = series
                .entry(series_uid)
                .or_insert_with(|| AggregatedSeriesRecord::new(series_uid));
            if aggregated.study_uid.is_none() {
                aggregated.study_uid = record.identity.study.clone();
            }

            if record.level == EntityLevel::Series {
                absorb(&mut aggregated.series_fields, record);
            } else {
                let image = images
                    .entry(series_uid)
                    .or_default()
                    .entry(record.key.as_str())
                    .or_insert_with(|| ImageAttributes {
                        instance_uid: record.key.clone(),
                        fields: BTreeMap::new(),
                    });
                absorb(&mut image.fields, record);
            }
        }

        series
            .into_iter()
            .map(|(uid, mut aggregated)| {
                if let Some(series_images) = images.remove(uid) {
                    aggregated.images = series_images.into_values().collect();
                }
                aggregated
            })
            .collect()
    }
}

fn absorb(target: &mut BTreeMap<String, FieldValue>, record: &EntityRecord) {
    for (name, value) in &record.fields {
        if let Some(value) = value {
            target.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// Union of every image-level row of one instance
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttributes {
    pub instance_uid: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl ImageAttributes {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Everything known about one series, built from a completed snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeriesRecord {
    pub series_uid: String,
    pub study_uid: Option<String>,
    /// Non-null fields of every series-level table
    pub series_fields: BTreeMap<String, FieldValue>,
    /// Images ordered by SOP instance UID
    pub images: Vec<ImageAttributes>,
}

impl AggregatedSeriesRecord {
    pub fn new(series_uid: impl Into<String>) -> Self {
        Self {
            series_uid: series_uid.into(),
            study_uid: None,
            series_fields: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    pub fn series_value(&self, field: &str) -> Option<&FieldValue> {
        self.series_fields.get(field)
    }

    /// Values of an image-level field across images, in image order
    pub fn image_values<'r>(&'r self, field: &'r str) -> impl Iterator<Item = &'r FieldValue> + 'r {
        self.images.iter().filter_map(move |image| image.get(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::extractor::tests::philips_header;
    use crate::extraction::extractor::AttributeExtractor;
    use crate::extraction::tags::{SERIES_DESCRIPTION, SOP_INSTANCE_UID};
    use rayon::prelude::*;

    fn rows_of(header: &crate::extraction::HeaderRecord) -> Vec<EntityRow> {
        let schema = SchemaModel::builtin().unwrap();
        AttributeExtractor::new(schema).extract_source(header).rows
    }

    fn series_row(source: &str, description: Option<&str>) -> EntityRow {
        let mut fields = BTreeMap::new();
        fields.insert(
            "SeriesInstanceUid".to_string(),
            Some(FieldValue::Text("1.2.3".to_string())),
        );
        fields.insert(
            "SeriesDescription".to_string(),
            description.map(|d| FieldValue::Text(d.to_string())),
        );
        EntityRow {
            table: "Series".to_string(),
            level: EntityLevel::Series,
            key: "1.2.3".to_string(),
            identity: EntityIdentity::default(),
            fields,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_merge_same_row_twice_is_idempotent() {
        let schema = SchemaModel::builtin().unwrap();
        let row = series_row("a.dcm", Some("T2 TSE"));

        let once = EntityStore::new(schema);
        once.upsert(row.clone()).unwrap();
        let twice = EntityStore::new(schema);
        twice.upsert(row.clone()).unwrap();
        let outcome = twice.upsert(row).unwrap();

        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                new_source: false,
                disagreements: 0
            }
        );
        assert_eq!(
            once.into_snapshot().rows("Series"),
            twice.into_snapshot().rows("Series")
        );
    }

    #[test]
    fn test_null_then_value_keeps_value() {
        let schema = SchemaModel::builtin().unwrap();
        let store = EntityStore::new(schema);
        store.upsert(series_row("a.dcm", None)).unwrap();
        let outcome = store.upsert(series_row("b.dcm", Some("DWI"))).unwrap();
        store.upsert(series_row("c.dcm", None)).unwrap();

        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                new_source: true,
                disagreements: 0
            }
        );
        let snapshot = store.into_snapshot();
        let record = snapshot.record("Series", "1.2.3").unwrap();
        assert_eq!(
            record.get("SeriesDescription"),
            Some(&FieldValue::Text("DWI".to_string()))
        );
        assert_eq!(record.sources.len(), 3);
        assert_eq!(record.duplicate_sources, 2);
    }

    #[test]
    fn test_non_identifying_disagreement_keeps_first() {
        let schema = SchemaModel::builtin().unwrap();
        let store = EntityStore::new(schema);
        store.upsert(series_row("a.dcm", Some("first"))).unwrap();
        let outcome = store.upsert(series_row("b.dcm", Some("second"))).unwrap();

        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                new_source: true,
                disagreements: 1
            }
        );
        let snapshot = store.into_snapshot();
        assert_eq!(
            snapshot
                .record("Series", "1.2.3")
                .and_then(|r| r.get("SeriesDescription")),
            Some(&FieldValue::Text("first".to_string()))
        );
        assert_eq!(snapshot.disagreements(), 1);
        assert_eq!(
            snapshot
                .record("Series", "1.2.3")
                .map(|r| r.disagreed_fields.iter().cloned().collect::<Vec<_>>()),
            Some(vec!["SeriesDescription".to_string()])
        );
    }

    #[test]
    fn test_conflict_on_unique_field() {
        let schema = SchemaModel::builtin().unwrap();
        let store = EntityStore::new(schema);
        store.upsert(series_row("a.dcm", Some("T1"))).unwrap();

        let mut conflicting = series_row("b.dcm", Some("T2"));
        conflicting.fields.insert(
            "SeriesInstanceUid".to_string(),
            Some(FieldValue::Text("9.9.9".to_string())),
        );
        let err = store.upsert(conflicting).unwrap_err();

        assert_eq!(err.field, "SeriesInstanceUid");
        assert_eq!(err.existing, FieldValue::Text("1.2.3".to_string()));
        assert_eq!(err.incoming, FieldValue::Text("9.9.9".to_string()));
        assert_eq!(err.existing_sources, vec!["a.dcm".to_string()]);
        assert_eq!(err.incoming_source, "b.dcm");

        // The conflicting row was not merged
        let snapshot = store.into_snapshot();
        let record = snapshot.record("Series", "1.2.3").unwrap();
        assert_eq!(record.sources.len(), 1);
        assert_eq!(
            record.get("SeriesDescription"),
            Some(&FieldValue::Text("T1".to_string()))
        );
    }

    #[test]
    fn test_concurrent_upserts() {
        let schema = SchemaModel::builtin().unwrap();
        let headers: Vec<_> = (0..32)
            .map(|i| philips_header(&format!("{}.dcm", i), &format!("1.2.840.1.1.{}", i % 8)))
            .collect();

        let store = EntityStore::new(schema);
        headers.par_iter().for_each(|header| {
            for row in rows_of(header) {
                store.upsert(row).unwrap();
            }
        });

        let snapshot = store.into_snapshot();
        assert_eq!(snapshot.rows("Patient").len(), 1);
        assert_eq!(snapshot.rows("Series").len(), 1);
        assert_eq!(snapshot.rows("Image").len(), 8);
        assert_eq!(snapshot.rows("Patient")[0].sources.len(), 32);
    }

    #[test]
    fn test_series_records_union_image_tables() {
        let schema = SchemaModel::builtin().unwrap();
        let store = EntityStore::new(schema);
        for header in [
            philips_header("b.dcm", "1.2.840.1.1.2"),
            philips_header("a.dcm", "1.2.840.1.1.1").with(SERIES_DESCRIPTION, "T1 FFE"),
        ] {
            for row in rows_of(&header) {
                store.upsert(row).unwrap();
            }
        }

        let records = store.into_snapshot().series_records();
        assert_eq!(records.len(), 1);

        let series = &records[0];
        assert_eq!(series.series_uid, "1.2.840.1.1");
        assert_eq!(series.study_uid.as_deref(), Some("1.2.840.1"));
        assert_eq!(series.series_value("SeriesNumber"), Some(&FieldValue::Integer(301)));

        let uids: Vec<&str> = series.images.iter().map(|i| i.instance_uid.as_str()).collect();
        assert_eq!(uids, vec!["1.2.840.1.1.1", "1.2.840.1.1.2"]);

        // Image, MRIImage and MRIImagePhilips fields on one instance
        let image = &series.images[0];
        assert!(image.get("ImageType").is_some());
        assert!(image.get("RepetitionTime").is_some());
        assert!(image.get("AcquisitionContrast").is_some());
        assert_eq!(series.image_values("AcquisitionContrast").count(), 2);
    }

    #[test]
    fn test_image_without_series_row_still_grouped() {
        let schema = SchemaModel::builtin().unwrap();
        let store = EntityStore::new(schema);
        let header = philips_header("a.dcm", "1.2.840.1.1.1");
        for row in rows_of(&header).into_iter().filter(|r| r.table != "Series") {
            store.upsert(row).unwrap();
        }

        let records = store.into_snapshot().series_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].series_fields.is_empty());
        assert_eq!(records[0].images.len(), 1);
        assert_eq!(
            records[0].images[0].instance_uid,
            header.get(SOP_INSTANCE_UID).unwrap()
        );
    }
}
