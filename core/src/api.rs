use crate::classification::ClassificationEngine;
use crate::error::{DcmwError, MergeConflictError, Result, RowValidationError};
use crate::extraction::{
    AggregatedSeriesRecord, AttributeExtractor, EntitySnapshot, EntityStore, HeaderRecord,
    VendorResolver,
};
use crate::protocol::{aggregate, StudyProtocolSignature};
use crate::schema::SchemaModel;
use crate::types::{FieldValue, ModalityClassification, PipelineConfig, UnclassifiableReason, Vendor};
use crate::extraction::tags::PIXEL_DATA;
use dicom_object::OpenFileOptions;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

const MANUFACTURER_FIELD: &str = "Manufacturer";

/// Extraction, classification and protocol aggregation in one call
///
/// Sources are extracted in parallel into a shared entity store. Once every
/// source is merged the store is frozen into a snapshot, series are
/// classified in parallel and each study is aggregated into its protocol
/// signature.
///
/// # Example
///
/// ```
/// use dcmw_core::extraction::HeaderRecord;
/// use dcmw_core::{ModalityCategory, Pipeline, PipelineConfig};
/// use dicom_core::Tag;
///
/// let header = HeaderRecord::new("t2.dcm")
///     .with(Tag(0x0010, 0x0020), "P001")
///     .with(Tag(0x0020, 0x000D), "1.2.840.1")
///     .with(Tag(0x0020, 0x000E), "1.2.840.1.2")
///     .with(Tag(0x0008, 0x0018), "1.2.840.1.2.1")
///     .with(Tag(0x0008, 0x0070), "SIEMENS")
///     .with(Tag(0x0008, 0x0008), "ORIGINAL\\PRIMARY\\M\\NORM\\DIS2D")
///     .with(Tag(0x0018, 0x0024), "*tse2d1_17");
///
/// let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
/// let output = pipeline.run(&[header]).unwrap();
///
/// let classification = output.classification("1.2.840.1.2").unwrap();
/// assert_eq!(classification.category(), Some(ModalityCategory::T2W));
///
/// let signature = output.signature("1.2.840.1").unwrap();
/// assert!(!signature.complete);
/// assert_eq!(output.report.processed_sources, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline<'s> {
    schema: &'s SchemaModel,
    config: PipelineConfig,
}

impl Pipeline<'static> {
    /// Pipeline over the table definitions shipped with the crate
    pub fn builtin(config: PipelineConfig) -> Result<Self> {
        Ok(Self::new(SchemaModel::builtin()?, config))
    }
}

impl<'s> Pipeline<'s> {
    pub fn new(schema: &'s SchemaModel, config: PipelineConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &'s SchemaModel {
        self.schema
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline over parsed headers
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be started. Per-source
    /// failures are collected in the [`RunReport`].
    pub fn run(&self, headers: &[HeaderRecord]) -> Result<PipelineOutput> {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        DcmwError::Config(format!("could not start {} worker threads: {}", threads, e))
                    })?;
                Ok(pool.install(|| self.execute(headers)))
            }
            None => Ok(self.execute(headers)),
        }
    }

    /// Reads the headers of DICOM files and runs the pipeline over them
    ///
    /// Unreadable files are logged and counted as skipped.
    pub fn run_files<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Result<PipelineOutput> {
        let headers: Vec<HeaderRecord> = paths
            .par_iter()
            .filter_map(|path| match read_header(path.as_ref()) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!("Skipping {}: {}", path.as_ref().display(), e);
                    None
                }
            })
            .collect();

        let mut output = self.run(&headers)?;
        output.report.skipped_sources = paths.len() - headers.len();
        Ok(output)
    }

    fn execute(&self, headers: &[HeaderRecord]) -> PipelineOutput {
        let extractor = AttributeExtractor::new(self.schema);
        let store = EntityStore::new(self.schema);

        let sources: Vec<SourceSummary> = headers
            .par_iter()
            .map(|header| {
                let mut extraction = extractor.extract_source(header);
                let conflicts = std::mem::take(&mut extraction.rows)
                    .into_iter()
                    .filter_map(|row| store.upsert(row).err())
                    .collect();
                SourceSummary {
                    rejections: extraction.rejections,
                    field_warnings: extraction.warnings.len(),
                    conflicts,
                }
            })
            .collect();

        let snapshot = store.into_snapshot();
        let mut report = RunReport {
            processed_sources: headers.len(),
            duplicate_sources: snapshot.duplicate_sources(),
            disagreements: snapshot.disagreements(),
            ..Default::default()
        };
        for source in sources {
            report.rejections.extend(source.rejections);
            report.conflicts.extend(source.conflicts);
            report.field_warnings += source.field_warnings;
        }
        info!(
            "Extracted {} sources into {} entities",
            report.processed_sources,
            snapshot.len()
        );

        let classifications: BTreeMap<String, ModalityClassification> = snapshot
            .series_records()
            .par_iter()
            .map(|record| {
                let classification = ClassificationEngine::classify(record, series_vendor(record));
                (classification.series_uid.clone(), classification)
            })
            .collect();

        for classification in classifications.values() {
            if let Some(reason) = classification.unclassifiable_reason() {
                debug!(
                    "Series {} ({}) unclassifiable: {}",
                    classification.series_uid,
                    describe(classification),
                    reason
                );
                report
                    .unclassifiable
                    .push((classification.series_uid.clone(), reason.clone()));
            }
        }

        let signatures = self.aggregate_studies(&classifications);
        info!(
            "Classified {} series in {} studies, {} unclassifiable",
            classifications.len(),
            signatures.len(),
            report.unclassifiable.len()
        );

        PipelineOutput {
            snapshot,
            classifications,
            signatures,
            report,
        }
    }

    fn aggregate_studies(
        &self,
        classifications: &BTreeMap<String, ModalityClassification>,
    ) -> BTreeMap<String, StudyProtocolSignature> {
        let mut studies: BTreeMap<&str, Vec<ModalityClassification>> = BTreeMap::new();
        for classification in classifications.values() {
            if classification.study_uid.is_empty() {
                warn!(
                    "Series {} has no study and is left out of protocol aggregation",
                    classification.series_uid
                );
                continue;
            }
            studies
                .entry(classification.study_uid.as_str())
                .or_default()
                .push(classification.clone());
        }

        let template = &self.config.template;
        studies
            .into_par_iter()
            .map(|(study_uid, series)| {
                let signature = aggregate(study_uid, &series, template);
                (study_uid.to_string(), signature)
            })
            .collect()
    }
}

/// Reads the header of a DICOM file, keyed by its path
///
/// Parsing stops at the pixel data, so damaged pixel data does not
/// reject an intact header.
pub fn read_header(path: &Path) -> Result<HeaderRecord> {
    let dcm = OpenFileOptions::new().read_until(PIXEL_DATA).open_file(path)?;
    Ok(HeaderRecord::from_dicom(path.display().to_string(), &dcm))
}

/// Vendor of a series from its Manufacturer attribute
fn series_vendor(record: &AggregatedSeriesRecord) -> Vendor {
    record
        .series_value(MANUFACTURER_FIELD)
        .and_then(FieldValue::as_text)
        .map(VendorResolver::from_manufacturer)
        .unwrap_or_default()
}

fn describe(classification: &ModalityClassification) -> &str {
    classification
        .series_description
        .as_deref()
        .unwrap_or("no description")
}

struct SourceSummary {
    rejections: Vec<RowValidationError>,
    field_warnings: usize,
    conflicts: Vec<MergeConflictError>,
}

/// Counters and failures collected during a run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Headers handed to the extractor
    pub processed_sources: usize,

    /// Files that could not be read as DICOM
    pub skipped_sources: usize,

    /// Rows rejected for one (source, table) pair
    pub rejections: Vec<RowValidationError>,

    /// Rows not merged because of a unique or required field conflict
    pub conflicts: Vec<MergeConflictError>,

    /// Fields stored as null after a failed coercion
    pub field_warnings: usize,

    /// Rows merged into an entity already seen from another source
    pub duplicate_sources: usize,

    /// Non-identifying values dropped in favour of the first value seen
    pub disagreements: usize,

    /// Series UID and reason of each unclassifiable series
    pub unclassifiable: Vec<(String, UnclassifiableReason)>,
}

impl RunReport {
    /// Unclassifiable series counted per reason message
    pub fn unclassifiable_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for (_, reason) in &self.unclassifiable {
            *counts.entry(reason.message()).or_insert(0) += 1;
        }
        counts
    }
}

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Merged entities, ready for persistence
    pub snapshot: EntitySnapshot,

    /// Classification per series UID
    pub classifications: BTreeMap<String, ModalityClassification>,

    /// Protocol signature per study UID
    pub signatures: BTreeMap<String, StudyProtocolSignature>,

    pub report: RunReport,
}

impl PipelineOutput {
    pub fn classification(&self, series_uid: &str) -> Option<&ModalityClassification> {
        self.classifications.get(series_uid)
    }

    pub fn signature(&self, study_uid: &str) -> Option<&StudyProtocolSignature> {
        self.signatures.get(study_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::extractor::tests::philips_header;
    use crate::extraction::tags::*;
    use crate::types::{ModalityCategory, Subtype};
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

    /// Writes a Siemens T2 image with `pixel_bytes` of pixel data
    fn write_siemens_t2(path: &Path, pixel_bytes: usize) {
        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(PATIENT_ID, VR::LO, PrimitiveValue::from("P001")),
            DataElement::new(STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.840.7")),
            DataElement::new(SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.840.7.1")),
            DataElement::new(SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.840.7.1.1")),
            DataElement::new(MANUFACTURER, VR::LO, PrimitiveValue::from("SIEMENS")),
            DataElement::new(
                IMAGE_TYPE,
                VR::CS,
                PrimitiveValue::Strs(
                    vec![
                        "ORIGINAL".to_string(),
                        "PRIMARY".to_string(),
                        "M".to_string(),
                        "NORM".to_string(),
                        "DIS2D".to_string(),
                    ]
                    .into(),
                ),
            ),
            DataElement::new(SEQUENCE_NAME, VR::SH, PrimitiveValue::from("*tse2d1_17")),
            DataElement::new(
                PIXEL_DATA,
                VR::OB,
                PrimitiveValue::U8(vec![0u8; pixel_bytes].into()),
            ),
        ]);
        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.4")
                    .media_storage_sop_instance_uid("1.2.840.7.1.1"),
            )
            .unwrap();
        file.write_to_file(path).unwrap();
    }

    /// Philips image of another series in the same study
    fn philips_series(series: &str, instance: &str, contrast: &str, image_type: &str) -> HeaderRecord {
        let mut header = philips_header(&format!("{}.dcm", instance), instance);
        header.insert(SERIES_INSTANCE_UID, series);
        header.insert(IMAGE_TYPE, image_type);
        header.insert_nested(PHILIPS_MR_SEQUENCE, ACQUISITION_CONTRAST, contrast);
        header
    }

    fn full_study() -> Vec<HeaderRecord> {
        let ffe = "ORIGINAL\\PRIMARY\\M_FFE\\M\\FFE";
        let mut headers = Vec::new();

        // Pre and post contrast T1
        for (series, time) in [("1.2.840.1.1", "082000"), ("1.2.840.1.3", "083000")] {
            let mut header = philips_series(series, &format!("{}.1", series), "T1", ffe);
            header.insert(ACQUISITION_TIME, time);
            headers.push(header);
        }

        // Ultrafast dynamic: one instance per phase, 5s apart
        for (i, time) in ["082500", "082505", "082510"].iter().enumerate() {
            let mut header =
                philips_series("1.2.840.1.2", &format!("1.2.840.1.2.{}", i), "T1", ffe);
            header.insert(ACQUISITION_TIME, *time);
            headers.push(header);
        }

        headers.push(philips_series(
            "1.2.840.1.4",
            "1.2.840.1.4.1",
            "T2",
            "ORIGINAL\\PRIMARY\\M_SE\\M\\SE",
        ));

        for (i, b) in ["0", "800"].iter().enumerate() {
            let mut header = philips_series(
                "1.2.840.1.5",
                &format!("1.2.840.1.5.{}", i),
                "DIFFUSION",
                "ORIGINAL\\PRIMARY\\DIFFUSION\\NONE",
            );
            header.insert_nested(MR_DIFFUSION_SEQUENCE, DIFFUSION_B_VALUE, *b);
            headers.push(header);
        }

        headers
    }

    #[test]
    fn test_full_study_end_to_end() {
        let pipeline = Pipeline::builtin(PipelineConfig::default().with_threads(2)).unwrap();
        let output = pipeline.run(&full_study()).unwrap();

        assert_eq!(output.report.processed_sources, 8);
        assert!(output.report.rejections.is_empty());
        assert!(output.report.conflicts.is_empty());
        assert!(output.report.unclassifiable.is_empty());

        let ultrafast = output.classification("1.2.840.1.2").unwrap();
        assert_eq!(ultrafast.timeseries(), Some("ultrafast"));

        let dwi = output.classification("1.2.840.1.5").unwrap();
        assert_eq!(dwi.category(), Some(ModalityCategory::Diffusion));
        assert_eq!(dwi.subtype(), Some(Subtype::Dwi));

        let signature = output.signature("1.2.840.1").unwrap();
        assert!(signature.complete, "{}", signature.description);
        assert_eq!(signature.description, "Full protocol");
        assert_eq!(
            signature
                .entry("1.2.840.1.3")
                .and_then(|e| e.contrast_phase.as_deref()),
            Some("post-contrast_1")
        );
    }

    #[test]
    fn test_run_is_deterministic() {
        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let mut headers = full_study();
        let forward = pipeline.run(&headers).unwrap();
        headers.reverse();
        let reversed = pipeline.run(&headers).unwrap();

        assert_eq!(forward.classifications, reversed.classifications);
        assert_eq!(forward.signatures, reversed.signatures);
    }

    #[test]
    fn test_missing_t2_makes_protocol_incomplete() {
        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let headers: Vec<HeaderRecord> = full_study()
            .into_iter()
            .filter(|h| h.get(SERIES_INSTANCE_UID) != Some("1.2.840.1.4"))
            .collect();

        let output = pipeline.run(&headers).unwrap();
        let signature = output.signature("1.2.840.1").unwrap();

        assert!(!signature.complete);
        assert_eq!(signature.description, "Not full protocol. Missing: T2");
    }

    #[test]
    fn test_report_collects_rejections_and_disagreements() {
        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let first = philips_header("first.dcm", "1.2.840.1.1.1");
        let mut renumbered = philips_header("renumbered.dcm", "1.2.840.1.1.1");
        renumbered.insert(SERIES_NUMBER, "302");
        let mut no_series = philips_header("broken.dcm", "1.2.840.1.1.9");
        no_series.insert(SERIES_INSTANCE_UID, "");

        let output = pipeline.run(&[first, renumbered, no_series]).unwrap();

        assert_eq!(output.report.processed_sources, 3);
        assert!(output
            .report
            .rejections
            .iter()
            .any(|r| r.table == "Series" && r.source_id == "broken.dcm"));
        assert!(output.report.conflicts.is_empty());
        assert!(output.report.disagreements >= 1);
        assert!(output.report.duplicate_sources >= 1);
    }

    #[test]
    fn test_report_collects_conflicts() {
        let schema = SchemaModel::from_toml_str(
            r#"
            [Series]
            level = "series"
            fields = [
                { name = "SeriesInstanceUid", hex_tag = [0x0020, 0x000E], type = "String", unique = true, not_null = true },
                { name = "StudyInstanceUid", hex_tag = [0x0020, 0x000D], type = "String", not_null = true },
            ]
            "#,
        )
        .unwrap();
        let pipeline = Pipeline::new(&schema, PipelineConfig::default().with_threads(1));
        let first = philips_header("first.dcm", "1.2.840.1.1.1");
        let mut moved = philips_header("moved.dcm", "1.2.840.1.1.2");
        moved.insert(STUDY_INSTANCE_UID, "1.2.840.9");

        let output = pipeline.run(&[first, moved]).unwrap();

        assert_eq!(output.report.conflicts.len(), 1);
        let conflict = &output.report.conflicts[0];
        assert_eq!(conflict.table, "Series");
        assert_eq!(conflict.field, "StudyInstanceUid");
        assert_eq!(conflict.incoming_source, "moved.dcm");
    }

    #[test]
    fn test_unknown_vendor_is_reported_unclassifiable() {
        let header = HeaderRecord::new("other.dcm")
            .with(PATIENT_ID, "P002")
            .with(STUDY_INSTANCE_UID, "2.1")
            .with(SERIES_INSTANCE_UID, "2.1.1")
            .with(SOP_INSTANCE_UID, "2.1.1.1")
            .with(MANUFACTURER, "Hitachi")
            .with(IMAGE_TYPE, "ORIGINAL\\PRIMARY\\M");

        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let output = pipeline.run(&[header]).unwrap();

        assert_eq!(
            output.report.unclassifiable,
            vec![("2.1.1".to_string(), UnclassifiableReason::UnsupportedVendor)]
        );
        assert_eq!(
            output.report.unclassifiable_by_reason().get("No logic for vendor"),
            Some(&1)
        );
        assert!(output.signature("2.1").unwrap().ambiguous);
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.dcm");
        std::fs::write(&path, b"not a dicom file").unwrap();

        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let output = pipeline.run_files(&[path]).unwrap();

        assert_eq!(output.report.processed_sources, 0);
        assert_eq!(output.report.skipped_sources, 1);
    }

    #[test]
    fn test_run_files_reads_dicom_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("t2.dcm");
        write_siemens_t2(&path, 256);

        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let output = pipeline.run_files(&[path]).unwrap();

        assert_eq!(output.report.processed_sources, 1);
        assert_eq!(output.report.skipped_sources, 0);
        assert!(output.report.rejections.is_empty());

        let classification = output.classification("1.2.840.7.1").unwrap();
        assert_eq!(classification.category(), Some(ModalityCategory::T2W));
        assert!(output.signature("1.2.840.7").is_some());
    }

    #[test]
    fn test_truncated_pixel_data_keeps_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("truncated.dcm");
        write_siemens_t2(&path, 4096);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2000]).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.get(SEQUENCE_NAME), Some("*tse2d1_17"));
        assert_eq!(header.get(PIXEL_DATA), None);

        let pipeline = Pipeline::builtin(PipelineConfig::default()).unwrap();
        let output = pipeline.run_files(&[path]).unwrap();

        assert_eq!(output.report.processed_sources, 1);
        assert_eq!(output.report.skipped_sources, 0);
        assert_eq!(
            output.classification("1.2.840.7.1").unwrap().category(),
            Some(ModalityCategory::T2W)
        );
    }
}
