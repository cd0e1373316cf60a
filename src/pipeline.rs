//! Request pipeline: validate, parse, fold, respond.
//!
//! The root view is owned by the pipeline for the whole request, so the
//! mapping and descriptor are released on every return path, including
//! validation failures and parser errors.

use anyhow::{Context, anyhow};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, ZipMetaError};
use crate::io::{ByteSource, FileView};
use crate::results::ResultSet;
use crate::zip::{
    CDFH_SIGNATURE, EXTRA_FIELD_KEY, ExtraField, FieldValue, LFH_SIGNATURE, MetadataParser,
    MetadataRecord, UNKNOWN_DATA_KEY, UNKNOWN_HEADER, ZipParser,
};

/// Magic sequences accepted at the start of an input file.
pub const ZIP_MAGICS: [&[u8]; 2] = [LFH_SIGNATURE, CDFH_SIGNATURE];

/// Replaces the raw payload of undecoded extra-field sub-records.
pub const REDACTED_PLACEHOLDER: &str = "Data";

/// Value reported under `ZipExtraField` for entries without extra fields.
const NO_EXTRA_FIELDS: &str = "None";

/// Turns a staged sample into its JSON metadata document.
#[derive(Clone)]
pub struct MetadataPipeline {
    staging_dir: PathBuf,
    parser: Arc<dyn MetadataParser>,
}

impl MetadataPipeline {
    pub fn new(staging_dir: impl Into<PathBuf>, parser: Arc<dyn MetadataParser>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            parser,
        }
    }

    /// Pipeline using the bundled [`ZipParser`].
    pub fn with_zip_parser(staging_dir: impl Into<PathBuf>) -> Self {
        Self::new(staging_dir, Arc::new(ZipParser::new()))
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Staging path for a sample identifier made of `[a-zA-Z0-9-]`.
    pub fn resolve(&self, id: &str) -> Result<PathBuf> {
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ZipMetaError::not_found(ZipMetaError::UNKNOWN_SAMPLE));
        }
        Ok(self.staging_dir.join(id))
    }

    /// Run the full pipeline for the staged sample `id`.
    pub fn process(&self, id: &str) -> Result<Value> {
        let _span = tracing::info_span!("zipmeta", id).entered();

        let path = self.resolve(id)?;
        let view = FileView::open(&path)
            .with_context(|| format!("failed to map {}", path.display()))?;
        let body = self.process_view(view)?;

        tracing::info!("metadata extracted");
        Ok(body)
    }

    /// Validate, parse and fold an already opened root view. The view is
    /// consumed; its mapping is gone once this returns, whatever the outcome.
    pub fn process_view(&self, mut view: FileView) -> Result<Value> {
        validate(&view)?;

        let parsed = self.parser.parse(&mut view);
        view.close();

        let records = parsed.context("metadata parser failed")?;
        if records.is_empty() {
            return Err(ZipMetaError::bad_request(ZipMetaError::UNPARSABLE));
        }
        tracing::debug!(entries = records.len(), "parsed archive");

        fold(&records)
    }
}

/// Require at least four bytes, starting with a recognized zip magic.
pub fn validate(source: &dyn ByteSource) -> Result<()> {
    if source.len() < 4 {
        return Err(ZipMetaError::bad_request(ZipMetaError::NOT_ENOUGH_DATA));
    }
    if !ZIP_MAGICS.iter().any(|magic| source.starts_with(magic)) {
        return Err(ZipMetaError::bad_request(ZipMetaError::NOT_A_ZIP));
    }
    Ok(())
}

/// Fold parsed records into `{"files": {<entry name>: <entry metadata>}}`.
///
/// Entries sharing a name end up as a list under that name.
pub fn fold(records: &[MetadataRecord]) -> Result<Value> {
    let mut files = ResultSet::new();

    for record in records {
        let name = record
            .file_name()
            .ok_or_else(|| anyhow!("entry without a file name"))?;
        files.add(name, fold_record(record));
    }

    let mut body = Map::new();
    body.insert("files".to_string(), Value::Object(files.snapshot()));
    Ok(Value::Object(body))
}

fn fold_record(record: &MetadataRecord) -> ResultSet {
    let mut entry = ResultSet::new();

    for (key, value) in &record.fields {
        if key == EXTRA_FIELD_KEY {
            continue;
        }
        add_field(&mut entry, key, value);
    }

    if record.extra_fields.is_empty() {
        entry.add(EXTRA_FIELD_KEY, NO_EXTRA_FIELDS);
    } else {
        for extra in &record.extra_fields {
            entry.add(extra.name(), fold_extra(extra));
        }
    }

    entry
}

fn fold_extra(extra: &ExtraField) -> ResultSet {
    let redact = extra.name() == UNKNOWN_HEADER;
    let mut sub = ResultSet::new();

    for (key, value) in &extra.fields {
        if redact && key == UNKNOWN_DATA_KEY {
            sub.add(key.as_str(), REDACTED_PLACEHOLDER);
        } else {
            add_field(&mut sub, key, value);
        }
    }

    sub
}

/// Lists are added element by element so repeats promote under one key.
fn add_field(set: &mut ResultSet, key: &str, value: &FieldValue) {
    match value {
        FieldValue::Text(text) => set.add(key, text.as_str()),
        FieldValue::List(items) => {
            for item in items {
                set.add(key, item.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::FILE_NAME_KEY;
    use serde_json::json;
    use std::io::Write;

    struct FixedParser(Vec<MetadataRecord>);

    impl MetadataParser for FixedParser {
        fn parse(&self, _source: &mut dyn ByteSource) -> anyhow::Result<Vec<MetadataRecord>> {
            Ok(self.0.clone())
        }
    }

    struct FailingParser;

    impl MetadataParser for FailingParser {
        fn parse(&self, _source: &mut dyn ByteSource) -> anyhow::Result<Vec<MetadataRecord>> {
            Err(anyhow!("parser exploded"))
        }
    }

    fn record(name: &str) -> MetadataRecord {
        let mut record = MetadataRecord::default();
        record.push("ZipCompression", "Stored");
        record.push(FILE_NAME_KEY, name);
        record
    }

    fn staged(content: &[u8]) -> (tempfile::TempDir, FileView) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample");
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        let view = FileView::open(&path).unwrap();
        (dir, view)
    }

    fn status_message(err: ZipMetaError) -> &'static str {
        match err {
            ZipMetaError::Validation { message, .. } => message,
            ZipMetaError::Internal(err) => panic!("unexpected internal error: {err:#}"),
        }
    }

    #[test]
    fn short_input_is_rejected_and_released() {
        let (_dir, view) = staged(b"PK\x03");
        let handle = view.downgrade();
        let pipeline = MetadataPipeline::new("/unused", Arc::new(FixedParser(vec![])));

        let err = pipeline.process_view(view).unwrap_err();
        assert_eq!(status_message(err), ZipMetaError::NOT_ENOUGH_DATA);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn wrong_magic_is_rejected_and_released() {
        let (_dir, view) = staged(b"MZ\x90\x00 not a zip");
        let handle = view.downgrade();
        let pipeline = MetadataPipeline::new("/unused", Arc::new(FixedParser(vec![])));

        let err = pipeline.process_view(view).unwrap_err();
        assert_eq!(status_message(err), ZipMetaError::NOT_A_ZIP);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn empty_parse_is_rejected_and_released() {
        let (_dir, view) = staged(b"PK\x01\x02 garbage");
        let handle = view.downgrade();
        let pipeline = MetadataPipeline::new("/unused", Arc::new(FixedParser(vec![])));

        let err = pipeline.process_view(view).unwrap_err();
        assert_eq!(status_message(err), ZipMetaError::UNPARSABLE);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn parser_failure_is_internal_and_released() {
        let (_dir, view) = staged(b"PK\x03\x04 garbage");
        let handle = view.downgrade();
        let pipeline = MetadataPipeline::new("/unused", Arc::new(FailingParser));

        let err = pipeline.process_view(view).unwrap_err();
        assert!(!err.is_validation());
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn repeated_failures_release_every_mapping() {
        let pipeline = MetadataPipeline::new("/unused", Arc::new(FailingParser));
        for _ in 0..64 {
            let (_dir, view) = staged(b"PK\x03\x04 garbage");
            let handle = view.downgrade();
            assert!(pipeline.process_view(view).is_err());
            assert!(handle.upgrade().is_none());
        }
    }

    #[test]
    fn missing_sample_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MetadataPipeline::with_zip_parser(dir.path());
        let err = pipeline.process("does-not-exist").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn identifiers_are_restricted() {
        let pipeline = MetadataPipeline::with_zip_parser("/staging");
        assert_eq!(
            pipeline.resolve("abc-123").unwrap(),
            Path::new("/staging/abc-123")
        );
        assert_eq!(
            status_message(pipeline.resolve("../etc/passwd").unwrap_err()),
            ZipMetaError::UNKNOWN_SAMPLE
        );
    }

    #[test]
    fn fold_reports_missing_extra_fields() {
        let body = fold(&[record("test.txt")]).unwrap();
        assert_eq!(
            body,
            json!({"files": {"test.txt": {
                "ZipCompression": "Stored",
                "ZipFileName": "test.txt",
                "ZipExtraField": "None"
            }}})
        );
    }

    #[test]
    fn fold_promotes_duplicate_entry_names() {
        let body = fold(&[record("dup.txt"), record("dup.txt")]).unwrap();
        let entries = body["files"]["dup.txt"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["ZipFileName"], "dup.txt");
    }

    #[test]
    fn fold_expands_lists_element_wise() {
        let mut rec = record("a");
        rec.push(
            "ZipGeneralPurposeFlags",
            vec!["Encrypted".to_string(), "DataDescriptor".to_string()],
        );
        rec.push("Single", vec!["only".to_string()]);
        let body = fold(&[rec]).unwrap();
        assert_eq!(
            body["files"]["a"]["ZipGeneralPurposeFlags"],
            json!(["Encrypted", "DataDescriptor"])
        );
        assert_eq!(body["files"]["a"]["Single"], json!("only"));
    }

    #[test]
    fn fold_nests_and_redacts_extra_fields() {
        let mut rec = record("a");
        rec.extra_fields = vec![
            ExtraField::new("InfoZipUnix").with("UID", "1000"),
            ExtraField::new(UNKNOWN_HEADER)
                .with("HeaderID", "0xcafe")
                .with(UNKNOWN_DATA_KEY, "deadbeef"),
        ];
        let body = fold(&[rec]).unwrap();
        let entry = &body["files"]["a"];

        assert_eq!(entry["InfoZipUnix"], json!({"Name": "InfoZipUnix", "UID": "1000"}));
        assert_eq!(
            entry[UNKNOWN_HEADER],
            json!({"Name": "UnknownHeader", "HeaderID": "0xcafe", "Data": "Data"})
        );
        assert!(entry.get(EXTRA_FIELD_KEY).is_none());
    }

    #[test]
    fn fold_rejects_nameless_records() {
        let mut rec = MetadataRecord::default();
        rec.push("ZipCompression", "Stored");
        assert!(!fold(&[rec]).unwrap_err().is_validation());
    }
}
