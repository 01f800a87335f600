//! Sample batch parsing.
//!
//! A samples file is either JSON (one object, or an array of objects) or CSV
//! with a header row. Both are normalized into [`SampleRecord`]s:
//!
//! ```text
//! [{"sample_id": "S1", "read1": "s1_R1.fq.gz"},      sample_id,read1
//!  {"sample_id": "S2", "read1": "s2_R1.fq.gz"}]      S1,s1_R1.fq.gz
//!                                                    S2,s2_R1.fq.gz
//! ```
//!
//! CSV values stay strings; JSON values keep their JSON types. Strings that
//! are themselves encoded JSON can be expanded with [`deep_unwrap_json`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::constants::SAMPLE_ID_KEY;
use crate::core::AppUtilError;
use crate::utils::fs::is_path_component;

/// One sample: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRecord(BTreeMap<String, Value>);

impl SampleRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// The sample id exactly as the templates see it.
    ///
    /// Numbers are accepted and printed as-is. A blank string or any other
    /// type is treated as missing.
    #[must_use]
    pub fn sample_id(&self) -> Option<String> {
        match self.0.get(SAMPLE_ID_KEY)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// Apply [`deep_unwrap_json`] to every value.
    #[must_use]
    pub fn deep_unwrapped(self) -> Self {
        Self(self.0.into_iter().map(|(k, v)| (k, deep_unwrap_json(v))).collect())
    }
}

impl From<BTreeMap<String, Value>> for SampleRecord {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for SampleRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Which format a samples file was read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Json,
    Tabular,
}

/// All records of one samples file.
#[derive(Debug, Clone)]
pub struct SampleBatch {
    path: PathBuf,
    source: SampleSource,
    header: Vec<String>,
    records: Vec<SampleRecord>,
}

impl SampleBatch {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn source(&self) -> SampleSource {
        self.source
    }

    /// CSV header in file order, or the sorted union of record keys for JSON.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    #[must_use]
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<SampleRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reject the batch if any record lacks a usable `sample_id`.
    ///
    /// The id names the sample's directory, so it must be a single path
    /// component (see [`is_path_component`]).
    ///
    /// # Errors
    ///
    /// [`AppUtilError::MalformedInput`] naming the first offending record
    /// (1-based).
    pub fn require_sample_ids(&self) -> Result<()> {
        for (index, record) in self.records.iter().enumerate() {
            match record.sample_id() {
                None => {
                    return Err(self.malformed(format!("record {} has no {SAMPLE_ID_KEY}", index + 1)).into());
                }
                Some(id) if !is_path_component(&id) => {
                    return Err(self
                        .malformed(format!(
                            "record {} has {SAMPLE_ID_KEY} '{id}', which is not a plain directory name",
                            index + 1
                        ))
                        .into());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Reject the batch if two records share a `sample_id`.
    pub fn require_unique_sample_ids(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in self.records.iter().filter_map(SampleRecord::sample_id) {
            if !seen.insert(id.clone()) {
                return Err(self.malformed(format!("duplicate {SAMPLE_ID_KEY} '{id}'")).into());
            }
        }
        Ok(())
    }

    /// Replace every record with its [`deep_unwrap_json`] form.
    #[must_use]
    pub fn deep_unwrapped(self) -> Self {
        Self {
            records: self.records.into_iter().map(SampleRecord::deep_unwrapped).collect(),
            ..self
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> AppUtilError {
        malformed(&self.path, reason)
    }
}

/// Parse a samples file, trying JSON first and falling back to CSV.
///
/// # Errors
///
/// [`AppUtilError::MalformedInput`] when the JSON is not an object or an
/// array of objects, when a CSV header cell is empty, or when a CSV row has
/// the wrong number of fields. [`AppUtilError::Io`] when the file cannot be
/// read and [`AppUtilError::Csv`] for other CSV reader failures, such as a
/// row that is not UTF-8.
pub fn parse_samples(path: &Path) -> Result<SampleBatch> {
    let bytes = std::fs::read(path)
        .map_err(AppUtilError::Io)
        .with_context(|| format!("Failed to read samples file: {}", path.display()))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => parse_json(path, value),
        Err(e) => {
            tracing::debug!("{} is not JSON ({}), reading as CSV", path.display(), e);
            parse_csv(path, &bytes)
        }
    }
}

/// Column names of a samples file, for pre-flight checks.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    Ok(parse_samples(path)?.header)
}

fn parse_json(path: &Path, value: Value) -> Result<SampleBatch> {
    let items = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        other => {
            return Err(malformed(
                path,
                format!("expected an object or an array of objects, found {}", json_kind(&other)),
            )
            .into());
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(map.into_iter().collect::<SampleRecord>()),
            other => {
                return Err(malformed(
                    path,
                    format!("record {} is {}, not an object", index + 1, json_kind(&other)),
                )
                .into());
            }
        }
    }

    let header: BTreeSet<&String> = records.iter().flat_map(SampleRecord::keys).collect();
    let header = header.into_iter().cloned().collect();

    Ok(SampleBatch {
        path: path.to_path_buf(),
        source: SampleSource::Json,
        header,
        records,
    })
}

fn parse_csv(path: &Path, data: &[u8]) -> Result<SampleBatch> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(path, format!("neither JSON nor CSV: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if header.is_empty() {
        return Err(malformed(path, "CSV header row is empty").into());
    }
    if let Some(position) = header.iter().position(String::is_empty) {
        return Err(malformed(path, format!("CSV header column {} is empty", position + 1)).into());
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            let lengths = match e.kind() {
                csv::ErrorKind::UnequalLengths {
                    expected_len,
                    len,
                    ..
                } => Some((*expected_len, *len)),
                _ => None,
            };
            match lengths {
                Some((expected_len, len)) => malformed(
                    path,
                    format!("row {} has {len} fields, header has {expected_len}", index + 1),
                ),
                None => AppUtilError::Csv(e),
            }
        })?;

        records.push(
            header
                .iter()
                .zip(row.iter())
                .map(|(key, value)| (key.clone(), Value::String(value.to_string())))
                .collect(),
        );
    }

    Ok(SampleBatch {
        path: path.to_path_buf(),
        source: SampleSource::Tabular,
        header,
        records,
    })
}

/// Recursively replace strings that hold encoded JSON with their parsed value.
///
/// `"[1, 2]"` becomes `[1, 2]` and `"{\"a\": \"3\"}"` becomes `{"a": 3}`.
/// Strings that are not JSON (`"S1"`) are kept.
#[must_use]
pub fn deep_unwrap_json(value: Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::String(inner)) if inner == s => Value::String(inner),
            Ok(parsed) => deep_unwrap_json(parsed),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(deep_unwrap_json).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, deep_unwrap_json(v))).collect())
        }
        other => other,
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> AppUtilError {
    AppUtilError::MalformedInput {
        file: path.display().to_string(),
        reason: reason.into(),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
