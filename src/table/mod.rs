//! Flat-table access and the column-naming contract.
//!
//! Tables reach this crate through the [`TableBackend`] trait, so any
//! tabular library can plug in with three methods. The column-name
//! grammar mirrors the platform integration convention: identity columns
//! by fixed name, and typed data columns spelled
//! `{family}{divider}{type}{divider}{name}` where the family is one of
//! `metadata`, `attachment`, `annotation`, or `prediction` and the type
//! token comes from a closed per-family set.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::FlatlabelError;
use crate::ontology::FeatureType;

const ACCEPTED_METADATA: &str = "enum, string, datetime, number";
const ACCEPTED_ATTACHMENT: &str = "IMAGE, VIDEO, RAW_TEXT, HTML, TEXT_URL";
const ACCEPTED_ANNOTATION: &str =
    "bbox, polygon, point, mask, line, named-entity, radio, checklist, text";

// ============================================================================
// Table backend
// ============================================================================

/// Minimal table access the integration needs, implemented per backend.
pub trait TableBackend {
    /// Column names, in table order.
    fn columns(&self) -> Vec<String>;

    /// Adds a column filled with `default`.
    fn add_column(&mut self, name: &str, default: &str) -> Result<(), FlatlabelError>;

    /// Unique values of a column, first-seen order.
    fn unique_values(&self, column: &str) -> Result<Vec<String>, FlatlabelError>;
}

/// In-memory CSV-backed table.
#[derive(Clone, Debug, Default)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads a CSV file with a header row.
    pub fn from_path(path: &Path) -> Result<Self, FlatlabelError> {
        let file = File::open(path).map_err(FlatlabelError::Io)?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let headers = reader
            .headers()
            .map_err(|source| FlatlabelError::TableCsvParse {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|source| FlatlabelError::TableCsvParse {
                path: path.to_path_buf(),
                source,
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// One cell, by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

impl TableBackend for CsvTable {
    fn columns(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn add_column(&mut self, name: &str, default: &str) -> Result<(), FlatlabelError> {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.to_string());
        }
        Ok(())
    }

    fn unique_values(&self, column: &str) -> Result<Vec<String>, FlatlabelError> {
        let idx = self
            .headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| FlatlabelError::MissingColumn(column.to_string()))?;

        let mut seen = Vec::new();
        for row in &self.rows {
            if let Some(value) = row.get(idx) {
                if !seen.iter().any(|s| s == value) {
                    seen.push(value.clone());
                }
            }
        }
        Ok(seen)
    }
}

// ============================================================================
// Column-name grammar
// ============================================================================

/// Fixed-name identity columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityColumn {
    RowData,
    GlobalKey,
    ExternalId,
    DatasetId,
    ProjectId,
    ModelId,
    ModelRunId,
}

impl IdentityColumn {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "row_data" => Some(IdentityColumn::RowData),
            "global_key" => Some(IdentityColumn::GlobalKey),
            "external_id" => Some(IdentityColumn::ExternalId),
            "dataset_id" => Some(IdentityColumn::DatasetId),
            "project_id" => Some(IdentityColumn::ProjectId),
            "model_id" => Some(IdentityColumn::ModelId),
            "model_run_id" => Some(IdentityColumn::ModelRunId),
            _ => None,
        }
    }
}

/// Metadata field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataType {
    Enum,
    String,
    Datetime,
    Number,
}

impl MetadataType {
    fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "enum" => Some(MetadataType::Enum),
            "string" => Some(MetadataType::String),
            "datetime" => Some(MetadataType::Datetime),
            "number" => Some(MetadataType::Number),
            _ => None,
        }
    }
}

/// Attachment types, spelled upper-case in column names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentType {
    Image,
    Video,
    RawText,
    Html,
    TextUrl,
}

impl AttachmentType {
    fn parse(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "IMAGE" => Some(AttachmentType::Image),
            "VIDEO" => Some(AttachmentType::Video),
            "RAW_TEXT" => Some(AttachmentType::RawText),
            "HTML" => Some(AttachmentType::Html),
            "TEXT_URL" => Some(AttachmentType::TextUrl),
            _ => None,
        }
    }
}

/// A parsed column name.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnSpec {
    Identity(IdentityColumn),
    Metadata { field: String, kind: MetadataType },
    Attachment { name: String, kind: AttachmentType },
    Annotation { name: String, kind: FeatureType },
    Prediction { name: String, kind: FeatureType },
    /// Anything outside the contract; carried through untouched.
    Plain(String),
}

impl ColumnSpec {
    /// Parses one column name against the naming contract.
    ///
    /// A recognized family with an unknown type token is a configuration
    /// error naming the offending column and the accepted set.
    pub fn parse(column: &str, divider: &str) -> Result<Self, FlatlabelError> {
        if !column.contains(divider) {
            return Ok(match IdentityColumn::parse(column) {
                Some(identity) => ColumnSpec::Identity(identity),
                None => ColumnSpec::Plain(column.to_string()),
            });
        }

        let mut parts = column.splitn(3, divider);
        let family = parts.next().unwrap_or_default();
        let token = parts.next().unwrap_or_default();
        let header = parts.next().unwrap_or_default();

        match family.to_lowercase().as_str() {
            "metadata" => {
                let kind = MetadataType::parse(token).ok_or_else(|| {
                    FlatlabelError::InvalidColumnName {
                        family: "metadata",
                        column: column.to_string(),
                        token: token.to_string(),
                        accepted: ACCEPTED_METADATA,
                    }
                })?;
                Ok(ColumnSpec::Metadata {
                    field: header.to_string(),
                    kind,
                })
            }
            "attachment" => {
                let kind = AttachmentType::parse(token).ok_or_else(|| {
                    FlatlabelError::InvalidColumnName {
                        family: "attachment",
                        column: column.to_string(),
                        token: token.to_string(),
                        accepted: ACCEPTED_ATTACHMENT,
                    }
                })?;
                Ok(ColumnSpec::Attachment {
                    name: header.to_string(),
                    kind,
                })
            }
            "annotation" => Ok(ColumnSpec::Annotation {
                name: header.to_string(),
                kind: parse_annotation_kind(token, column, "annotation")?,
            }),
            "prediction" => Ok(ColumnSpec::Prediction {
                name: header.to_string(),
                kind: parse_annotation_kind(token, column, "prediction")?,
            }),
            _ => Ok(ColumnSpec::Plain(column.to_string())),
        }
    }
}

fn parse_annotation_kind(
    token: &str,
    column: &str,
    family: &'static str,
) -> Result<FeatureType, FlatlabelError> {
    let invalid = || FlatlabelError::InvalidColumnName {
        family,
        column: column.to_string(),
        token: token.to_string(),
        accepted: ACCEPTED_ANNOTATION,
    };
    let kind = FeatureType::parse_token(&token.to_lowercase(), column).map_err(|_| invalid())?;
    if kind == FeatureType::Option {
        return Err(invalid());
    }
    Ok(kind)
}

/// Typed-column lookup built once per table.
#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    /// `{field_name: metadata_type}`
    pub metadata: BTreeMap<String, MetadataType>,
    /// `{attachment_name: attachment_type}`
    pub attachments: BTreeMap<String, AttachmentType>,
    /// `{top_level_feature_name: annotation_type}`
    pub annotations: BTreeMap<String, FeatureType>,
    /// `{top_level_feature_name: prediction_type}`
    pub predictions: BTreeMap<String, FeatureType>,
}

impl ColumnIndex {
    /// Scans a table's columns against the naming contract.
    pub fn build(table: &dyn TableBackend, divider: &str) -> Result<Self, FlatlabelError> {
        let mut index = ColumnIndex::default();
        for column in table.columns() {
            match ColumnSpec::parse(&column, divider)? {
                ColumnSpec::Metadata { field, kind } => {
                    index.metadata.insert(field, kind);
                }
                ColumnSpec::Attachment { name, kind } => {
                    index.attachments.insert(name, kind);
                }
                ColumnSpec::Annotation { name, kind } => {
                    index.annotations.insert(name, kind);
                }
                ColumnSpec::Prediction { name, kind } => {
                    index.predictions.insert(name, kind);
                }
                ColumnSpec::Identity(_) | ColumnSpec::Plain(_) => {}
            }
        }
        Ok(index)
    }
}

/// Adds a table column for every metadata field the index names but the
/// table lacks. A field counts as present whether it appears bare or in
/// its typed `metadata{divider}{type}{divider}{field}` spelling.
pub fn ensure_metadata_columns(
    table: &mut dyn TableBackend,
    metadata: &BTreeMap<String, MetadataType>,
    divider: &str,
) -> Result<(), FlatlabelError> {
    let mut existing = Vec::new();
    for column in table.columns() {
        match ColumnSpec::parse(&column, divider)? {
            ColumnSpec::Metadata { field, .. } => existing.push(field),
            _ => existing.push(column),
        }
    }
    for field in metadata.keys() {
        if !existing.iter().any(|c| c == field) {
            table.add_column(field, "")?;
        }
    }
    Ok(())
}

// ============================================================================
// Metadata value screening
// ============================================================================

/// Screens one metadata cell for upload, per its declared type.
///
/// Returns `None` for values the platform would reject: empty cells,
/// `nan`, enum options with no schema mapping, non-integer numbers,
/// unparseable datetimes. Enum values resolve through
/// `name_key_to_schema` keyed `{parent_name}{divider}{option}`.
pub fn process_metadata_value(
    value: &str,
    kind: MetadataType,
    parent_name: &str,
    name_key_to_schema: &BTreeMap<String, String>,
    divider: &str,
) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return None;
    }
    match kind {
        MetadataType::Enum => {
            let name_key = format!("{parent_name}{divider}{value}");
            name_key_to_schema.get(&name_key).cloned()
        }
        MetadataType::Number => parse_integer(value).map(|n| n.to_string()),
        MetadataType::String => Some(value.to_string()),
        MetadataType::Datetime => parse_datetime_utc(value)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
    }
}

fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    // Whole-valued floats pass; anything fractional is rejected.
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        _ => None,
    }
}

fn parse_datetime_utc(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
