//! Exported-label schema types.
//!
//! Serde model of the platform's label export: one record per label,
//! with geometric `objects` and top-level `classifications` under the
//! `Label` key. Readers are permissive the way exports demand: answer
//! nodes spell their display name `title` in exports but `name` in
//! upload records, both are accepted; geometry payloads appear under a
//! key matching the tool type.

use serde::Deserialize;

use super::model::XyPoint;
use super::record::{BboxPayload, TextSpan};

/// One row of a label export.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "ID")]
    pub label_id: String,

    #[serde(rename = "DataRow ID")]
    pub data_row_id: String,

    #[serde(rename = "Global Key", default)]
    pub global_key: Option<String>,

    #[serde(rename = "External ID", default)]
    pub external_id: Option<String>,

    #[serde(rename = "Labeled Data", default)]
    pub row_data: Option<String>,

    #[serde(rename = "Skipped", default)]
    pub skipped: bool,

    #[serde(rename = "Label", default)]
    pub label: ExportedLabel,
}

/// The annotation content of one label.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExportedLabel {
    #[serde(default)]
    pub objects: Vec<ExportedObject>,
    #[serde(default)]
    pub classifications: Vec<ExportedClassification>,
}

/// One geometric tool instance in an export.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportedObject {
    #[serde(rename = "featureId", default)]
    pub feature_id: Option<String>,

    #[serde(rename = "schemaId", default)]
    pub schema_id: Option<String>,

    #[serde(default, alias = "title")]
    pub name: Option<String>,

    #[serde(default)]
    pub bbox: Option<BboxPayload>,

    #[serde(default)]
    pub polygon: Option<Vec<XyPoint>>,

    #[serde(default)]
    pub line: Option<Vec<XyPoint>>,

    #[serde(default)]
    pub point: Option<XyPoint>,

    #[serde(default)]
    pub location: Option<TextSpan>,

    /// Nested mask payload, as upload records carry it.
    #[serde(default)]
    pub mask: Option<ExportedMask>,

    /// Hosted mask URI at the object's top level, as exports carry it.
    #[serde(rename = "instanceURI", default)]
    pub instance_uri: Option<String>,

    #[serde(rename = "colorRGB", default)]
    pub color_rgb: Option<[u8; 3]>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub classifications: Vec<ExportedClassification>,
}

/// Mask payload nested under a `mask` key.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportedMask {
    #[serde(rename = "instanceURI", default)]
    pub instance_uri: Option<String>,

    #[serde(rename = "colorRGB", default)]
    pub color_rgb: Option<[u8; 3]>,

    #[serde(default)]
    pub png: Option<String>,
}

/// One classification with its answer(s), at any nesting depth.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportedClassification {
    #[serde(rename = "schemaId", default)]
    pub schema_id: Option<String>,

    #[serde(alias = "title")]
    pub name: String,

    #[serde(default)]
    pub answer: Option<ExportedAnswerValue>,

    #[serde(default)]
    pub answers: Vec<ExportedAnswer>,

    #[serde(default)]
    pub text_answer: Option<String>,
}

/// A radio/text `answer` field: an answer object or a literal string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ExportedAnswerValue {
    Node(ExportedAnswer),
    Text(String),
}

/// One selected answer, possibly with nested classifications below it.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportedAnswer {
    #[serde(alias = "title")]
    pub name: String,

    #[serde(default)]
    pub classifications: Vec<ExportedClassification>,
}
