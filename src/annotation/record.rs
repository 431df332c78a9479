//! Upload-record schema types.
//!
//! One [`AnnotationRecord`] is one NDJSON line of an annotation import:
//! a fresh uuid, the data row reference, the top-level feature name, a
//! geometry payload or classification answer merged at the top level,
//! and optional nested classifications mirroring the ontology's
//! radio/checklist/text structure. These are transient serialization
//! artifacts: built per annotation, serialized, discarded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::XyPoint;
use crate::masks::ResolvedMask;

/// Reference to the platform data row an annotation attaches to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRowRef {
    pub id: String,
}

/// Bounding box in the platform's top/left/height/width convention.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BboxPayload {
    pub top: f64,
    pub left: f64,
    pub height: f64,
    pub width: f64,
}

/// Character span of a named-entity annotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: u64,
    pub end: u64,
}

/// Mask payload in one of the two accepted wire shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskPayload {
    Url {
        #[serde(rename = "instanceURI")]
        instance_uri: String,
        #[serde(rename = "colorRGB")]
        color_rgb: [u8; 3],
    },
    Png { png: String },
}

impl From<ResolvedMask> for MaskPayload {
    fn from(mask: ResolvedMask) -> Self {
        match mask {
            ResolvedMask::Url {
                instance_uri,
                color_rgb,
            } => MaskPayload::Url {
                instance_uri,
                color_rgb,
            },
            ResolvedMask::Png(png) => MaskPayload::Png { png },
        }
    }
}

/// The answer side of a radio/checklist/text classification.
///
/// Serialized flattened into its parent, so a radio contributes
/// `"answer": {...}`, a checklist `"answers": [...]`, and a text
/// classification a literal `"answer"` string. Variant order matters for
/// deserialization: the object-shaped `answer` must be tried before the
/// literal one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResponse {
    Radio { answer: AnswerNode },
    Checklist { answers: Vec<AnswerNode> },
    Text { answer: String },
}

/// One classification within an annotation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationNode {
    pub name: String,
    #[serde(flatten)]
    pub response: ClassificationResponse,
}

/// One selected answer, possibly carrying nested classifications.
///
/// `classifications` is omitted entirely when empty; the upload API does
/// not accept an empty list there.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<ClassificationNode>,
}

impl AnswerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classifications: Vec::new(),
        }
    }
}

/// Payload of one top-level annotation: exactly one geometry key, or a
/// classification answer merged at the record's top level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationBody {
    Bbox { bbox: BboxPayload },
    Polygon { polygon: Vec<XyPoint> },
    Line { line: Vec<XyPoint> },
    Point { point: XyPoint },
    Mask { mask: MaskPayload },
    NamedEntity { location: TextSpan },
    Classification(ClassificationResponse),
}

/// One annotation as uploaded to the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub uuid: String,

    #[serde(rename = "dataRow", default, skip_serializing_if = "Option::is_none")]
    pub data_row: Option<DataRowRef>,

    /// Top-level feature name.
    pub name: String,

    #[serde(flatten)]
    pub body: AnnotationBody,

    /// Nested classifications of a tool annotation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<ClassificationNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl AnnotationRecord {
    /// Creates a record with a fresh random uuid and no data row
    /// reference (the orchestrator attaches one at upload time).
    pub fn new(name: impl Into<String>, body: AnnotationBody) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            data_row: None,
            name: name.into(),
            body,
            classifications: Vec::new(),
            confidence: None,
        }
    }

    pub fn with_data_row(mut self, data_row_id: impl Into<String>) -> Self {
        self.data_row = Some(DataRowRef {
            id: data_row_id.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bbox_record_serializes_with_flattened_payload() {
        let mut record = AnnotationRecord::new(
            "car",
            AnnotationBody::Bbox {
                bbox: BboxPayload {
                    top: 10.0,
                    left: 20.0,
                    height: 30.0,
                    width: 40.0,
                },
            },
        )
        .with_data_row("dr-1");
        record.uuid = "fixed".to_string();

        let value = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(
            value,
            json!({
                "uuid": "fixed",
                "dataRow": {"id": "dr-1"},
                "name": "car",
                "bbox": {"top": 10.0, "left": 20.0, "height": 30.0, "width": 40.0},
            })
        );
    }

    #[test]
    fn text_classification_serializes_literal_answer() {
        let mut record = AnnotationRecord::new(
            "comment",
            AnnotationBody::Classification(ClassificationResponse::Text {
                answer: "hello world".to_string(),
            }),
        );
        record.uuid = "fixed".to_string();

        let value = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(
            value,
            json!({"uuid": "fixed", "name": "comment", "answer": "hello world"})
        );
    }

    #[test]
    fn checklist_uses_plural_answers_key() {
        let response = ClassificationResponse::Checklist {
            answers: vec![AnswerNode::new("red"), AnswerNode::new("blue")],
        };
        let value = serde_json::to_value(&response).expect("serialize response");
        assert_eq!(
            value,
            json!({"answers": [{"name": "red"}, {"name": "blue"}]})
        );
        assert!(value.get("answer").is_none());
    }

    #[test]
    fn radio_answer_roundtrips_through_untagged_variants() {
        let node = ClassificationNode {
            name: "damaged".to_string(),
            response: ClassificationResponse::Radio {
                answer: AnswerNode::new("yes"),
            },
        };
        let json = serde_json::to_string(&node).expect("serialize node");
        let back: ClassificationNode = serde_json::from_str(&json).expect("parse node");
        assert_eq!(back, node);
    }

    #[test]
    fn text_answer_parses_as_text_not_radio() {
        let back: ClassificationNode =
            serde_json::from_str(r#"{"name":"comment","answer":"free text"}"#)
                .expect("parse node");
        assert_eq!(
            back.response,
            ClassificationResponse::Text {
                answer: "free text".to_string()
            }
        );
    }

    #[test]
    fn fresh_records_get_distinct_uuids() {
        let a = AnnotationRecord::new("x", AnnotationBody::Point { point: XyPoint::new(0.0, 0.0) });
        let b = AnnotationRecord::new("x", AnnotationBody::Point { point: XyPoint::new(0.0, 0.0) });
        assert_ne!(a.uuid, b.uuid);
    }
}
