//! Annotation encoder: flat cell values to nested upload records.
//!
//! Given a top-level feature name, a tabular [`AnnotationValue`], and the
//! ontology index, builds the nested annotation-answer tree the upload
//! API expects. The recursion mirrors the ontology: answers under their
//! classification, nested classifications under their answer, down to
//! text leaves carrying literal values.
//!
//! Every lookup goes through the index and fails loudly on a miss; a
//! half-built record is never returned.

use crate::annotation::model::{AnnotationValue, Geometry, ToolInstance};
use crate::annotation::record::{
    AnnotationBody, AnnotationRecord, AnswerNode, BboxPayload, ClassificationNode,
    ClassificationResponse, TextSpan,
};
use crate::error::FlatlabelError;
use crate::masks::{resolve_mask, MaskMethod, MaskRasterizer};
use crate::ontology::OntologyIndex;
use crate::paths::{children_of, unique_first_segments, DEFAULT_DIVIDER};

/// Encoder configuration.
pub struct EncodeOptions<'a> {
    pub divider: String,
    /// How mask sources in annotation values are interpreted.
    pub mask_method: MaskMethod,
    /// When set, every record carries a `confidence` field, defaulting
    /// to 0.0 for values without one. Used for prediction uploads.
    pub with_confidence: bool,
    /// Collaborator for array-method mask rasterization.
    pub rasterizer: Option<&'a dyn MaskRasterizer>,
}

impl Default for EncodeOptions<'_> {
    fn default() -> Self {
        Self {
            divider: DEFAULT_DIVIDER.to_string(),
            mask_method: MaskMethod::default(),
            with_confidence: false,
            rasterizer: None,
        }
    }
}

/// Encodes one annotation value into an upload record.
///
/// Branches on the ontology type of `top_level_name`: geometry tools
/// produce a geometry payload plus nested `classifications`; top-level
/// radio/checklist/text values produce an answer merged alongside the
/// record's uuid. An unknown `top_level_name` is a
/// [`FlatlabelError::MissingIndexEntry`].
pub fn encode_annotation(
    top_level_name: &str,
    value: &AnnotationValue,
    index: &OntologyIndex,
    opts: &EncodeOptions<'_>,
) -> Result<AnnotationRecord, FlatlabelError> {
    let entry = index.require_path(top_level_name)?;

    let (mut record, confidence) = match value {
        AnnotationValue::Tool(instance) => {
            if instance.geometry.feature_type() != entry.feature_type {
                return Err(FlatlabelError::GeometryMismatch {
                    name: top_level_name.to_string(),
                    expected: entry.feature_type.token(),
                    found: instance.geometry.feature_type().token(),
                });
            }
            let record = encode_tool(top_level_name, instance, index, opts)?;
            (record, instance.confidence)
        }
        AnnotationValue::Classification { paths, confidence } => {
            if !entry.feature_type.is_classification() {
                return Err(FlatlabelError::GeometryMismatch {
                    name: top_level_name.to_string(),
                    expected: entry.feature_type.token(),
                    found: "classification",
                });
            }
            // Paths are rooted at the classification's own name; strip it
            // to get the answer paths. A path stopping at the
            // classification itself carries no answer.
            let answer_paths: Vec<String> = children_of(top_level_name, paths, &opts.divider)
                .into_iter()
                .filter(|path| !path.is_empty())
                .collect();
            let response = build_response(top_level_name, &answer_paths, index, &opts.divider)?;
            let record = AnnotationRecord::new(
                top_level_name,
                AnnotationBody::Classification(response),
            );
            (record, *confidence)
        }
    };

    if opts.with_confidence {
        record.confidence = Some(confidence.unwrap_or(0.0));
    }
    Ok(record)
}

/// Encodes every annotation value of one cell, attaching the data row
/// reference each record uploads against.
pub fn encode_annotations(
    data_row_id: &str,
    top_level_name: &str,
    values: &[AnnotationValue],
    index: &OntologyIndex,
    opts: &EncodeOptions<'_>,
) -> Result<Vec<AnnotationRecord>, FlatlabelError> {
    values
        .iter()
        .map(|value| {
            encode_annotation(top_level_name, value, index, opts)
                .map(|record| record.with_data_row(data_row_id))
        })
        .collect()
}

fn encode_tool(
    top_level_name: &str,
    instance: &ToolInstance,
    index: &OntologyIndex,
    opts: &EncodeOptions<'_>,
) -> Result<AnnotationRecord, FlatlabelError> {
    let body = build_body(&instance.geometry, opts)?;
    let mut record = AnnotationRecord::new(top_level_name, body);

    // Nested-classification paths are relative to the tool; group them by
    // their immediate classification name and build one node per group.
    for nested_name in unique_first_segments(&instance.classifications, &opts.divider) {
        let answer_paths: Vec<String> =
            children_of(&nested_name, &instance.classifications, &opts.divider)
                .into_iter()
                .filter(|path| !path.is_empty())
                .collect();
        let class_path = format!("{top_level_name}{}{nested_name}", opts.divider);
        record.classifications.push(build_classification(
            &class_path,
            &nested_name,
            &answer_paths,
            index,
            &opts.divider,
        )?);
    }
    Ok(record)
}

fn build_body(
    geometry: &Geometry,
    opts: &EncodeOptions<'_>,
) -> Result<AnnotationBody, FlatlabelError> {
    Ok(match geometry {
        Geometry::Bbox {
            top,
            left,
            height,
            width,
        } => AnnotationBody::Bbox {
            bbox: BboxPayload {
                top: *top,
                left: *left,
                height: *height,
                width: *width,
            },
        },
        Geometry::Polygon(points) => AnnotationBody::Polygon {
            polygon: points.clone(),
        },
        Geometry::Line(points) => AnnotationBody::Line {
            line: points.clone(),
        },
        Geometry::Point(point) => AnnotationBody::Point { point: *point },
        Geometry::Mask(source) => AnnotationBody::Mask {
            mask: resolve_mask(source, opts.mask_method, opts.rasterizer)?.into(),
        },
        Geometry::NamedEntity { start, end } => AnnotationBody::NamedEntity {
            location: TextSpan {
                start: *start,
                end: *end,
            },
        },
    })
}

/// Builds one classification node: `classification_path` locates the
/// classification in the ontology, `answer_paths` are the name paths
/// below it (answer-first).
fn build_classification(
    classification_path: &str,
    name: &str,
    answer_paths: &[String],
    index: &OntologyIndex,
    divider: &str,
) -> Result<ClassificationNode, FlatlabelError> {
    Ok(ClassificationNode {
        name: name.to_string(),
        response: build_response(classification_path, answer_paths, index, divider)?,
    })
}

fn build_response(
    classification_path: &str,
    answer_paths: &[String],
    index: &OntologyIndex,
    divider: &str,
) -> Result<ClassificationResponse, FlatlabelError> {
    use crate::ontology::FeatureType;

    let entry = index.require_path(classification_path)?;
    match entry.feature_type {
        FeatureType::Radio => {
            // A radio holds exactly one answer: the first unique answer
            // name wins, extra candidates are never emitted.
            let answer_names = unique_first_segments(answer_paths, divider);
            let answer_name =
                answer_names
                    .first()
                    .ok_or_else(|| FlatlabelError::MissingAnswer {
                        kind: "radio",
                        classification: classification_path.to_string(),
                    })?;
            Ok(ClassificationResponse::Radio {
                answer: build_answer(classification_path, answer_name, answer_paths, index, divider)?,
            })
        }
        FeatureType::Checklist => {
            let answers = unique_first_segments(answer_paths, divider)
                .iter()
                .map(|answer_name| {
                    build_answer(classification_path, answer_name, answer_paths, index, divider)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ClassificationResponse::Checklist { answers })
        }
        FeatureType::Text => {
            // The remaining path is the literal text value, not an
            // ontology node name.
            let answer = answer_paths
                .first()
                .ok_or_else(|| FlatlabelError::MissingAnswer {
                    kind: "text",
                    classification: classification_path.to_string(),
                })?;
            Ok(ClassificationResponse::Text {
                answer: answer.clone(),
            })
        }
        other => Err(FlatlabelError::NotAClassification {
            name_path: classification_path.to_string(),
            found: other.token(),
        }),
    }
}

fn build_answer(
    classification_path: &str,
    answer_name: &str,
    answer_paths: &[String],
    index: &OntologyIndex,
    divider: &str,
) -> Result<AnswerNode, FlatlabelError> {
    // Paths continuing past the answer name carry nested classifications;
    // a path that is exactly the answer name strips to "" and means a
    // plain leaf selection.
    let nested_paths: Vec<String> = children_of(answer_name, answer_paths, divider)
        .into_iter()
        .filter(|path| !path.is_empty())
        .collect();

    let mut answer = AnswerNode::new(answer_name);
    for nested_name in unique_first_segments(&nested_paths, divider) {
        let child_paths = children_of(&nested_name, &nested_paths, divider);
        let nested_class_path =
            format!("{classification_path}{divider}{answer_name}{divider}{nested_name}");
        answer.classifications.push(build_classification(
            &nested_class_path,
            &nested_name,
            &child_paths,
            index,
            divider,
        )?);
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::model::XyPoint;
    use crate::ontology::Ontology;
    use serde_json::json;

    fn index() -> OntologyIndex {
        let ontology = Ontology::from_value(&json!({
            "tools": [
                {
                    "name": "car",
                    "tool": "bbox",
                    "featureSchemaId": "s-car",
                    "classifications": [
                        {
                            "instructions": "damaged",
                            "type": "radio",
                            "featureSchemaId": "s-damaged",
                            "options": [
                                {"label": "yes", "featureSchemaId": "s-yes"},
                                {"label": "no", "featureSchemaId": "s-no"}
                            ]
                        }
                    ]
                }
            ],
            "classifications": [
                {
                    "instructions": "color",
                    "type": "checklist",
                    "featureSchemaId": "s-color",
                    "options": [
                        {"label": "red", "featureSchemaId": "s-red"},
                        {"label": "blue", "featureSchemaId": "s-blue"}
                    ]
                },
                {
                    "instructions": "comment",
                    "type": "text",
                    "featureSchemaId": "s-comment",
                    "options": []
                }
            ]
        }))
        .expect("parse ontology");
        OntologyIndex::build(&ontology, "///")
    }

    #[test]
    fn bbox_with_nested_radio() {
        let value = AnnotationValue::Tool(
            ToolInstance::new(Geometry::Bbox {
                top: 10.0,
                left: 20.0,
                height: 30.0,
                width: 40.0,
            })
            .with_classifications(["damaged///yes"]),
        );
        let record =
            encode_annotation("car", &value, &index(), &EncodeOptions::default()).unwrap();

        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("uuid");
        assert_eq!(
            json,
            json!({
                "name": "car",
                "bbox": {"top": 10.0, "left": 20.0, "height": 30.0, "width": 40.0},
                "classifications": [
                    {"name": "damaged", "answer": {"name": "yes"}}
                ]
            })
        );
    }

    #[test]
    fn text_classification_takes_literal_remainder() {
        let value = AnnotationValue::classification(["comment///hello world"]);
        let record =
            encode_annotation("comment", &value, &index(), &EncodeOptions::default()).unwrap();

        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("uuid");
        assert_eq!(json, json!({"name": "comment", "answer": "hello world"}));
    }

    #[test]
    fn checklist_emits_plural_answers() {
        let value = AnnotationValue::classification(["color///red", "color///blue"]);
        let record =
            encode_annotation("color", &value, &index(), &EncodeOptions::default()).unwrap();

        match &record.body {
            AnnotationBody::Classification(ClassificationResponse::Checklist { answers }) => {
                let names: Vec<_> = answers.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["red", "blue"]);
            }
            other => panic!("expected checklist body, got {other:?}"),
        }
    }

    #[test]
    fn radio_uses_only_first_answer() {
        let value = AnnotationValue::Tool(
            ToolInstance::new(Geometry::Bbox {
                top: 0.0,
                left: 0.0,
                height: 1.0,
                width: 1.0,
            })
            .with_classifications(["damaged///yes", "damaged///no"]),
        );
        let record =
            encode_annotation("car", &value, &index(), &EncodeOptions::default()).unwrap();

        match &record.classifications[0].response {
            ClassificationResponse::Radio { answer } => assert_eq!(answer.name, "yes"),
            other => panic!("expected radio response, got {other:?}"),
        }
    }

    #[test]
    fn missing_top_level_name_fails_without_partial_record() {
        let value = AnnotationValue::classification(["bicycle///x"]);
        let err =
            encode_annotation("bicycle", &value, &index(), &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, FlatlabelError::MissingIndexEntry { .. }));
    }

    #[test]
    fn geometry_disagreeing_with_ontology_fails() {
        let value =
            AnnotationValue::Tool(ToolInstance::new(Geometry::Point(XyPoint::new(1.0, 2.0))));
        let err = encode_annotation("car", &value, &index(), &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, FlatlabelError::GeometryMismatch { .. }));
    }

    #[test]
    fn confidence_mode_defaults_to_zero() {
        let opts = EncodeOptions {
            with_confidence: true,
            ..Default::default()
        };
        let value = AnnotationValue::classification(["comment///ok"]);
        let record = encode_annotation("comment", &value, &index(), &opts).unwrap();
        assert_eq!(record.confidence, Some(0.0));

        let value = AnnotationValue::Classification {
            paths: vec!["comment///ok".to_string()],
            confidence: Some(0.75),
        };
        let record = encode_annotation("comment", &value, &index(), &opts).unwrap();
        assert_eq!(record.confidence, Some(0.75));
    }

    #[test]
    fn radio_without_answer_paths_is_loud() {
        let value = AnnotationValue::Tool(
            ToolInstance::new(Geometry::Bbox {
                top: 0.0,
                left: 0.0,
                height: 1.0,
                width: 1.0,
            })
            // the path stops at the classification, no answer below it
            .with_classifications(["damaged"]),
        );
        let err = encode_annotation("car", &value, &index(), &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, FlatlabelError::MissingAnswer { kind: "radio", .. }));
    }

    #[test]
    fn encode_annotations_attaches_data_row() {
        let values = vec![AnnotationValue::classification(["comment///a"])];
        let records =
            encode_annotations("dr-9", "comment", &values, &index(), &EncodeOptions::default())
                .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data_row.as_ref().unwrap().id, "dr-9");
    }
}
