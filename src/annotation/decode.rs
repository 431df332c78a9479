//! Annotation decoder: exported labels back to flat cell values.
//!
//! The inverse of the encoder. Exported objects become
//! [`ToolInstance`] lists grouped per tool column; exported top-level
//! classifications flatten into leaf name-path lists partitioned per
//! classification column. Column keys are
//! `{type_token}{divider}{top_level_name}`.
//!
//! Flattening walks `answer`/`answers`/`text_answer` recursively,
//! concatenating `parent{divider}answer` at each level and appending the
//! literal text at text leaves, so
//! `decode(encode(value))` reproduces the original name-path sets
//! (order within checklist groups is not an invariant).

use std::collections::BTreeMap;

use log::debug;

use super::export::{
    ExportRecord, ExportedAnswer, ExportedAnswerValue, ExportedClassification, ExportedLabel,
    ExportedObject,
};
use super::model::{ColumnValue, Geometry, ToolInstance};
use crate::error::FlatlabelError;
use crate::masks::MaskSource;
use crate::ontology::{FeatureType, IndexEntry, OntologyIndex};
use crate::paths::first_segment;

/// One flattened label row, ready for a flat table.
#[derive(Clone, Debug, serde::Serialize)]
pub struct FlatRow {
    pub global_key: Option<String>,
    pub row_data: Option<String>,
    pub data_row_id: String,
    pub label_id: String,
    pub external_id: Option<String>,
    /// Annotation columns, keyed `annotation{divider}{type}{divider}{name}`.
    pub columns: BTreeMap<String, ColumnValue>,
}

/// Decodes one exported label into per-column values.
///
/// Keys are `{type_token}{divider}{top_level_name}`; tool columns group
/// every instance of the same tool, classification columns hold the
/// flattened name-path list rooted at the classification's own name.
pub fn decode_label(
    label: &ExportedLabel,
    index: &OntologyIndex,
    divider: &str,
) -> Result<BTreeMap<String, ColumnValue>, FlatlabelError> {
    let mut columns: BTreeMap<String, ColumnValue> = BTreeMap::new();

    for object in &label.objects {
        let entry = resolve_object_entry(object, index)?;
        let instance = decode_object(object, entry, divider)?;
        let key = format!("{}{divider}{}", entry.feature_type.token(), entry.name_path);

        match columns
            .entry(key)
            .or_insert_with(|| ColumnValue::Tool(Vec::new()))
        {
            ColumnValue::Tool(instances) => instances.push(instance),
            ColumnValue::Classification(_) => unreachable!("tool key collides with classification"),
        }
    }

    // Flatten every top-level classification, then partition the paths by
    // their first segment (the classification name).
    let mut paths = Vec::new();
    for classification in &label.classifications {
        paths.extend(flatten_classification(classification, divider));
    }
    for path in paths {
        let top = first_segment(&path, divider).to_string();
        let entry = index.require_path(&top)?;
        if !entry.feature_type.is_classification() {
            return Err(FlatlabelError::NotAClassification {
                name_path: top,
                found: entry.feature_type.token(),
            });
        }
        let key = format!("{}{divider}{}", entry.feature_type.token(), entry.name_path);
        match columns
            .entry(key)
            .or_insert_with(|| ColumnValue::Classification(Vec::new()))
        {
            ColumnValue::Classification(list) => list.push(path),
            ColumnValue::Tool(_) => unreachable!("classification key collides with tool"),
        }
    }

    Ok(columns)
}

/// Flattens a whole export: skipped labels are dropped, identity columns
/// are carried through, and annotation column keys gain the
/// `annotation{divider}` prefix.
pub fn flatten_export(
    records: &[ExportRecord],
    index: &OntologyIndex,
    divider: &str,
) -> Result<Vec<FlatRow>, FlatlabelError> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if record.skipped {
            debug!("skipping label {} (marked skipped)", record.label_id);
            continue;
        }
        let decoded = decode_label(&record.label, index, divider)?;
        let columns = decoded
            .into_iter()
            .map(|(key, value)| (format!("annotation{divider}{key}"), value))
            .collect();
        rows.push(FlatRow {
            global_key: record.global_key.clone(),
            row_data: record.row_data.clone(),
            data_row_id: record.data_row_id.clone(),
            label_id: record.label_id.clone(),
            external_id: record.external_id.clone(),
            columns,
        });
    }
    Ok(rows)
}

/// Flattens one exported classification into leaf name paths rooted at
/// the classification's own name.
pub fn flatten_classification(
    classification: &ExportedClassification,
    divider: &str,
) -> Vec<String> {
    let name = &classification.name;

    if let Some(text) = &classification.text_answer {
        return vec![format!("{name}{divider}{text}")];
    }
    if let Some(answer) = &classification.answer {
        return match answer {
            ExportedAnswerValue::Text(text) => vec![format!("{name}{divider}{text}")],
            ExportedAnswerValue::Node(node) => flatten_answer(node, divider)
                .into_iter()
                .map(|path| format!("{name}{divider}{path}"))
                .collect(),
        };
    }
    classification
        .answers
        .iter()
        .flat_map(|node| flatten_answer(node, divider))
        .map(|path| format!("{name}{divider}{path}"))
        .collect()
}

fn flatten_answer(answer: &ExportedAnswer, divider: &str) -> Vec<String> {
    if answer.classifications.is_empty() {
        return vec![answer.name.clone()];
    }
    answer
        .classifications
        .iter()
        .flat_map(|nested| flatten_classification(nested, divider))
        .map(|path| format!("{}{divider}{path}", answer.name))
        .collect()
}

fn resolve_object_entry<'a>(
    object: &ExportedObject,
    index: &'a OntologyIndex,
) -> Result<&'a IndexEntry, FlatlabelError> {
    if let Some(schema_id) = &object.schema_id {
        return index.require_schema(schema_id);
    }
    if let Some(name) = &object.name {
        return index.require_path(name);
    }
    Err(FlatlabelError::UnresolvableObject)
}

fn decode_object(
    object: &ExportedObject,
    entry: &IndexEntry,
    divider: &str,
) -> Result<ToolInstance, FlatlabelError> {
    let geometry = extract_geometry(object, entry)?;

    let classifications: Vec<String> = object
        .classifications
        .iter()
        .flat_map(|classification| flatten_classification(classification, divider))
        .collect();

    let mut instance = ToolInstance::new(geometry).with_classifications(classifications);
    instance.confidence = object.confidence;
    Ok(instance)
}

/// Inverse of the encoder's geometry payload mapping.
fn extract_geometry(
    object: &ExportedObject,
    entry: &IndexEntry,
) -> Result<Geometry, FlatlabelError> {
    let missing = |expected: &'static str| FlatlabelError::MissingGeometry {
        name: entry.name_path.clone(),
        expected,
    };

    match entry.feature_type {
        FeatureType::Bbox => object
            .bbox
            .map(|bbox| Geometry::Bbox {
                top: bbox.top,
                left: bbox.left,
                height: bbox.height,
                width: bbox.width,
            })
            .ok_or_else(|| missing("bbox")),
        FeatureType::Polygon => object
            .polygon
            .clone()
            .map(Geometry::Polygon)
            .ok_or_else(|| missing("polygon")),
        FeatureType::Line => object
            .line
            .clone()
            .map(Geometry::Line)
            .ok_or_else(|| missing("line")),
        FeatureType::Point => object
            .point
            .map(Geometry::Point)
            .ok_or_else(|| missing("point")),
        FeatureType::NamedEntity => object
            .location
            .map(|span| Geometry::NamedEntity {
                start: span.start,
                end: span.end,
            })
            .ok_or_else(|| missing("location")),
        FeatureType::Mask => extract_mask(object).ok_or_else(|| missing("mask")),
        other => Err(FlatlabelError::GeometryMismatch {
            name: entry.name_path.clone(),
            expected: "a geometry tool",
            found: other.token(),
        }),
    }
}

fn extract_mask(object: &ExportedObject) -> Option<Geometry> {
    // Upload records nest the payload under `mask`; raw exports put the
    // instance URI at the object's top level. Missing colors default to
    // white.
    if let Some(mask) = &object.mask {
        if let Some(png) = &mask.png {
            return Some(Geometry::Mask(MaskSource::Png(png.clone())));
        }
        if let Some(uri) = &mask.instance_uri {
            return Some(Geometry::Mask(MaskSource::Url {
                instance_uri: uri.clone(),
                color_rgb: mask.color_rgb.unwrap_or([255, 255, 255]),
            }));
        }
    }
    object.instance_uri.as_ref().map(|uri| {
        Geometry::Mask(MaskSource::Url {
            instance_uri: uri.clone(),
            color_rgb: object.color_rgb.unwrap_or([255, 255, 255]),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
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
                    "instructions": "weather",
                    "type": "checklist",
                    "featureSchemaId": "s-weather",
                    "options": [
                        {"label": "rain", "featureSchemaId": "s-rain"},
                        {"label": "fog", "featureSchemaId": "s-fog"}
                    ]
                }
            ]
        }))
        .expect("parse ontology");
        OntologyIndex::build(&ontology, "///")
    }

    fn label(json: serde_json::Value) -> ExportedLabel {
        serde_json::from_value(json).expect("parse exported label")
    }

    #[test]
    fn objects_group_per_tool_column() {
        let label = label(json!({
            "objects": [
                {
                    "schemaId": "s-car",
                    "bbox": {"top": 1.0, "left": 2.0, "height": 3.0, "width": 4.0},
                    "classifications": [
                        {"title": "damaged", "answer": {"title": "yes"}}
                    ]
                },
                {
                    "schemaId": "s-car",
                    "bbox": {"top": 5.0, "left": 6.0, "height": 7.0, "width": 8.0}
                }
            ],
            "classifications": []
        }));

        let columns = decode_label(&label, &index(), "///").expect("decode label");
        match columns.get("bbox///car").expect("bbox column") {
            ColumnValue::Tool(instances) => {
                assert_eq!(instances.len(), 2);
                assert_eq!(instances[0].classifications, vec!["damaged///yes"]);
                assert!(instances[1].classifications.is_empty());
            }
            other => panic!("expected tool column, got {other:?}"),
        }
    }

    #[test]
    fn checklist_classification_flattens_to_paths() {
        let label = label(json!({
            "objects": [],
            "classifications": [
                {
                    "title": "weather",
                    "answers": [{"title": "rain"}, {"title": "fog"}]
                }
            ]
        }));

        let columns = decode_label(&label, &index(), "///").expect("decode label");
        assert_eq!(
            columns.get("checklist///weather"),
            Some(&ColumnValue::Classification(vec![
                "weather///rain".to_string(),
                "weather///fog".to_string(),
            ]))
        );
    }

    #[test]
    fn unknown_schema_id_fails_loudly() {
        let label = label(json!({
            "objects": [
                {"schemaId": "s-ghost", "bbox": {"top": 0.0, "left": 0.0, "height": 1.0, "width": 1.0}}
            ],
            "classifications": []
        }));
        let err = decode_label(&label, &index(), "///").unwrap_err();
        assert!(matches!(err, FlatlabelError::MissingIndexEntry { .. }));
    }

    #[test]
    fn missing_geometry_payload_is_an_error() {
        let label = label(json!({
            "objects": [{"schemaId": "s-car"}],
            "classifications": []
        }));
        let err = decode_label(&label, &index(), "///").unwrap_err();
        assert!(matches!(err, FlatlabelError::MissingGeometry { .. }));
    }

    #[test]
    fn nested_text_answer_appends_literal() {
        let classification: ExportedClassification = serde_json::from_value(json!({
            "title": "quality",
            "answer": {
                "title": "bad",
                "classifications": [
                    {"title": "why", "answer": "blurry photo"}
                ]
            }
        }))
        .expect("parse classification");

        assert_eq!(
            flatten_classification(&classification, "///"),
            vec!["quality///bad///why///blurry photo".to_string()]
        );
    }

    #[test]
    fn flatten_export_skips_skipped_and_prefixes_columns() {
        let records: Vec<ExportRecord> = serde_json::from_value(json!([
            {
                "ID": "l-1",
                "DataRow ID": "dr-1",
                "Global Key": "gk-1",
                "Skipped": false,
                "Label": {
                    "objects": [],
                    "classifications": [
                        {"title": "weather", "answers": [{"title": "rain"}]}
                    ]
                }
            },
            {
                "ID": "l-2",
                "DataRow ID": "dr-2",
                "Skipped": true,
                "Label": {"objects": [], "classifications": []}
            }
        ]))
        .expect("parse export records");

        let rows = flatten_export(&records, &index(), "///").expect("flatten export");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].global_key.as_deref(), Some("gk-1"));
        assert!(rows[0].columns.contains_key("annotation///checklist///weather"));
    }
}
