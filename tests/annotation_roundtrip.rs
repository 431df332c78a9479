//! Integration tests for the encode/decode round trip.
//!
//! Encoded upload records are fed straight back through the exported-
//! label reader: the export model accepts both the `name` spelling of
//! upload records and the `title` spelling of raw exports, so
//! `decode(encode(value))` can be checked end to end.

use std::collections::BTreeSet;

use flatlabel::annotation::{
    decode_label, encode_annotation, AnnotationValue, ColumnValue, EncodeOptions, ExportedLabel,
    Geometry, ToolInstance, XyPoint,
};
use flatlabel::ontology::{Ontology, OntologyIndex};

fn fixture_index() -> OntologyIndex {
    let json = include_str!("fixtures/sample.ontology.json");
    let ontology = Ontology::from_json_str(json).expect("parse ontology fixture");
    OntologyIndex::build(&ontology, "///")
}

/// Serializes records and reads them back as one exported label.
fn as_exported_label(records: &[flatlabel::annotation::AnnotationRecord]) -> ExportedLabel {
    let mut objects = Vec::new();
    let mut classifications = Vec::new();
    for record in records {
        let value = serde_json::to_value(record).expect("serialize record");
        let is_object = ["bbox", "polygon", "line", "point", "mask", "location"]
            .iter()
            .any(|key| value.get(key).is_some());
        if is_object {
            objects.push(value);
        } else {
            classifications.push(value);
        }
    }
    serde_json::from_value(serde_json::json!({
        "objects": objects,
        "classifications": classifications,
    }))
    .expect("parse records as exported label")
}

fn path_set(paths: &[String]) -> BTreeSet<String> {
    paths.iter().cloned().collect()
}

#[test]
fn bbox_with_nested_answers_roundtrips() {
    let index = fixture_index();
    let original = ToolInstance::new(Geometry::Bbox {
        top: 120.0,
        left: 44.0,
        height: 80.0,
        width: 160.0,
    })
    .with_classifications(["damaged///yes///severity///minor"]);

    let record = encode_annotation(
        "car",
        &AnnotationValue::Tool(original.clone()),
        &index,
        &EncodeOptions::default(),
    )
    .expect("encode bbox");

    let label = as_exported_label(&[record]);
    let columns = decode_label(&label, &index, "///").expect("decode label");

    match columns.get("bbox///car").expect("bbox column") {
        ColumnValue::Tool(instances) => {
            assert_eq!(instances.len(), 1);
            assert_eq!(instances[0].geometry, original.geometry);
            assert_eq!(
                path_set(&instances[0].classifications),
                path_set(&original.classifications)
            );
        }
        other => panic!("expected tool column, got {other:?}"),
    }
}

#[test]
fn checklist_roundtrips_as_a_set() {
    let index = fixture_index();
    let paths = vec![
        "weather///rain".to_string(),
        "weather///fog".to_string(),
        "weather///clear".to_string(),
    ];

    let record = encode_annotation(
        "weather",
        &AnnotationValue::classification(paths.clone()),
        &index,
        &EncodeOptions::default(),
    )
    .expect("encode checklist");

    let label = as_exported_label(&[record]);
    let columns = decode_label(&label, &index, "///").expect("decode label");

    assert_eq!(
        columns.get("checklist///weather"),
        Some(&ColumnValue::Classification(paths))
    );
}

#[test]
fn text_answer_roundtrips_literally() {
    let index = fixture_index();
    let paths = vec!["comment///two cars, poor visibility".to_string()];

    let record = encode_annotation(
        "comment",
        &AnnotationValue::classification(paths.clone()),
        &index,
        &EncodeOptions::default(),
    )
    .expect("encode text");

    let label = as_exported_label(&[record]);
    let columns = decode_label(&label, &index, "///").expect("decode label");

    assert_eq!(
        columns.get("text///comment"),
        Some(&ColumnValue::Classification(paths))
    );
}

#[test]
fn multiple_instances_share_one_column() {
    let index = fixture_index();
    let first = ToolInstance::new(Geometry::Bbox {
        top: 1.0,
        left: 2.0,
        height: 3.0,
        width: 4.0,
    });
    let second = ToolInstance::new(Geometry::Bbox {
        top: 5.0,
        left: 6.0,
        height: 7.0,
        width: 8.0,
    });

    let records: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .map(|instance| {
            encode_annotation(
                "car",
                &AnnotationValue::Tool(instance),
                &index,
                &EncodeOptions::default(),
            )
            .expect("encode bbox")
        })
        .collect();

    let label = as_exported_label(&records);
    let columns = decode_label(&label, &index, "///").expect("decode label");

    match columns.get("bbox///car").expect("bbox column") {
        ColumnValue::Tool(instances) => {
            assert_eq!(instances.len(), 2);
            assert_eq!(instances[0].geometry, first.geometry);
            assert_eq!(instances[1].geometry, second.geometry);
        }
        other => panic!("expected tool column, got {other:?}"),
    }
}

#[test]
fn point_and_named_entity_geometry_roundtrip() {
    let index = fixture_index();
    let original = ToolInstance::new(Geometry::Point(XyPoint::new(84.0, 145.5)));

    let record = encode_annotation(
        "driver",
        &AnnotationValue::Tool(original.clone()),
        &index,
        &EncodeOptions::default(),
    )
    .expect("encode point");

    let label = as_exported_label(&[record]);
    let columns = decode_label(&label, &index, "///").expect("decode label");

    match columns.get("point///driver").expect("point column") {
        ColumnValue::Tool(instances) => assert_eq!(instances[0].geometry, original.geometry),
        other => panic!("expected tool column, got {other:?}"),
    }
}

#[test]
fn fixture_export_decodes_to_expected_columns() {
    let index = fixture_index();
    let records: Vec<flatlabel::annotation::ExportRecord> =
        serde_json::from_str(include_str!("fixtures/sample.export.json"))
            .expect("parse export fixture");

    let rows = flatlabel::annotation::flatten_export(&records, &index, "///")
        .expect("flatten export fixture");

    // the skipped second label is dropped
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.global_key.as_deref(), Some("street-0001"));

    match row
        .columns
        .get("annotation///bbox///car")
        .expect("car column")
    {
        ColumnValue::Tool(instances) => {
            assert_eq!(instances.len(), 2);
            assert_eq!(
                instances[0].classifications,
                vec!["damaged///yes///severity///minor".to_string()]
            );
        }
        other => panic!("expected tool column, got {other:?}"),
    }

    assert_eq!(
        row.columns.get("annotation///text///comment"),
        Some(&ColumnValue::Classification(vec![
            "comment///two cars, poor visibility".to_string()
        ]))
    );
}
