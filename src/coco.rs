//! COCO export built on the ontology index.
//!
//! A downstream consumer of the decoder: categories come straight from
//! the ontology index (`encoded_value` is the compact numeric category
//! id), annotations from decoded tool instances. Only the COCO-shaped
//! geometry survives: bbox, polygon, line, and point instances convert;
//! masks and named entities are skipped with a log note.
//!
//! Per-annotation conversion is independent work, so it fans out over a
//! bounded worker pool; each task returns its entry and the caller
//! collects.

use log::warn;
use rayon::prelude::*;
use serde::Serialize;

use crate::annotation::{ColumnValue, FlatRow, Geometry, ToolInstance, XyPoint};
use crate::error::FlatlabelError;
use crate::ontology::{FeatureType, NodeKind, OntologyIndex};

/// One COCO category entry.
#[derive(Clone, Debug, Serialize)]
pub struct CocoCategory {
    pub supercategory: String,
    pub id: u32,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Vec<[u32; 2]>>,
}

/// One COCO annotation entry. Image ids are the platform data row ids.
#[derive(Clone, Debug, Serialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: String,
    pub category_id: u32,

    /// `[x, y, width, height]` for bbox-shaped entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Vec<Vec<f64>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iscrowd: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_keypoints: Option<usize>,
}

/// The index- and annotation-derived sections of a COCO dataset.
#[derive(Clone, Debug, Serialize)]
pub struct CocoExport {
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
}

/// Converts decoded rows into COCO annotations and categories.
pub fn export_annotations(
    rows: &[FlatRow],
    index: &OntologyIndex,
) -> Result<CocoExport, FlatlabelError> {
    let divider = index.divider().to_string();

    // Flatten rows into independent per-instance work items.
    let mut work = Vec::new();
    for row in rows {
        for (column, value) in &row.columns {
            if let ColumnValue::Tool(instances) = value {
                for instance in instances {
                    work.push((column.clone(), row.data_row_id.clone(), instance.clone()));
                }
            }
        }
    }

    let converted: Vec<Option<(CocoAnnotation, usize)>> = work
        .par_iter()
        .enumerate()
        .map(|(id, (column, data_row_id, instance))| {
            convert_instance(id as u64, column, data_row_id, instance, index, &divider)
        })
        .collect();

    let mut annotations = Vec::new();
    let mut max_line_keypoints = 0;
    for entry in converted.into_iter().flatten() {
        max_line_keypoints = max_line_keypoints.max(entry.1);
        annotations.push(entry.0);
    }

    Ok(CocoExport {
        annotations,
        categories: categories(index, max_line_keypoints),
    })
}

/// Builds the COCO category list from the ontology index.
///
/// Tools map one to one; answer options nested exactly one
/// classification below a tool become categories with the tool as
/// supercategory. Line and point tools carry keypoint skeletons sized to
/// the longest converted line.
pub fn categories(index: &OntologyIndex, max_line_keypoints: usize) -> Vec<CocoCategory> {
    let divider = index.divider();
    let mut out = Vec::new();

    for entry in index.iter() {
        match entry.feature_type {
            FeatureType::Line => {
                let mut keypoints = Vec::new();
                let mut skeleton = Vec::new();
                for i in 0..max_line_keypoints as u32 {
                    keypoints.push(format!("line_{}", i + 1));
                    skeleton.push([i, i + 1]);
                }
                out.push(CocoCategory {
                    supercategory: entry.name.clone(),
                    id: entry.encoded_value,
                    name: entry.name.clone(),
                    keypoints: Some(keypoints),
                    skeleton: Some(skeleton),
                });
            }
            FeatureType::Point => {
                out.push(CocoCategory {
                    supercategory: entry.name.clone(),
                    id: entry.encoded_value,
                    name: entry.name.clone(),
                    keypoints: Some(vec!["point".to_string()]),
                    skeleton: Some(vec![[0, 0]]),
                });
            }
            _ if entry.kind == NodeKind::Tool => {
                out.push(CocoCategory {
                    supercategory: entry.name.clone(),
                    id: entry.encoded_value,
                    name: entry.name.clone(),
                    keypoints: None,
                    skeleton: None,
                });
            }
            _ => {
                // tool///classification///option answers double as
                // fine-grained categories under their tool.
                let segments: Vec<&str> = entry.name_path.split(divider).collect();
                let is_option = matches!(
                    entry.kind,
                    NodeKind::BranchOption | NodeKind::LeafOption
                );
                if is_option && segments.len() == 3 {
                    if let Some(tool) = index.entry_by_path(segments[0]) {
                        if tool.kind == NodeKind::Tool {
                            out.push(CocoCategory {
                                supercategory: tool.name.clone(),
                                id: entry.encoded_value,
                                name: entry.name.clone(),
                                keypoints: None,
                                skeleton: None,
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

fn convert_instance(
    id: u64,
    column: &str,
    data_row_id: &str,
    instance: &ToolInstance,
    index: &OntologyIndex,
    divider: &str,
) -> Option<(CocoAnnotation, usize)> {
    // Column keys read "annotation///{type}///{tool name}"; the tool
    // name is the last segment.
    let tool_name = column.rsplit(divider).next()?;
    let tool = index.entry_by_path(tool_name)?;

    // Category id: the first nested answer resolvable in the ontology
    // wins, otherwise the tool itself.
    let mut category_id = tool.encoded_value;
    for path in &instance.classifications {
        let full = format!("{tool_name}{divider}{path}");
        if let Some(answer) = index.entry_by_path(&full) {
            category_id = answer.encoded_value;
            break;
        }
    }

    let base = CocoAnnotation {
        id,
        image_id: data_row_id.to_string(),
        category_id,
        bbox: None,
        segmentation: None,
        area: None,
        iscrowd: None,
        keypoints: None,
        num_keypoints: None,
    };

    match &instance.geometry {
        Geometry::Bbox {
            top,
            left,
            height,
            width,
        } => Some((
            CocoAnnotation {
                bbox: Some([*left, *top, *width, *height]),
                ..base
            },
            0,
        )),
        Geometry::Polygon(points) => {
            let (bounds, area) = polygon_metrics(points);
            Some((
                CocoAnnotation {
                    segmentation: Some(vec![flatten_points(points)]),
                    bbox: Some(bounds),
                    area: Some(area),
                    iscrowd: Some(0),
                    ..base
                },
                0,
            ))
        }
        Geometry::Line(points) => {
            let mut keypoints = Vec::with_capacity(points.len() * 3);
            for point in points {
                keypoints.extend([point.x, point.y, 2.0]);
            }
            let count = points.len();
            Some((
                CocoAnnotation {
                    keypoints: Some(keypoints),
                    num_keypoints: Some(count),
                    ..base
                },
                count,
            ))
        }
        Geometry::Point(point) => Some((
            CocoAnnotation {
                keypoints: Some(vec![point.x, point.y, 2.0]),
                num_keypoints: Some(1),
                ..base
            },
            0,
        )),
        Geometry::Mask(_) | Geometry::NamedEntity { .. } => {
            warn!(
                "skipping {} instance of '{tool_name}': no COCO equivalent without rasterization",
                instance.geometry.feature_type()
            );
            None
        }
    }
}

fn flatten_points(points: &[XyPoint]) -> Vec<f64> {
    let mut flat = Vec::with_capacity(points.len() * 2);
    for point in points {
        flat.extend([point.x, point.y]);
    }
    flat
}

/// Bounding box `[x, y, width, height]` and shoelace area of a polygon.
fn polygon_metrics(points: &[XyPoint]) -> ([f64; 4], f64) {
    if points.is_empty() {
        return ([0.0; 4], 0.0);
    }
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut twice_area = 0.0;
    for (i, point) in points.iter().enumerate() {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
        let next = &points[(i + 1) % points.len()];
        twice_area += point.x * next.y - next.x * point.y;
    }
    (
        [min_x, min_y, max_x - min_x, max_y - min_y],
        (twice_area / 2.0).abs(),
    )
}
