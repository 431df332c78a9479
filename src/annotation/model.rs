//! Canonical tabular-cell model for annotations.
//!
//! This is the shape annotation data takes inside a flat table cell:
//! geometry plus nested-classification name paths for tool columns, name
//! paths alone for classification columns. The encoder consumes these
//! values and the decoder produces them, so round trips meet in this
//! module.

use serde::{Deserialize, Serialize};

use crate::masks::MaskSource;
use crate::ontology::FeatureType;

/// A single x/y coordinate pair in pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XyPoint {
    pub x: f64,
    pub y: f64,
}

impl XyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry payload of a tool annotation, one variant per tool type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    Bbox {
        top: f64,
        left: f64,
        height: f64,
        width: f64,
    },
    Polygon(Vec<XyPoint>),
    Line(Vec<XyPoint>),
    Point(XyPoint),
    Mask(MaskSource),
    /// Character offsets into a text document.
    NamedEntity { start: u64, end: u64 },
}

impl Geometry {
    /// The ontology feature type this geometry belongs to.
    pub fn feature_type(&self) -> FeatureType {
        match self {
            Geometry::Bbox { .. } => FeatureType::Bbox,
            Geometry::Polygon(_) => FeatureType::Polygon,
            Geometry::Line(_) => FeatureType::Line,
            Geometry::Point(_) => FeatureType::Point,
            Geometry::Mask(_) => FeatureType::Mask,
            Geometry::NamedEntity { .. } => FeatureType::NamedEntity,
        }
    }
}

/// One geometric annotation instance as held in a tool column cell.
///
/// `classifications` holds nested-classification name paths relative to
/// the tool itself (the tool's own name is not a path segment).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInstance {
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ToolInstance {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            classifications: Vec::new(),
            confidence: None,
        }
    }

    /// Attaches nested-classification name paths (relative to the tool).
    pub fn with_classifications<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classifications = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A single annotation value handed to the encoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    Tool(ToolInstance),
    /// A top-level classification answer: name paths rooted at the
    /// classification's own name. The final segment of a text path is the
    /// literal text value.
    Classification {
        paths: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
}

impl AnnotationValue {
    pub fn classification<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnnotationValue::Classification {
            paths: paths.into_iter().map(Into::into).collect(),
            confidence: None,
        }
    }
}

/// A decoded flat-table cell: all instances of one top-level feature on
/// one data row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnValue {
    /// Multiple disjoint shapes of the same tool share one column.
    Tool(Vec<ToolInstance>),
    Classification(Vec<String>),
}
