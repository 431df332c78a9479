//! Ontology tree model.
//!
//! The labeling platform describes a project ontology as nested JSON:
//! `tools` (geometric features, each carrying nested classifications) and
//! `classifications` (radio/checklist/text questions, each carrying
//! options, which may carry further nested classifications).
//!
//! The raw shape discriminates node kinds implicitly by which keys a dict
//! carries (`tool` vs `instructions` vs `label`). That probing happens in
//! exactly one place here: the parse step converts the raw JSON into
//! [`OntologyNode`] values with an explicit [`NodeKind`] tag, so all
//! downstream code matches on a closed set.

use serde::{Deserialize, Serialize};

use crate::error::FlatlabelError;

// ============================================================================
// Raw platform schema types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawOntology {
    #[serde(default)]
    tools: Vec<RawNode>,
    #[serde(default)]
    classifications: Vec<RawNode>,
}

/// One node of the raw ontology JSON. Kind is decided by field presence:
/// tools carry `tool`, classifications carry `instructions`, options carry
/// `label`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Tool {
        name: String,
        tool: String,
        #[serde(default)]
        classifications: Vec<RawNode>,
        #[serde(rename = "featureSchemaId")]
        feature_schema_id: String,
    },
    Classification {
        instructions: String,
        #[serde(rename = "type")]
        classification_type: String,
        #[serde(default)]
        options: Vec<RawNode>,
        #[serde(rename = "featureSchemaId")]
        feature_schema_id: String,
    },
    Option {
        label: String,
        #[serde(default)]
        options: Vec<RawNode>,
        #[serde(rename = "featureSchemaId")]
        feature_schema_id: String,
    },
}

// ============================================================================
// Parsed model
// ============================================================================

/// The kind of an ontology node, assigned once at parse time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Tool,
    Classification,
    BranchOption,
    LeafOption,
}

impl NodeKind {
    /// The token used in detailed index entries.
    pub fn token(&self) -> &'static str {
        match self {
            NodeKind::Tool => "tool",
            NodeKind::Classification => "classification",
            NodeKind::BranchOption => "branch_option",
            NodeKind::LeafOption => "leaf_option",
        }
    }
}

/// Normalized feature type of an ontology node.
///
/// Raw exports drift across platform revisions (`rectangle` vs `bbox`,
/// `raster-segmentation`/`superpixel` vs `mask`, `geo_*` prefixes); all
/// spellings normalize here so the rest of the crate compares one token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureType {
    Bbox,
    Polygon,
    Line,
    Point,
    Mask,
    NamedEntity,
    Radio,
    Checklist,
    Text,
    /// Answer options have no type of their own.
    Option,
}

impl FeatureType {
    /// Parses a raw tool or classification type token.
    pub fn parse_token(raw: &str, node: &str) -> Result<Self, FlatlabelError> {
        let token = raw.strip_prefix("geo_").unwrap_or(raw);
        match token {
            "bbox" | "rectangle" => Ok(FeatureType::Bbox),
            "polygon" => Ok(FeatureType::Polygon),
            "line" => Ok(FeatureType::Line),
            "point" => Ok(FeatureType::Point),
            "mask" | "superpixel" | "raster-segmentation" => Ok(FeatureType::Mask),
            "named-entity" => Ok(FeatureType::NamedEntity),
            "radio" => Ok(FeatureType::Radio),
            "checklist" => Ok(FeatureType::Checklist),
            "text" => Ok(FeatureType::Text),
            _ => Err(FlatlabelError::UnknownFeatureType {
                value: raw.to_string(),
                node: node.to_string(),
            }),
        }
    }

    /// The canonical token, as used in column names and detailed index
    /// entries.
    pub fn token(&self) -> &'static str {
        match self {
            FeatureType::Bbox => "bbox",
            FeatureType::Polygon => "polygon",
            FeatureType::Line => "line",
            FeatureType::Point => "point",
            FeatureType::Mask => "mask",
            FeatureType::NamedEntity => "named-entity",
            FeatureType::Radio => "radio",
            FeatureType::Checklist => "checklist",
            FeatureType::Text => "text",
            FeatureType::Option => "option",
        }
    }

    /// True for the geometric tool types.
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            FeatureType::Bbox
                | FeatureType::Polygon
                | FeatureType::Line
                | FeatureType::Point
                | FeatureType::Mask
                | FeatureType::NamedEntity
        )
    }

    /// True for radio/checklist/text.
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            FeatureType::Radio | FeatureType::Checklist | FeatureType::Text
        )
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// One parsed ontology node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OntologyNode {
    /// Display name. Source field varies by kind: tools use `name`,
    /// classifications use `instructions`, options use `label`.
    pub name: String,
    pub kind: NodeKind,
    pub feature_type: FeatureType,
    /// Opaque stable identifier assigned by the platform.
    pub feature_schema_id: String,
    /// Ordered child nodes; empty for leaf options and text
    /// classifications.
    pub children: Vec<OntologyNode>,
}

/// A parsed project ontology: top-level tools followed by top-level
/// classifications, both in authored order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ontology {
    pub tools: Vec<OntologyNode>,
    pub classifications: Vec<OntologyNode>,
}

impl Ontology {
    /// Parses an ontology from an arbitrary JSON value.
    ///
    /// The value must be the platform's normalized ontology object. Any
    /// other JSON type fails with an error naming what was received.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, FlatlabelError> {
        if !value.is_object() {
            return Err(FlatlabelError::UnexpectedOntologyInput {
                found: json_type_name(value).to_string(),
            });
        }
        let raw: RawOntology = serde_json::from_value(value.clone()).map_err(|source| {
            FlatlabelError::UnexpectedOntologyInput {
                found: format!("object ({source})"),
            }
        })?;
        Self::from_raw(raw)
    }

    /// Parses an ontology from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, FlatlabelError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|source| FlatlabelError::UnexpectedOntologyInput {
                found: format!("unparseable text ({source})"),
            })?;
        Self::from_value(&value)
    }

    fn from_raw(raw: RawOntology) -> Result<Self, FlatlabelError> {
        Ok(Ontology {
            tools: raw
                .tools
                .into_iter()
                .map(parse_node)
                .collect::<Result<_, _>>()?,
            classifications: raw
                .classifications
                .into_iter()
                .map(parse_node)
                .collect::<Result<_, _>>()?,
        })
    }
}

fn parse_node(raw: RawNode) -> Result<OntologyNode, FlatlabelError> {
    match raw {
        RawNode::Tool {
            name,
            tool,
            classifications,
            feature_schema_id,
        } => {
            let feature_type = FeatureType::parse_token(&tool, &name)?;
            Ok(OntologyNode {
                kind: NodeKind::Tool,
                feature_type,
                feature_schema_id,
                children: classifications
                    .into_iter()
                    .map(parse_node)
                    .collect::<Result<_, _>>()?,
                name,
            })
        }
        RawNode::Classification {
            instructions,
            classification_type,
            options,
            feature_schema_id,
        } => {
            let feature_type = FeatureType::parse_token(&classification_type, &instructions)?;
            Ok(OntologyNode {
                kind: NodeKind::Classification,
                feature_type,
                feature_schema_id,
                children: options
                    .into_iter()
                    .map(parse_node)
                    .collect::<Result<_, _>>()?,
                name: instructions,
            })
        }
        RawNode::Option {
            label,
            options,
            feature_schema_id,
        } => {
            let children: Vec<OntologyNode> = options
                .into_iter()
                .map(parse_node)
                .collect::<Result<_, _>>()?;
            Ok(OntologyNode {
                kind: if children.is_empty() {
                    NodeKind::LeafOption
                } else {
                    NodeKind::BranchOption
                },
                feature_type: FeatureType::Option,
                feature_schema_id,
                children,
                name: label,
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
