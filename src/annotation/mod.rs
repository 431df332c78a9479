//! Annotation value model and the flat ⇄ nested codecs.
//!
//! [`model`] is the canonical tabular-cell representation both codecs
//! share. [`record`] is the upload-record wire shape and [`export`] the
//! exported-label wire shape; [`encode`] and [`decode`] translate
//! between them.

pub mod decode;
pub mod encode;
pub mod export;
mod model;
pub mod record;

pub use decode::{decode_label, flatten_classification, flatten_export, FlatRow};
pub use encode::{encode_annotation, encode_annotations, EncodeOptions};
pub use export::{ExportRecord, ExportedClassification, ExportedLabel, ExportedObject};
pub use model::{AnnotationValue, ColumnValue, Geometry, ToolInstance, XyPoint};
pub use record::{
    AnnotationBody, AnnotationRecord, AnswerNode, BboxPayload, ClassificationNode,
    ClassificationResponse, DataRowRef, MaskPayload, TextSpan,
};
