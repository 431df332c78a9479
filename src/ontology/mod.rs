//! Ontology parsing and indexing.
//!
//! [`model`] parses the platform's normalized ontology JSON into a tagged
//! node tree; [`index`] walks that tree into the bidirectional
//! schema-id ⇄ name-path lookup table the annotation codecs run on.

mod index;
mod model;

pub use index::{IndexDirection, IndexEntry, OntologyIndex};
pub use model::{FeatureType, NodeKind, Ontology, OntologyNode};
