use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flatlabel operations.
#[derive(Debug, Error)]
pub enum FlatlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse ontology JSON from {path}: {source}")]
    OntologyJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse label export JSON from {path}: {source}")]
    ExportJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read table from {path}: {source}")]
    TableCsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The ontology input was not the expected nested tools/classifications
    /// structure.
    #[error("ontology input must be a normalized ontology object with 'tools' and 'classifications' arrays - received JSON {found}")]
    UnexpectedOntologyInput { found: String },

    /// A tool or classification type token outside the accepted set.
    #[error("unrecognized feature type '{value}' on ontology node '{node}'")]
    UnknownFeatureType { value: String, node: String },

    /// A typed column name whose type token is outside the accepted set.
    #[error("invalid value in {family} column name '{column}' - '{token}' must be one of |{accepted}|")]
    InvalidColumnName {
        family: &'static str,
        column: String,
        token: String,
        accepted: &'static str,
    },

    #[error("column '{0}' not present in table")]
    MissingColumn(String),

    /// A name path or schema id absent from the ontology index. Stale
    /// ontologies silently defaulting would corrupt downstream category
    /// assignment, so this always fails loudly.
    #[error("'{key}' not found in the ontology index")]
    MissingIndexEntry { key: String },

    /// A radio or text classification with no answer path to consume.
    #[error("no answer path provided for {kind} classification '{classification}'")]
    MissingAnswer {
        kind: &'static str,
        classification: String,
    },

    /// The annotation value's geometry does not agree with the ontology
    /// type for its feature.
    #[error("annotation value for '{name}' carries {found} geometry but the ontology declares {expected}")]
    GeometryMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An exported object without the geometry payload its ontology type
    /// promises.
    #[error("exported object '{name}' is missing its {expected} geometry payload")]
    MissingGeometry { name: String, expected: &'static str },

    /// An exported object carrying neither a schema id nor a resolvable
    /// feature name.
    #[error("exported object has neither a known schemaId nor a known feature name")]
    UnresolvableObject,

    /// A nested name path resolved to something other than a
    /// radio/checklist/text classification.
    #[error("'{name_path}' resolves to a {found} node; expected a radio, checklist, or text classification")]
    NotAClassification { name_path: String, found: &'static str },

    #[error("mask input method '{method}' does not accept a {found} mask source")]
    MaskMethodMismatch {
        method: &'static str,
        found: &'static str,
    },

    #[error("mask input method 'array' requires a rasterizer collaborator")]
    MissingRasterizer,

    /// Remote platform rejected a request outright.
    #[error("platform error: {0}")]
    Platform(String),

    /// An asynchronous remote job did not reach a terminal state before
    /// the retry deadline.
    #[error("remote job {job_id} still pending after {deadline_secs}s deadline")]
    JobTimeout { job_id: String, deadline_secs: u64 },

    /// A bulk upload batch was rejected. Remaining batches are not
    /// submitted.
    #[error("upload batch #{batch_number} failed: {errors:?}")]
    BatchFailed {
        batch_number: usize,
        errors: Vec<String>,
    },
}
