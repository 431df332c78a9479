//! Flatlabel: flat tables in, nested annotation uploads out.
//!
//! Flatlabel translates between a flat, spreadsheet-friendly annotation
//! representation and the nested JSON annotation-upload format a
//! labeling platform expects, plus thin batching/retry wrappers around
//! the platform's bulk APIs. The hinge is the ontology index: a
//! bidirectional mapping between stable feature schema ids and
//! divider-delimited name paths, which the encoder and decoder use to
//! walk annotation trees in both directions.
//!
//! # Modules
//!
//! - [`paths`]: name-path string utilities
//! - [`ontology`]: ontology parsing and the path/schema index
//! - [`annotation`]: the flat ⇄ nested annotation codecs
//! - [`table`]: table backend trait and the column-naming contract
//! - [`upload`]: batching/retry orchestration over the platform API
//! - [`masks`]: mask input handling and the rasterizer seam
//! - [`coco`]: COCO export consuming the ontology index
//! - [`error`]: error types for flatlabel operations

pub mod annotation;
pub mod coco;
pub mod error;
pub mod masks;
pub mod ontology;
pub mod paths;
pub mod table;
pub mod upload;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub use error::FlatlabelError;

use annotation::ExportRecord;
use ontology::{IndexDirection, Ontology, OntologyIndex};
use paths::DEFAULT_DIVIDER;
use table::{ColumnIndex, CsvTable};

/// The flatlabel CLI application.
#[derive(Parser)]
#[command(name = "flatlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build the schema-id/name-path index from an ontology JSON file.
    Index(IndexArgs),
    /// Flatten a label export into row-oriented JSON lines.
    Flatten(FlattenArgs),
    /// Validate a CSV's column names against the naming contract.
    Columns(ColumnsArgs),
}

/// Arguments for the index subcommand.
#[derive(clap::Args)]
struct IndexArgs {
    /// Ontology JSON file (the platform's normalized shape).
    input: PathBuf,

    /// Path divider used in name paths.
    #[arg(long, default_value = DEFAULT_DIVIDER)]
    divider: String,

    /// Key the map by name path instead of schema id.
    #[arg(long)]
    invert: bool,

    /// Emit detailed entries (name, type, kind, encoded value).
    #[arg(long)]
    detailed: bool,
}

/// Arguments for the flatten subcommand.
#[derive(clap::Args)]
struct FlattenArgs {
    /// Label export JSON file (array of exported labels).
    input: PathBuf,

    /// Ontology JSON file the labels were created against.
    #[arg(long)]
    ontology: PathBuf,

    /// Path divider used in name paths and column names.
    #[arg(long, default_value = DEFAULT_DIVIDER)]
    divider: String,
}

/// Arguments for the columns subcommand.
#[derive(clap::Args)]
struct ColumnsArgs {
    /// CSV file whose header row is validated.
    input: PathBuf,

    /// Path divider used in column names.
    #[arg(long, default_value = DEFAULT_DIVIDER)]
    divider: String,
}

/// Run the flatlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), FlatlabelError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Index(args)) => run_index(args),
        Some(Commands::Flatten(args)) => run_flatten(args),
        Some(Commands::Columns(args)) => run_columns(args),
        None => {
            println!("flatlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Flat tables in, nested annotation uploads out.");
            println!();
            println!("Run 'flatlabel --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the index subcommand.
fn run_index(args: IndexArgs) -> Result<(), FlatlabelError> {
    let ontology = read_ontology(&args.input)?;
    let index = OntologyIndex::build(&ontology, &args.divider);

    let direction = if args.invert {
        IndexDirection::Inverse
    } else {
        IndexDirection::Forward
    };
    let map = index.to_map(direction, args.detailed);

    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

/// Execute the flatten subcommand.
fn run_flatten(args: FlattenArgs) -> Result<(), FlatlabelError> {
    let ontology = read_ontology(&args.ontology)?;
    let index = OntologyIndex::build(&ontology, &args.divider);

    let file = File::open(&args.input).map_err(FlatlabelError::Io)?;
    let records: Vec<ExportRecord> = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| FlatlabelError::ExportJsonParse {
            path: args.input.clone(),
            source,
        })?;

    let rows = annotation::flatten_export(&records, &index, &args.divider)?;
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

/// Execute the columns subcommand.
fn run_columns(args: ColumnsArgs) -> Result<(), FlatlabelError> {
    let table = CsvTable::from_path(&args.input)?;
    let index = ColumnIndex::build(&table, &args.divider)?;

    println!(
        "{} metadata, {} attachment, {} annotation, {} prediction column(s)",
        index.metadata.len(),
        index.attachments.len(),
        index.annotations.len(),
        index.predictions.len()
    );
    Ok(())
}

fn read_ontology(path: &Path) -> Result<Ontology, FlatlabelError> {
    let file = File::open(path).map_err(FlatlabelError::Io)?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file)).map_err(
        |source| FlatlabelError::OntologyJsonParse {
            path: path.to_path_buf(),
            source,
        },
    )?;
    Ontology::from_value(&value)
}
