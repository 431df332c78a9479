//! Criterion microbenches for flatlabel ontology indexing and encoding.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Ontology parsing and index construction
//! - Annotation encoding (bbox with nested classifications)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use flatlabel::annotation::{
    encode_annotation, AnnotationValue, EncodeOptions, Geometry, ToolInstance,
};
use flatlabel::ontology::{Ontology, OntologyIndex};

// Include test fixtures at compile time (no file I/O during benchmark)
const ONTOLOGY_FIXTURE: &str = include_str!("../tests/fixtures/sample.ontology.json");

/// Benchmark ontology parsing plus index construction.
fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("ontology_index");
    group.throughput(Throughput::Bytes(ONTOLOGY_FIXTURE.len() as u64));

    group.bench_function("parse_and_build", |b| {
        b.iter(|| {
            let ontology = Ontology::from_json_str(black_box(ONTOLOGY_FIXTURE)).unwrap();
            let index = OntologyIndex::build(&ontology, "///");
            black_box(index)
        })
    });

    let ontology = Ontology::from_json_str(ONTOLOGY_FIXTURE).unwrap();
    group.bench_function("build_only", |b| {
        b.iter(|| {
            let index = OntologyIndex::build(black_box(&ontology), "///");
            black_box(index)
        })
    });

    group.finish();
}

/// Benchmark encoding a bbox with a doubly nested radio classification.
fn bench_encode(c: &mut Criterion) {
    let ontology = Ontology::from_json_str(ONTOLOGY_FIXTURE).unwrap();
    let index = OntologyIndex::build(&ontology, "///");
    let opts = EncodeOptions::default();
    let value = AnnotationValue::Tool(
        ToolInstance::new(Geometry::Bbox {
            top: 120.0,
            left: 44.0,
            height: 80.0,
            width: 160.0,
        })
        .with_classifications(["damaged///yes///severity///minor"]),
    );

    c.bench_function("encode_bbox_nested", |b| {
        b.iter(|| {
            let record =
                encode_annotation(black_box("car"), black_box(&value), &index, &opts).unwrap();
            black_box(record)
        })
    });
}

criterion_group!(benches, bench_index_build, bench_encode);
criterion_main!(benches);
