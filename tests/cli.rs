use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(predicates::str::starts_with("flatlabel"));
}

// Index subcommand tests

#[test]
fn index_builds_forward_map() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args(["index", "tests/fixtures/sample.ontology.json"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("car///damaged///yes"));
}

#[test]
fn index_inverse_detailed_carries_encoded_values() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args([
        "index",
        "tests/fixtures/sample.ontology.json",
        "--invert",
        "--detailed",
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("encoded_value"))
        .stdout(predicates::str::contains("schema_id"));
}

#[test]
fn index_rejects_non_ontology_input() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args(["index", "tests/fixtures/sample.export.json"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("ontology input"));
}

// Flatten subcommand tests

#[test]
fn flatten_emits_one_row_per_unskipped_label() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args([
        "flatten",
        "tests/fixtures/sample.export.json",
        "--ontology",
        "tests/fixtures/sample.ontology.json",
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("street-0001"))
        .stdout(predicates::str::contains("annotation///bbox///car"))
        .stdout(predicates::str::contains("street-0002").not());
}

// Columns subcommand tests

#[test]
fn columns_accepts_contract_conformant_table() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args(["columns", "tests/fixtures/sample_valid.table.csv"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("2 metadata"))
        .stdout(predicates::str::contains("1 attachment"))
        .stdout(predicates::str::contains("2 annotation"));
}

#[test]
fn columns_names_the_offending_token() {
    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args(["columns", "tests/fixtures/sample_invalid.table.csv"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("metadata///blob///split"));
}

#[test]
fn columns_accepts_custom_divider() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "row_data,annotation|bbox|car").unwrap();
    writeln!(file, "https://rows/1,").unwrap();

    let mut cmd = Command::cargo_bin("flatlabel").unwrap();
    cmd.args(["columns", file.path().to_str().unwrap(), "--divider", "|"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("1 annotation"));
}
