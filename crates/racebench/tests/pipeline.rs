//! End-to-end pipeline test against a fake analyzer.
//!
//! A shell script stands in for the analyzer binary: it prints the labeled
//! stdout lines the extraction grammar expects, varying by variant mode,
//! and fails on demand for one trace name. The test drives the same
//! library path the binary does: config, grammar, record builder, store,
//! report renderer.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use racebench_harness::{build_record, read_table, StoreWriter};
use racebench_report::render_reports;
use racebench_schemas::{FieldValue, HarnessConfig};
use serde_json::json;
use tempfile::TempDir;

const ANALYZER_SCRIPT: &str = r#"#!/bin/sh
mode="$1"
trace="$3"
case "$trace" in
  *broken.std) echo "no such trace" >&2; exit 3 ;;
esac
echo "locks: 4"
echo "reads: 120"
echo "writes: 80"
echo "acquires: 40"
echo "releases: 40"
echo "forks: 2"
echo "joins: 2"
echo "notifies: 1"
echo "waits: 1"
case "$mode" in
  UNDEAD)
    echo "Found 2 races."
    echo "Phase 2 elapsed time in milliseconds: 7"
    echo "UNDEAD dependencies per thread: 5 10 15"
    ;;
  PWRUNDEAD)
    echo "Found 3 races."
    echo "Phase 2 elapsed time in milliseconds: 9"
    echo "PWRUNDEAD dependencies per thread: 6 12 18"
    ;;
esac
"#;

fn write_analyzer(dir: &Path) {
    let path = dir.join("reader");
    fs::write(&path, ANALYZER_SCRIPT).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn write_config(dir: &Path, traces: &[&str]) -> HarnessConfig {
    let corpus_dir = dir.join("traces");
    fs::create_dir_all(&corpus_dir).unwrap();
    for trace in traces {
        fs::write(corpus_dir.join(trace), "").unwrap();
    }
    let config = json!({
        "analyzer": {
            "program": "./reader",
            "dir": dir,
            "format_flag": "--std",
            "build": []
        },
        "corpus": { "dir": corpus_dir, "traces": traces },
        "params": [["vc_limit", 5]],
        "variants": [
            { "id": "UNDEAD", "mode_arg": "UNDEAD",
              "fields": ["races", "phase2_ms", "undead_deps_thread",
                         "locks", "reads", "writes"] },
            { "id": "PWRUNDEAD", "mode_arg": "PWRUNDEAD",
              "fields": ["races", "phase2_ms", "pwr_deps_thread"] }
        ],
        "output_dir": dir.join("out"),
        "reports": [
            { "kind": "event_type_breakdown",
              "counters": ["UNDEAD.reads", "UNDEAD.writes"],
              "chart": "events.svg",
              "table": "events_table.csv" },
            { "kind": "deps_table",
              "columns": ["UNDEAD.undead_deps_thread",
                          "PWRUNDEAD.pwr_deps_thread"],
              "output": "deps_table.csv" }
        ]
    });
    let path = dir.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    HarnessConfig::load(&path).unwrap()
}

fn run_batch(config: &HarnessConfig) -> Result<(), racebench_harness::HarnessError> {
    let grammar =
        racebench_harness::Grammar::compile(&config.field_defs()).unwrap();
    fs::create_dir_all(&config.output_dir).unwrap();
    let schema = config.schema().unwrap();
    let mut writer =
        StoreWriter::create(&config.store_path(), &schema).unwrap();
    for trace in config.corpus.trace_refs() {
        let record = build_record(
            &trace,
            &config.variants,
            &config.analyzer,
            &config.params,
            &grammar,
        )?;
        writer.append(&record).unwrap();
    }
    Ok(())
}

#[test]
fn full_pipeline_collects_and_reports() {
    let dir = TempDir::new().unwrap();
    write_analyzer(dir.path());
    let config = write_config(dir.path(), &["account.std", "bank.std"]);

    run_batch(&config).unwrap();

    let schema = config.schema().unwrap();
    let table = read_table(&config.store_path(), &schema).unwrap();
    assert_eq!(table.records.len(), 2);
    let record = &table.records[0];
    assert_eq!(record.trace_id, "account.std");
    assert_eq!(record.config_params, vec![("vc_limit".to_string(), 5)]);
    assert_eq!(
        record.metrics.get("UNDEAD.races"),
        Some(&FieldValue::Int(2))
    );
    assert_eq!(
        record.metrics.get("PWRUNDEAD.races"),
        Some(&FieldValue::Int(3))
    );
    assert_eq!(
        record.metrics.get("PWRUNDEAD.pwr_deps_thread"),
        Some(&FieldValue::Series(vec![6, 12, 18]))
    );
    assert!(
        record.metrics.contains_key("UNDEAD.duration_ms"),
        "wall time is always recorded"
    );

    render_reports(&config.reports, &table, &config.output_dir).unwrap();
    let deps =
        fs::read_to_string(config.output_dir.join("deps_table.csv")).unwrap();
    let mut lines = deps.lines();
    assert_eq!(
        lines.next(),
        Some(
            "trace,undead_deps_sum,undead_deps_thread,\
             pwr_deps_sum,pwr_deps_thread"
        )
    );
    assert_eq!(lines.next(), Some("account.std,30,5-10-15,36,6-12-18"));
    assert!(config.output_dir.join("events.svg").exists());
    assert!(config.output_dir.join("events_table.csv").exists());
}

#[test]
fn failing_invocation_writes_zero_rows() {
    let dir = TempDir::new().unwrap();
    write_analyzer(dir.path());
    let config = write_config(dir.path(), &["broken.std"]);

    let err = run_batch(&config).unwrap_err();
    assert!(err.is_process(), "non-zero exit surfaces as a process error");

    let store = fs::read_to_string(config.store_path()).unwrap();
    assert_eq!(
        store.lines().count(),
        1,
        "only the header reaches the store for a failed trace"
    );
}

#[test]
fn append_resumes_an_interrupted_batch() {
    let dir = TempDir::new().unwrap();
    write_analyzer(dir.path());
    let config = write_config(dir.path(), &["account.std"]);
    run_batch(&config).unwrap();

    // Second batch over another trace, appending to the same store.
    let schema = config.schema().unwrap();
    let grammar =
        racebench_harness::Grammar::compile(&config.field_defs()).unwrap();
    fs::write(dir.path().join("traces").join("philo.std"), "").unwrap();
    let mut writer =
        StoreWriter::append_to(&config.store_path(), &schema).unwrap();
    let trace = racebench_schemas::TraceRef {
        name: "philo.std".to_string(),
        path: dir.path().join("traces").join("philo.std"),
    };
    let record = build_record(
        &trace,
        &config.variants,
        &config.analyzer,
        &config.params,
        &grammar,
    )
    .unwrap();
    writer.append(&record).unwrap();

    let table = read_table(&config.store_path(), &schema).unwrap();
    let names: Vec<&str> =
        table.records.iter().map(|r| r.trace_id.as_str()).collect();
    assert_eq!(names, vec!["account.std", "philo.std"]);
}
