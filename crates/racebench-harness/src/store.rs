//! The result store: an append-only CSV of run records.
//!
//! One header line (comma-separated column names in schema order) followed
//! by one line per trace. Scalar fields are comma-separated; a sequence
//! field is its integers joined by single spaces inside one comma-delimited
//! column. The comma-vs-space separator split is the bit-exact contract
//! that keeps the format unambiguous, which is why no cell may contain a
//! literal comma.
//!
//! Durability over performance: each appended row is encoded fully in
//! memory, written as one record, and flushed immediately, so a crash
//! after N traces leaves a well-formed file with exactly N rows and never
//! a torn row.

use std::fs::{self, OpenOptions};
use std::path::Path;

use racebench_schemas::{
    ColumnKind, FieldValue, ResultTable, RunRecord, StoreSchema,
};
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessErrorKind};

/// Append-side handle for one store file.
#[derive(Debug)]
pub struct StoreWriter {
    writer: csv::Writer<fs::File>,
    schema: StoreSchema,
}

impl StoreWriter {
    /// Creates (or truncates) the store file and writes the header row.
    pub fn create(
        path: &Path,
        schema: &StoreSchema,
    ) -> Result<Self, HarnessError> {
        let file = fs::File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(schema.header())?;
        writer.flush()?;
        info!(path = %path.display(), "created result store");
        Ok(Self {
            writer,
            schema: schema.clone(),
        })
    }

    /// Opens an existing store for append, verifying that its header
    /// matches `schema` exactly. A missing or empty file is created fresh.
    ///
    /// The column layout is fixed for the lifetime of one store file;
    /// appending under a different schema would silently misalign columns,
    /// so a header disagreement is a schema-mismatch error instead.
    pub fn append_to(
        path: &Path,
        schema: &StoreSchema,
    ) -> Result<Self, HarnessError> {
        let exists = path.exists() && fs::metadata(path)?.len() > 0;
        if !exists {
            return Self::create(path, schema);
        }

        verify_header(path, schema)?;
        let file = OpenOptions::new().append(true).open(path)?;
        let writer = csv::Writer::from_writer(file);
        debug!(path = %path.display(), "opened result store for append");
        Ok(Self {
            writer,
            schema: schema.clone(),
        })
    }

    /// Appends one record as a single row and flushes it to disk.
    ///
    /// The full row is encoded before anything is written: a record missing
    /// a schema column fails here, with nothing on disk.
    pub fn append(&mut self, record: &RunRecord) -> Result<(), HarnessError> {
        let row = encode_row(&self.schema, record)?;
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        debug!(trace = %record.trace_id, "appended store row");
        Ok(())
    }
}

/// Reads a store file back into typed records, in row order.
///
/// The on-disk header must equal the expected schema's header; each
/// sequence-valued column is re-split on its secondary (space) separator.
pub fn read_table(
    path: &Path,
    schema: &StoreSchema,
) -> Result<ResultTable, HarnessError> {
    verify_header(path, schema)?;

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        records.push(decode_row(schema, &row, index + 1)?);
    }
    debug!(path = %path.display(), rows = records.len(), "read result store");
    Ok(ResultTable {
        schema: schema.clone(),
        records,
    })
}

fn verify_header(
    path: &Path,
    schema: &StoreSchema,
) -> Result<(), HarnessError> {
    let mut reader = csv::Reader::from_path(path)?;
    let found: Vec<String> =
        reader.headers()?.iter().map(ToString::to_string).collect();
    let expected: Vec<String> =
        schema.header().iter().map(ToString::to_string).collect();
    if found != expected {
        return Err(HarnessError::new(HarnessErrorKind::SchemaMismatch {
            expected,
            found,
        }));
    }
    Ok(())
}

/// A column name containing `.` is a namespaced variant metric; everything
/// else (past the trace column) is a config parameter.
fn is_metric_column(name: &str) -> bool {
    name.contains('.')
}

fn encode_row(
    schema: &StoreSchema,
    record: &RunRecord,
) -> Result<Vec<String>, HarnessError> {
    let mut row = Vec::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let cell = match column.kind {
            ColumnKind::Text => record.trace_id.clone(),
            _ if is_metric_column(&column.name) => record
                .metrics
                .get(&column.name)
                .ok_or_else(|| {
                    HarnessError::new(HarnessErrorKind::FieldNotFound {
                        field: column.name.clone(),
                    })
                })?
                .encode(),
            _ => record
                .config_params
                .iter()
                .find(|(name, _)| *name == column.name)
                .map(|(_, value)| value.to_string())
                .ok_or_else(|| {
                    HarnessError::new(HarnessErrorKind::FieldNotFound {
                        field: column.name.clone(),
                    })
                })?,
        };
        row.push(cell);
    }
    Ok(row)
}

fn decode_row(
    schema: &StoreSchema,
    row: &csv::StringRecord,
    row_index: usize,
) -> Result<RunRecord, HarnessError> {
    let mut trace_id = String::new();
    let mut config_params = Vec::new();
    let mut metrics = std::collections::BTreeMap::new();

    for (position, column) in schema.columns().iter().enumerate() {
        let cell = row.get(position).ok_or_else(|| {
            HarnessError::new(HarnessErrorKind::BadCell {
                column: column.name.clone(),
                row: row_index,
                text: "<missing>".to_string(),
            })
        })?;
        let bad_cell = || {
            HarnessError::new(HarnessErrorKind::BadCell {
                column: column.name.clone(),
                row: row_index,
                text: cell.to_string(),
            })
        };

        match column.kind {
            ColumnKind::Text => trace_id = cell.to_string(),
            ColumnKind::Int if !is_metric_column(&column.name) => {
                let value = cell.parse::<i64>().map_err(|_| bad_cell())?;
                config_params.push((column.name.clone(), value));
            }
            ColumnKind::Int => {
                let value = cell.parse::<i64>().map_err(|_| bad_cell())?;
                metrics.insert(column.name.clone(), FieldValue::Int(value));
            }
            ColumnKind::Float => {
                let value = cell.parse::<f64>().map_err(|_| bad_cell())?;
                metrics.insert(column.name.clone(), FieldValue::Float(value));
            }
            ColumnKind::Series => {
                let values: Result<Vec<u64>, _> = cell
                    .split_whitespace()
                    .map(|part| part.parse::<u64>())
                    .collect();
                let values = values.map_err(|_| bad_cell())?;
                metrics
                    .insert(column.name.clone(), FieldValue::Series(values));
            }
        }
    }

    Ok(RunRecord {
        trace_id,
        config_params,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use racebench_schemas::{FieldKind, VariantSpec};

    use super::*;

    fn schema() -> StoreSchema {
        let variants = vec![VariantSpec {
            id: "PWRUNDEAD".to_string(),
            mode_arg: "PWRUNDEAD".to_string(),
            fields: vec!["races".to_string(), "deps_thread".to_string()],
        }];
        StoreSchema::build(
            &[("vc_limit".to_string(), 5)],
            &variants,
            |field| match field {
                "races" => Some(FieldKind::Int),
                "deps_thread" => Some(FieldKind::Series),
                _ => None,
            },
        )
        .unwrap()
    }

    fn record(trace: &str, races: i64, deps: Vec<u64>) -> RunRecord {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "PWRUNDEAD.duration_ms".to_string(),
            FieldValue::Int(100 + races),
        );
        metrics.insert("PWRUNDEAD.races".to_string(), FieldValue::Int(races));
        metrics.insert(
            "PWRUNDEAD.deps_thread".to_string(),
            FieldValue::Series(deps),
        );
        RunRecord {
            trace_id: trace.to_string(),
            config_params: vec![("vc_limit".to_string(), 5)],
            metrics,
        }
    }

    #[test]
    fn three_appends_read_back_in_insertion_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let records = vec![
            record("account.std", 1, vec![4, 5]),
            record("derby.std", 2, vec![9]),
            record("sor.std", 3, vec![1, 2, 3, 4]),
        ];
        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        for r in &records {
            writer.append(r).unwrap();
        }
        drop(writer);

        let table = read_table(&path, &schema).unwrap();
        assert_eq!(table.records.len(), 3);
        for (read, written) in table.records.iter().zip(&records) {
            assert_eq!(read, written, "round-trip must preserve field values");
        }
    }

    #[test]
    fn series_round_trips_singleton_and_ten_elements() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let ten: Vec<u64> = (0..10).map(|i| i * 7).collect();
        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        writer.append(&record("one.std", 0, vec![42])).unwrap();
        writer.append(&record("ten.std", 0, ten.clone())).unwrap();
        drop(writer);

        let table = read_table(&path, &schema).unwrap();
        assert_eq!(
            table.records[0].metrics["PWRUNDEAD.deps_thread"],
            FieldValue::Series(vec![42])
        );
        assert_eq!(
            table.records[1].metrics["PWRUNDEAD.deps_thread"],
            FieldValue::Series(ten)
        );
    }

    #[test]
    fn rows_are_durable_without_dropping_the_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        writer.append(&record("account.std", 1, vec![1])).unwrap();

        // Read while the writer is still open: the flushed row must be
        // visible, modeling a crash right after the append.
        let table = read_table(&path, &schema).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].trace_id, "account.std");
        drop(writer);
    }

    #[test]
    fn append_to_continues_an_existing_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        writer.append(&record("a.std", 1, vec![1])).unwrap();
        drop(writer);

        let mut writer = StoreWriter::append_to(&path, &schema).unwrap();
        writer.append(&record("b.std", 2, vec![2])).unwrap();
        drop(writer);

        let table = read_table(&path, &schema).unwrap();
        let traces: Vec<&str> =
            table.records.iter().map(|r| r.trace_id.as_str()).collect();
        assert_eq!(traces, vec!["a.std", "b.std"]);
    }

    #[test]
    fn append_to_rejects_foreign_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        fs::write(&path, "trace,some,other,columns\n").unwrap();

        let err = StoreWriter::append_to(&path, &schema()).unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn read_rejects_missing_expected_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        // Header lacks the deps_thread column the schema expects.
        fs::write(
            &path,
            "trace,vc_limit,PWRUNDEAD.duration_ms,PWRUNDEAD.races\n\
             a.std,5,100,1\n",
        )
        .unwrap();

        let err = read_table(&path, &schema()).unwrap_err();
        assert!(
            err.is_schema_mismatch(),
            "a missing column must be a schema mismatch, not a default"
        );
    }

    #[test]
    fn append_rejects_record_missing_a_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let mut incomplete = record("a.std", 1, vec![1]);
        incomplete.metrics.remove("PWRUNDEAD.races");

        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        let err = writer.append(&incomplete).unwrap_err();
        assert!(err.is_field_not_found());
        drop(writer);

        // Nothing past the header may have been written.
        let table = read_table(&path, &schema).unwrap();
        assert!(table.records.is_empty());
    }

    #[test]
    fn persisted_form_uses_comma_and_space_separators() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        let schema = schema();

        let mut writer = StoreWriter::create(&path, &schema).unwrap();
        writer.append(&record("a.std", 7, vec![1, 2, 3])).unwrap();
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "trace,vc_limit,PWRUNDEAD.duration_ms,PWRUNDEAD.races,\
             PWRUNDEAD.deps_thread"
        );
        assert_eq!(lines.next().unwrap(), "a.std,5,107,7,1 2 3");
    }
}
