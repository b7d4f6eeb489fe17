//! Secondary CSV tables derived from a result store.
//!
//! Each table is a fixed-header projection of the store: dependency sums,
//! raw event counts, race counts, per-variant timing rows, and vector-clock
//! limit violations. Headers name the bare field, not the namespaced store
//! column, so the files read the same regardless of variant naming.

use std::path::Path;

use racebench_schemas::{ColumnKind, PhasePair, ResultTable, RunRecord};

use crate::analytics::require_column;
use crate::error::{ReportError, ReportErrorKind};

/// The field part of a namespaced `variant.field` column name.
fn field_name(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// The variant part of a namespaced `variant.field` column name.
fn variant_name(column: &str) -> &str {
    match column.split_once('.') {
        Some((variant, _)) => variant,
        None => column,
    }
}

/// Header name for the sum column paired with a series column:
/// `undead_deps_thread` sums into `undead_deps_sum`.
fn sum_column_name(column: &str) -> String {
    let field = field_name(column);
    match field.strip_suffix("_thread") {
        Some(stem) => format!("{stem}_sum"),
        None => format!("{field}_sum"),
    }
}

fn int_metric(record: &RunRecord, column: &str) -> Result<i64, ReportError> {
    record.metrics.get(column).and_then(|v| v.as_int()).ok_or_else(|| {
        ReportError::new(ReportErrorKind::MissingMetric {
            trace: record.trace_id.clone(),
            column: column.to_string(),
        })
    })
}

fn series_metric<'r>(
    record: &'r RunRecord,
    column: &str,
) -> Result<&'r [u64], ReportError> {
    record.metrics.get(column).and_then(|v| v.as_series()).ok_or_else(|| {
        ReportError::new(ReportErrorKind::MissingMetric {
            trace: record.trace_id.clone(),
            column: column.to_string(),
        })
    })
}

/// Per-trace dependency sums and dash-joined per-thread lists, one
/// (sum, list) column pair per series column. Traces where the first
/// series sums to zero are skipped entirely.
pub fn deps_table(
    table: &ResultTable,
    columns: &[String],
    path: &Path,
) -> Result<(), ReportError> {
    for column in columns {
        require_column(&table.schema, column, ColumnKind::Series)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["trace".to_string()];
    for column in columns {
        header.push(sum_column_name(column));
        header.push(field_name(column).to_string());
    }
    writer.write_record(&header)?;

    let Some(first_column) = columns.first() else {
        writer.flush()?;
        return Ok(());
    };
    for record in &table.records {
        let first = series_metric(record, first_column)?;
        if first.iter().sum::<u64>() == 0 {
            continue;
        }
        let mut row = vec![record.trace_id.clone()];
        for column in columns {
            let series = series_metric(record, column)?;
            row.push(series.iter().sum::<u64>().to_string());
            row.push(
                series
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join("-"),
            );
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Raw per-trace event counts, one column per counter.
pub fn events_table(
    table: &ResultTable,
    counters: &[String],
    path: &Path,
) -> Result<(), ReportError> {
    for column in counters {
        require_column(&table.schema, column, ColumnKind::Int)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["trace".to_string()];
    header.extend(counters.iter().map(|c| field_name(c).to_string()));
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = vec![record.trace_id.clone()];
        for column in counters {
            row.push(int_metric(record, column)?.to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-trace race counts per variant, total event count, and lock count.
pub fn trace_info_table(
    table: &ResultTable,
    races: &[String],
    events: &[String],
    locks: &str,
    path: &Path,
) -> Result<(), ReportError> {
    for column in races.iter().chain(events).chain([&locks.to_string()]) {
        require_column(&table.schema, column, ColumnKind::Int)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["trace".to_string()];
    header.extend(
        races
            .iter()
            .map(|c| format!("races_{}", variant_name(c).to_lowercase())),
    );
    header.push("events".to_string());
    header.push("locks".to_string());
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = vec![record.trace_id.clone()];
        for column in races {
            row.push(int_metric(record, column)?.to_string());
        }
        let mut event_count = 0;
        for column in events {
            event_count += int_metric(record, column)?;
        }
        row.push(event_count.to_string());
        row.push(int_metric(record, locks)?.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-(trace, variant) timing rows: full wall time, phase 1 (full minus
/// phase 2), and phase 2. Traces whose first variant's full time falls
/// below `min_full_ms` are skipped.
pub fn timing_table(
    table: &ResultTable,
    variants: &[PhasePair],
    min_full_ms: i64,
    path: &Path,
) -> Result<(), ReportError> {
    for pair in variants {
        require_column(&table.schema, &pair.full, ColumnKind::Int)?;
        require_column(&table.schema, &pair.phase, ColumnKind::Int)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "trace",
        "detector",
        "time_taken_full (ms)",
        "time_taken_phase_1 (ms)",
        "time_taken_phase_2 (ms)",
    ])?;

    let Some(first_variant) = variants.first() else {
        writer.flush()?;
        return Ok(());
    };
    for record in &table.records {
        if int_metric(record, &first_variant.full)? < min_full_ms {
            continue;
        }
        for pair in variants {
            let full = int_metric(record, &pair.full)?;
            let phase2 = int_metric(record, &pair.phase)?;
            writer.write_record([
                record.trace_id.as_str(),
                pair.label.as_str(),
                &full.to_string(),
                &(full - phase2).to_string(),
                &phase2.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Vector-clock limit violations per trace and the violating dependencies
/// as a percentage of the dependency total, one column per cumulative
/// prefix of `dep_columns`. Traces below `min_exceeded` violations are
/// skipped.
pub fn vc_exceeded_table(
    table: &ResultTable,
    exceeded: &str,
    exceeded_deps: &str,
    dep_columns: &[String],
    min_exceeded: i64,
    path: &Path,
) -> Result<(), ReportError> {
    require_column(&table.schema, exceeded, ColumnKind::Int)?;
    require_column(&table.schema, exceeded_deps, ColumnKind::Int)?;
    for column in dep_columns {
        require_column(&table.schema, column, ColumnKind::Series)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "trace".to_string(),
        "vc_limit_exceeded_counter".to_string(),
        "vc_limit_exceeded_deps_counter".to_string(),
    ];
    for i in 0..dep_columns.len() {
        let stems: Vec<&str> = dep_columns[..=i]
            .iter()
            .map(|c| field_name(c))
            .collect();
        header.push(format!("percentage of {}", stems.join("+")));
    }
    writer.write_record(&header)?;

    for record in &table.records {
        let count = int_metric(record, exceeded)?;
        if count < min_exceeded {
            continue;
        }
        let deps = int_metric(record, exceeded_deps)?;
        let mut row = vec![
            record.trace_id.clone(),
            count.to_string(),
            deps.to_string(),
        ];
        let mut denominator = 0u64;
        for column in dep_columns {
            denominator += series_metric(record, column)?.iter().sum::<u64>();
            if denominator == 0 {
                return Err(ReportError::new(
                    ReportErrorKind::DivisionByZero {
                        metric: column.clone(),
                    },
                ));
            }
            row.push(format!(
                "{:.2}",
                deps as f64 / denominator as f64 * 100.0
            ));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
