//! Derived analytics over a result table.
//!
//! Every function here is pure and composable: it consumes values read
//! from a [`ResultTable`] and computes percentages, ratios, decompositions,
//! or filtered subsets. Nothing is persisted — derived metrics are
//! recomputed from the store on every analysis run.

use racebench_schemas::{
    ColumnKind, MetricRef, ResultTable, RunRecord, StoreSchema,
};

use crate::error::{ReportError, ReportErrorKind};

/// Converts sibling counters into percentages of their sum.
///
/// A zero sum yields all zeros rather than NaN or an error: callers that
/// threshold on a minimum sum never hit this case, but the function must
/// stay total for direct invocation.
pub fn normalize_shares(counters: &[f64]) -> Vec<f64> {
    let sum: f64 = counters.iter().sum();
    if sum == 0.0 {
        return vec![0.0; counters.len()];
    }
    counters.iter().map(|c| c / sum * 100.0).collect()
}

/// Relative overhead of `contender` versus `baseline` in percent:
/// `(contender - baseline) / baseline * 100`.
///
/// A zero baseline is an error by design; the report layer pre-filters
/// degenerate traces instead of this function masking them.
pub fn overhead_ratio(
    metric: &str,
    baseline: f64,
    contender: f64,
) -> Result<f64, ReportError> {
    if baseline == 0.0 {
        return Err(ReportError::new(ReportErrorKind::DivisionByZero {
            metric: metric.to_string(),
        }));
    }
    Ok((contender - baseline) / baseline * 100.0)
}

/// Decomposes three monotonically-increasing cumulative timings
/// (baseline, baseline+overhead-1, baseline+overhead-1+overhead-2) into
/// three non-negative percentage shares summing to 100.
///
/// A negative share means a later cumulative timing was smaller than an
/// earlier one — a measurement inversion, surfaced as an error and never
/// clamped away.
pub fn stacked_decomposition(
    cumulative: [f64; 3],
) -> Result<[f64; 3], ReportError> {
    let [first, second, total] = cumulative;
    if total == 0.0 {
        return Err(ReportError::new(ReportErrorKind::DivisionByZero {
            metric: "total cumulative time".to_string(),
        }));
    }
    let base_share = first / total * 100.0;
    let mid_share = second / total * 100.0 - base_share;
    let top_share = 100.0 - base_share - mid_share;
    let shares = [base_share, mid_share, top_share];
    if shares.iter().any(|s| *s < 0.0) {
        return Err(ReportError::new(
            ReportErrorKind::MeasurementInversion { shares },
        ));
    }
    Ok(shares)
}

/// Per-thread distributions that survive the meaningfulness filters:
/// total at least `min_sum` and at least `min_threads` entries
/// (distributions of length two or less carry no spread information).
///
/// Returns `(trace_id, series)` pairs in table order.
pub fn filter_distributions<'t>(
    table: &'t ResultTable,
    column: &str,
    min_sum: u64,
    min_threads: usize,
) -> Result<Vec<(&'t str, &'t [u64])>, ReportError> {
    require_column(&table.schema, column, ColumnKind::Series)?;

    let mut kept = Vec::new();
    for record in &table.records {
        let series = record
            .metrics
            .get(column)
            .and_then(|v| v.as_series())
            .ok_or_else(|| missing_metric(record, column))?;
        let sum: u64 = series.iter().sum();
        if sum >= min_sum && series.len() >= min_threads {
            kept.push((record.trace_id.as_str(), series));
        }
    }
    Ok(kept)
}

/// Reads one scalar metric (a column value or a series sum) from a record.
pub fn metric_value(
    record: &RunRecord,
    metric: &MetricRef,
) -> Result<f64, ReportError> {
    match metric {
        MetricRef::Column { column } => record
            .metrics
            .get(column)
            .and_then(|v| v.as_float())
            .ok_or_else(|| missing_metric(record, column)),
        MetricRef::SeriesSum { column } => record
            .metrics
            .get(column)
            .and_then(|v| v.as_series())
            .map(|s| s.iter().sum::<u64>() as f64)
            .ok_or_else(|| missing_metric(record, column)),
    }
}

/// Reads one scalar column from a record as f64.
pub fn scalar(record: &RunRecord, column: &str) -> Result<f64, ReportError> {
    record
        .metrics
        .get(column)
        .and_then(|v| v.as_float())
        .ok_or_else(|| missing_metric(record, column))
}

/// Verifies a column exists in the schema with the expected kind.
///
/// An analysis pass expecting a field absent from the header is a schema
/// mismatch, never a silent default.
pub fn require_column(
    schema: &StoreSchema,
    column: &str,
    kind: ColumnKind,
) -> Result<(), ReportError> {
    match schema.column(column) {
        Some(col) if col.kind == kind => Ok(()),
        _ => Err(ReportError::new(ReportErrorKind::MissingColumn {
            column: column.to_string(),
        })),
    }
}

fn missing_metric(record: &RunRecord, column: &str) -> ReportError {
    ReportError::new(ReportErrorKind::MissingMetric {
        trace: record.trace_id.clone(),
        column: column.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use racebench_schemas::{FieldKind, FieldValue, VariantSpec};

    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn normalize_shares_sums_to_hundred() {
        let shares = normalize_shares(&[30.0, 50.0, 20.0]);
        assert_close(shares.iter().sum::<f64>(), 100.0);
        assert_close(shares[0], 30.0);
        assert_close(shares[1], 50.0);
    }

    #[test]
    fn normalize_shares_zero_sum_is_all_zero_not_nan() {
        let shares = normalize_shares(&[0.0, 0.0, 0.0]);
        assert_eq!(shares, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn overhead_ratio_literal_pairs() {
        assert_close(overhead_ratio("t", 100.0, 150.0).unwrap(), 50.0);
        // Swapping the pair relates by the formula, not by negation.
        let swapped = overhead_ratio("t", 150.0, 100.0).unwrap();
        assert!(
            (swapped - (-100.0 / 3.0)).abs() < 1e-2,
            "expected -33.33, got {swapped}"
        );
    }

    #[test]
    fn overhead_ratio_zero_baseline_is_an_error() {
        let err = overhead_ratio("races", 0.0, 10.0).unwrap_err();
        assert!(err.is_division_by_zero());
        assert!(err.to_string().contains("races"));
    }

    #[test]
    fn stacked_decomposition_of_cumulative_timings() {
        let shares = stacked_decomposition([20.0, 35.0, 50.0]).unwrap();
        assert_close(shares[0], 40.0);
        assert_close(shares[1], 30.0);
        assert_close(shares[2], 30.0);
        assert_close(shares.iter().sum::<f64>(), 100.0);
    }

    #[test]
    fn stacked_decomposition_surfaces_inversion() {
        // Second cumulative timing below the first: not monotonic.
        let err = stacked_decomposition([40.0, 30.0, 50.0]).unwrap_err();
        assert!(err.is_measurement_inversion());
    }

    fn table_with_series(rows: &[(&str, Vec<u64>)]) -> ResultTable {
        let variants = vec![VariantSpec {
            id: "PWR".to_string(),
            mode_arg: "PWR".to_string(),
            fields: vec!["deps".to_string()],
        }];
        let schema =
            StoreSchema::build(&[], &variants, |_| Some(FieldKind::Series))
                .unwrap();
        let records = rows
            .iter()
            .map(|(trace, series)| {
                let mut metrics = BTreeMap::new();
                metrics
                    .insert("PWR.duration_ms".to_string(), FieldValue::Int(1));
                metrics.insert(
                    "PWR.deps".to_string(),
                    FieldValue::Series(series.clone()),
                );
                RunRecord {
                    trace_id: trace.to_string(),
                    config_params: vec![],
                    metrics,
                }
            })
            .collect();
        ResultTable { schema, records }
    }

    #[test]
    fn distribution_filter_boundary_at_min_sum() {
        let table = table_with_series(&[
            ("below.std", vec![20, 20, 9]),
            ("above.std", vec![20, 20, 11]),
        ]);
        let kept = filter_distributions(&table, "PWR.deps", 50, 3).unwrap();
        let names: Vec<&str> = kept.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["above.std"],
            "sum 49 must be excluded, sum 51 included"
        );
    }

    #[test]
    fn distribution_filter_drops_short_series() {
        let table = table_with_series(&[
            ("two.std", vec![100, 100]),
            ("three.std", vec![100, 100, 100]),
        ]);
        let kept = filter_distributions(&table, "PWR.deps", 0, 3).unwrap();
        let names: Vec<&str> = kept.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["three.std"]);
    }

    #[test]
    fn distribution_filter_unknown_column_is_missing_column() {
        let table = table_with_series(&[("a.std", vec![1, 2, 3])]);
        let err = filter_distributions(&table, "PWR.nothing", 0, 3)
            .unwrap_err();
        assert!(err.is_missing_column());
    }

    #[test]
    fn metric_ref_reads_column_and_series_sum() {
        let table = table_with_series(&[("a.std", vec![5, 10, 15])]);
        let record = &table.records[0];
        let sum = metric_value(
            record,
            &MetricRef::SeriesSum {
                column: "PWR.deps".to_string(),
            },
        )
        .unwrap();
        assert_close(sum, 30.0);
        let duration = metric_value(
            record,
            &MetricRef::Column {
                column: "PWR.duration_ms".to_string(),
            },
        )
        .unwrap();
        assert_close(duration, 1.0);
    }
}
