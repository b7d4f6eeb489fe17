//! Assembles one run record per trace.
//!
//! For each variant, in configured order, the builder composes the analyzer
//! argv from the command template, runs it through the command runner, and
//! extracts the variant's static field list from the captured stdout. The
//! whole record is built in memory; the caller decides persistence. A
//! failure in any variant aborts the record — partial records are never
//! returned, so a late extraction failure can never leave a truncated row
//! on disk.

use std::collections::BTreeMap;

use racebench_schemas::{
    AnalyzerConfig, FieldValue, RunRecord, TraceRef, VariantSpec,
    DURATION_FIELD,
};
use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::error::HarnessError;
use crate::grammar::Grammar;

/// Composes the analyzer argv for one (variant, trace) invocation:
/// mode selector, optional format flag, trailing positional trace path.
pub fn analyzer_command(
    analyzer: &AnalyzerConfig,
    variant: &VariantSpec,
    trace: &TraceRef,
) -> CommandSpec {
    let mut args = vec![variant.mode_arg.clone()];
    if let Some(flag) = &analyzer.format_flag {
        args.push(flag.clone());
    }
    args.push(trace.path.display().to_string());
    CommandSpec::new(&analyzer.program, args, &analyzer.dir)
}

/// Builds the complete record for one trace across all variants.
///
/// `config_params` is recorded as-is; all variants of one record run
/// against a single analyzer build, so the parameters are identical across
/// them by construction.
pub fn build_record(
    trace: &TraceRef,
    variants: &[VariantSpec],
    analyzer: &AnalyzerConfig,
    config_params: &[(String, i64)],
    grammar: &Grammar,
) -> Result<RunRecord, HarnessError> {
    let mut metrics = BTreeMap::new();

    for variant in variants {
        let command = analyzer_command(analyzer, variant, trace);
        debug!(trace = %trace.name, variant = %variant.id, "invoking analyzer");
        let output = command.run()?;

        metrics.insert(
            format!("{}.{DURATION_FIELD}", variant.id),
            FieldValue::Int(output.duration_ms()),
        );
        for field in &variant.fields {
            let value = grammar.extract(&output.stdout, field)?;
            metrics.insert(format!("{}.{field}", variant.id), value);
        }

        info!(
            trace = %trace.name,
            variant = %variant.id,
            duration_ms = output.duration_ms(),
            "variant finished"
        );
    }

    Ok(RunRecord {
        trace_id: trace.name.clone(),
        config_params: config_params.to_vec(),
        metrics,
    })
}
