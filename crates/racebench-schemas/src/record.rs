//! Run records, metric values, and the persisted store schema.
//!
//! A [`RunRecord`] holds everything collected for one trace across all
//! configured variants. Records are built fully in memory and only then
//! handed to the store, so a failed extraction can never leave a torn row
//! on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifies one input trace: a display name and its location on disk.
///
/// Created once at corpus-load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRef {
    /// Trace identifier, unique within a corpus (e.g. `account.std`).
    /// Used as the store row key.
    pub name: String,
    /// Filesystem location of the trace file.
    pub path: PathBuf,
}

/// One analyzer configuration to run against every trace.
///
/// The field list is static: it names exactly the grammar fields this
/// variant's detector is known to emit. Fields are never discovered
/// dynamically from output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    /// Variant identifier used to namespace metric columns
    /// (e.g. `UNDEAD`, `PWRUNDEAD`).
    pub id: String,
    /// The mode argument passed to the analyzer to select this variant.
    pub mode_arg: String,
    /// Grammar field names extracted from this variant's stdout,
    /// in column order.
    pub fields: Vec<String>,
}

/// The type of a single extracted metric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A single integer value.
    Int,
    /// A single floating-point value.
    Float,
    /// An ordered sequence of non-negative integers, one per thread
    /// observed in the trace. Length varies per trace; positions are
    /// not comparable across variants.
    Series,
}

/// One extracted metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Series(Vec<u64>),
}

impl FieldValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Series(_) => FieldKind::Series,
        }
    }

    /// Returns the integer value, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as f64. Integers widen; series have no scalar
    /// interpretation and return `None`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Series(_) => None,
        }
    }

    /// Returns the series, if this is a `Series`.
    pub fn as_series(&self) -> Option<&[u64]> {
        match self {
            FieldValue::Series(v) => Some(v),
            _ => None,
        }
    }

    /// Encodes the value for one store cell.
    ///
    /// Scalars print as-is; a series is its integers joined by single
    /// spaces. The space is the store's secondary separator and must never
    /// collide with the comma used between columns, which is why no field
    /// value may contain a literal comma.
    pub fn encode(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Series(vs) => {
                let parts: Vec<String> =
                    vs.iter().map(ToString::to_string).collect();
                parts.join(" ")
            }
        }
    }
}

/// The complete set of metrics collected for one trace across all variants
/// in one collection pass.
///
/// Well-formed only if every variant invocation exited successfully; the
/// builder never returns a partial record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Store row key; unique within one result store.
    pub trace_id: String,
    /// Build/run parameters in effect for this record (e.g. a vector-clock
    /// size limit). Identical across all variants of one record since all
    /// variants run against a single analyzer build.
    pub config_params: Vec<(String, i64)>,
    /// Metrics keyed `"{variant_id}.{field}"`. Harness-measured wall-clock
    /// durations are stored under `"{variant_id}.duration_ms"` alongside
    /// the extracted fields.
    pub metrics: BTreeMap<String, FieldValue>,
}

impl RunRecord {
    /// Harness-measured wall time of one variant invocation, if present.
    pub fn duration_ms(&self, variant_id: &str) -> Option<i64> {
        self.metrics
            .get(&format!("{variant_id}.duration_ms"))
            .and_then(FieldValue::as_int)
    }
}

/// An ordered sequence of run records read back from a store, with
/// insertion order preserved.
#[derive(Debug, Clone)]
pub struct ResultTable {
    /// The schema the store file was written with.
    pub schema: StoreSchema,
    /// One record per trace, in append order.
    pub records: Vec<RunRecord>,
}

/// Name of the column holding the trace identifier. Always first.
pub const TRACE_COLUMN: &str = "trace";

/// Suffix of the per-variant harness-measured duration column.
pub const DURATION_FIELD: &str = "duration_ms";

/// The type of one store column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// The trace identifier.
    Text,
    /// An integer metric or config parameter.
    Int,
    /// A floating-point metric.
    Float,
    /// A space-joined integer sequence.
    Series,
}

impl From<FieldKind> for ColumnKind {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Int => ColumnKind::Int,
            FieldKind::Float => ColumnKind::Float,
            FieldKind::Series => ColumnKind::Series,
        }
    }
}

/// One column of the persisted store: name plus value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// The fixed, ordered column layout of one store file.
///
/// Column order is: the trace identifier, the config parameters in
/// configured order, then for each variant its duration column followed by
/// its declared fields. The schema is fixed for the lifetime of a store
/// file; reads verify the on-disk header against it before parsing rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    columns: Vec<Column>,
}

impl StoreSchema {
    /// Builds a schema from config parameters, the variant set, and a kind
    /// lookup for grammar fields.
    ///
    /// Returns `Err` with the offending `"variant.field"` name if a variant
    /// declares a field the grammar does not define.
    pub fn build(
        params: &[(String, i64)],
        variants: &[VariantSpec],
        field_kind: impl Fn(&str) -> Option<FieldKind>,
    ) -> Result<Self, String> {
        let mut columns = vec![Column {
            name: TRACE_COLUMN.to_string(),
            kind: ColumnKind::Text,
        }];
        for (name, _) in params {
            columns.push(Column {
                name: name.clone(),
                kind: ColumnKind::Int,
            });
        }
        for variant in variants {
            columns.push(Column {
                name: format!("{}.{DURATION_FIELD}", variant.id),
                kind: ColumnKind::Int,
            });
            for field in &variant.fields {
                let Some(kind) = field_kind(field) else {
                    return Err(format!("{}.{field}", variant.id));
                };
                columns.push(Column {
                    name: format!("{}.{field}", variant.id),
                    kind: kind.into(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// The ordered columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The ordered column names, i.e. the store header row.
    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(field: &str) -> Option<FieldKind> {
        match field {
            "races" | "locks" => Some(FieldKind::Int),
            "deps_thread" => Some(FieldKind::Series),
            _ => None,
        }
    }

    fn variant(id: &str, fields: &[&str]) -> VariantSpec {
        VariantSpec {
            id: id.to_string(),
            mode_arg: id.to_string(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn schema_column_order_is_trace_params_then_variants() {
        let params = vec![("vc_limit".to_string(), 5)];
        let variants = vec![
            variant("UNDEAD", &["races"]),
            variant("PWRUNDEAD", &["races", "deps_thread"]),
        ];
        let schema = StoreSchema::build(&params, &variants, kind_of).unwrap();

        assert_eq!(
            schema.header(),
            vec![
                "trace",
                "vc_limit",
                "UNDEAD.duration_ms",
                "UNDEAD.races",
                "PWRUNDEAD.duration_ms",
                "PWRUNDEAD.races",
                "PWRUNDEAD.deps_thread",
            ]
        );
    }

    #[test]
    fn schema_assigns_column_kinds_from_grammar() {
        let variants = vec![variant("PWRUNDEAD", &["races", "deps_thread"])];
        let schema = StoreSchema::build(&[], &variants, kind_of).unwrap();

        assert_eq!(
            schema.column("PWRUNDEAD.races").unwrap().kind,
            ColumnKind::Int
        );
        assert_eq!(
            schema.column("PWRUNDEAD.deps_thread").unwrap().kind,
            ColumnKind::Series
        );
        assert_eq!(schema.column("trace").unwrap().kind, ColumnKind::Text);
    }

    #[test]
    fn schema_rejects_unknown_field() {
        let variants = vec![variant("UNDEAD", &["no_such_field"])];
        let err = StoreSchema::build(&[], &variants, kind_of).unwrap_err();
        assert_eq!(err, "UNDEAD.no_such_field");
    }

    #[test]
    fn field_value_encode_scalar_and_series() {
        assert_eq!(FieldValue::Int(42).encode(), "42");
        assert_eq!(FieldValue::Series(vec![7]).encode(), "7");
        assert_eq!(
            FieldValue::Series(vec![1, 2, 30]).encode(),
            "1 2 30",
            "series cells are space-joined"
        );
    }

    #[test]
    fn field_value_as_float_widens_int() {
        assert_eq!(FieldValue::Int(3).as_float(), Some(3.0));
        assert_eq!(FieldValue::Series(vec![1]).as_float(), None);
    }

    #[test]
    fn run_record_duration_lookup() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "UNDEAD.duration_ms".to_string(),
            FieldValue::Int(123),
        );
        let record = RunRecord {
            trace_id: "t".to_string(),
            config_params: vec![],
            metrics,
        };
        assert_eq!(record.duration_ms("UNDEAD"), Some(123));
        assert_eq!(record.duration_ms("PWRUNDEAD"), None);
    }
}
