//! Harness configuration: one JSON document describing the analyzer, the
//! trace corpus, the variant set, grammar extensions, and the report
//! manifest.
//!
//! There is deliberately no process-wide state: the loaded config struct is
//! passed explicitly into the pipeline, and nothing survives between runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fmt, fs, io};

use serde::{Deserialize, Serialize};

use crate::manifest::ReportSpec;
use crate::record::{FieldKind, StoreSchema, TraceRef, VariantSpec};

/// A named single-line extraction pattern with a typed capture.
///
/// The pattern must be anchored so it matches at most one line of analyzer
/// output and must contain exactly one capture group. Builtin fields cover
/// everything the stock analyzer prints; configs add fields for detector
/// builds that print more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name, referenced from `VariantSpec::fields`.
    pub name: String,
    /// Regular expression over one line of stdout, with one capture.
    /// Compiled in multiline mode so `^`/`$` anchor per line.
    pub pattern: String,
    /// How the capture is parsed.
    pub kind: FieldKind,
}

/// The builtin extraction grammar: every labeled line the analyzer emits.
///
/// One fact per line, `label` optionally followed by `:`, then a value or a
/// space-separated integer list. This table is the explicit, versioned
/// contract with the analyzer's stdout format.
pub fn builtin_fields() -> Vec<FieldDef> {
    fn f(name: &str, pattern: &str, kind: FieldKind) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            pattern: pattern.to_string(),
            kind,
        }
    }
    let mut fields = vec![
        f("races", r"^Found (\d+) races\.$", FieldKind::Int),
        f(
            "phase2_ms",
            r"^Phase 2 elapsed time in milliseconds: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "undead_deps_thread",
            r"^UNDEAD dependencies per thread: ([\d ]+)$",
            FieldKind::Series,
        ),
        f(
            "pwr_deps_thread",
            r"^PWRUNDEAD dependencies per thread: ([\d ]+)$",
            FieldKind::Series,
        ),
        f(
            "extra_deps_thread",
            r"^EXTRAEDGES dependencies per thread: ([\d ]+)$",
            FieldKind::Series,
        ),
        f(
            "vc_limit_exceeded",
            r"^VC limit exceeded: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "vc_limit_exceeded_deps",
            r"^VC limit exceeded by dependency: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "possible_guard_lock_deps",
            r"^Possible guard lock dependencies: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "possible_guard_locks",
            r"^Possible guard locks: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "guard_locks_accepted",
            r"^Guard locks accepted: (\d+)$",
            FieldKind::Int,
        ),
        f(
            "guard_locks_declined",
            r"^Guard locks declined: (\d+)$",
            FieldKind::Int,
        ),
    ];
    // Event-type counters share one printed shape.
    for counter in [
        "locks", "reads", "writes", "acquires", "releases", "forks", "joins",
        "notifies", "waits",
    ] {
        fields.push(f(
            counter,
            &format!(r"^{counter}: (\d+)$"),
            FieldKind::Int,
        ));
    }
    fields
}

/// The analyzer binary and how to (re)build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Path to the analyzer executable, relative to `dir`.
    pub program: PathBuf,
    /// Working directory for build and analyzer invocations.
    pub dir: PathBuf,
    /// Trace-format flag inserted before the trace path
    /// (e.g. `--std` or `--speedygo`).
    #[serde(default)]
    pub format_flag: Option<String>,
    /// Opaque build command templates, run in order inside `dir` before a
    /// collection pass. Arguments may reference config parameters as
    /// `{name}` placeholders (e.g. `-DVC_PER_DEP_LIMIT={vc_limit}`).
    #[serde(default)]
    pub build: Vec<Vec<String>>,
}

/// Where the trace corpus lives and which traces to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory containing the trace files.
    pub dir: PathBuf,
    /// Trace file names, in run order.
    pub traces: Vec<String>,
}

impl CorpusConfig {
    /// Resolves the configured trace names into `TraceRef`s.
    pub fn trace_refs(&self) -> Vec<TraceRef> {
        self.traces
            .iter()
            .map(|name| TraceRef {
                name: name.clone(),
                path: self.dir.join(name),
            })
            .collect()
    }
}

/// The complete harness configuration for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub analyzer: AnalyzerConfig,
    pub corpus: CorpusConfig,
    /// Build/run parameters, in column order (e.g. `vc_limit`). Substituted
    /// into build templates and persisted in every record.
    #[serde(default)]
    pub params: Vec<(String, i64)>,
    /// Analyzer variants, in run and column order.
    pub variants: Vec<VariantSpec>,
    /// Grammar extensions beyond [`builtin_fields`].
    #[serde(default)]
    pub extra_fields: Vec<FieldDef>,
    /// Known-good analyzer output used to validate the grammar at startup,
    /// before the first real invocation.
    #[serde(default)]
    pub golden_sample: Option<PathBuf>,
    /// Directory receiving the store, tables, and charts.
    pub output_dir: PathBuf,
    /// Store file name within `output_dir`.
    #[serde(default = "default_store_file")]
    pub store_file: String,
    /// Declarative report manifest consumed by the `report` subcommand.
    #[serde(default)]
    pub reports: Vec<ReportSpec>,
}

fn default_store_file() -> String {
    "results.csv".to_string()
}

impl HarnessConfig {
    /// Loads and parses a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| {
            ConfigError::new(ConfigErrorKind::Io {
                path: path.to_path_buf(),
                source: err,
            })
        })?;
        let config: HarnessConfig =
            serde_json::from_str(&content).map_err(|err| {
                ConfigError::new(ConfigErrorKind::Json {
                    path: path.to_path_buf(),
                    source: err,
                })
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-references the deserializer cannot: every variant field
    /// must resolve against the grammar (builtin plus extensions).
    fn validate(&self) -> Result<(), ConfigError> {
        let kinds = self.field_kinds();
        for variant in &self.variants {
            for field in &variant.fields {
                if !kinds.contains_key(field.as_str()) {
                    return Err(ConfigError::new(
                        ConfigErrorKind::UnknownField {
                            variant: variant.id.clone(),
                            field: field.clone(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }

    /// All grammar field definitions: builtins plus config extensions.
    /// An extension with a builtin's name replaces the builtin.
    pub fn field_defs(&self) -> Vec<FieldDef> {
        let mut defs = builtin_fields();
        for extra in &self.extra_fields {
            if let Some(existing) =
                defs.iter_mut().find(|d| d.name == extra.name)
            {
                *existing = extra.clone();
            } else {
                defs.push(extra.clone());
            }
        }
        defs
    }

    fn field_kinds(&self) -> BTreeMap<String, FieldKind> {
        self.field_defs()
            .into_iter()
            .map(|d| (d.name, d.kind))
            .collect()
    }

    /// Builds the store schema implied by this config.
    pub fn schema(&self) -> Result<StoreSchema, ConfigError> {
        let kinds = self.field_kinds();
        StoreSchema::build(&self.params, &self.variants, |field| {
            kinds.get(field).copied()
        })
        .map_err(|qualified| {
            let (variant, field) = qualified
                .split_once('.')
                .map(|(v, f)| (v.to_string(), f.to_string()))
                .unwrap_or((String::new(), qualified));
            ConfigError::new(ConfigErrorKind::UnknownField { variant, field })
        })
    }

    /// Full path of the result store file.
    pub fn store_path(&self) -> PathBuf {
        self.output_dir.join(&self.store_file)
    }

    /// Substitutes `{name}` parameter placeholders into one build template.
    pub fn substitute_params(&self, template: &[String]) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                let mut arg = arg.clone();
                for (name, value) in &self.params {
                    arg = arg.replace(
                        &format!("{{{name}}}"),
                        &value.to_string(),
                    );
                }
                arg
            })
            .collect()
    }
}

/// Error raised while loading or validating a harness configuration.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
}

#[derive(Debug)]
enum ConfigErrorKind {
    /// Could not read the config file.
    Io { path: PathBuf, source: io::Error },
    /// The config file is not valid JSON for the expected shape.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A variant references a field the grammar does not define.
    UnknownField { variant: String, field: String },
}

impl ConfigError {
    fn new(kind: ConfigErrorKind) -> Self {
        Self { kind }
    }

    /// Returns true if the config referenced an undefined grammar field.
    pub fn is_unknown_field(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::UnknownField { .. })
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigErrorKind::Json { path, source } => {
                write!(
                    f,
                    "failed to parse config {}: {source}",
                    path.display()
                )
            }
            ConfigErrorKind::UnknownField { variant, field } => {
                write!(
                    f,
                    "variant `{variant}` references field `{field}` which \
                     the extraction grammar does not define"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ConfigErrorKind::Io { source, .. } => Some(source),
            ConfigErrorKind::Json { source, .. } => Some(source),
            ConfigErrorKind::UnknownField { .. } => None,
        }
    }
}
