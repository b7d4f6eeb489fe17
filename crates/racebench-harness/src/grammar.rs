//! The extraction grammar: a registry of named, typed line patterns.
//!
//! The contract between harness and analyzer is an implicit text format:
//! stdout is free-form human-readable lines, a fixed subset of which carry
//! one labeled fact each. Extraction is purely line-oriented — it never
//! parses the output as a structured format, it picks specific labeled
//! lines out of a semi-structured log.
//!
//! Because that contract is the pipeline's principal fragility point, the
//! grammar is an explicit table validated up front against a known-good
//! sample (`validate_sample`) rather than discovered lazily at the first
//! failing trace.

use std::collections::HashMap;

use racebench_schemas::{FieldDef, FieldKind, FieldValue};
use regex::Regex;
use tracing::debug;

use crate::error::{HarnessError, HarnessErrorKind};

/// One compiled extractor: an anchored multiline pattern with a single
/// capture, parsed according to its kind.
#[derive(Debug)]
struct FieldPattern {
    regex: Regex,
    kind: FieldKind,
}

/// The compiled extraction grammar.
#[derive(Debug)]
pub struct Grammar {
    fields: HashMap<String, FieldPattern>,
}

impl Grammar {
    /// Compiles a grammar from field definitions.
    ///
    /// Each pattern is compiled in multiline mode so `^`/`$` anchor to line
    /// boundaries. A pattern that fails to compile or does not contain
    /// exactly one capture group is rejected up front.
    pub fn compile(defs: &[FieldDef]) -> Result<Self, HarnessError> {
        let mut fields = HashMap::with_capacity(defs.len());
        for def in defs {
            let regex =
                Regex::new(&format!("(?m){}", def.pattern)).map_err(|err| {
                    HarnessError::new(HarnessErrorKind::InvalidPattern {
                        field: def.name.clone(),
                        reason: err.to_string(),
                    })
                })?;
            if regex.captures_len() != 2 {
                return Err(HarnessError::new(
                    HarnessErrorKind::InvalidPattern {
                        field: def.name.clone(),
                        reason: format!(
                            "expected exactly one capture group, found {}",
                            regex.captures_len() - 1
                        ),
                    },
                ));
            }
            fields.insert(
                def.name.clone(),
                FieldPattern {
                    regex,
                    kind: def.kind,
                },
            );
        }
        debug!(fields = fields.len(), "compiled extraction grammar");
        Ok(Self { fields })
    }

    /// Extracts one field from captured analyzer output.
    ///
    /// Fails with a field-not-found error when the pattern matches no line
    /// and an ambiguous-field error when it matches more than one; a
    /// silently defaulted metric would corrupt every downstream analytic,
    /// so neither case is ever masked.
    pub fn extract(
        &self,
        text: &str,
        name: &str,
    ) -> Result<FieldValue, HarnessError> {
        let pattern = self.fields.get(name).ok_or_else(|| {
            HarnessError::new(HarnessErrorKind::FieldNotFound {
                field: name.to_string(),
            })
        })?;

        let mut matches = pattern.regex.captures_iter(text);
        let Some(captures) = matches.next() else {
            return Err(HarnessError::new(HarnessErrorKind::FieldNotFound {
                field: name.to_string(),
            }));
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(HarnessError::new(HarnessErrorKind::AmbiguousField {
                field: name.to_string(),
                matches: extra + 1,
            }));
        }

        // captures_len is checked at compile time, so group 1 exists.
        let raw = captures.get(1).map_or("", |m| m.as_str());
        parse_capture(name, raw, pattern.kind)
    }

    /// Validates the named fields against a known-good sample output.
    ///
    /// Returns the first violation: a field whose pattern does not match
    /// the sample exactly once, or whose capture does not parse. Run once
    /// at startup, before the first real analyzer invocation.
    pub fn validate_sample(
        &self,
        sample: &str,
        fields: &[String],
    ) -> Result<(), HarnessError> {
        for field in fields {
            self.extract(sample, field)?;
        }
        Ok(())
    }
}

fn parse_capture(
    name: &str,
    raw: &str,
    kind: FieldKind,
) -> Result<FieldValue, HarnessError> {
    let malformed = || {
        HarnessError::new(HarnessErrorKind::Malformed {
            field: name.to_string(),
            text: raw.to_string(),
        })
    };
    match kind {
        FieldKind::Int => {
            raw.parse::<i64>().map(FieldValue::Int).map_err(|_| malformed())
        }
        FieldKind::Float => raw
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| malformed()),
        FieldKind::Series => {
            let values: Result<Vec<u64>, _> = raw
                .split_whitespace()
                .map(|part| part.parse::<u64>())
                .collect();
            values.map(FieldValue::Series).map_err(|_| malformed())
        }
    }
}
