use anyhow::{Context, Result};
use mimo_core::{EnergySystem, MimoConverter, MimoError, MimoResult, Sequence};
use mimo_model::EmissionLimit;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::constraint::emission_limit_from_record;
use crate::facade::MimoFacade;

/// A flat key/value record, dispatched on its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn optional_str(&self, key: &str) -> MimoResult<Option<&str>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(MimoError::Type(format!(
                "'{}' must be a string, got {}",
                key, other
            ))),
        }
    }

    pub(crate) fn optional_f64(&self, key: &str) -> MimoResult<Option<f64>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(MimoError::Type(format!(
                "'{}' must be a number, got {}",
                key, other
            ))),
        }
    }
}

/// Numeric record value as a sequence: a number or a list of numbers.
pub(crate) fn sequence(key: &str, value: &Value) -> MimoResult<Sequence> {
    let invalid = || MimoError::Type(format!("'{}' must be a number or a list of numbers", key));
    match value {
        Value::Number(n) => n.as_f64().map(Sequence::Constant).ok_or_else(invalid),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().ok_or_else(invalid))
            .collect::<MimoResult<Vec<_>>>()
            .map(Sequence::Series),
        _ => Err(invalid()),
    }
}

/// A record decoded into its typed form.
#[derive(Debug, Clone)]
pub enum Parsed {
    Mimo(MimoConverter),
    EmissionLimit(EmissionLimit),
}

/// Read a list of records from a YAML or JSON file.
pub fn load_records_from_path(path: &Path) -> Result<Vec<Record>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading records '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing records yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing records json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing records"),
    }
}

/// Decode one record. Buses named by `mimo` records must exist in `es`.
pub fn parse_record(record: &Record, es: &EnergySystem) -> MimoResult<Parsed> {
    match record.kind.as_str() {
        "mimo" => {
            let config = MimoFacade::from_record(record, es)?;
            Ok(Parsed::Mimo(MimoConverter::new(config)?))
        }
        "co2_emission_limit" => Ok(Parsed::EmissionLimit(emission_limit_from_record(record)?)),
        other => Err(MimoError::Lookup(format!("Unknown record type '{}'.", other))),
    }
}

/// Add every converter record to `es` and return the emission limits, in
/// record order, for building onto the model.
pub fn apply_records(records: &[Record], es: &mut EnergySystem) -> MimoResult<Vec<EmissionLimit>> {
    let mut limits = Vec::new();
    let mut converters = 0;
    for record in records {
        match parse_record(record, es)? {
            Parsed::Mimo(converter) => {
                debug!(label = converter.label(), "adding converter from record");
                es.add_mimo(converter)?;
                converters += 1;
            }
            Parsed::EmissionLimit(limit) => limits.push(limit),
        }
    }
    info!(converters, limits = limits.len(), "records applied");
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_type_field_is_split_off() {
        let record: Record =
            serde_json::from_value(json!({"type": "mimo", "label": "m", "from_bus_0": "gas"}))
                .unwrap();
        assert_eq!(record.kind, "mimo");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.optional_str("label").unwrap(), Some("m"));
    }

    #[test]
    fn test_sequence_from_number_or_list() {
        assert_eq!(sequence("x", &json!(2)).unwrap(), Sequence::Constant(2.0));
        assert_eq!(
            sequence("x", &json!([0.5, 1])).unwrap(),
            Sequence::Series(vec![0.5, 1.0])
        );
        assert!(matches!(sequence("x", &json!("a")), Err(MimoError::Type(_))));
        assert!(matches!(sequence("x", &json!([1, "a"])), Err(MimoError::Type(_))));
    }

    #[test]
    fn test_unknown_record_type() {
        let es = EnergySystem::new(mimo_core::TimeIndex::new(1));
        let err = parse_record(&Record::new("bus"), &es).unwrap_err();
        assert!(matches!(err, MimoError::Lookup(_)));
    }

    #[test]
    fn test_optional_accessors_reject_wrong_types() {
        let record = Record::new("mimo").with("label", 3).with("capacity_cost", "cheap");
        assert!(matches!(record.optional_str("label"), Err(MimoError::Type(_))));
        assert!(matches!(record.optional_f64("capacity_cost"), Err(MimoError::Type(_))));
        assert_eq!(record.optional_f64("missing").unwrap(), None);
    }
}
