use mimo_core::{MimoError, MimoResult};
use mimo_model::{CommodityTaxonomy, EmissionLimit, Limit};
use serde_json::{Map, Value};

use crate::records::Record;

const COMMODITY_LISTS: [&str; 4] = [
    "co2_commodities",
    "ch4_commodities",
    "n2o_commodities",
    "negative_co2_commodities",
];

/// Decode a `co2_emission_limit` record.
///
/// `ch4_equivalent` and `n2o_equivalent` are accepted in place of
/// `ch4_factor` and `n2o_factor`. Commodity lists come from a `commodities`
/// object (or a string holding one) or from top-level list fields.
pub fn emission_limit_from_record(record: &Record) -> MimoResult<EmissionLimit> {
    let name = record
        .optional_str("name")?
        .or(record.optional_str("label")?)
        .unwrap_or("co2_emission_limit");

    let limit = match record.get("co2_limit") {
        Some(Value::Number(n)) => n.as_f64().map(Limit::Total),
        Some(Value::Array(items)) => items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()
            .map(Limit::PerPeriod),
        _ => None,
    }
    .ok_or_else(|| MimoError::Type("co2_limit must be a list, float or int".to_string()))?;

    let ch4_factor = factor(record, "ch4_factor", "ch4_equivalent")?;
    let n2o_factor = factor(record, "n2o_factor", "n2o_equivalent")?;

    Ok(EmissionLimit::new(name, limit)
        .with_factors(ch4_factor, n2o_factor)
        .with_commodities(commodities(record)?))
}

fn factor(record: &Record, key: &str, alias: &str) -> MimoResult<f64> {
    Ok(record
        .optional_f64(key)?
        .or(record.optional_f64(alias)?)
        .unwrap_or(0.0))
}

fn commodities(record: &Record) -> MimoResult<CommodityTaxonomy> {
    let taxonomy = match record.get("commodities") {
        Some(Value::String(json)) => serde_json::from_str(json)?,
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())?,
        Some(other) => {
            return Err(MimoError::Type(format!(
                "commodities must be an object, got {}",
                other
            )))
        }
        None => {
            let flat: Map<String, Value> = COMMODITY_LISTS
                .iter()
                .filter_map(|&key| Some((key.to_string(), record.get(key)?.clone())))
                .collect();
            serde_json::from_value(Value::Object(flat))?
        }
    };
    Ok(taxonomy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scalar_limit_with_aliases() {
        let limit = emission_limit_from_record(&record(json!({
            "type": "co2_emission_limit",
            "name": "cap",
            "co2_limit": 1000,
            "ch4_equivalent": 25,
            "n2o_equivalent": 298.0,
            "co2_commodities": ["co2"],
        })))
        .unwrap();
        assert_eq!(limit.name, "cap");
        assert_eq!(limit.limit, Limit::Total(1000.0));
        assert_eq!(limit.ch4_factor, 25.0);
        assert_eq!(limit.n2o_factor, 298.0);
        assert_eq!(limit.commodities.co2_commodities, vec!["co2".to_string()]);
    }

    #[test]
    fn test_per_period_limit_and_default_factors() {
        let limit = emission_limit_from_record(&record(json!({
            "type": "co2_emission_limit",
            "co2_limit": [100, 50.5],
        })))
        .unwrap();
        assert_eq!(limit.name, "co2_emission_limit");
        assert_eq!(limit.limit, Limit::PerPeriod(vec![100.0, 50.5]));
        assert_eq!(limit.ch4_factor, 0.0);
        assert!(limit.commodities.is_empty());
    }

    #[test]
    fn test_invalid_limit_type() {
        let err = emission_limit_from_record(&record(json!({
            "type": "co2_emission_limit",
            "co2_limit": "lots",
        })))
        .unwrap_err();
        match err {
            MimoError::Type(msg) => assert_eq!(msg, "co2_limit must be a list, float or int"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_commodities_object_and_string() {
        let object = emission_limit_from_record(&record(json!({
            "type": "co2_emission_limit",
            "co2_limit": 10,
            "commodities": {"ch4_commodities": ["ch4"], "negative_co2_commodities": ["dac"]},
        })))
        .unwrap();
        assert_eq!(object.commodities.ch4_commodities, vec!["ch4".to_string()]);

        let string = emission_limit_from_record(&record(json!({
            "type": "co2_emission_limit",
            "co2_limit": 10,
            "commodities": "{\"ch4_commodities\": [\"ch4\"], \"negative_co2_commodities\": [\"dac\"]}",
        })))
        .unwrap();
        assert_eq!(object.commodities, string.commodities);
    }
}
