//! Converter records in flat naming-convention form.
//!
//! A `mimo` record names its buses and parameters through key prefixes:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `from_bus*` / `to_bus*` | input / output bus label |
//! | `groups` | `{name: [bus, ...]}`, as an object or a JSON string |
//! | `conversion_factor_<bus or group>` | conversion factor |
//! | `emission_factor_<bus or group>_<emission bus>` | emission factor |
//! | `flow_share_<min/max/fix>_<bus>` | flow share |
//! | `activity_bound_<min/max/fix>` | activity bound |
//! | `expandable`, `capacity_*`, `primary` | investment on the primary bus |
//!
//! Labels may themselves contain underscores. Emission-factor keys are
//! therefore split at every underscore and must match exactly one
//! (source, emission bus) pair.

use indexmap::IndexMap;
use mimo_core::{EnergySystem, Flow, Investment, MimoConfig, MimoError, MimoResult, Port};
use serde_json::Value;
use tracing::{debug, warn};

use crate::records::{sequence, Record};

const INPUT_PREFIX: &str = "from_bus";
const OUTPUT_PREFIX: &str = "to_bus";

const METADATA_KEYS: [&str; 9] = [
    "label",
    "carrier",
    "tech",
    "groups",
    "primary",
    "expandable",
    "capacity_cost",
    "capacity_potential",
    "capacity_minimum",
];

/// Builds a [`MimoConfig`] from a flat record.
pub struct MimoFacade<'a> {
    record: &'a Record,
    /// Record key and bus label, in record order
    buses: Vec<(&'a str, &'a str)>,
    groups: IndexMap<String, Vec<String>>,
    investment: Option<Investment>,
    primary: Option<&'a str>,
}

impl<'a> MimoFacade<'a> {
    /// Decode `record` into a converter configuration.
    ///
    /// Bus labels must name buses of `es`. The result still has to pass
    /// [`mimo_core::MimoConverter::new`].
    pub fn from_record(record: &'a Record, es: &EnergySystem) -> MimoResult<MimoConfig> {
        let facade = Self::new(record, es)?;
        let label = record.optional_str("label")?.ok_or_else(|| {
            MimoError::Configuration("MIMO record has no 'label'.".to_string())
        })?;

        let mut config = MimoConfig::new(label);
        let (inputs, outputs) = facade.ports()?;
        config.inputs = Some(inputs);
        config.outputs = Some(outputs);
        config.carrier = record.optional_str("carrier")?.map(str::to_string);
        config.tech = record.optional_str("tech")?.map(str::to_string);

        for (key, value) in &record.fields {
            if let Some(name) = key.strip_prefix("conversion_factor_") {
                facade.check_bus_or_group(name, key)?;
                config = config.with_conversion_factor(name, sequence(key, value)?);
            } else if let Some(suffix) = key.strip_prefix("emission_factor_") {
                let (source, target) = facade.split_emission_key(suffix, key)?;
                config = config.with_emission_factor(target, source, sequence(key, value)?);
            } else if let Some(rest) = key.strip_prefix("flow_share_") {
                let (tag, bus) = rest.split_once('_').ok_or_else(|| {
                    MimoError::Configuration(format!("Flow share '{}' names no bus.", key))
                })?;
                config = config.with_flow_share(tag, bus, sequence(key, value)?);
            } else if let Some(tag) = key.strip_prefix("activity_bound_") {
                config = config.with_activity_bound(tag, sequence(key, value)?);
            } else if !Self::is_port_key(key) && !METADATA_KEYS.contains(&key.as_str()) {
                warn!(converter = label, key = %key, "ignoring unknown record field");
            }
        }

        debug!(
            converter = label,
            buses = facade.buses.len(),
            groups = facade.groups.len(),
            "decoded converter record"
        );
        Ok(config)
    }

    fn new(record: &'a Record, es: &EnergySystem) -> MimoResult<Self> {
        let primary = match record.get("primary") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                return Err(MimoError::Configuration(
                    "Primary key must be given as string, not as Bus component.".to_string(),
                ))
            }
        };

        let mut buses = Vec::new();
        for (key, value) in &record.fields {
            if !Self::is_port_key(key) {
                continue;
            }
            let Value::String(label) = value else {
                return Err(MimoError::Type(format!(
                    "'{}' must be a bus label, got {}",
                    key, value
                )));
            };
            if es.bus(label).is_none() {
                return Err(MimoError::Lookup(format!(
                    "Bus '{}' given as '{}' not found.",
                    label, key
                )));
            }
            buses.push((key.as_str(), label.as_str()));
        }

        let groups = match record.get("groups") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::String(json)) => serde_json::from_str(json)?,
            Some(value) => serde_json::from_value(value.clone())?,
        };

        let investment = if Self::expandable(record)? {
            let mut investment =
                Investment::new(record.optional_f64("capacity_cost")?.unwrap_or(0.0));
            if let Some(potential) = record.optional_f64("capacity_potential")? {
                investment = investment.with_maximum(potential);
            }
            if let Some(minimum) = record.optional_f64("capacity_minimum")? {
                investment = investment.with_minimum(minimum);
            }
            if primary.is_none() {
                return Err(MimoError::Configuration(
                    "If you want to set investment you have to define primary bus to put investment on."
                        .to_string(),
                ));
            }
            Some(investment)
        } else {
            None
        };

        Ok(Self {
            record,
            buses,
            groups,
            investment,
            primary,
        })
    }

    fn expandable(record: &Record) -> MimoResult<bool> {
        match record.get("expandable") {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(MimoError::Type(format!(
                "'expandable' must be a boolean, got {}",
                other
            ))),
        }
    }

    fn is_port_key(key: &str) -> bool {
        key.starts_with(INPUT_PREFIX) || key.starts_with(OUTPUT_PREFIX)
    }

    fn flow(&self, bus: &str) -> Flow {
        match (&self.investment, self.primary) {
            (Some(investment), Some(primary)) if primary == bus => {
                Flow::new().with_investment(investment.clone())
            }
            _ => Flow::new(),
        }
    }

    fn is_bus(&self, label: &str) -> bool {
        self.buses.iter().any(|&(_, bus)| bus == label)
    }

    fn is_bus_or_group(&self, name: &str) -> bool {
        self.is_bus(name) || self.groups.contains_key(name)
    }

    fn check_bus_or_group(&self, name: &str, key: &str) -> MimoResult<()> {
        if self.is_bus_or_group(name) {
            Ok(())
        } else {
            Err(MimoError::Lookup(format!(
                "Could not find bus '{}' for efficiency labeled '{}'.",
                name, key
            )))
        }
    }

    /// Grouped ports first, then the remaining buses in record order.
    fn ports(&self) -> MimoResult<(Vec<Port>, Vec<Port>)> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        for (name, members) in &self.groups {
            let mut is_input = None;
            let mut found = Vec::new();
            for &(key, bus) in &self.buses {
                if !members.iter().any(|m| m == bus) {
                    continue;
                }
                let input = key.starts_with(INPUT_PREFIX);
                if *is_input.get_or_insert(input) != input {
                    return Err(MimoError::Configuration(format!(
                        "Mix of input and output buses in group '{}'.",
                        name
                    )));
                }
                found.push((bus, self.flow(bus)));
            }
            if found.len() != members.len() {
                return Err(MimoError::Lookup(format!(
                    "Could not find all buses from group '{}'.",
                    name
                )));
            }
            let port = Port::group(name.as_str(), found);
            match is_input {
                Some(true) => inputs.push(port),
                Some(false) => outputs.push(port),
                None => {
                    return Err(MimoError::Configuration(format!(
                        "Group '{}' has no buses.",
                        name
                    )))
                }
            }
        }

        for &(key, bus) in &self.buses {
            if self.groups.values().any(|members| members.iter().any(|m| m == bus)) {
                continue;
            }
            let port = Port::single(bus, self.flow(bus));
            if key.starts_with(INPUT_PREFIX) {
                inputs.push(port);
            } else {
                outputs.push(port);
            }
        }
        Ok((inputs, outputs))
    }

    /// Split `<source>_<target>` where both sides are bus labels or group names.
    fn split_emission_key(&self, suffix: &'a str, key: &str) -> MimoResult<(&'a str, &'a str)> {
        let matches: Vec<(&str, &str)> = suffix
            .match_indices('_')
            .map(|(i, _)| (&suffix[..i], &suffix[i + 1..]))
            .filter(|(source, target)| self.is_bus_or_group(source) && self.is_bus_or_group(target))
            .collect();
        match matches.as_slice() {
            [pair] => Ok(*pair),
            [] => Err(MimoError::Lookup(format!(
                "Could not find emitting bus and emission bus for '{}' in record '{}'.",
                key,
                self.record.optional_str("label").ok().flatten().unwrap_or("?")
            ))),
            _ => Err(MimoError::Configuration(format!(
                "Emission factor '{}' matches more than one bus combination: {:?}.",
                key, matches
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimo_core::{Bus, TimeIndex};
    use serde_json::json;

    fn system() -> EnergySystem {
        let mut es = EnergySystem::new(TimeIndex::new(2));
        for bus in ["gas", "h2", "elec", "heat", "co2", "ind_ch4"] {
            es.add_bus(Bus::new(bus)).unwrap();
        }
        es
    }

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_groups_and_singletons() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "from_bus_1": "h2",
            "to_bus_0": "elec",
            "to_bus_1": "heat",
            "groups": {"in": ["gas", "h2"]},
            "conversion_factor_in": 1.5,
            "carrier": "gas",
            "tech": "chp",
        }));
        let config = MimoFacade::from_record(&r, &system()).unwrap();
        let inputs = config.inputs.as_ref().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].buses(), vec!["gas", "h2"]);
        assert_eq!(config.outputs.as_ref().unwrap().len(), 2);
        assert!(config.conversion_factors.contains_key("in"));
        assert_eq!(config.tech.as_deref(), Some("chp"));
    }

    #[test]
    fn test_groups_given_as_json_string() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "to_bus_1": "heat",
            "groups": "{\"out\": [\"elec\", \"heat\"]}",
        }));
        let config = MimoFacade::from_record(&r, &system()).unwrap();
        let outputs = config.outputs.unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(matches!(&outputs[0], Port::Group { name, .. } if name == "out"));
    }

    #[test]
    fn test_mixed_group_rejected() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "groups": {"g": ["gas", "elec"]},
        }));
        match MimoFacade::from_record(&r, &system()) {
            Err(MimoError::Configuration(msg)) => {
                assert_eq!(msg, "Mix of input and output buses in group 'g'.")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_group_rejected() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "groups": {"in": ["gas", "h2"]},
        }));
        match MimoFacade::from_record(&r, &system()) {
            Err(MimoError::Lookup(msg)) => {
                assert_eq!(msg, "Could not find all buses from group 'in'.")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_emission_factor_with_underscored_labels() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "to_bus_1": "ind_ch4",
            "emission_factor_gas_ind_ch4": [0.1, 0.2],
        }));
        let config = MimoFacade::from_record(&r, &system()).unwrap();
        assert!(config.emission_factors["ind_ch4"].contains_key("gas"));
    }

    #[test]
    fn test_emission_factor_without_match() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "emission_factor_gas_co2": 0.2,
        }));
        assert!(matches!(
            MimoFacade::from_record(&r, &system()),
            Err(MimoError::Lookup(_))
        ));
    }

    #[test]
    fn test_unknown_conversion_factor() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "conversion_factor_coal": 2.0,
        }));
        assert!(matches!(
            MimoFacade::from_record(&r, &system()),
            Err(MimoError::Lookup(_))
        ));
    }

    #[test]
    fn test_shares_and_activity_bounds() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "from_bus_1": "h2",
            "to_bus_0": "elec",
            "groups": {"in": ["gas", "h2"]},
            "flow_share_max_gas": 0.4,
            "activity_bound_min": [1, 2],
        }));
        let config = MimoFacade::from_record(&r, &system()).unwrap();
        assert!(!config.flow_shares.is_empty());
        assert!(config.activity_bounds.contains_key("min"));
    }

    #[test]
    fn test_investment_on_primary_bus() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "to_bus_1": "heat",
            "expandable": true,
            "capacity_cost": 12.0,
            "capacity_potential": 50.0,
            "primary": "elec",
        }));
        let config = MimoFacade::from_record(&r, &system()).unwrap();
        let outputs = config.outputs.unwrap();
        let flow_of = |bus: &str| match outputs.iter().find(|p| p.buses() == vec![bus]) {
            Some(Port::Single { flow, .. }) => flow.clone(),
            _ => panic!("no port for {}", bus),
        };
        let investment = flow_of("elec").investment.unwrap();
        assert_eq!(investment.ep_costs, 12.0);
        assert_eq!(investment.maximum, 50.0);
        assert!(flow_of("heat").investment.is_none());
    }

    #[test]
    fn test_expandable_needs_primary() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "expandable": true,
        }));
        assert!(matches!(
            MimoFacade::from_record(&r, &system()),
            Err(MimoError::Configuration(_))
        ));
    }

    #[test]
    fn test_primary_must_be_string() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "gas",
            "to_bus_0": "elec",
            "primary": {"label": "elec"},
        }));
        match MimoFacade::from_record(&r, &system()) {
            Err(MimoError::Configuration(msg)) => assert!(msg.contains("as string"), "{}", msg),
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_bus_label() {
        let r = record(json!({
            "type": "mimo",
            "label": "plant",
            "from_bus_0": "coal",
        }));
        assert!(matches!(
            MimoFacade::from_record(&r, &system()),
            Err(MimoError::Lookup(_))
        ));
    }
}
