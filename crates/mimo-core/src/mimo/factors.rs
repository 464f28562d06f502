//! Conversion factors, flow shares and activity bounds of a converter.
//!
//! Raw user input keeps its string type tags (`"min"`, `"max"`, `"fix"`) so
//! unknown tags can be reported by name. Validation turns them into
//! [`BoundType`]s and scalar-or-series [`Sequence`]s.

use crate::{MimoError, MimoResult, Sequence};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Relational sense of a flow share or activity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundType {
    /// `lhs >= rhs`
    Min,
    /// `lhs <= rhs`
    Max,
    /// `lhs == rhs`
    Fix,
}

impl BoundType {
    pub const ALL: [BoundType; 3] = [BoundType::Min, BoundType::Max, BoundType::Fix];

    pub fn as_str(self) -> &'static str {
        match self {
            BoundType::Min => "min",
            BoundType::Max => "max",
            BoundType::Fix => "fix",
        }
    }
}

impl std::fmt::Display for BoundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundType {
    type Err = MimoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(BoundType::Min),
            "max" => Ok(BoundType::Max),
            "fix" => Ok(BoundType::Fix),
            other => Err(invalid_types_error([other])),
        }
    }
}

fn invalid_types_error<'a>(invalid: impl IntoIterator<Item = &'a str>) -> MimoError {
    let names: BTreeSet<&str> = invalid.into_iter().collect();
    let listed = names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ");
    MimoError::Configuration(format!(
        "Invalid flow share or activity bound types found: {{{}}}. Must be one of 'min', 'max' or 'fix'.",
        listed
    ))
}

/// Parse type tags, reporting every unknown tag at once.
pub fn parse_bound_types<'a>(
    tags: impl IntoIterator<Item = &'a str>,
) -> MimoResult<Vec<BoundType>> {
    let mut parsed = Vec::new();
    let mut invalid = Vec::new();
    for tag in tags {
        match tag.parse::<BoundType>() {
            Ok(bound) => parsed.push(bound),
            Err(_) => invalid.push(tag),
        }
    }
    if invalid.is_empty() {
        Ok(parsed)
    } else {
        Err(invalid_types_error(invalid))
    }
}

/// Flow shares as declared: type tag → bus label → share of the group aggregate.
///
/// This merged form is the canonical surface. Configurations that give input
/// and output shares separately are merged with [`FlowShareSpec::from_split`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowShareSpec(IndexMap<String, IndexMap<String, Sequence>>);

impl FlowShareSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge separately given input and output shares.
    ///
    /// Bus labels are unique across the energy system, so the merged map keeps
    /// every entry; a bus named on both sides keeps the output value.
    pub fn from_split(
        input: IndexMap<String, IndexMap<String, Sequence>>,
        output: IndexMap<String, IndexMap<String, Sequence>>,
    ) -> Self {
        let mut merged = Self(input);
        for (tag, shares) in output {
            for (bus, share) in shares {
                merged.insert(tag.clone(), bus, share);
            }
        }
        merged
    }

    pub fn insert(
        &mut self,
        tag: impl Into<String>,
        bus: impl Into<String>,
        share: impl Into<Sequence>,
    ) {
        self.0
            .entry(tag.into())
            .or_default()
            .insert(bus.into(), share.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|m| m.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<String, Sequence>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<IndexMap<String, IndexMap<String, Sequence>>> for FlowShareSpec {
    fn from(map: IndexMap<String, IndexMap<String, Sequence>>) -> Self {
        Self(map)
    }
}

/// A validated share bound on one bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowShare {
    pub bus: String,
    pub bound: BoundType,
    pub share: Sequence,
}

/// Validate type tags and reject `fix` combined with `min` or `max` on one bus.
pub fn validate_flow_shares(spec: &FlowShareSpec) -> MimoResult<Vec<FlowShare>> {
    let bounds = parse_bound_types(spec.0.keys().map(String::as_str))?;

    let buses_of = |bound: BoundType| {
        spec.0
            .get(bound.as_str())
            .map(|m| m.keys().collect::<Vec<_>>())
            .unwrap_or_default()
    };
    let fixed = buses_of(BoundType::Fix);
    for other in [BoundType::Min, BoundType::Max] {
        let bounded = buses_of(other);
        if fixed.iter().any(|bus| bounded.contains(bus)) {
            return Err(MimoError::Configuration(format!(
                "Cannot combine 'fix' and '{}' flow share for same node.",
                other
            )));
        }
    }

    let mut shares = Vec::new();
    for (bound, (_, by_bus)) in bounds.into_iter().zip(spec.0.iter()) {
        for (bus, share) in by_bus {
            shares.push(FlowShare {
                bus: bus.clone(),
                bound,
                share: share.clone(),
            });
        }
    }
    Ok(shares)
}

/// Validate activity bounds, keyed by type tag.
pub fn validate_activity_bounds(
    raw: &IndexMap<String, Sequence>,
) -> MimoResult<IndexMap<BoundType, Sequence>> {
    let bounds = parse_bound_types(raw.keys().map(String::as_str))?;
    let has = |b: BoundType| bounds.contains(&b);
    if has(BoundType::Fix) && (has(BoundType::Min) || has(BoundType::Max)) {
        return Err(MimoError::Configuration(
            "Invalid activity bounds found. Cannot set 'fix' in combination with 'min' or 'max'."
                .into(),
        ));
    }
    Ok(bounds.into_iter().zip(raw.values().cloned()).collect())
}

/// Conversion factors for every connected bus and group, defaulting to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionFactors {
    factors: IndexMap<String, Sequence>,
}

impl ConversionFactors {
    /// Fill in neutral factors for every key in `known` lacking an entry.
    ///
    /// Keys of `raw` must be a connected bus or group; factors must be finite
    /// and non-zero since flows are divided by them.
    pub fn resolve<'a>(
        raw: &IndexMap<String, Sequence>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> MimoResult<Self> {
        let known: Vec<&str> = known.into_iter().collect();

        for (key, seq) in raw {
            if !known.contains(&key.as_str()) {
                return Err(MimoError::Configuration(format!(
                    "Conversion factor given for '{}', which is neither a connected bus nor a group.",
                    key
                )));
            }
            if seq.values().any(|v| !v.is_finite() || v == 0.0) {
                return Err(MimoError::Configuration(format!(
                    "Conversion factor for '{}' must be finite and non-zero.",
                    key
                )));
            }
        }

        let mut factors = raw.clone();
        for key in known {
            factors
                .entry(key.to_string())
                .or_insert_with(|| Sequence::constant(1.0));
        }
        Ok(Self { factors })
    }

    pub fn get(&self, key: &str) -> Option<&Sequence> {
        self.factors.get(key)
    }

    /// Factor of `key` at step `t`; 1 for unknown keys.
    pub fn at(&self, key: &str, t: usize) -> f64 {
        self.factors.get(key).map_or(1.0, |s| s.at(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sequence)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_type_from_str() {
        assert_eq!("fix".parse::<BoundType>().unwrap(), BoundType::Fix);
        assert!("fixed".parse::<BoundType>().is_err());
    }

    #[test]
    fn test_invalid_types_named_in_error() {
        let err = parse_bound_types(["min", "maxx", "avg"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid flow share or activity bound types found: {'avg', 'maxx'}. Must be one of 'min', 'max' or 'fix'."
        );
    }

    #[test]
    fn test_fix_with_max_on_same_bus_rejected() {
        let mut spec = FlowShareSpec::new();
        spec.insert("fix", "gas", 0.4);
        spec.insert("max", "gas", 0.9);
        let err = validate_flow_shares(&spec).unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot combine 'fix' and 'max' flow share for same node."));
    }

    #[test]
    fn test_fix_and_max_on_different_buses_allowed() {
        let mut spec = FlowShareSpec::new();
        spec.insert("fix", "gas", [0.8, 0.3]);
        spec.insert("max", "hydro", 0.5);
        let shares = validate_flow_shares(&spec).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].bound, BoundType::Fix);
        assert_eq!(shares[1].bus, "hydro");
    }

    #[test]
    fn test_from_split_merges_directions() {
        let mut input = IndexMap::new();
        input.insert(
            "fix".to_string(),
            [("gas".to_string(), Sequence::from(0.8))].into_iter().collect(),
        );
        let mut output = IndexMap::new();
        output.insert(
            "fix".to_string(),
            [("heat".to_string(), Sequence::from(0.8))].into_iter().collect(),
        );
        output.insert(
            "min".to_string(),
            [("steam".to_string(), Sequence::from(0.1))].into_iter().collect(),
        );

        let merged = FlowShareSpec::from_split(input, output);
        let shares = validate_flow_shares(&merged).unwrap();
        let buses: Vec<_> = shares.iter().map(|s| s.bus.as_str()).collect();
        assert_eq!(buses, vec!["gas", "heat", "steam"]);
    }

    #[test]
    fn test_activity_fix_with_min_rejected() {
        let raw: IndexMap<String, Sequence> = [
            ("fix".to_string(), Sequence::from(10.0)),
            ("min".to_string(), Sequence::from(2.0)),
        ]
        .into_iter()
        .collect();
        let err = validate_activity_bounds(&raw).unwrap_err();
        assert!(err.to_string().contains("Cannot set 'fix' in combination"));
    }

    #[test]
    fn test_conversion_factors_default_to_one() {
        let raw: IndexMap<String, Sequence> =
            [("in".to_string(), Sequence::from(1.2))].into_iter().collect();
        let cf = ConversionFactors::resolve(&raw, ["in", "gas", "heat"]).unwrap();
        assert_eq!(cf.at("in", 0), 1.2);
        assert_eq!(cf.at("gas", 3), 1.0);
        assert_eq!(cf.iter().count(), 3);
    }

    #[test]
    fn test_conversion_factor_for_unknown_key_rejected() {
        let raw: IndexMap<String, Sequence> =
            [("coal".to_string(), Sequence::from(1.2))].into_iter().collect();
        assert!(ConversionFactors::resolve(&raw, ["gas"]).is_err());
    }

    #[test]
    fn test_zero_conversion_factor_rejected() {
        let raw: IndexMap<String, Sequence> =
            [("gas".to_string(), Sequence::from([1.0, 0.0]))].into_iter().collect();
        assert!(ConversionFactors::resolve(&raw, ["gas"]).is_err());
    }
}
