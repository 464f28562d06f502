//! Flows between buses and components, with optional capacity investment.

use crate::Sequence;
use serde::{Deserialize, Serialize};

/// Capacity investment attached to a flow.
///
/// The solver sizes the capacity `invest` within `[minimum, maximum]`; the
/// usable capacity is `existing + invest` and each unit costs `ep_costs`
/// (equivalent periodical costs) in the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub ep_costs: f64,
    #[serde(default)]
    pub minimum: f64,
    #[serde(default = "unbounded")]
    pub maximum: f64,
    #[serde(default)]
    pub existing: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl Investment {
    pub fn new(ep_costs: f64) -> Self {
        Self {
            ep_costs,
            minimum: 0.0,
            maximum: f64::INFINITY,
            existing: 0.0,
        }
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn with_maximum(mut self, maximum: f64) -> Self {
        self.maximum = maximum;
        self
    }

    pub fn with_existing(mut self, existing: f64) -> Self {
        self.existing = existing;
        self
    }
}

/// A directed flow between a bus and a component.
///
/// `fix`, `min` and `max` are relative to the nominal value, or to the
/// invested capacity when the flow carries an [`Investment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flow {
    pub nominal_value: Option<f64>,
    pub investment: Option<Investment>,
    pub fix: Option<Sequence>,
    pub min: Option<Sequence>,
    pub max: Option<Sequence>,
    pub variable_costs: Option<Sequence>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nominal_value(mut self, nominal_value: f64) -> Self {
        self.nominal_value = Some(nominal_value);
        self
    }

    pub fn with_investment(mut self, investment: Investment) -> Self {
        self.investment = Some(investment);
        self
    }

    /// Fix the flow to `fix * nominal_value` at every time step.
    pub fn with_fix(mut self, fix: impl Into<Sequence>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_min(mut self, min: impl Into<Sequence>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<Sequence>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn with_variable_costs(mut self, costs: impl Into<Sequence>) -> Self {
        self.variable_costs = Some(costs.into());
        self
    }

    pub fn has_investment(&self) -> bool {
        self.investment.is_some()
    }

    /// All sequences stored on this flow, tagged with their attribute name.
    pub fn sequences(&self) -> impl Iterator<Item = (&'static str, &Sequence)> {
        [
            ("fix", self.fix.as_ref()),
            ("min", self.min.as_ref()),
            ("max", self.max.as_ref()),
            ("variable_costs", self.variable_costs.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, seq)| seq.map(|s| (name, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_builder() {
        let flow = Flow::new()
            .with_nominal_value(1.0)
            .with_fix([100.0, 80.0])
            .with_variable_costs(2.0);

        assert_eq!(flow.nominal_value, Some(1.0));
        assert!(!flow.has_investment());
        assert_eq!(flow.sequences().count(), 2);
    }

    #[test]
    fn test_investment_defaults() {
        let inv: Investment = serde_json::from_str(r#"{"ep_costs": 1.2, "maximum": 20}"#).unwrap();
        assert_eq!(inv.ep_costs, 1.2);
        assert_eq!(inv.maximum, 20.0);
        assert_eq!(inv.minimum, 0.0);

        let open = Investment::new(200.0);
        assert!(open.maximum.is_infinite());
    }
}
