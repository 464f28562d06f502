//! Aggregate emission limits over the whole model.
//!
//! An [`EmissionLimit`] sums all flows into the buses of a commodity taxonomy,
//! weights methane and nitrous oxide by their CO2 equivalence factors,
//! subtracts negative-emission flows, and bounds the result from above:
//!
//! ```text
//! co2 + ch4 * ch4_factor + n2o * n2o_factor - negative_co2 <= limit
//! ```
//!
//! A [`Limit::Total`] applies once over the whole horizon; a
//! [`Limit::PerPeriod`] applies once per period of the time index.

use crate::Model;
use good_lp::{constraint, Expression};
use mimo_core::{MimoError, MimoResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A constraint added to a built model as a whole, not per component.
pub trait ConstraintFacade {
    fn name(&self) -> &str;

    fn build_constraint(&self, model: &mut Model) -> MimoResult<()>;
}

/// Emission limit value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Limit {
    Total(f64),
    PerPeriod(Vec<f64>),
}

/// Output-bus labels counted by an emission limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommodityTaxonomy {
    pub co2_commodities: Vec<String>,
    pub ch4_commodities: Vec<String>,
    pub n2o_commodities: Vec<String>,
    pub negative_co2_commodities: Vec<String>,
}

impl CommodityTaxonomy {
    /// CO2-equivalent weight of flows into `label`.
    ///
    /// A label listed in several commodity lists counts once per list.
    fn weight(&self, label: &str, ch4_factor: f64, n2o_factor: f64) -> f64 {
        let listed = |list: &[String]| list.iter().any(|l| l == label);
        let mut weight = 0.0;
        if listed(&self.co2_commodities) {
            weight += 1.0;
        }
        if listed(&self.ch4_commodities) {
            weight += ch4_factor;
        }
        if listed(&self.n2o_commodities) {
            weight += n2o_factor;
        }
        if listed(&self.negative_co2_commodities) {
            weight -= 1.0;
        }
        weight
    }

    pub fn is_empty(&self) -> bool {
        self.co2_commodities.is_empty()
            && self.ch4_commodities.is_empty()
            && self.n2o_commodities.is_empty()
            && self.negative_co2_commodities.is_empty()
    }
}

/// Upper bound on CO2-equivalent emissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionLimit {
    pub name: String,
    pub limit: Limit,
    #[serde(default)]
    pub ch4_factor: f64,
    #[serde(default)]
    pub n2o_factor: f64,
    #[serde(default)]
    pub commodities: CommodityTaxonomy,
}

impl EmissionLimit {
    pub fn new(name: impl Into<String>, limit: Limit) -> Self {
        Self {
            name: name.into(),
            limit,
            ch4_factor: 0.0,
            n2o_factor: 0.0,
            commodities: CommodityTaxonomy::default(),
        }
    }

    pub fn with_factors(mut self, ch4_factor: f64, n2o_factor: f64) -> Self {
        self.ch4_factor = ch4_factor;
        self.n2o_factor = n2o_factor;
        self
    }

    pub fn with_commodities(mut self, commodities: CommodityTaxonomy) -> Self {
        self.commodities = commodities;
        self
    }

    /// Weighted emission flows summed over global steps `steps`.
    fn emissions(&self, model: &Model, steps: std::ops::Range<usize>) -> MimoResult<Expression> {
        let mut expr = Expression::from(0.0);
        let mut weighted = HashSet::new();
        for (source, target) in model.flow_keys() {
            let weight = self
                .commodities
                .weight(target, self.ch4_factor, self.n2o_factor);
            if weight == 0.0 {
                continue;
            }
            weighted.insert(target);
            for t in steps.clone() {
                expr += weight * model.flow_var(source, target, t)?;
            }
        }
        debug!(limit = %self.name, buses = weighted.len(), "emission flows collected");
        Ok(expr)
    }
}

impl ConstraintFacade for EmissionLimit {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_constraint(&self, model: &mut Model) -> MimoResult<()> {
        let timeindex = model.timeindex().clone();
        match &self.limit {
            Limit::Total(limit) => {
                let emitted = self.emissions(model, 0..timeindex.len())?;
                model.add_constraint(
                    &self.name,
                    self.name.clone(),
                    constraint!(emitted <= *limit),
                );
            }
            Limit::PerPeriod(limits) => {
                if limits.len() != timeindex.num_periods() {
                    return Err(MimoError::Configuration(format!(
                        "Emission limit '{}' gives {} values for {} periods.",
                        self.name,
                        limits.len(),
                        timeindex.num_periods()
                    )));
                }
                for (p, limit) in limits.iter().enumerate() {
                    let emitted = self.emissions(model, timeindex.steps_in_period(p))?;
                    model.add_constraint(
                        &self.name,
                        format!("{}_{}", self.name, p),
                        constraint!(emitted <= *limit),
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimo_core::{Bus, EnergySystem, Flow, Source, TimeIndex};

    fn model(periods: Vec<usize>) -> Model {
        let mut es = EnergySystem::new(TimeIndex::with_periods(periods));
        for bus in ["co2", "ch4", "dac"] {
            es.add_bus(Bus::unbalanced(bus)).unwrap();
        }
        for (label, bus) in [("a", "co2"), ("b", "ch4"), ("c", "dac")] {
            es.add_source(Source::new(label).output(bus, Flow::new()))
                .unwrap();
        }
        Model::new(&es).unwrap()
    }

    fn taxonomy() -> CommodityTaxonomy {
        CommodityTaxonomy {
            co2_commodities: vec!["co2".into()],
            ch4_commodities: vec!["ch4".into()],
            negative_co2_commodities: vec!["dac".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_taxonomy_weights() {
        let tax = CommodityTaxonomy {
            n2o_commodities: vec!["n2o".into()],
            negative_co2_commodities: vec!["n2o".into()],
            ..taxonomy()
        };
        assert_eq!(tax.weight("co2", 25.0, 298.0), 1.0);
        assert_eq!(tax.weight("ch4", 25.0, 298.0), 25.0);
        assert_eq!(tax.weight("n2o", 25.0, 298.0), 297.0);
        assert_eq!(tax.weight("heat", 25.0, 298.0), 0.0);
    }

    #[test]
    fn test_total_limit_is_one_constraint() {
        let mut m = model(vec![2, 2]);
        let limit = EmissionLimit::new("co2_limit", Limit::Total(100.0))
            .with_factors(25.0, 298.0)
            .with_commodities(taxonomy());
        limit.build_constraint(&mut m).unwrap();
        assert!(m.has_constraint("co2_limit"));
        assert_eq!(m.count_family("co2_limit"), 1);
    }

    #[test]
    fn test_per_period_limit_named_per_period() {
        let mut m = model(vec![2, 3]);
        let limit = EmissionLimit::new("co2_limit", Limit::PerPeriod(vec![100.0, 50.0]))
            .with_commodities(taxonomy());
        limit.build_constraint(&mut m).unwrap();
        assert!(m.has_constraint("co2_limit_0"));
        assert!(m.has_constraint("co2_limit_1"));
    }

    #[test]
    fn test_per_period_length_mismatch_rejected() {
        let mut m = model(vec![4]);
        let limit = EmissionLimit::new("co2_limit", Limit::PerPeriod(vec![100.0, 50.0]));
        let err = limit.build_constraint(&mut m).unwrap_err();
        assert!(matches!(err, MimoError::Configuration(_)));
    }

    #[test]
    fn test_limit_deserializes_from_number_or_list() {
        let scalar: Limit = serde_json::from_str("1000").unwrap();
        assert_eq!(scalar, Limit::Total(1000.0));
        let list: Limit = serde_json::from_str("[100, 50]").unwrap();
        assert_eq!(list, Limit::PerPeriod(vec![100.0, 50.0]));
    }
}
