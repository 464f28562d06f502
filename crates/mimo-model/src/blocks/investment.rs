use super::{relation, ConstraintBlock};
use crate::model::InvestVar;
use crate::Model;
use good_lp::{variable, Expression};
use mimo_core::{BoundType, EnergySystem, MimoError, MimoResult};

/// Capacity investment of flows carrying an [`Investment`](mimo_core::Investment).
///
/// One invest variable per flow, bounded by `[minimum, maximum]`. The total
/// capacity `existing + invest` bounds the flow through `max` (default 1),
/// `min`, or `fix`; each invested unit costs `ep_costs`.
pub struct InvestmentFlowBlock;

impl ConstraintBlock for InvestmentFlowBlock {
    fn name(&self) -> &'static str {
        "investment"
    }

    fn create(&self, model: &mut Model, es: &EnergySystem) -> MimoResult<()> {
        let steps: Vec<(usize, usize)> = model.timeindex().iter().collect();

        for (source, target, flow) in es.flows() {
            let Some(inv) = &flow.investment else {
                continue;
            };
            if inv.minimum > inv.maximum {
                return Err(MimoError::Configuration(format!(
                    "Investment on '{}' -> '{}' has minimum {} above maximum {}.",
                    source, target, inv.minimum, inv.maximum
                )));
            }

            let mut def = variable().min(inv.minimum.max(0.0));
            if inv.maximum.is_finite() {
                def = def.max(inv.maximum);
            }
            let var = model.add_variable(def);
            model.add_objective_term(inv.ep_costs, var);
            model.add_investment(
                source,
                target,
                InvestVar {
                    var,
                    existing: inv.existing,
                },
            );

            let bounds = match &flow.fix {
                Some(fix) => vec![(BoundType::Fix, fix.clone())],
                None => {
                    let mut bounds = vec![(BoundType::Max, flow.max.clone().unwrap_or_default())];
                    if let Some(min) = &flow.min {
                        bounds.push((BoundType::Min, min.clone()));
                    }
                    bounds
                }
            };

            for (bound, seq) in bounds {
                for &(p, t) in &steps {
                    let flow_var = model.flow_var(source, target, t)?;
                    let total = model.invested_total(source, target, p).ok_or_else(|| {
                        MimoError::Lookup(format!(
                            "No investment registered for '{}' -> '{}'.",
                            source, target
                        ))
                    })?;
                    model.add_constraint(
                        self.name(),
                        format!("invest_{}[{},{},{},{}]", bound, source, target, p, t),
                        relation(bound, Expression::from(flow_var), total * seq.at(t)),
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Model;
    use mimo_core::{Bus, EnergySystem, Flow, Investment, Sink, Source, TimeIndex};

    #[test]
    fn test_investment_flow_is_bounded_by_capacity() {
        let mut es = EnergySystem::new(TimeIndex::new(3));
        es.add_bus(Bus::new("elec")).unwrap();
        es.add_source(Source::new("pv").output(
            "elec",
            Flow::new()
                .with_max([0.0, 0.5, 1.0])
                .with_investment(Investment::new(200.0).with_maximum(50.0)),
        ))
        .unwrap();
        es.add_sink(Sink::new("demand").input("elec", Flow::new())).unwrap();

        let model = Model::new(&es).unwrap();
        assert_eq!(model.count_family("invest_max"), 3);
        assert!(model.invested_total("pv", "elec", 0).is_some());
        assert!(model.invested_total("elec", "demand", 0).is_none());
    }

    #[test]
    fn test_minimum_above_maximum_rejected() {
        let mut es = EnergySystem::new(TimeIndex::new(1));
        es.add_bus(Bus::new("elec")).unwrap();
        es.add_source(Source::new("pv").output(
            "elec",
            Flow::new().with_investment(Investment::new(1.0).with_minimum(5.0).with_maximum(2.0)),
        ))
        .unwrap();
        assert!(Model::new(&es).is_err());
    }
}
