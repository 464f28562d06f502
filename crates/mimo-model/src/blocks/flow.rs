use super::{relation, ConstraintBlock};
use crate::Model;
use good_lp::Expression;
use mimo_core::{BoundType, EnergySystem, Flow, MimoError, MimoResult};
use tracing::warn;

/// Bounds of flows with a fixed nominal value, and variable costs of all flows.
///
/// `fix`, `min` and `max` are relative to `nominal_value`; a flow with a
/// nominal value but no `max` is bounded by the nominal value itself.
pub struct FlowBlock;

impl ConstraintBlock for FlowBlock {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn create(&self, model: &mut Model, es: &EnergySystem) -> MimoResult<()> {
        let steps: Vec<(usize, usize)> = model.timeindex().iter().collect();

        for (source, target, flow) in es.flows() {
            check_sequences(source, target, flow, steps.len())?;

            if let Some(costs) = &flow.variable_costs {
                for &(_, t) in &steps {
                    let var = model.flow_var(source, target, t)?;
                    model.add_objective_term(costs.at(t), var);
                }
            }

            if flow.has_investment() {
                continue;
            }

            let Some(nominal) = flow.nominal_value else {
                if flow.fix.is_some() {
                    return Err(MimoError::Configuration(format!(
                        "Flow '{}' -> '{}' is fixed but has no nominal value.",
                        source, target
                    )));
                }
                if flow.min.is_some() || flow.max.is_some() {
                    warn!(source, target, "min/max ignored on flow without nominal value");
                }
                continue;
            };

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
                    let var = model.flow_var(source, target, t)?;
                    let rhs = Expression::from(seq.at(t) * nominal);
                    model.add_constraint(
                        self.name(),
                        format!("flow_{}[{},{},{},{}]", bound, source, target, p, t),
                        relation(bound, Expression::from(var), rhs),
                    );
                }
            }
        }
        Ok(())
    }
}

pub(super) fn check_sequences(
    source: &str,
    target: &str,
    flow: &Flow,
    steps: usize,
) -> MimoResult<()> {
    for (name, seq) in flow.sequences() {
        if !seq.covers(steps) {
            return Err(MimoError::Configuration(format!(
                "'{}' of flow '{}' -> '{}' is shorter than the time index ({} steps).",
                name, source, target, steps
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::Model;
    use mimo_core::{Bus, EnergySystem, Flow, Sink, Source, TimeIndex};

    fn system(demand: Flow) -> EnergySystem {
        let mut es = EnergySystem::new(TimeIndex::new(2));
        es.add_bus(Bus::new("heat")).unwrap();
        es.add_source(
            Source::new("boiler").output("heat", Flow::new().with_variable_costs(2.0)),
        )
        .unwrap();
        es.add_sink(Sink::new("demand").input("heat", demand)).unwrap();
        es
    }

    #[test]
    fn test_fixed_flow_creates_equalities() {
        let model = Model::new(&system(
            Flow::new().with_nominal_value(1.0).with_fix([66.0, 16.0]),
        ))
        .unwrap();
        assert_eq!(model.count_family("flow_fix"), 2);
        assert_eq!(model.count_family("flow_max"), 0);
        assert!(model.has_constraint("flow_fix[heat,demand,0,1]"));
    }

    #[test]
    fn test_nominal_value_bounds_flow() {
        let model = Model::new(&system(Flow::new().with_nominal_value(10.0).with_min(0.2)))
            .unwrap();
        assert_eq!(model.count_family("flow_max"), 2);
        assert_eq!(model.count_family("flow_min"), 2);
    }

    #[test]
    fn test_fix_without_nominal_value_rejected() {
        assert!(Model::new(&system(Flow::new().with_fix([1.0, 1.0]))).is_err());
    }

    #[test]
    fn test_short_sequence_rejected() {
        let err = Model::new(&system(Flow::new().with_nominal_value(1.0).with_fix([1.0])))
            .err()
            .unwrap();
        assert!(err.to_string().contains("shorter than the time index"));
    }
}
