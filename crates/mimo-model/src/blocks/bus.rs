use super::ConstraintBlock;
use crate::Model;
use good_lp::{constraint, Expression};
use mimo_core::{EnergySystem, MimoResult};

/// Balance of balanced buses: inflow equals outflow at every time step.
pub struct BusBlock;

impl ConstraintBlock for BusBlock {
    fn name(&self) -> &'static str {
        "bus"
    }

    fn create(&self, model: &mut Model, es: &EnergySystem) -> MimoResult<()> {
        let steps: Vec<(usize, usize)> = model.timeindex().iter().collect();

        for bus in es.buses() {
            if !bus.balanced {
                continue;
            }
            let inflows = es.inflows(&bus.label);
            let outflows = es.outflows(&bus.label);
            if inflows.is_empty() && outflows.is_empty() {
                continue;
            }

            for &(p, t) in &steps {
                let mut lhs = Expression::from(0.0);
                for (source, target, _) in &inflows {
                    lhs += model.flow_var(source, target, t)?;
                }
                let mut rhs = Expression::from(0.0);
                for (source, target, _) in &outflows {
                    rhs += model.flow_var(source, target, t)?;
                }
                model.add_constraint(
                    self.name(),
                    format!("balance[{},{},{}]", bus.label, p, t),
                    constraint!(lhs == rhs),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Model;
    use mimo_core::{Bus, EnergySystem, Flow, Sink, Source, TimeIndex};

    #[test]
    fn test_only_balanced_connected_buses_get_balance() {
        let mut es = EnergySystem::new(TimeIndex::new(4));
        es.add_bus(Bus::new("heat")).unwrap();
        es.add_bus(Bus::unbalanced("co2")).unwrap();
        es.add_bus(Bus::new("unused")).unwrap();
        es.add_source(Source::new("boiler").output("heat", Flow::new()))
            .unwrap();
        es.add_sink(Sink::new("demand").input("heat", Flow::new()))
            .unwrap();
        es.add_source(Source::new("stack").output("co2", Flow::new()))
            .unwrap();

        let model = Model::new(&es).unwrap();
        assert_eq!(model.count_family("balance"), 4);
        assert!(model.has_constraint("balance[heat,0,3]"));
        assert_eq!(model.num_variables(), 12);
    }
}
