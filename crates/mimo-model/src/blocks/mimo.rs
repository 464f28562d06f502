//! Constraints of multi-input/multi-output converters.
//!
//! For every converter and time step:
//!
//! - one non-negative aggregate variable per input and output group,
//! - `input_relation` / `output_relation`: the conversion-factor-scaled bus
//!   flows of a group sum to its aggregate,
//! - `input_output_group_relation`: scaled aggregates of adjacent input
//!   groups, of adjacent output groups, and of the last input and last output
//!   group are equal, forcing one activity level through the converter,
//! - `maximum_input_output_relation`: the aggregate of the group holding the
//!   primary bus is bounded by the invested capacity,
//! - `input_flow_share_relation` / `output_flow_share_relation`: a bus's
//!   scaled flow relative to its group aggregate,
//! - `emission_relation`: emission outflow equals the weighted sum of its
//!   emitting flows or group aggregates,
//! - `output_activity_bound_relation`: bounds on the first output group.

use super::{relation, ConstraintBlock};
use crate::model::GroupKey;
use crate::Model;
use good_lp::{constraint, variable, Expression, Variable};
use mimo_core::{
    Direction, EmissionSource, EnergySystem, FlowShare, Groups, MimoConverter, MimoError,
    MimoResult,
};
use tracing::{debug, warn};

pub struct MimoConverterBlock;

const BLOCK: &str = "mimo";

impl ConstraintBlock for MimoConverterBlock {
    fn name(&self) -> &'static str {
        BLOCK
    }

    fn create(&self, model: &mut Model, es: &EnergySystem) -> MimoResult<()> {
        let converters = es.mimo_converters();
        if converters.is_empty() {
            return Ok(());
        }
        let steps: Vec<(usize, usize)> = model.timeindex().iter().collect();

        for conv in &converters {
            conv.check_horizon(steps.len())?;
            for (direction, groups) in [
                (Direction::Input, conv.input_groups()),
                (Direction::Output, conv.output_groups()),
            ] {
                for group in groups.iter() {
                    let series = steps
                        .iter()
                        .map(|_| model.add_variable(variable().min(0.0)))
                        .collect();
                    model.add_group_flow(GroupKey::new(conv.label(), direction, &group.name), series);
                }
            }
        }

        for conv in &converters {
            let mut b = ConverterConstraints {
                model: &mut *model,
                conv,
                steps: &steps,
            };
            b.group_relations(Direction::Input)?;
            b.group_relations(Direction::Output)?;
            b.group_chain()?;
            b.capacity_coupling()?;
            b.flow_shares(Direction::Input, conv.input_flow_shares())?;
            b.flow_shares(Direction::Output, conv.output_flow_shares())?;
            b.emissions()?;
            b.activity_bounds()?;
            debug!(converter = conv.label(), "converter constraints created");
        }
        Ok(())
    }
}

struct ConverterConstraints<'a> {
    model: &'a mut Model,
    conv: &'a MimoConverter,
    steps: &'a [(usize, usize)],
}

impl<'a> ConverterConstraints<'a> {
    fn label(&self) -> &str {
        self.conv.label()
    }

    fn add(&mut self, family: &str, key: &str, p: usize, t: usize, c: good_lp::Constraint) {
        let name = format!("{}[{},{},{},{}]", family, self.conv.label(), key, p, t);
        self.model.add_constraint(BLOCK, name, c);
    }

    fn group_var(&self, direction: Direction, group: &str, t: usize) -> MimoResult<Variable> {
        self.model
            .group_flow(self.label(), direction, group, t)
            .ok_or_else(|| {
                MimoError::Lookup(format!(
                    "No {} group '{}' on converter '{}'.",
                    direction,
                    group,
                    self.label()
                ))
            })
    }

    fn bus_flow(&self, direction: Direction, bus: &str, t: usize) -> MimoResult<Variable> {
        match direction {
            Direction::Input => self.model.flow_var(bus, self.label(), t),
            Direction::Output => self.model.flow_var(self.label(), bus, t),
        }
    }

    /// `x / conversion_factor[key][t]`
    fn scaled(&self, key: &str, t: usize, x: Variable) -> Expression {
        (1.0 / self.conv.conversion_factors().at(key, t)) * x
    }

    fn groups(&self, direction: Direction) -> &'a Groups {
        match direction {
            Direction::Input => self.conv.input_groups(),
            Direction::Output => self.conv.output_groups(),
        }
    }

    fn group_relations(&mut self, direction: Direction) -> MimoResult<()> {
        let family = match direction {
            Direction::Input => "input_relation",
            Direction::Output => "output_relation",
        };
        let groups = self.groups(direction);
        for &(p, t) in self.steps {
            for group in groups.iter() {
                let mut scaled_sum = Expression::from(0.0);
                for bus in group.buses() {
                    scaled_sum += self.scaled(bus, t, self.bus_flow(direction, bus, t)?);
                }
                let aggregate = self.group_var(direction, &group.name, t)?;
                self.add(family, &group.name, p, t, constraint!(scaled_sum == aggregate));
            }
        }
        Ok(())
    }

    fn group_chain(&mut self) -> MimoResult<()> {
        let conv = self.conv;
        let family = "input_output_group_relation";
        for &(p, t) in self.steps {
            for direction in [Direction::Input, Direction::Output] {
                for (g, next) in self.groups(direction).adjacent_pairs() {
                    let lhs = self.scaled(&g.name, t, self.group_var(direction, &g.name, t)?);
                    let rhs = self.scaled(&next.name, t, self.group_var(direction, &next.name, t)?);
                    self.add(family, &g.name, p, t, constraint!(lhs == rhs));
                }
            }
            if let (Some(last_in), Some(last_out)) =
                (conv.input_groups().last(), conv.output_groups().last())
            {
                let lhs = self.scaled(
                    &last_in.name,
                    t,
                    self.group_var(Direction::Input, &last_in.name, t)?,
                );
                let rhs = self.scaled(
                    &last_out.name,
                    t,
                    self.group_var(Direction::Output, &last_out.name, t)?,
                );
                self.add(family, &last_in.name, p, t, constraint!(lhs == rhs));
            }
        }
        Ok(())
    }

    fn capacity_coupling(&mut self) -> MimoResult<()> {
        let conv = self.conv;
        let Some(primary) = conv.primary_bus() else {
            return Ok(());
        };
        let Some(group) = self.groups(primary.direction).group_of(&primary.bus) else {
            warn!(
                converter = conv.label(),
                bus = %primary.bus,
                "primary bus is an emission output; no capacity coupling"
            );
            return Ok(());
        };
        let (source, target) = match primary.direction {
            Direction::Input => (primary.bus.as_str(), conv.label()),
            Direction::Output => (conv.label(), primary.bus.as_str()),
        };

        for &(p, t) in self.steps {
            let Some(total) = self.model.invested_total(source, target, p) else {
                continue;
            };
            let aggregate = self.group_var(primary.direction, &group.name, t)?;
            self.add(
                "maximum_input_output_relation",
                &group.name,
                p,
                t,
                constraint!(aggregate <= total),
            );
        }
        Ok(())
    }

    fn flow_shares(&mut self, direction: Direction, shares: &[FlowShare]) -> MimoResult<()> {
        let family = match direction {
            Direction::Input => "input_flow_share_relation",
            Direction::Output => "output_flow_share_relation",
        };
        for &(p, t) in self.steps {
            for share in shares {
                let group = self.groups(direction).group_of(&share.bus).ok_or_else(|| {
                    MimoError::Lookup(format!(
                        "Bus '{}' of flow share is not in any {} group of '{}'.",
                        share.bus,
                        direction,
                        self.label()
                    ))
                })?;
                let lhs = self.scaled(&share.bus, t, self.bus_flow(direction, &share.bus, t)?);
                let rhs = share.share.at(t) * self.group_var(direction, &group.name, t)?;
                let key = format!("{},{}", share.bus, share.bound);
                self.add(family, &key, p, t, relation(share.bound, lhs, rhs));
            }
        }
        Ok(())
    }

    fn emissions(&mut self) -> MimoResult<()> {
        let conv = self.conv;
        for (target, sources) in conv.emission_factors() {
            let resolved = sources
                .iter()
                .map(|(name, factor)| Ok((conv.resolve_emission_source(name)?, factor)))
                .collect::<MimoResult<Vec<_>>>()?;

            for &(p, t) in self.steps {
                let mut emitted = Expression::from(0.0);
                for (source, factor) in &resolved {
                    let var = match *source {
                        EmissionSource::InputGroup(g) => self.group_var(Direction::Input, g, t)?,
                        EmissionSource::OutputGroup(g) => self.group_var(Direction::Output, g, t)?,
                        EmissionSource::InputBus(b) => self.bus_flow(Direction::Input, b, t)?,
                        EmissionSource::OutputBus(b) => self.bus_flow(Direction::Output, b, t)?,
                    };
                    emitted += factor.at(t) * var;
                }
                let outflow = self.bus_flow(Direction::Output, target, t)?;
                self.add("emission_relation", target, p, t, constraint!(emitted == outflow));
            }
        }
        Ok(())
    }

    fn activity_bounds(&mut self) -> MimoResult<()> {
        let conv = self.conv;
        if conv.activity_bounds().is_empty() {
            return Ok(());
        }
        let Some(first) = conv.output_groups().first() else {
            return Ok(());
        };
        for &(p, t) in self.steps {
            for (bound, value) in conv.activity_bounds() {
                let aggregate = self.group_var(Direction::Output, &first.name, t)?;
                self.add(
                    "output_activity_bound_relation",
                    bound.as_str(),
                    p,
                    t,
                    relation(*bound, Expression::from(aggregate), Expression::from(value.at(t))),
                );
            }
        }
        Ok(())
    }
}
