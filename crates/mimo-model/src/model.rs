//! The optimization-model builder context.
//!
//! [`Model`] owns every decision variable and constraint of one build. It is
//! created from an [`EnergySystem`] in a single pass and never updated
//! incrementally; building again starts from a fresh `Model`.

use crate::blocks::{
    BusBlock, ConstraintBlock, FlowBlock, InvestmentFlowBlock, MimoConverterBlock,
};
use good_lp::{variable, Constraint, Expression, ProblemVariables, Variable, VariableDefinition};
use indexmap::IndexMap;
use mimo_core::{Direction, EnergySystem, MimoError, MimoResult, TimeIndex};
use serde::Serialize;
use tracing::{debug, info};

/// Identifies one group-aggregate variable series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub converter: String,
    pub direction: Direction,
    pub group: String,
}

impl GroupKey {
    pub fn new(converter: &str, direction: Direction, group: &str) -> Self {
        Self {
            converter: converter.to_string(),
            direction,
            group: group.to_string(),
        }
    }
}

/// Where a constraint came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintInfo {
    /// Block that created the constraint (`flow`, `investment`, `bus`, `mimo`,
    /// or a global constraint's name)
    pub block: String,
    /// `family[index,...]`
    pub name: String,
}

impl ConstraintInfo {
    /// Constraint family, i.e. the name up to the index brackets.
    pub fn family(&self) -> &str {
        self.name.split('[').next().unwrap_or(&self.name)
    }
}

/// Capacity investment variable of one flow.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InvestVar {
    pub(crate) var: Variable,
    pub(crate) existing: f64,
}

/// A built model taken apart for solving.
#[cfg(feature = "solver-clarabel")]
pub(crate) struct ModelParts {
    pub(crate) vars: ProblemVariables,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) objective: Vec<(f64, Variable)>,
    pub(crate) flows: IndexMap<(String, String), Vec<Variable>>,
    pub(crate) investments: IndexMap<(String, String), InvestVar>,
    pub(crate) group_flows: IndexMap<GroupKey, Vec<Variable>>,
}

/// Builder context for one optimization model.
pub struct Model {
    timeindex: TimeIndex,
    vars: ProblemVariables,
    num_variables: usize,
    flows: IndexMap<(String, String), Vec<Variable>>,
    investments: IndexMap<(String, String), InvestVar>,
    group_flows: IndexMap<GroupKey, Vec<Variable>>,
    constraints: Vec<Constraint>,
    infos: Vec<ConstraintInfo>,
    objective: Vec<(f64, Variable)>,
}

impl Model {
    /// Build the model: flow variables for every flow and time step, then the
    /// standard blocks followed by the converter block.
    pub fn new(es: &EnergySystem) -> MimoResult<Self> {
        let mut model = Self {
            timeindex: es.timeindex().clone(),
            vars: ProblemVariables::new(),
            num_variables: 0,
            flows: IndexMap::new(),
            investments: IndexMap::new(),
            group_flows: IndexMap::new(),
            constraints: Vec::new(),
            infos: Vec::new(),
            objective: Vec::new(),
        };

        let steps = model.timeindex.len();
        for (source, target, _) in es.flows() {
            let series = (0..steps)
                .map(|_| model.add_variable(variable().min(0.0)))
                .collect();
            model
                .flows
                .insert((source.to_string(), target.to_string()), series);
        }

        let blocks: [&dyn ConstraintBlock; 4] = [
            &FlowBlock,
            &InvestmentFlowBlock,
            &BusBlock,
            &MimoConverterBlock,
        ];
        for block in blocks {
            let before = model.constraints.len();
            block.create(&mut model, es)?;
            debug!(
                block = block.name(),
                constraints = model.constraints.len() - before,
                "block created"
            );
        }

        info!(
            variables = model.num_variables,
            constraints = model.constraints.len(),
            steps,
            "model built"
        );
        Ok(model)
    }

    pub fn timeindex(&self) -> &TimeIndex {
        &self.timeindex
    }

    pub fn add_variable(&mut self, definition: VariableDefinition) -> Variable {
        self.num_variables += 1;
        self.vars.add(definition)
    }

    pub fn add_constraint(&mut self, block: &str, name: String, constraint: Constraint) {
        self.constraints.push(constraint);
        self.infos.push(ConstraintInfo {
            block: block.to_string(),
            name,
        });
    }

    /// Add `coefficient * var` to the minimized objective.
    pub fn add_objective_term(&mut self, coefficient: f64, var: Variable) {
        if coefficient != 0.0 {
            self.objective.push((coefficient, var));
        }
    }

    /// Flow variable from `source` to `target` at global step `t`.
    pub fn flow(&self, source: &str, target: &str, t: usize) -> Option<Variable> {
        self.flows
            .get(&(source.to_string(), target.to_string()))
            .and_then(|series| series.get(t).copied())
    }

    /// Like [`Model::flow`], failing with a lookup error.
    pub fn flow_var(&self, source: &str, target: &str, t: usize) -> MimoResult<Variable> {
        self.flow(source, target, t).ok_or_else(|| {
            MimoError::Lookup(format!(
                "No flow from '{}' to '{}' at step {}.",
                source, target, t
            ))
        })
    }

    /// All flows as `(source, target)` label pairs in insertion order.
    pub fn flow_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.flows.keys().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    pub(crate) fn add_investment(&mut self, source: &str, target: &str, invest: InvestVar) {
        self.investments
            .insert((source.to_string(), target.to_string()), invest);
    }

    /// Total capacity `existing + invest` of an investment flow in period `p`.
    ///
    /// `None` when the flow carries no investment.
    pub fn invested_total(&self, source: &str, target: &str, _p: usize) -> Option<Expression> {
        self.investments
            .get(&(source.to_string(), target.to_string()))
            .map(|inv| inv.var + inv.existing)
    }

    pub(crate) fn add_group_flow(&mut self, key: GroupKey, series: Vec<Variable>) {
        self.group_flows.insert(key, series);
    }

    /// Group-aggregate variable of a converter group at step `t`.
    pub fn group_flow(
        &self,
        converter: &str,
        direction: Direction,
        group: &str,
        t: usize,
    ) -> Option<Variable> {
        self.group_flows
            .get(&GroupKey::new(converter, direction, group))
            .and_then(|series| series.get(t).copied())
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[ConstraintInfo] {
        &self.infos
    }

    /// Number of constraints in a family, e.g. `input_output_group_relation`.
    pub fn count_family(&self, family: &str) -> usize {
        self.infos.iter().filter(|c| c.family() == family).count()
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.infos.iter().any(|c| c.name == name)
    }

    #[cfg(feature = "solver-clarabel")]
    pub(crate) fn into_parts(self) -> ModelParts {
        ModelParts {
            vars: self.vars,
            constraints: self.constraints,
            objective: self.objective,
            flows: self.flows,
            investments: self.investments,
            group_flows: self.group_flows,
        }
    }
}
