//! Solved model values.

use crate::model::GroupKey;
use indexmap::IndexMap;
use mimo_core::Direction;
use serde::Serialize;
use std::time::Duration;

/// How the solver terminated.
///
/// Infeasible and unbounded models are regular outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    Optimal,
    Infeasible,
    Unbounded,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::Optimal => "optimal",
            Termination::Infeasible => "infeasible",
            Termination::Unbounded => "unbounded",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of a solved model. Empty unless the termination is optimal.
#[derive(Debug, Clone)]
pub struct Results {
    pub termination: Termination,
    /// Objective value (variable costs + investment costs)
    pub objective: Option<f64>,
    pub solve_time: Duration,
    pub(crate) flows: IndexMap<(String, String), Vec<f64>>,
    pub(crate) invest: IndexMap<(String, String), f64>,
    pub(crate) group_flows: IndexMap<GroupKey, Vec<f64>>,
}

impl Results {
    #[cfg(any(test, feature = "solver-clarabel"))]
    pub(crate) fn unsolved(termination: Termination, solve_time: Duration) -> Self {
        Self {
            termination,
            objective: None,
            solve_time,
            flows: IndexMap::new(),
            invest: IndexMap::new(),
            group_flows: IndexMap::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.termination == Termination::Optimal
    }

    pub fn termination_condition(&self) -> &'static str {
        self.termination.as_str()
    }

    /// Flow values from `source` to `target`, one per time step.
    pub fn flow(&self, source: &str, target: &str) -> Option<&[f64]> {
        self.flows
            .get(&(source.to_string(), target.to_string()))
            .map(Vec::as_slice)
    }

    /// Flow summed over all time steps.
    pub fn total_flow(&self, source: &str, target: &str) -> Option<f64> {
        self.flow(source, target).map(|v| v.iter().sum())
    }

    /// Invested capacity of an investment flow.
    pub fn invest(&self, source: &str, target: &str) -> Option<f64> {
        self.invest
            .get(&(source.to_string(), target.to_string()))
            .copied()
    }

    /// Group-aggregate values of a converter group, one per time step.
    pub fn group_flow(&self, converter: &str, direction: Direction, group: &str) -> Option<&[f64]> {
        self.group_flows
            .get(&GroupKey::new(converter, direction, group))
            .map(Vec::as_slice)
    }

    pub fn flows(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.flows
            .iter()
            .map(|((s, t), v)| (s.as_str(), t.as_str(), v.as_slice()))
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Model Results\n{}\n", "=".repeat(40)));
        s.push_str(&format!("Status: {}\n", self.termination));
        if let Some(objective) = self.objective {
            s.push_str(&format!("Objective: {:.4}\n", objective));
        }
        s.push_str(&format!("Solve Time: {:.2?}\n", self.solve_time));

        if !self.invest.is_empty() {
            s.push_str("\nInvestments:\n");
            for ((source, target), value) in &self.invest {
                s.push_str(&format!("  {} -> {}: {:.4}\n", source, target, value));
            }
        }

        if !self.flows.is_empty() {
            s.push_str("\nFlows (sum over time):\n");
            for ((source, target), values) in &self.flows {
                s.push_str(&format!(
                    "  {} -> {}: {:.4}\n",
                    source,
                    target,
                    values.iter().sum::<f64>()
                ));
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsolved_results_are_empty() {
        let results = Results::unsolved(Termination::Infeasible, Duration::ZERO);
        assert!(!results.is_optimal());
        assert_eq!(results.termination_condition(), "infeasible");
        assert!(results.flow("a", "b").is_none());
        assert!(results.summary().contains("Status: infeasible"));
        assert!(!results.summary().contains("Objective"));
    }

    #[test]
    fn test_lookups() {
        let mut results = Results::unsolved(Termination::Optimal, Duration::ZERO);
        results
            .flows
            .insert(("gas".into(), "mimo".into()), vec![96.0, 36.0]);
        results.invest.insert(("mimo".into(), "heat".into()), 18.0);
        results.group_flows.insert(
            GroupKey::new("mimo", Direction::Input, "in"),
            vec![100.0, 100.0],
        );

        assert_eq!(results.total_flow("gas", "mimo"), Some(132.0));
        assert_eq!(results.invest("mimo", "heat"), Some(18.0));
        assert_eq!(
            results.group_flow("mimo", Direction::Input, "in"),
            Some(&[100.0, 100.0][..])
        );
        assert!(results.group_flow("mimo", Direction::Output, "in").is_none());
        assert!(results.summary().contains("gas -> mimo: 132.0000"));
    }
}
