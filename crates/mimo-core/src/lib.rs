//! # mimo-core: Energy-System Graph and MIMO Converters
//!
//! Provides the data structures an energy-system optimization model is built
//! from, and the multi-input/multi-output converter component.
//!
//! ## Design Philosophy
//!
//! Energy systems are modeled as **directed graphs** where:
//! - **Nodes**: Buses (commodities), Sources, Sinks and MIMO converters
//! - **Edges**: Flows, each carrying its bounds and optional investment
//!
//! Components connect only to buses, so every flow has a bus on one end.
//! Labels are unique across the whole system and are the only way the model
//! builder refers to nodes.
//!
//! ## Quick Start
//!
//! ```rust
//! use mimo_core::*;
//!
//! let mut es = EnergySystem::new(TimeIndex::new(2));
//! es.add_bus(Bus::new("gas")).unwrap();
//! es.add_bus(Bus::new("heat")).unwrap();
//! es.add_source(Source::new("gas_station").output("gas", Flow::new())).unwrap();
//! es.add_sink(
//!     Sink::new("heat_demand")
//!         .input("heat", Flow::new().with_nominal_value(1.0).with_fix([66.0, 16.0])),
//! )
//! .unwrap();
//!
//! let mimo = MimoConverter::new(
//!     MimoConfig::new("boiler")
//!         .input(Port::single("gas", Flow::new()))
//!         .output(Port::single("heat", Flow::new()))
//!         .with_conversion_factor("gas", 1.0 / 0.9),
//! )
//! .unwrap();
//! es.add_mimo(mimo).unwrap();
//!
//! assert_eq!(es.stats().num_flows, 4);
//! ```
//!
//! ## Modules
//!
//! - [`mimo`] - Converter configuration, group normalization, factors, primary bus
//! - [`diagnostics`] - Non-fatal issues found while assembling a system
//! - [`error`] - The shared [`MimoError`] type

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as EdgeDirection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod mimo;
pub mod sequence;
pub mod timeindex;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{MimoError, MimoResult};
pub use flow::{Flow, Investment};
pub use mimo::{
    BoundType, ConversionFactors, Direction, EmissionSource, FlowShare, FlowShareSpec, Group,
    GroupKind, Groups, MimoConfig, MimoConverter, Port, PrimaryBus,
};
pub use sequence::Sequence;
pub use timeindex::TimeIndex;

/// A commodity node. Balanced buses force inflow to equal outflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub label: String,
    #[serde(default = "default_balanced")]
    pub balanced: bool,
}

fn default_balanced() -> bool {
    true
}

impl Bus {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            balanced: true,
        }
    }

    /// An unbalanced bus absorbs or supplies any amount, e.g. an emission sink.
    pub fn unbalanced(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            balanced: false,
        }
    }
}

/// Supplies commodities into buses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    #[serde(default)]
    pub outputs: IndexMap<String, Flow>,
}

impl Source {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            outputs: IndexMap::new(),
        }
    }

    pub fn output(mut self, bus: impl Into<String>, flow: Flow) -> Self {
        self.outputs.insert(bus.into(), flow);
        self
    }
}

/// Draws commodities out of buses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sink {
    pub label: String,
    #[serde(default)]
    pub inputs: IndexMap<String, Flow>,
}

impl Sink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            inputs: IndexMap::new(),
        }
    }

    pub fn input(mut self, bus: impl Into<String>, flow: Flow) -> Self {
        self.inputs.insert(bus.into(), flow);
        self
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Source(Source),
    Sink(Sink),
    Mimo(MimoConverter),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.label,
            Node::Source(source) => &source.label,
            Node::Sink(sink) => &sink.label,
            Node::Mimo(mimo) => mimo.label(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Bus(_) => "bus",
            Node::Source(_) => "source",
            Node::Sink(_) => "sink",
            Node::Mimo(_) => "mimo",
        }
    }
}

/// The energy-system graph, with flows as edges.
#[derive(Debug, Clone)]
pub struct EnergySystem {
    pub graph: DiGraph<Node, Flow>,
    index: HashMap<String, NodeIndex>,
    timeindex: TimeIndex,
}

impl EnergySystem {
    pub fn new(timeindex: TimeIndex) -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            timeindex,
        }
    }

    pub fn timeindex(&self) -> &TimeIndex {
        &self.timeindex
    }

    fn insert_node(&mut self, node: Node) -> MimoResult<NodeIndex> {
        let label = node.label().to_string();
        if self.index.contains_key(&label) {
            return Err(MimoError::Network(format!(
                "Label '{}' is already used in the energy system.",
                label
            )));
        }
        let idx = self.graph.add_node(node);
        self.index.insert(label, idx);
        Ok(idx)
    }

    fn bus_index(&self, label: &str) -> MimoResult<NodeIndex> {
        let idx = *self
            .index
            .get(label)
            .ok_or_else(|| MimoError::Network(format!("Bus '{}' not found.", label)))?;
        match &self.graph[idx] {
            Node::Bus(_) => Ok(idx),
            other => Err(MimoError::Network(format!(
                "'{}' is a {}, not a bus.",
                label,
                other.kind()
            ))),
        }
    }

    pub fn add_bus(&mut self, bus: Bus) -> MimoResult<NodeIndex> {
        self.insert_node(Node::Bus(bus))
    }

    pub fn add_source(&mut self, source: Source) -> MimoResult<NodeIndex> {
        let targets = source
            .outputs
            .iter()
            .map(|(bus, flow)| Ok((self.bus_index(bus)?, flow.clone())))
            .collect::<MimoResult<Vec<_>>>()?;
        let idx = self.insert_node(Node::Source(source))?;
        for (bus, flow) in targets {
            self.graph.add_edge(idx, bus, flow);
        }
        Ok(idx)
    }

    pub fn add_sink(&mut self, sink: Sink) -> MimoResult<NodeIndex> {
        let origins = sink
            .inputs
            .iter()
            .map(|(bus, flow)| Ok((self.bus_index(bus)?, flow.clone())))
            .collect::<MimoResult<Vec<_>>>()?;
        let idx = self.insert_node(Node::Sink(sink))?;
        for (bus, flow) in origins {
            self.graph.add_edge(bus, idx, flow);
        }
        Ok(idx)
    }

    /// Add a converter, connecting its inputs and outputs (emission outputs
    /// included) to existing buses.
    pub fn add_mimo(&mut self, mimo: MimoConverter) -> MimoResult<NodeIndex> {
        let inputs = mimo
            .inputs()
            .map(|(bus, flow)| Ok((self.bus_index(bus)?, flow.clone())))
            .collect::<MimoResult<Vec<_>>>()?;
        let outputs = mimo
            .outputs()
            .map(|(bus, flow)| Ok((self.bus_index(bus)?, flow.clone())))
            .collect::<MimoResult<Vec<_>>>()?;
        let idx = self.insert_node(Node::Mimo(mimo))?;
        for (bus, flow) in inputs {
            self.graph.add_edge(bus, idx, flow);
        }
        for (bus, flow) in outputs {
            self.graph.add_edge(idx, bus, flow);
        }
        Ok(idx)
    }

    pub fn node(&self, label: &str) -> Option<&Node> {
        self.index.get(label).map(|&idx| &self.graph[idx])
    }

    pub fn bus(&self, label: &str) -> Option<&Bus> {
        match self.node(label) {
            Some(Node::Bus(bus)) => Some(bus),
            _ => None,
        }
    }

    pub fn mimo(&self, label: &str) -> Option<&MimoConverter> {
        match self.node(label) {
            Some(Node::Mimo(mimo)) => Some(mimo),
            _ => None,
        }
    }

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn mimo_converters(&self) -> Vec<&MimoConverter> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Mimo(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// All flows as `(source label, target label, flow)` in insertion order.
    pub fn flows(&self) -> impl Iterator<Item = (&str, &str, &Flow)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].label(),
                self.graph[e.target()].label(),
                e.weight(),
            )
        })
    }

    /// Flows ending at `label`.
    pub fn inflows(&self, label: &str) -> Vec<(&str, &str, &Flow)> {
        self.flows_at(label, EdgeDirection::Incoming)
    }

    /// Flows starting at `label`.
    pub fn outflows(&self, label: &str) -> Vec<(&str, &str, &Flow)> {
        self.flows_at(label, EdgeDirection::Outgoing)
    }

    fn flows_at(&self, label: &str, direction: EdgeDirection) -> Vec<(&str, &str, &Flow)> {
        let Some(&idx) = self.index.get(label) else {
            return Vec::new();
        };
        let mut flows: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                (
                    e.id(),
                    self.graph[e.source()].label(),
                    self.graph[e.target()].label(),
                    e.weight(),
                )
            })
            .collect();
        flows.sort_by_key(|(id, ..)| *id);
        flows.into_iter().map(|(_, s, t, f)| (s, t, f)).collect()
    }

    pub fn stats(&self) -> EnergySystemStats {
        let mut stats = EnergySystemStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Source(_) => stats.num_sources += 1,
                Node::Sink(_) => stats.num_sinks += 1,
                Node::Mimo(_) => stats.num_converters += 1,
            }
        }
        stats.num_flows = self.graph.edge_count();
        stats.num_investments = self
            .graph
            .edge_weights()
            .filter(|f| f.has_investment())
            .count();
        stats
    }

    /// Check the system for structures that make the model meaningless or
    /// infeasible. Converter construction warnings are included.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();
        if stats.num_buses == 0 {
            diag.add_error("structure", "Energy system has no buses");
            return;
        }
        if self.timeindex.is_empty() {
            diag.add_error("structure", "Time index has no time steps");
        }

        for idx in self.graph.node_indices() {
            let Node::Bus(bus) = &self.graph[idx] else {
                continue;
            };
            let inflows = self.graph.edges_directed(idx, EdgeDirection::Incoming).count();
            let outflows = self.graph.edges_directed(idx, EdgeDirection::Outgoing).count();
            if inflows == 0 && outflows == 0 {
                diag.add_warning_with_entity("structure", "Bus is not connected", &bus.label);
            } else if bus.balanced && inflows == 0 {
                diag.add_warning_with_entity(
                    "structure",
                    "Balanced bus has no inflow; its outflows are forced to zero",
                    &bus.label,
                );
            } else if bus.balanced && outflows == 0 {
                diag.add_warning_with_entity(
                    "structure",
                    "Balanced bus has no outflow; its inflows are forced to zero",
                    &bus.label,
                );
            }
        }

        for mimo in self.mimo_converters() {
            diag.merge(mimo.diagnostics().clone());
        }
    }
}

/// Size of an energy system
#[derive(Debug, Clone, Default)]
pub struct EnergySystemStats {
    pub num_buses: usize,
    pub num_sources: usize,
    pub num_sinks: usize,
    pub num_converters: usize,
    pub num_flows: usize,
    pub num_investments: usize,
}

impl std::fmt::Display for EnergySystemStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} sources, {} sinks, {} converters, {} flows ({} investable)",
            self.num_buses,
            self.num_sources,
            self.num_sinks,
            self.num_converters,
            self.num_flows,
            self.num_investments
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heat_system() -> EnergySystem {
        let mut es = EnergySystem::new(TimeIndex::new(3));
        es.add_bus(Bus::new("gas")).unwrap();
        es.add_bus(Bus::new("heat")).unwrap();
        es.add_bus(Bus::unbalanced("co2")).unwrap();
        es.add_source(Source::new("gas_station").output("gas", Flow::new()))
            .unwrap();
        es.add_sink(Sink::new("heat_demand").input("heat", Flow::new()))
            .unwrap();
        es
    }

    #[test]
    fn test_energy_system_creation() {
        let mut es = heat_system();
        let mimo = MimoConverter::new(
            MimoConfig::new("mimo")
                .input(Port::single("gas", Flow::new()))
                .output(Port::single("heat", Flow::new()))
                .output(Port::single("co2", Flow::new()))
                .with_emission_factor("co2", "gas", 56.0),
        )
        .unwrap();
        es.add_mimo(mimo).unwrap();

        let stats = es.stats();
        assert_eq!(stats.num_buses, 3);
        assert_eq!(stats.num_converters, 1);
        assert_eq!(stats.num_flows, 5);
        assert_eq!(
            stats.to_string(),
            "3 buses, 1 sources, 1 sinks, 1 converters, 5 flows (0 investable)"
        );

        let flows: Vec<_> = es.flows().map(|(s, t, _)| (s, t)).collect();
        assert_eq!(
            flows,
            vec![
                ("gas_station", "gas"),
                ("heat", "heat_demand"),
                ("gas", "mimo"),
                ("mimo", "heat"),
                ("mimo", "co2"),
            ]
        );
        assert!(es.mimo("mimo").is_some());
        let into_heat: Vec<_> = es.inflows("heat").into_iter().map(|(s, _, _)| s).collect();
        assert_eq!(into_heat, vec!["mimo"]);
        assert_eq!(es.outflows("mimo").len(), 2);
        assert!(es.bus("mimo").is_none());
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let mut es = heat_system();
        let err = es
            .add_sink(Sink::new("elec_demand").input("electricity", Flow::new()))
            .unwrap_err();
        assert!(matches!(err, MimoError::Network(_)));
        assert!(es.node("elec_demand").is_none());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut es = heat_system();
        assert!(es.add_bus(Bus::new("gas")).is_err());
    }

    #[test]
    fn test_component_used_as_bus_rejected() {
        let mut es = heat_system();
        let err = es
            .add_sink(Sink::new("other").input("gas_station", Flow::new()))
            .unwrap_err();
        assert!(err.to_string().contains("is a source, not a bus"));
    }

    #[test]
    fn test_validate_reports_dangling_buses() {
        let es = heat_system();
        let mut diag = Diagnostics::new();
        es.validate_into(&mut diag);

        // gas and heat have only one side connected; co2 is unconnected
        assert_eq!(diag.warning_count(), 3);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_validate_empty_system() {
        let es = EnergySystem::new(TimeIndex::new(1));
        let mut diag = Diagnostics::new();
        es.validate_into(&mut diag);
        assert_eq!(diag.error_count(), 1);
    }
}
