//! Multi-input/multi-output converter.
//!
//! A [`MimoConverter`] relates any number of grouped inputs to any number of
//! grouped outputs through one shared activity level. Construction validates
//! the declarative [`MimoConfig`] once: it normalizes groups, fills in default
//! conversion factors, resolves the primary (investment-bearing) bus and
//! checks flow-share and activity-bound declarations. The resulting converter
//! is immutable; the optimization model reads it when building constraints.
//!
//! ```
//! use mimo_core::{Flow, MimoConfig, MimoConverter, Port};
//!
//! let config = MimoConfig::new("mimo")
//!     .input(Port::group("in", [("gas", Flow::new()), ("hydro", Flow::new())]))
//!     .output(Port::single("heat", Flow::new()))
//!     .output(Port::single("co2", Flow::new()))
//!     .with_conversion_factor("in", 1.0 / 0.82)
//!     .with_emission_factor("co2", "gas", 56.0)
//!     .with_flow_share("max", "hydro", [0.0, 0.5]);
//!
//! let mimo = MimoConverter::new(config).unwrap();
//! assert_eq!(mimo.output_groups().len(), 1);
//! assert!(mimo.emission_outputs().contains_key("co2"));
//! ```

pub mod factors;
pub mod groups;
pub mod primary;

pub use factors::{
    parse_bound_types, validate_activity_bounds, validate_flow_shares, BoundType,
    ConversionFactors, FlowShare, FlowShareSpec,
};
pub use groups::{normalize, Direction, Group, GroupKind, Groups, Normalized, Port};
pub use primary::{resolve_primary_bus, PrimaryBus};

use crate::{Diagnostics, Flow, MimoError, MimoResult, Sequence};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Declarative configuration of a converter.
///
/// `inputs`/`outputs` left as `None` are treated as empty with a warning.
/// Emission factors map an emission output bus to the emitting buses or
/// groups and their factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimoConfig {
    pub label: String,
    pub inputs: Option<Vec<Port>>,
    pub outputs: Option<Vec<Port>>,
    pub conversion_factors: IndexMap<String, Sequence>,
    pub emission_factors: IndexMap<String, IndexMap<String, Sequence>>,
    pub flow_shares: FlowShareSpec,
    pub activity_bounds: IndexMap<String, Sequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech: Option<String>,
}

impl MimoConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn input(mut self, port: Port) -> Self {
        self.inputs.get_or_insert_with(Vec::new).push(port);
        self
    }

    pub fn output(mut self, port: Port) -> Self {
        self.outputs.get_or_insert_with(Vec::new).push(port);
        self
    }

    pub fn with_conversion_factor(
        mut self,
        bus_or_group: impl Into<String>,
        factor: impl Into<Sequence>,
    ) -> Self {
        self.conversion_factors
            .insert(bus_or_group.into(), factor.into());
        self
    }

    /// Declare `factor` units of `emission_bus` per unit of `source`, where
    /// `source` is a connected bus or a group name.
    pub fn with_emission_factor(
        mut self,
        emission_bus: impl Into<String>,
        source: impl Into<String>,
        factor: impl Into<Sequence>,
    ) -> Self {
        self.emission_factors
            .entry(emission_bus.into())
            .or_default()
            .insert(source.into(), factor.into());
        self
    }

    pub fn with_flow_share(
        mut self,
        tag: impl Into<String>,
        bus: impl Into<String>,
        share: impl Into<Sequence>,
    ) -> Self {
        self.flow_shares.insert(tag, bus, share);
        self
    }

    pub fn with_activity_bound(mut self, tag: impl Into<String>, bound: impl Into<Sequence>) -> Self {
        self.activity_bounds.insert(tag.into(), bound.into());
        self
    }
}

/// Where an emission factor's source name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionSource<'a> {
    InputGroup(&'a str),
    OutputGroup(&'a str),
    InputBus(&'a str),
    OutputBus(&'a str),
}

/// A validated multi-input/multi-output converter.
#[derive(Debug, Clone)]
pub struct MimoConverter {
    label: String,
    input_groups: Groups,
    output_groups: Groups,
    emission_outputs: IndexMap<String, Flow>,
    emission_factors: IndexMap<String, IndexMap<String, Sequence>>,
    conversion_factors: ConversionFactors,
    input_flow_shares: Vec<FlowShare>,
    output_flow_shares: Vec<FlowShare>,
    activity_bounds: IndexMap<BoundType, Sequence>,
    primary: Option<PrimaryBus>,
    carrier: Option<String>,
    tech: Option<String>,
    diagnostics: Diagnostics,
}

impl MimoConverter {
    pub fn new(config: MimoConfig) -> MimoResult<Self> {
        let MimoConfig {
            label,
            inputs,
            outputs,
            conversion_factors,
            mut emission_factors,
            flow_shares,
            activity_bounds,
            carrier,
            tech,
        } = config;
        let mut diagnostics = Diagnostics::new();

        let inputs = ports_or_warn(inputs, "inputs", &label, &mut diagnostics);
        let outputs = ports_or_warn(outputs, "outputs", &label, &mut diagnostics);

        let single_outputs: HashSet<&str> = outputs
            .iter()
            .filter_map(|p| match p {
                Port::Single { bus, .. } => Some(bus.as_str()),
                Port::Group { .. } => None,
            })
            .collect();
        let grouped_outputs: HashSet<&str> = outputs
            .iter()
            .filter(|p| matches!(p, Port::Group { .. }))
            .flat_map(|p| p.buses())
            .collect();
        emission_factors.retain(|target, _| {
            let connected = single_outputs.contains(target.as_str())
                || grouped_outputs.contains(target.as_str());
            if !connected {
                let msg = format!(
                    "emission factors given for '{}', which is not an output; ignored",
                    target
                );
                warn!(converter = %label, "{}", msg);
                diagnostics.add_warning_with_entity("emission", &msg, &label);
            }
            connected
        });
        let targets: HashSet<String> = emission_factors.keys().cloned().collect();

        let Normalized {
            groups: input_groups,
            ..
        } = normalize(&inputs, Direction::Input, &HashSet::new())?;
        let Normalized {
            groups: output_groups,
            excluded: emission_outputs,
        } = normalize(&outputs, Direction::Output, &targets)?;

        check_names(&label, &input_groups, &output_groups, &emission_outputs)?;

        let primary = resolve_primary_bus(
            input_groups
                .buses()
                .map(|(b, f)| (b, f, Direction::Input))
                .chain(
                    output_groups
                        .buses()
                        .chain(emission_outputs.iter().map(|(b, f)| (b.as_str(), f)))
                        .map(|(b, f)| (b, f, Direction::Output)),
                ),
        )?;

        let known = input_groups
            .buses()
            .map(|(b, _)| b)
            .chain(output_groups.buses().map(|(b, _)| b))
            .chain(emission_outputs.keys().map(String::as_str))
            .chain(input_groups.names())
            .chain(output_groups.names());
        let conversion_factors = ConversionFactors::resolve(&conversion_factors, known)?;

        let mut input_flow_shares = Vec::new();
        let mut output_flow_shares = Vec::new();
        for share in validate_flow_shares(&flow_shares)? {
            let on_input = input_groups.contains_bus(&share.bus);
            let on_output = output_groups.contains_bus(&share.bus);
            match (on_input, on_output) {
                (true, true) => {
                    input_flow_shares.push(share.clone());
                    output_flow_shares.push(share);
                }
                (true, false) => input_flow_shares.push(share),
                (false, true) => output_flow_shares.push(share),
                (false, false) => {
                    return Err(MimoError::Configuration(format!(
                        "Flow share given for '{}', which is not a grouped input or output of '{}'.",
                        share.bus, label
                    )));
                }
            }
        }

        let activity_bounds = validate_activity_bounds(&activity_bounds)?;
        if !activity_bounds.is_empty() && output_groups.is_empty() {
            return Err(MimoError::Configuration(format!(
                "Activity bounds on '{}' require at least one output group.",
                label
            )));
        }

        debug!(
            converter = %label,
            input_groups = input_groups.len(),
            output_groups = output_groups.len(),
            emissions = emission_outputs.len(),
            primary = primary.as_ref().map(|p| p.bus.as_str()).unwrap_or("-"),
            "converter constructed"
        );

        Ok(Self {
            label,
            input_groups,
            output_groups,
            emission_outputs,
            emission_factors,
            conversion_factors,
            input_flow_shares,
            output_flow_shares,
            activity_bounds,
            primary,
            carrier,
            tech,
            diagnostics,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn input_groups(&self) -> &Groups {
        &self.input_groups
    }

    pub fn output_groups(&self) -> &Groups {
        &self.output_groups
    }

    pub fn emission_outputs(&self) -> &IndexMap<String, Flow> {
        &self.emission_outputs
    }

    pub fn emission_factors(&self) -> &IndexMap<String, IndexMap<String, Sequence>> {
        &self.emission_factors
    }

    pub fn conversion_factors(&self) -> &ConversionFactors {
        &self.conversion_factors
    }

    pub fn input_flow_shares(&self) -> &[FlowShare] {
        &self.input_flow_shares
    }

    pub fn output_flow_shares(&self) -> &[FlowShare] {
        &self.output_flow_shares
    }

    pub fn activity_bounds(&self) -> &IndexMap<BoundType, Sequence> {
        &self.activity_bounds
    }

    pub fn primary_bus(&self) -> Option<&PrimaryBus> {
        self.primary.as_ref()
    }

    pub fn carrier(&self) -> Option<&str> {
        self.carrier.as_deref()
    }

    pub fn tech(&self) -> Option<&str> {
        self.tech.as_deref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Input buses and their flows, in group order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &Flow)> {
        self.input_groups.buses()
    }

    /// Output buses including emission outputs, which come last.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Flow)> {
        self.output_groups.buses().chain(
            self.emission_outputs
                .iter()
                .map(|(b, f)| (b.as_str(), f)),
        )
    }

    pub fn is_input(&self, bus: &str) -> bool {
        self.input_groups.contains_bus(bus)
    }

    pub fn is_output(&self, bus: &str) -> bool {
        self.output_groups.contains_bus(bus) || self.emission_outputs.contains_key(bus)
    }

    /// Resolve an emission source name: group names take precedence over bus
    /// labels, inputs over outputs.
    pub fn resolve_emission_source<'a>(&self, name: &'a str) -> MimoResult<EmissionSource<'a>> {
        if self.input_groups.contains_group(name) {
            Ok(EmissionSource::InputGroup(name))
        } else if self.output_groups.contains_group(name) {
            Ok(EmissionSource::OutputGroup(name))
        } else if self.is_input(name) {
            Ok(EmissionSource::InputBus(name))
        } else if self.is_output(name) {
            Ok(EmissionSource::OutputBus(name))
        } else {
            Err(MimoError::Lookup(format!(
                "Emitting node '{}' not found in inputs or outputs (including groups).",
                name
            )))
        }
    }

    /// Check that every sequence has a value for each of `steps` time steps.
    pub fn check_horizon(&self, steps: usize) -> MimoResult<()> {
        let too_short = |what: &str, entity: &str| {
            MimoError::Configuration(format!(
                "{} of '{}' on converter '{}' is shorter than the time index ({} steps).",
                what, entity, self.label, steps
            ))
        };

        for (key, seq) in self.conversion_factors.iter() {
            if !seq.covers(steps) {
                return Err(too_short("Conversion factor", key));
            }
        }
        for (target, sources) in &self.emission_factors {
            for (source, seq) in sources {
                if !seq.covers(steps) {
                    return Err(too_short("Emission factor", &format!("{}->{}", source, target)));
                }
            }
        }
        for share in self.input_flow_shares.iter().chain(&self.output_flow_shares) {
            if !share.share.covers(steps) {
                return Err(too_short("Flow share", &share.bus));
            }
        }
        for (bound, seq) in &self.activity_bounds {
            if !seq.covers(steps) {
                return Err(too_short("Activity bound", bound.as_str()));
            }
        }
        Ok(())
    }
}

fn ports_or_warn(
    ports: Option<Vec<Port>>,
    what: &str,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Port> {
    match ports {
        Some(ports) if !ports.is_empty() => ports,
        _ => {
            let msg = format!("no {} given, treated as empty", what);
            warn!(converter = %label, "{}", msg);
            diagnostics.add_warning_with_entity("missing", &msg, label);
            Vec::new()
        }
    }
}

/// Group names share one namespace with bus labels for conversion factors and
/// emission sources, so they must not collide.
fn check_names(
    label: &str,
    inputs: &Groups,
    outputs: &Groups,
    emissions: &IndexMap<String, Flow>,
) -> MimoResult<()> {
    let buses: HashSet<&str> = inputs
        .buses()
        .chain(outputs.buses())
        .map(|(b, _)| b)
        .chain(emissions.keys().map(String::as_str))
        .collect();

    for name in inputs.names() {
        if outputs.contains_group(name) {
            return Err(MimoError::Configuration(format!(
                "Group name '{}' is used for inputs and outputs of '{}'.",
                name, label
            )));
        }
    }
    for group in inputs.iter().chain(outputs.iter()) {
        if group.kind == GroupKind::Named && buses.contains(group.name.as_str()) {
            return Err(MimoError::Configuration(format!(
                "Group name '{}' of '{}' is also a bus label.",
                group.name, label
            )));
        }
    }
    Ok(())
}
