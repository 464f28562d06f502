//! Input/output grouping of a converter's buses.
//!
//! Ports are given either as a single bus with its flow or as a named group of
//! buses. [`normalize`] turns them into an ordered [`Groups`] collection where
//! every single bus has been wrapped into a synthesized singleton group.
//!
//! # Ordering
//!
//! Group order is part of the model: the constraint builder chains adjacent
//! groups and bridges the *last* input group to the *last* output group.
//! Explicit groups come first in declaration order, followed by the singleton
//! groups, also in declaration order, named `in_group_<n>` / `out_group_<n>`
//! where `n` counts singletons only.

use crate::{Flow, MimoError, MimoResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Side of the converter a port or group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Prefix used for synthesized singleton group names.
    pub fn prefix(self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// A connection of the converter as declared by the user.
///
/// Serialized as a map with a `type` field (`single` or `group`) next to the
/// variant's fields; an omitted `flow` on a single port is the default flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Port {
    /// One bus, grouped on its own during normalization.
    Single {
        bus: String,
        #[serde(default)]
        flow: Flow,
    },
    /// Several buses sharing one group aggregate.
    Group {
        name: String,
        members: Vec<(String, Flow)>,
    },
}

impl Port {
    pub fn single(bus: impl Into<String>, flow: Flow) -> Self {
        Port::Single {
            bus: bus.into(),
            flow,
        }
    }

    pub fn group<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, Flow)>,
    ) -> Self {
        Port::Group {
            name: name.into(),
            members: members.into_iter().map(|(b, f)| (b.into(), f)).collect(),
        }
    }

    /// Bus labels reachable through this port.
    pub fn buses(&self) -> Vec<&str> {
        match self {
            Port::Single { bus, .. } => vec![bus.as_str()],
            Port::Group { members, .. } => members.iter().map(|(b, _)| b.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Synthesized for a single bus.
    Singleton,
    /// Declared by name.
    Named,
}

/// A normalized group: named buses sharing one aggregate variable.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub name: String,
    pub kind: GroupKind,
    pub members: IndexMap<String, Flow>,
}

impl Group {
    pub fn contains(&self, bus: &str) -> bool {
        self.members.contains_key(bus)
    }

    pub fn buses(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

/// Ordered groups of one direction.
#[derive(Debug, Clone, Serialize)]
pub struct Groups {
    pub direction: Direction,
    groups: IndexMap<String, Group>,
}

impl Groups {
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            groups: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn first(&self) -> Option<&Group> {
        self.groups.first().map(|(_, g)| g)
    }

    pub fn last(&self) -> Option<&Group> {
        self.groups.last().map(|(_, g)| g)
    }

    /// Group holding `bus`, if any.
    pub fn group_of(&self, bus: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.contains(bus))
    }

    pub fn contains_bus(&self, bus: &str) -> bool {
        self.group_of(bus).is_some()
    }

    /// All grouped buses with their flows, in group order.
    pub fn buses(&self) -> impl Iterator<Item = (&str, &Flow)> {
        self.groups
            .values()
            .flat_map(|g| g.members.iter().map(|(b, f)| (b.as_str(), f)))
    }

    /// Consecutive pairs `(g, g')` in insertion order.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&Group, &Group)> {
        self.groups
            .values()
            .zip(self.groups.values().skip(1))
    }
}

/// Result of normalizing one direction's ports.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub groups: Groups,
    /// Buses matched by the exclusion set, in declaration order. Named groups
    /// give up such members and keep the rest.
    pub excluded: IndexMap<String, Flow>,
}

/// Build the ordered groups of one direction.
///
/// Buses in `exclude` are set aside in [`Normalized::excluded`] instead of
/// being grouped, whether they were given as a single port or as a member of
/// a named group. Fails on a duplicate group name, a bus listed twice, or a
/// group that is empty (or only held excluded buses).
pub fn normalize(
    ports: &[Port],
    direction: Direction,
    exclude: &HashSet<String>,
) -> MimoResult<Normalized> {
    let mut named: IndexMap<String, Group> = IndexMap::new();
    let mut singles: Vec<(String, Flow)> = Vec::new();
    let mut excluded = IndexMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for port in ports {
        for bus in port.buses() {
            if !seen.insert(bus) {
                return Err(MimoError::Configuration(format!(
                    "Bus '{}' is connected more than once as {}.",
                    bus, direction
                )));
            }
        }

        match port {
            Port::Single { bus, flow } => {
                if exclude.contains(bus) {
                    excluded.insert(bus.clone(), flow.clone());
                } else {
                    singles.push((bus.clone(), flow.clone()));
                }
            }
            Port::Group { name, members } => {
                if members.is_empty() {
                    return Err(MimoError::Configuration(format!(
                        "Group '{}' has no buses.",
                        name
                    )));
                }
                if named.contains_key(name) {
                    return Err(MimoError::Configuration(format!(
                        "Duplicate {} group name '{}'.",
                        direction, name
                    )));
                }
                let mut kept = IndexMap::new();
                for (bus, flow) in members {
                    if exclude.contains(bus) {
                        excluded.insert(bus.clone(), flow.clone());
                    } else {
                        kept.insert(bus.clone(), flow.clone());
                    }
                }
                if kept.is_empty() {
                    return Err(MimoError::Configuration(format!(
                        "Group '{}' has no buses left once emission buses are set aside.",
                        name
                    )));
                }
                named.insert(
                    name.clone(),
                    Group {
                        name: name.clone(),
                        kind: GroupKind::Named,
                        members: kept,
                    },
                );
            }
        }
    }

    let mut groups = named;
    for (n, (bus, flow)) in singles.into_iter().enumerate() {
        let name = format!("{}_group_{}", direction.prefix(), n);
        if groups.contains_key(&name) {
            return Err(MimoError::Configuration(format!(
                "Group name '{}' collides with a generated singleton group.",
                name
            )));
        }
        let mut members = IndexMap::new();
        members.insert(bus, flow);
        groups.insert(
            name.clone(),
            Group {
                name,
                kind: GroupKind::Singleton,
                members,
            },
        );
    }

    Ok(Normalized {
        groups: Groups { direction, groups },
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_exclude() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_singletons_are_wrapped_in_order() {
        let ports = vec![
            Port::single("gas", Flow::new()),
            Port::single("hydro", Flow::new()),
        ];
        let n = normalize(&ports, Direction::Input, &no_exclude()).unwrap();
        let names: Vec<_> = n.groups.names().collect();
        assert_eq!(names, vec!["in_group_0", "in_group_1"]);
        assert_eq!(n.groups.group_of("hydro").unwrap().name, "in_group_1");
        assert_eq!(n.groups.first().unwrap().kind, GroupKind::Singleton);
    }

    #[test]
    fn test_named_groups_precede_singletons() {
        let ports = vec![
            Port::single("heat_low", Flow::new()),
            Port::group("out", [("heat", Flow::new()), ("steam", Flow::new())]),
        ];
        let n = normalize(&ports, Direction::Output, &no_exclude()).unwrap();
        let names: Vec<_> = n.groups.names().collect();
        assert_eq!(names, vec!["out", "out_group_0"]);
        assert_eq!(n.groups.last().unwrap().name, "out_group_0");

        let pairs: Vec<_> = n
            .groups
            .adjacent_pairs()
            .map(|(a, b)| (a.name.as_str(), b.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("out", "out_group_0")]);
    }

    #[test]
    fn test_excluded_buses_are_set_aside() {
        let ports = vec![
            Port::single("heat", Flow::new()),
            Port::single("co2", Flow::new()),
        ];
        let exclude: HashSet<String> = ["co2".to_string()].into_iter().collect();
        let n = normalize(&ports, Direction::Output, &exclude).unwrap();

        assert_eq!(n.groups.len(), 1);
        assert!(!n.groups.contains_bus("co2"));
        assert!(n.excluded.contains_key("co2"));
    }

    #[test]
    fn test_excluded_bus_leaves_named_group() {
        let ports = vec![Port::group(
            "out",
            [("heat", Flow::new()), ("co2", Flow::new())],
        )];
        let exclude: HashSet<String> = ["co2".to_string()].into_iter().collect();
        let n = normalize(&ports, Direction::Output, &exclude).unwrap();

        let out = n.groups.get("out").unwrap();
        assert_eq!(out.buses().collect::<Vec<_>>(), vec!["heat"]);
        assert!(!n.groups.contains_bus("co2"));
        assert_eq!(n.excluded.keys().collect::<Vec<_>>(), vec!["co2"]);
    }

    #[test]
    fn test_group_of_only_excluded_buses_rejected() {
        let ports = vec![Port::group("out", [("co2", Flow::new())])];
        let exclude: HashSet<String> = ["co2".to_string()].into_iter().collect();
        let err = normalize(&ports, Direction::Output, &exclude).unwrap_err();
        assert!(err.to_string().contains("'out'"), "{}", err);
    }

    #[test]
    fn test_duplicate_group_name_rejected() {
        let ports = vec![
            Port::group("in", [("gas", Flow::new())]),
            Port::group("in", [("hydro", Flow::new())]),
        ];
        let err = normalize(&ports, Direction::Input, &no_exclude()).unwrap_err();
        assert!(matches!(err, MimoError::Configuration(_)));
    }

    #[test]
    fn test_bus_listed_twice_rejected() {
        let ports = vec![
            Port::group("in", [("gas", Flow::new())]),
            Port::single("gas", Flow::new()),
        ];
        let err = normalize(&ports, Direction::Input, &no_exclude()).unwrap_err();
        assert!(err.to_string().contains("'gas'"));
    }

    #[test]
    fn test_empty_group_rejected() {
        let ports = vec![Port::Group {
            name: "in".into(),
            members: vec![],
        }];
        assert!(normalize(&ports, Direction::Input, &no_exclude()).is_err());
    }

    #[test]
    fn test_ports_read_from_tagged_maps() {
        let ports: Vec<Port> = serde_json::from_str(
            r#"[
                {"type": "single", "bus": "heat"},
                {"type": "group", "name": "in", "members": [["gas", {"variable_costs": 2}]]}
            ]"#,
        )
        .unwrap();
        assert_eq!(ports[0], Port::single("heat", Flow::new()));
        assert_eq!(
            ports[1],
            Port::group("in", [("gas", Flow::new().with_variable_costs(2.0))])
        );
    }

    #[test]
    fn test_no_ports_gives_empty_groups() {
        let n = normalize(&[], Direction::Output, &no_exclude()).unwrap();
        assert!(n.groups.is_empty());
        assert!(n.groups.last().is_none());
    }
}
