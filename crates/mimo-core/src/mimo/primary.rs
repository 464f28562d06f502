//! Resolution of the primary bus: the one connected bus whose flow carries a
//! capacity investment.

use super::groups::Direction;
use crate::{Flow, MimoError, MimoResult};

/// The investment-bearing bus of a converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBus {
    pub bus: String,
    pub direction: Direction,
}

/// Find the single bus carrying an investment.
///
/// Returns `Ok(None)` when no connected flow is investable and fails when
/// more than one is.
pub fn resolve_primary_bus<'a>(
    connected: impl IntoIterator<Item = (&'a str, &'a Flow, Direction)>,
) -> MimoResult<Option<PrimaryBus>> {
    let mut found: Option<PrimaryBus> = None;
    for (bus, flow, direction) in connected {
        if !flow.has_investment() {
            continue;
        }
        if found.is_some() {
            return Err(MimoError::Configuration("Only one investment allowed.".into()));
        }
        found = Some(PrimaryBus {
            bus: bus.to_string(),
            direction,
        });
    }
    Ok(found)
}
