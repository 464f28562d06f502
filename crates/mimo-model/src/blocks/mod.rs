//! Constraint blocks.
//!
//! Each block adds the variables and constraints of one component type to a
//! [`Model`]. Blocks run once per build, in the fixed order flows,
//! investments, buses, converters.

mod bus;
mod flow;
mod investment;
mod mimo;

pub use bus::BusBlock;
pub use flow::FlowBlock;
pub use investment::InvestmentFlowBlock;
pub use mimo::MimoConverterBlock;

use crate::Model;
use good_lp::{constraint, Constraint, Expression};
use mimo_core::{BoundType, EnergySystem, MimoResult};

/// Contribution of one component type to the model.
pub trait ConstraintBlock {
    /// Short name recorded on every constraint the block creates.
    fn name(&self) -> &'static str;

    fn create(&self, model: &mut Model, es: &EnergySystem) -> MimoResult<()>;
}

/// `lhs >= rhs`, `lhs <= rhs` or `lhs == rhs`.
pub(crate) fn relation(bound: BoundType, lhs: Expression, rhs: Expression) -> Constraint {
    match bound {
        BoundType::Min => constraint!(lhs >= rhs),
        BoundType::Max => constraint!(lhs <= rhs),
        BoundType::Fix => constraint!(lhs == rhs),
    }
}
