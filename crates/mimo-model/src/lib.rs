//! # mimo-model: Linear Optimization of Energy Systems
//!
//! Builds a linear program from a [`mimo_core::EnergySystem`] and solves it
//! with `good_lp`.
//!
//! ## Building
//!
//! [`Model::new`] runs one pass over the energy system: a non-negative flow
//! variable per flow and time step, then the constraint blocks in fixed order:
//!
//! | Block | Constraints |
//! |-------|-------------|
//! | [`FlowBlock`] | `fix` / `min` / `max` relative to the nominal value, variable costs |
//! | [`InvestmentFlowBlock`] | invested capacity bounds the flow, investment costs |
//! | [`BusBlock`] | inflow equals outflow on balanced buses |
//! | [`MimoConverterBlock`] | group aggregates, group chain, shares, emissions, activity bounds |
//!
//! Global constraints such as [`EmissionLimit`] are added afterwards through
//! the [`ConstraintFacade`] trait.
//!
//! ## Solving
//!
//! [`solve`] uses the Clarabel interior-point solver (feature
//! `solver-clarabel`, enabled by default). Infeasible or unbounded models are
//! reported through [`Results::termination`], not as errors.
//!
//! ## Example
//!
//! ```no_run
//! use mimo_core::*;
//! use mimo_model::{ConstraintFacade, EmissionLimit, Limit, Model};
//!
//! let mut es = EnergySystem::new(TimeIndex::new(2));
//! es.add_bus(Bus::new("gas"))?;
//! es.add_bus(Bus::new("heat"))?;
//! es.add_bus(Bus::unbalanced("co2"))?;
//! es.add_source(Source::new("gas_station").output("gas", Flow::new().with_variable_costs(1.0)))?;
//! es.add_sink(Sink::new("demand").input("heat", Flow::new().with_nominal_value(1.0).with_fix([10.0, 20.0])))?;
//! es.add_mimo(MimoConverter::new(
//!     MimoConfig::new("boiler")
//!         .input(Port::single("gas", Flow::new()))
//!         .output(Port::single("heat", Flow::new()))
//!         .output(Port::single("co2", Flow::new()))
//!         .with_emission_factor("co2", "gas", 0.2),
//! )?)?;
//!
//! let mut model = Model::new(&es)?;
//! EmissionLimit::new("co2_limit", Limit::Total(100.0))
//!     .build_constraint(&mut model)?;
//! # #[cfg(feature = "solver-clarabel")]
//! # {
//! use mimo_model::{solve, SolverConfig};
//! let results = solve(model, &SolverConfig::default())?;
//! println!("{}", results.summary());
//! # }
//! # Ok::<(), MimoError>(())
//! ```

pub mod blocks;
pub mod emission;
mod model;
pub mod results;
#[cfg(feature = "solver-clarabel")]
pub mod solve;

pub use blocks::{BusBlock, ConstraintBlock, FlowBlock, InvestmentFlowBlock, MimoConverterBlock};
pub use emission::{CommodityTaxonomy, ConstraintFacade, EmissionLimit, Limit};
pub use model::{ConstraintInfo, GroupKey, Model};
pub use results::{Results, Termination};
#[cfg(feature = "solver-clarabel")]
pub use solve::{solve, SolverConfig};
