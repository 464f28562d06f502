//! # mimo-tabular: Converters and Emission Limits from Flat Records
//!
//! Tabular energy-system inputs describe each component as one flat record
//! with a `type` field. This crate decodes the `mimo` and
//! `co2_emission_limit` record types against an existing
//! [`mimo_core::EnergySystem`].
//!
//! ```no_run
//! use mimo_core::{EnergySystem, TimeIndex};
//! use mimo_model::{solve, ConstraintFacade, Model, SolverConfig};
//! use mimo_tabular::{apply_records, load_records_from_path};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut es = EnergySystem::new(TimeIndex::new(8760)); // buses, sources, sinks
//! let records = load_records_from_path(Path::new("components.yaml"))?;
//! let limits = apply_records(&records, &mut es)?;
//!
//! let mut model = Model::new(&es)?;
//! for limit in &limits {
//!     limit.build_constraint(&mut model)?;
//! }
//! let results = solve(model, &SolverConfig::default())?;
//! println!("{}", results.summary());
//! # Ok(())
//! # }
//! ```

pub mod constraint;
pub mod facade;
pub mod records;

pub use constraint::emission_limit_from_record;
pub use facade::MimoFacade;
pub use records::{apply_records, load_records_from_path, parse_record, Parsed, Record};
