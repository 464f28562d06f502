//! Scalar-or-series parameter values.
//!
//! Conversion factors, emission factors, flow shares, activity bounds and flow
//! bounds may be given either as one number applying to every time step or as
//! one value per time step. [`Sequence`] stores both forms and is indexed by
//! the global time-step index of a [`TimeIndex`](crate::TimeIndex).

use serde::{Deserialize, Serialize};

/// A value that is either constant over time or given per time step.
///
/// Deserializes from a number (`1.2`) or a list (`[0.8, 0.3]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    Constant(f64),
    Series(Vec<f64>),
}

impl Sequence {
    pub fn constant(value: f64) -> Self {
        Sequence::Constant(value)
    }

    pub fn series(values: impl Into<Vec<f64>>) -> Self {
        Sequence::Series(values.into())
    }

    /// Value at time step `t`, `None` past the end of a series.
    pub fn get(&self, t: usize) -> Option<f64> {
        match self {
            Sequence::Constant(v) => Some(*v),
            Sequence::Series(values) => values.get(t).copied(),
        }
    }

    /// Value at time step `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is past the end of a series. Model construction checks
    /// [`Sequence::covers`] for every sequence before indexing.
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Sequence::Constant(v) => *v,
            Sequence::Series(values) => values[t],
        }
    }

    /// Whether the sequence provides a value for each of `steps` time steps.
    pub fn covers(&self, steps: usize) -> bool {
        match self {
            Sequence::Constant(_) => true,
            Sequence::Series(values) => values.len() >= steps,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Sequence::Constant(_))
    }

    /// Iterate over all explicitly stored values.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let slice: &[f64] = match self {
            Sequence::Constant(v) => std::slice::from_ref(v),
            Sequence::Series(values) => values,
        };
        slice.iter().copied()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Constant(1.0)
    }
}

impl From<f64> for Sequence {
    fn from(value: f64) -> Self {
        Sequence::Constant(value)
    }
}

impl From<Vec<f64>> for Sequence {
    fn from(values: Vec<f64>) -> Self {
        Sequence::Series(values)
    }
}

impl From<&[f64]> for Sequence {
    fn from(values: &[f64]) -> Self {
        Sequence::Series(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Sequence {
    fn from(values: [f64; N]) -> Self {
        Sequence::Series(values.to_vec())
    }
}
