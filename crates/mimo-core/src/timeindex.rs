//! Time index of an energy system: periods made of consecutive time steps.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ordered `(period, step)` index shared by all flows of a model.
///
/// Steps are numbered globally (0..len) across periods, so sequences are
/// indexed by the global step regardless of the period they fall in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeIndex {
    steps_per_period: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    timestamps: Vec<DateTime<Utc>>,
}

impl TimeIndex {
    /// Single period with `steps` time steps.
    pub fn new(steps: usize) -> Self {
        Self::with_periods(vec![steps])
    }

    /// Multi-period index, one entry per period giving its number of steps.
    pub fn with_periods(steps_per_period: Vec<usize>) -> Self {
        Self {
            steps_per_period,
            timestamps: Vec::new(),
        }
    }

    /// Single period of `steps` hourly time steps starting at `start`.
    pub fn hourly(start: DateTime<Utc>, steps: usize) -> Self {
        let timestamps = (0..steps)
            .map(|h| start + Duration::hours(h as i64))
            .collect();
        Self {
            steps_per_period: vec![steps],
            timestamps,
        }
    }

    /// Total number of time steps over all periods.
    pub fn len(&self) -> usize {
        self.steps_per_period.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_periods(&self) -> usize {
        self.steps_per_period.len()
    }

    /// Iterate `(period, step)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps_per_period
            .iter()
            .enumerate()
            .flat_map(|(p, &n)| std::iter::repeat(p).take(n))
            .enumerate()
            .map(|(t, p)| (p, t))
    }

    /// Global step indices belonging to period `p`.
    pub fn steps_in_period(&self, p: usize) -> std::ops::Range<usize> {
        let start: usize = self.steps_per_period.iter().take(p).sum();
        let n = self.steps_per_period.get(p).copied().unwrap_or(0);
        start..start + n
    }

    pub fn timestamp(&self, t: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(t).copied()
    }
}
