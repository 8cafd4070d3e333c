//! Per-volume statistics that decide whether geometric ordering can be trusted.
use std::collections::HashMap;

use itertools::Itertools;

/// Counts how many frames share each position. In a well formed multi-phase
/// acquisition every position repeats the same number of times.
#[derive(Debug, Clone, Default)]
pub struct PhasesPerPosition {
    counts: HashMap<String, usize>,
}

impl PhasesPerPosition {
    pub fn add(&mut self, position_key: String) {
        *self.counts.entry(position_key).or_default() += 1;
    }

    pub fn phase_count(&self, position_key: &str) -> usize {
        self.counts.get(position_key).copied().unwrap_or_default()
    }

    pub fn number_of_positions(&self) -> usize {
        self.counts.len()
    }

    /// True when every position has been seen the same number of times.
    pub fn is_consistent(&self) -> bool {
        self.counts.values().all_equal()
    }
}

/// Tracks whether every frame carries the same Acquisition Number.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionNumberEvaluator {
    first: Option<Option<String>>,
    uniform: bool,
}

impl AcquisitionNumberEvaluator {
    pub fn add(&mut self, acquisition_number: Option<&str>) {
        match &self.first {
            None => {
                self.first = Some(acquisition_number.map(str::to_string));
                self.uniform = true;
            }
            Some(first) => {
                if first.as_deref() != acquisition_number {
                    self.uniform = false;
                }
            }
        }
    }

    /// True when no frame has been seen, or all frames share one value (absence included).
    pub fn is_uniform(&self) -> bool {
        self.first.is_none() || self.uniform
    }
}
