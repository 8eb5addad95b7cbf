//! Cumulative counter with milestone thresholds
//!
//! Backs the monetization and guard-progress widgets. The counter only
//! moves up by positive deltas; milestone crossings fire exactly once, in
//! ascending threshold order, and the scan resumes where it left off so a
//! threshold is never re-triggered.

use castlink_common::config::MilestoneConfig;
use castlink_common::events::{CounterSnapshot, MilestoneHit};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Milestone {
    threshold: f64,
    payload: String,
}

#[derive(Debug)]
pub struct CounterState {
    current: f64,
    milestones: Vec<Milestone>,
    /// Count of milestones already triggered; scan resumes here
    next_index: usize,
}

impl CounterState {
    /// Build from configuration. Thresholds must be positive and strictly
    /// ascending.
    pub fn new(milestones: &[MilestoneConfig]) -> Result<Self> {
        for pair in milestones.windows(2) {
            if pair[0].threshold >= pair[1].threshold {
                return Err(Error::InvalidMilestones(format!(
                    "thresholds not strictly ascending: {} then {}",
                    pair[0].threshold, pair[1].threshold
                )));
            }
        }
        if let Some(m) = milestones.iter().find(|m| m.threshold <= 0.0) {
            return Err(Error::InvalidMilestones(format!(
                "non-positive threshold: {}",
                m.threshold
            )));
        }

        Ok(Self {
            current: 0.0,
            milestones: milestones
                .iter()
                .map(|m| Milestone {
                    threshold: m.threshold,
                    payload: m.payload.clone(),
                })
                .collect(),
            next_index: 0,
        })
    }

    /// Add `delta` to the counter and return the milestones it crossed,
    /// ascending. Non-positive deltas are rejected without state change.
    pub fn apply(&mut self, delta: f64) -> Result<Vec<MilestoneHit>> {
        if delta <= 0.0 || !delta.is_finite() {
            return Err(Error::InvalidDelta(delta));
        }

        self.current += delta;

        let mut hits = Vec::new();
        while self.next_index < self.milestones.len()
            && self.milestones[self.next_index].threshold <= self.current
        {
            let m = &self.milestones[self.next_index];
            hits.push(MilestoneHit {
                index: self.next_index,
                threshold: m.threshold,
                payload: m.payload.clone(),
            });
            self.next_index += 1;
        }
        Ok(hits)
    }

    /// Zero the counter and re-arm every milestone
    pub fn reset(&mut self) {
        self.current = 0.0;
        self.next_index = 0;
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            current_value: self.current,
            reached: self.milestones[..self.next_index]
                .iter()
                .enumerate()
                .map(|(index, m)| MilestoneHit {
                    index,
                    threshold: m.threshold,
                    payload: m.payload.clone(),
                })
                .collect(),
            next_threshold: self.milestones.get(self.next_index).map(|m| m.threshold),
        }
    }
}
