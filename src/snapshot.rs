//! Recorded trajectories
//!
//! A table-driven `MuscleModel`: constant muscle properties plus one recorded
//! state per muscle and frame, as exported by a forward simulation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::MuscleState;
use crate::error::{MetabolicsError, MetabolicsResult};
use crate::probe::{MuscleModel, MuscleProperties};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MuscleDescription {
    pub name: String,
    #[serde(flatten)]
    pub properties: MuscleProperties,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryFrame {
    pub time: f64,
    /// Overrides the trajectory-level body mass for this frame
    #[serde(default)]
    pub total_mass: Option<f64>,
    pub muscles: HashMap<String, MuscleState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trajectory {
    pub total_mass: f64,
    pub muscles: Vec<MuscleDescription>,
    pub frames: Vec<TrajectoryFrame>,
}

impl Trajectory {
    pub fn validate(&self) -> MetabolicsResult<()> {
        if !self.total_mass.is_finite() || self.total_mass <= 0.0 {
            return Err(MetabolicsError::configuration(format!(
                "trajectory total_mass must be positive, got {}",
                self.total_mass
            )));
        }
        for (i, muscle) in self.muscles.iter().enumerate() {
            if self.muscles[..i].iter().any(|m| m.name == muscle.name) {
                return Err(MetabolicsError::configuration(format!(
                    "muscle '{}' is described twice in the trajectory",
                    muscle.name
                )));
            }
        }
        if let Some(pair) = self
            .frames
            .windows(2)
            .find(|pair| !(pair[1].time >= pair[0].time))
        {
            return Err(MetabolicsError::configuration(format!(
                "trajectory frame times must be non-decreasing ({} then {})",
                pair[0].time, pair[1].time
            )));
        }
        Ok(())
    }

    /// Host model view over the described muscles.
    pub fn model(&self) -> SnapshotModel {
        SnapshotModel {
            names: self.muscles.iter().map(|m| m.name.clone()).collect(),
            properties: self.muscles.iter().map(|m| m.properties).collect(),
            total_mass: self.total_mass,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SnapshotModel {
    names: Vec<String>,
    properties: Vec<MuscleProperties>,
    total_mass: f64,
}

impl SnapshotModel {
    pub fn new(total_mass: f64) -> Self {
        Self {
            names: Vec::new(),
            properties: Vec::new(),
            total_mass,
        }
    }

    pub fn add_muscle(&mut self, name: impl Into<String>, properties: MuscleProperties) {
        self.names.push(name.into());
        self.properties.push(properties);
    }
}

impl MuscleModel for SnapshotModel {
    type MuscleHandle = usize;
    type State = TrajectoryFrame;

    fn find_muscle(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn muscle_properties(&self, muscle: usize) -> MuscleProperties {
        self.properties[muscle]
    }

    fn muscle_state(&self, state: &TrajectoryFrame, muscle: usize) -> MetabolicsResult<MuscleState> {
        let name = &self.names[muscle];
        state.muscles.get(name).copied().ok_or_else(|| {
            MetabolicsError::computation(format!(
                "frame at t={} has no state for muscle '{name}'",
                state.time
            ))
        })
    }

    fn total_mass(&self, state: &TrajectoryFrame) -> f64 {
        state.total_mass.unwrap_or(self.total_mass)
    }
}
