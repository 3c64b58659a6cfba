//! Metabolic power probe
//!
//! `MetabolicProbe` is the persisted configuration. Binding it against a host
//! `MuscleModel` resolves every configured muscle name and mass once, and
//! returns a `BoundMetabolicProbe` that is queried at each evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{
    MetabolicRateConfig, MetabolicRateEngine, MetabolicRateTotals, MuscleRateBreakdown,
    MuscleState,
};
use crate::error::{MetabolicsError, MetabolicsResult};
use crate::parameters::{MuscleEnergeticsParameter, MuscleEnergeticsParameterSet};

pub const DEFAULT_PROBE_NAME: &str = "metabolic_power";

/// Constant muscle properties read once at bind time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MuscleProperties {
    /// N
    pub max_isometric_force: f64,
    /// m
    pub optimal_fiber_length: f64,
}

/// Host simulation seen by the probe.
///
/// Names are resolved to handles once; per-evaluation state is pulled
/// through the handle.
pub trait MuscleModel {
    type MuscleHandle: Copy + fmt::Debug;
    type State;

    fn find_muscle(&self, name: &str) -> Option<Self::MuscleHandle>;

    fn muscle_properties(&self, muscle: Self::MuscleHandle) -> MuscleProperties;

    fn muscle_state(
        &self,
        state: &Self::State,
        muscle: Self::MuscleHandle,
    ) -> MetabolicsResult<MuscleState>;

    /// kg
    fn total_mass(&self, state: &Self::State) -> f64;
}

/// How evaluation results are laid out as output channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// One channel: whole-body metabolic power
    #[default]
    Total,
    /// Total followed by basal, activation, maintenance, shortening and work
    Decomposed,
}

const DECOMPOSED_SUFFIXES: [&str; 6] = [
    "TOTAL",
    "BASAL",
    "ACTIVATION",
    "MAINTENANCE",
    "SHORTENING",
    "MECHANICAL_WORK",
];

impl ReportMode {
    pub fn channel_count(self) -> usize {
        match self {
            ReportMode::Total => 1,
            ReportMode::Decomposed => DECOMPOSED_SUFFIXES.len(),
        }
    }

    fn labels(self, probe_name: &str) -> Vec<String> {
        match self {
            ReportMode::Total => vec![probe_name.to_string()],
            ReportMode::Decomposed => DECOMPOSED_SUFFIXES
                .iter()
                .map(|suffix| format!("{probe_name}_{suffix}"))
                .collect(),
        }
    }

    fn values(self, totals: &MetabolicRateTotals) -> Vec<f64> {
        match self {
            ReportMode::Total => vec![totals.total],
            ReportMode::Decomposed => vec![
                totals.total,
                totals.basal,
                totals.activation,
                totals.maintenance,
                totals.shortening,
                totals.mechanical_work,
            ],
        }
    }
}

/// Muscle metabolic power probe configuration (Bhargava et al., 2004).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolicProbe {
    pub probe_name: String,
    /// Multiplies every reported channel
    pub gain: f64,
    pub report_mode: ReportMode,
    #[serde(flatten)]
    pub rates: MetabolicRateConfig,
    pub metabolic_parameters: MuscleEnergeticsParameterSet,
}

impl Default for MetabolicProbe {
    fn default() -> Self {
        Self {
            probe_name: DEFAULT_PROBE_NAME.to_string(),
            gain: 1.0,
            report_mode: ReportMode::Total,
            rates: MetabolicRateConfig::default(),
            metabolic_parameters: MuscleEnergeticsParameterSet::new(),
        }
    }
}

impl MetabolicProbe {
    pub fn new(probe_name: impl Into<String>) -> Self {
        Self {
            probe_name: probe_name.into(),
            ..Default::default()
        }
    }

    /// Probe with the five rate terms switched individually.
    pub fn with_rates(
        activation_rate_on: bool,
        maintenance_rate_on: bool,
        shortening_rate_on: bool,
        basal_rate_on: bool,
        mechanical_work_rate_on: bool,
    ) -> Self {
        let mut probe = Self::default();
        probe.rates.activation_rate_on = activation_rate_on;
        probe.rates.maintenance_rate_on = maintenance_rate_on;
        probe.rates.shortening_rate_on = shortening_rate_on;
        probe.rates.basal_rate_on = basal_rate_on;
        probe.rates.mechanical_work_rate_on = mechanical_work_rate_on;
        probe
    }

    pub fn add_muscle(
        &mut self,
        muscle: impl Into<String>,
        parameter: MuscleEnergeticsParameter,
    ) -> MetabolicsResult<()> {
        self.metabolic_parameters.insert(muscle, parameter)
    }

    pub fn remove_muscle(&mut self, muscle: &str) -> Option<MuscleEnergeticsParameter> {
        self.metabolic_parameters.remove(muscle)
    }

    pub fn validate(&self) -> MetabolicsResult<()> {
        if self.probe_name.trim().is_empty() {
            return Err(MetabolicsError::configuration("probe_name must not be empty"));
        }
        if !self.gain.is_finite() {
            return Err(MetabolicsError::configuration(format!(
                "gain must be finite, got {}",
                self.gain
            )));
        }
        self.rates.validate()?;
        self.metabolic_parameters.validate()
    }

    pub fn num_output_channels(&self) -> usize {
        self.report_mode.channel_count()
    }

    pub fn output_labels(&self) -> Vec<String> {
        self.report_mode.labels(&self.probe_name)
    }

    /// Resolve every configured muscle against `model` and compute its mass.
    ///
    /// Any unknown muscle or invalid parameter aborts the whole bind.
    pub fn bind<'a, M: MuscleModel>(
        &self,
        model: &'a M,
    ) -> MetabolicsResult<BoundMetabolicProbe<'a, M>> {
        self.validate()?;
        let engine = MetabolicRateEngine::new(self.rates.clone())?;

        let mut muscles = Vec::with_capacity(self.metabolic_parameters.len());
        for (name, parameter) in self.metabolic_parameters.iter() {
            let handle = model.find_muscle(name).ok_or_else(|| {
                MetabolicsError::binding(format!(
                    "muscle '{name}' in probe '{}' was not found in the model",
                    self.probe_name
                ))
            })?;

            let properties = model.muscle_properties(handle);
            let mut parameter = parameter.clone();
            let mass = parameter
                .resolve_mass(
                    properties.max_isometric_force,
                    properties.optimal_fiber_length,
                )
                .map_err(|e| match e {
                    MetabolicsError::Configuration(msg) => {
                        MetabolicsError::configuration(format!("muscle '{name}': {msg}"))
                    }
                    other => other,
                })?;
            log::debug!(
                "[{}] bound muscle '{}' ({:?}), mass {:.5} kg{}",
                self.probe_name,
                name,
                handle,
                mass,
                if parameter.use_provided_muscle_mass {
                    " (provided)"
                } else {
                    ""
                }
            );

            muscles.push(BoundMuscle {
                name: name.to_string(),
                handle,
                parameter,
            });
        }

        if muscles.is_empty() {
            log::warn!(
                "[{}] no muscles configured, probe reports basal rate only",
                self.probe_name
            );
        }
        log::info!(
            "[{}] bound {} muscles",
            self.probe_name,
            muscles.len()
        );

        Ok(BoundMetabolicProbe {
            model,
            engine,
            probe_name: self.probe_name.clone(),
            gain: self.gain,
            report_mode: self.report_mode,
            muscles,
        })
    }
}

struct BoundMuscle<H> {
    name: String,
    handle: H,
    parameter: MuscleEnergeticsParameter,
}

/// Probe bound to a live model. Read-only: evaluation never mutates it.
pub struct BoundMetabolicProbe<'a, M: MuscleModel> {
    model: &'a M,
    engine: MetabolicRateEngine,
    probe_name: String,
    gain: f64,
    report_mode: ReportMode,
    muscles: Vec<BoundMuscle<M::MuscleHandle>>,
}

impl<'a, M: MuscleModel> BoundMetabolicProbe<'a, M> {
    pub fn probe_name(&self) -> &str {
        &self.probe_name
    }

    pub fn engine(&self) -> &MetabolicRateEngine {
        &self.engine
    }

    pub fn num_muscles(&self) -> usize {
        self.muscles.len()
    }

    pub fn muscle_names(&self) -> impl Iterator<Item = &str> {
        self.muscles.iter().map(|m| m.name.as_str())
    }

    /// Mass resolved at bind time (kg)
    pub fn muscle_mass(&self, muscle: &str) -> Option<f64> {
        self.muscles
            .iter()
            .find(|m| m.name == muscle)
            .and_then(|m| m.parameter.resolved_mass().ok())
    }

    pub fn num_output_channels(&self) -> usize {
        self.report_mode.channel_count()
    }

    pub fn output_labels(&self) -> Vec<String> {
        self.report_mode.labels(&self.probe_name)
    }

    /// Per-muscle heat and work terms, in configuration order.
    pub fn muscle_breakdowns(
        &self,
        state: &M::State,
    ) -> MetabolicsResult<Vec<(&str, MuscleRateBreakdown)>> {
        let mut breakdowns = Vec::with_capacity(self.muscles.len());
        for muscle in &self.muscles {
            let muscle_state = self.model.muscle_state(state, muscle.handle)?;
            let breakdown = self
                .engine
                .compute_muscle_rate(&muscle_state, &muscle.parameter)
                .map_err(|e| match e {
                    MetabolicsError::Computation(msg) => {
                        MetabolicsError::computation(format!("muscle '{}': {msg}", muscle.name))
                    }
                    other => other,
                })?;
            breakdowns.push((muscle.name.as_str(), breakdown));
        }
        Ok(breakdowns)
    }

    /// Whole-body totals; fails as a whole if any muscle fails.
    pub fn totals(&self, state: &M::State) -> MetabolicsResult<MetabolicRateTotals> {
        let breakdowns = self.muscle_breakdowns(state)?;
        let body_mass = self.model.total_mass(state);
        self.engine
            .aggregate(body_mass, breakdowns.iter().map(|(_, b)| b))
    }

    /// Lay out precomputed totals as output channels, scaled by the probe gain.
    pub fn channel_values(&self, totals: &MetabolicRateTotals) -> Vec<f64> {
        self.report_mode
            .values(totals)
            .into_iter()
            .map(|value| value * self.gain)
            .collect()
    }

    /// Channel values for the current state, scaled by the probe gain.
    pub fn evaluate(&self, state: &M::State) -> MetabolicsResult<Vec<f64>> {
        let totals = self.totals(state)?;
        Ok(self.channel_values(&totals))
    }
}
