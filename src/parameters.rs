//! Per-muscle energetics parameters
//!
//! Constants from Bhargava et al. (2004), J Biomech 37, 81-88. Muscle mass is
//! either supplied by the user or derived from the bound muscle's maximum
//! isometric force and optimal fiber length.

use serde::{Deserialize, Serialize};

use crate::error::{MetabolicsError, MetabolicsResult};

/// Specific tension of mammalian muscle (Pa)
pub const DEFAULT_SPECIFIC_TENSION: f64 = 0.25e6;
/// Density of mammalian muscle (kg/m³)
pub const DEFAULT_DENSITY: f64 = 1059.7;
pub const DEFAULT_RATIO_SLOW_TWITCH: f64 = 0.5;
/// Activation heat constants (W/kg)
pub const DEFAULT_ACTIVATION_SLOW: f64 = 40.0;
pub const DEFAULT_ACTIVATION_FAST: f64 = 133.0;
/// Maintenance heat constants (W/kg)
pub const DEFAULT_MAINTENANCE_SLOW: f64 = 74.0;
pub const DEFAULT_MAINTENANCE_FAST: f64 = 111.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuscleEnergeticsParameter {
    /// Fraction of slow twitch fibers, in [0, 1]
    pub ratio_slow_twitch_fibers: f64,
    pub activation_constant_slow_twitch: f64,
    pub activation_constant_fast_twitch: f64,
    pub maintenance_constant_slow_twitch: f64,
    pub maintenance_constant_fast_twitch: f64,
    /// Pa, only used when mass is derived
    pub specific_tension: f64,
    /// kg/m³, only used when mass is derived
    pub density: f64,
    pub use_provided_muscle_mass: bool,
    /// kg, required when `use_provided_muscle_mass` is set
    pub provided_muscle_mass: Option<f64>,

    // Derived during binding, never read from or written to configuration.
    #[serde(skip)]
    resolved_mass: Option<f64>,
}

impl Default for MuscleEnergeticsParameter {
    fn default() -> Self {
        Self {
            ratio_slow_twitch_fibers: DEFAULT_RATIO_SLOW_TWITCH,
            activation_constant_slow_twitch: DEFAULT_ACTIVATION_SLOW,
            activation_constant_fast_twitch: DEFAULT_ACTIVATION_FAST,
            maintenance_constant_slow_twitch: DEFAULT_MAINTENANCE_SLOW,
            maintenance_constant_fast_twitch: DEFAULT_MAINTENANCE_FAST,
            specific_tension: DEFAULT_SPECIFIC_TENSION,
            density: DEFAULT_DENSITY,
            use_provided_muscle_mass: false,
            provided_muscle_mass: None,
            resolved_mass: None,
        }
    }
}

impl MuscleEnergeticsParameter {
    pub fn new(ratio_slow_twitch_fibers: f64) -> Self {
        Self {
            ratio_slow_twitch_fibers,
            ..Default::default()
        }
    }

    /// Parameter whose mass is taken as given instead of derived from the muscle.
    pub fn with_provided_mass(ratio_slow_twitch_fibers: f64, muscle_mass: f64) -> Self {
        Self {
            ratio_slow_twitch_fibers,
            use_provided_muscle_mass: true,
            provided_muscle_mass: Some(muscle_mass),
            ..Default::default()
        }
    }

    pub fn with_constants(
        ratio_slow_twitch_fibers: f64,
        activation_constant_slow_twitch: f64,
        activation_constant_fast_twitch: f64,
        maintenance_constant_slow_twitch: f64,
        maintenance_constant_fast_twitch: f64,
    ) -> Self {
        Self {
            ratio_slow_twitch_fibers,
            activation_constant_slow_twitch,
            activation_constant_fast_twitch,
            maintenance_constant_slow_twitch,
            maintenance_constant_fast_twitch,
            ..Default::default()
        }
    }

    /// Check user-supplied fields. Does not touch the resolved mass.
    pub fn validate(&self) -> MetabolicsResult<()> {
        let r = self.ratio_slow_twitch_fibers;
        if !r.is_finite() || !(0.0..=1.0).contains(&r) {
            return Err(MetabolicsError::configuration(format!(
                "ratio_slow_twitch_fibers must be within [0, 1], got {r}"
            )));
        }

        let constants = [
            ("activation_constant_slow_twitch", self.activation_constant_slow_twitch),
            ("activation_constant_fast_twitch", self.activation_constant_fast_twitch),
            ("maintenance_constant_slow_twitch", self.maintenance_constant_slow_twitch),
            ("maintenance_constant_fast_twitch", self.maintenance_constant_fast_twitch),
        ];
        for (name, value) in constants {
            require_positive(name, value)?;
        }

        if self.use_provided_muscle_mass {
            self.provided_mass()?;
        } else {
            require_positive("specific_tension", self.specific_tension)?;
            require_positive("density", self.density)?;
        }
        Ok(())
    }

    fn provided_mass(&self) -> MetabolicsResult<f64> {
        match self.provided_muscle_mass {
            Some(mass) if mass.is_finite() && mass > 0.0 => Ok(mass),
            Some(mass) => Err(MetabolicsError::configuration(format!(
                "missing or invalid provided mass: {mass}"
            ))),
            None => Err(MetabolicsError::configuration(
                "missing or invalid provided mass: use_provided_muscle_mass is set but no mass was given",
            )),
        }
    }

    /// Resolve the muscle mass (kg) used by the heat rate terms.
    ///
    /// With `use_provided_muscle_mass` the provided value wins and the muscle
    /// properties are ignored. Otherwise
    /// `m = (max_isometric_force / specific_tension) * density * optimal_fiber_length`.
    ///
    /// Safe to call again after model edits; the same inputs give the same mass.
    /// On failure the previously resolved mass is discarded.
    pub fn resolve_mass(
        &mut self,
        max_isometric_force: f64,
        optimal_fiber_length: f64,
    ) -> MetabolicsResult<f64> {
        self.resolved_mass = None;
        self.validate()?;

        let mass = if self.use_provided_muscle_mass {
            self.provided_mass()?
        } else {
            require_positive("max_isometric_force", max_isometric_force)?;
            require_positive("optimal_fiber_length", optimal_fiber_length)?;
            let mass = (max_isometric_force / self.specific_tension)
                * self.density
                * optimal_fiber_length;
            if !mass.is_finite() || mass <= 0.0 {
                return Err(MetabolicsError::configuration(format!(
                    "derived muscle mass is not positive: {mass}"
                )));
            }
            mass
        };

        self.resolved_mass = Some(mass);
        Ok(mass)
    }

    /// Mass resolved at bind time. Fails if binding has not happened.
    pub fn resolved_mass(&self) -> MetabolicsResult<f64> {
        match self.resolved_mass {
            Some(mass) if mass.is_finite() && mass > 0.0 => Ok(mass),
            Some(mass) => Err(MetabolicsError::computation(format!(
                "resolved muscle mass is invalid: {mass}"
            ))),
            None => Err(MetabolicsError::computation(
                "muscle mass has not been resolved; bind the probe first",
            )),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_mass.is_some()
    }
}

fn require_positive(name: &str, value: f64) -> MetabolicsResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MetabolicsError::configuration(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

/// Serialised form of one set entry: the muscle name next to its parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MuscleEntry {
    pub muscle: String,
    #[serde(flatten)]
    pub parameter: MuscleEnergeticsParameter,
}

/// Ordered mapping from muscle name to its energetics parameters.
///
/// Insertion order is the evaluation and reporting order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MuscleEntry>", into = "Vec<MuscleEntry>")]
pub struct MuscleEnergeticsParameterSet {
    entries: Vec<(String, MuscleEnergeticsParameter)>,
}

impl MuscleEnergeticsParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a muscle. Names must be unique.
    pub fn insert(
        &mut self,
        muscle: impl Into<String>,
        parameter: MuscleEnergeticsParameter,
    ) -> MetabolicsResult<()> {
        let muscle = muscle.into();
        if muscle.is_empty() {
            return Err(MetabolicsError::configuration("muscle name must not be empty"));
        }
        if self.contains(&muscle) {
            return Err(MetabolicsError::configuration(format!(
                "muscle '{muscle}' is already in the parameter set"
            )));
        }
        self.entries.push((muscle, parameter));
        Ok(())
    }

    pub fn remove(&mut self, muscle: &str) -> Option<MuscleEnergeticsParameter> {
        let index = self.position(muscle)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, muscle: &str) -> Option<&MuscleEnergeticsParameter> {
        self.position(muscle).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, muscle: &str) -> Option<&mut MuscleEnergeticsParameter> {
        let index = self.position(muscle)?;
        Some(&mut self.entries[index].1)
    }

    pub fn contains(&self, muscle: &str) -> bool {
        self.position(muscle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MuscleEnergeticsParameter)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn validate(&self) -> MetabolicsResult<()> {
        for (name, parameter) in self.iter() {
            parameter.validate().map_err(|e| match e {
                MetabolicsError::Configuration(msg) => {
                    MetabolicsError::configuration(format!("muscle '{name}': {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn position(&self, muscle: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == muscle)
    }
}

impl TryFrom<Vec<MuscleEntry>> for MuscleEnergeticsParameterSet {
    type Error = MetabolicsError;

    fn try_from(entries: Vec<MuscleEntry>) -> Result<Self, Self::Error> {
        let mut set = Self::new();
        for entry in entries {
            set.insert(entry.muscle, entry.parameter)?;
        }
        Ok(set)
    }
}

impl From<MuscleEnergeticsParameterSet> for Vec<MuscleEntry> {
    fn from(set: MuscleEnergeticsParameterSet) -> Self {
        set.entries
            .into_iter()
            .map(|(muscle, parameter)| MuscleEntry { muscle, parameter })
            .collect()
    }
}
