//! Metabolic Rate Engine
//! Phenomenological heat and work decomposition of Bhargava et al. (2004)
//!
//!   Edot = Bdot + sum over muscles (Adot + Mdot + Sdot + Wdot)
//!
//! Sign convention: positive fiber velocity is lengthening (eccentric),
//! negative is shortening (concentric).

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::curve::PiecewiseLinearFunction;
use crate::error::{MetabolicsError, MetabolicsResult};
use crate::parameters::MuscleEnergeticsParameter;

/// Floor on the summed heat rate of one muscle (W/kg), Umberger (2003) p. 104
pub const MINIMUM_HEAT_RATE_W_PER_KG: f64 = 1.0;

pub const DEFAULT_BASAL_COEFFICIENT: f64 = 1.2;
pub const DEFAULT_BASAL_EXPONENT: f64 = 1.0;

/// Shortening proportionality constants
const ALPHA_ISOMETRIC_FORCE_DEPENDENT: f64 = 0.16;
const ALPHA_ACTIVE_FORCE_DEPENDENT: f64 = 0.18;
const ALPHA_SHORTENING_FORCE_DEPENDENT: f64 = 0.157;
const ALPHA_CONSTANT: f64 = 0.25;

/// Per-muscle inputs supplied by the host at each evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MuscleState {
    /// Neural excitation u, in [0, 1]
    pub excitation: f64,
    /// Not used by the formulas; carried for reporting
    #[serde(default)]
    pub activation: f64,
    /// m/s, positive = lengthening
    pub fiber_velocity: f64,
    /// F_CE (N)
    pub active_fiber_force: f64,
    /// F_CE_iso (N), isometric force at current activation and length
    pub active_isometric_fiber_force: f64,
    /// F_PASSIVE (N)
    pub passive_fiber_force: f64,
    #[serde(default = "unit_length")]
    pub normalized_fiber_length: f64,
}

fn unit_length() -> f64 {
    1.0
}

impl MuscleState {
    fn check(&self) -> MetabolicsResult<()> {
        let fields = [
            ("excitation", self.excitation),
            ("fiber_velocity", self.fiber_velocity),
            ("active_fiber_force", self.active_fiber_force),
            ("active_isometric_fiber_force", self.active_isometric_fiber_force),
            ("passive_fiber_force", self.passive_fiber_force),
            ("normalized_fiber_length", self.normalized_fiber_length),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MetabolicsError::computation(format!(
                "{name} is not finite: {value}"
            )));
        }
        if !(0.0..=1.0).contains(&self.excitation) {
            return Err(MetabolicsError::computation(format!(
                "excitation must be within [0, 1], got {}",
                self.excitation
            )));
        }
        Ok(())
    }
}

/// Probe-level switches and constants shared by all muscles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolicRateConfig {
    pub activation_rate_on: bool,
    pub maintenance_rate_on: bool,
    pub shortening_rate_on: bool,
    pub basal_rate_on: bool,
    pub mechanical_work_rate_on: bool,
    /// Only honoured when activation, maintenance and shortening are all on.
    pub enforce_minimum_heat_rate_per_muscle: bool,
    pub use_force_dependent_shortening_prop_constant: bool,
    pub basal_coefficient: f64,
    pub basal_exponent: f64,
    pub normalized_fiber_length_dependence_on_maintenance_rate: PiecewiseLinearFunction,
}

impl Default for MetabolicRateConfig {
    fn default() -> Self {
        Self {
            activation_rate_on: true,
            maintenance_rate_on: true,
            shortening_rate_on: true,
            basal_rate_on: true,
            mechanical_work_rate_on: true,
            enforce_minimum_heat_rate_per_muscle: true,
            use_force_dependent_shortening_prop_constant: false,
            basal_coefficient: DEFAULT_BASAL_COEFFICIENT,
            basal_exponent: DEFAULT_BASAL_EXPONENT,
            normalized_fiber_length_dependence_on_maintenance_rate:
                PiecewiseLinearFunction::default_maintenance_curve(),
        }
    }
}

impl MetabolicRateConfig {
    pub fn validate(&self) -> MetabolicsResult<()> {
        if !self.basal_coefficient.is_finite() {
            return Err(MetabolicsError::configuration(format!(
                "basal_coefficient must be finite, got {}",
                self.basal_coefficient
            )));
        }
        if !self.basal_exponent.is_finite() {
            return Err(MetabolicsError::configuration(format!(
                "basal_exponent must be finite, got {}",
                self.basal_exponent
            )));
        }
        self.normalized_fiber_length_dependence_on_maintenance_rate
            .validate()
    }

    /// The heat floor is gated on all three heat terms being enabled.
    pub fn minimum_heat_rate_applies(&self) -> bool {
        self.enforce_minimum_heat_rate_per_muscle
            && self.activation_rate_on
            && self.maintenance_rate_on
            && self.shortening_rate_on
    }
}

/// Heat and work terms for one muscle (W). Disabled terms are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MuscleRateBreakdown {
    pub muscle_mass: f64,
    pub activation: f64,
    pub maintenance: f64,
    pub shortening: f64,
    pub mechanical_work: f64,
    /// Adot + Mdot + Sdot after the minimum heat floor
    pub total_heat: f64,
    pub heat_clamped: bool,
    /// total_heat + mechanical_work
    pub net: f64,
}

/// Whole-body totals for one evaluation (W).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetabolicRateTotals {
    pub basal: f64,
    pub activation: f64,
    pub maintenance: f64,
    pub shortening: f64,
    pub mechanical_work: f64,
    pub total: f64,
}

#[derive(Clone, Debug, Default)]
pub struct MetabolicRateEngine {
    config: MetabolicRateConfig,
}

impl MetabolicRateEngine {
    pub fn new(config: MetabolicRateConfig) -> MetabolicsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MetabolicRateConfig {
        &self.config
    }

    /// Weighted slow/fast twitch recruitment shared by the activation and
    /// maintenance terms: c_slow * r * sin(pi/2 u) + c_fast * (1 - r) * (1 - cos(pi/2 u))
    fn recruitment(r: f64, u: f64, slow: f64, fast: f64) -> f64 {
        let angle = FRAC_PI_2 * u;
        slow * r * angle.sin() + fast * (1.0 - r) * (1.0 - angle.cos())
    }

    pub fn activation_heat_rate(
        &self,
        state: &MuscleState,
        params: &MuscleEnergeticsParameter,
        mass: f64,
    ) -> f64 {
        if !self.config.activation_rate_on {
            return 0.0;
        }
        mass * Self::recruitment(
            params.ratio_slow_twitch_fibers,
            state.excitation,
            params.activation_constant_slow_twitch,
            params.activation_constant_fast_twitch,
        )
    }

    pub fn maintenance_heat_rate(
        &self,
        state: &MuscleState,
        params: &MuscleEnergeticsParameter,
        mass: f64,
    ) -> f64 {
        if !self.config.maintenance_rate_on {
            return 0.0;
        }
        // Extrapolation past a sloped end segment can dip below zero
        let length_dependence = self
            .config
            .normalized_fiber_length_dependence_on_maintenance_rate
            .evaluate(state.normalized_fiber_length)
            .max(0.0);
        mass * length_dependence
            * Self::recruitment(
                params.ratio_slow_twitch_fibers,
                state.excitation,
                params.maintenance_constant_slow_twitch,
                params.maintenance_constant_fast_twitch,
            )
    }

    /// Shortening proportionality constant alpha (N).
    pub fn shortening_prop_constant(&self, state: &MuscleState) -> f64 {
        let v = state.fiber_velocity;
        let f_ce = state.active_fiber_force;
        if self.config.use_force_dependent_shortening_prop_constant {
            if v >= 0.0 {
                ALPHA_ISOMETRIC_FORCE_DEPENDENT * state.active_isometric_fiber_force
                    + ALPHA_ACTIVE_FORCE_DEPENDENT * f_ce
            } else {
                ALPHA_SHORTENING_FORCE_DEPENDENT * f_ce
            }
        } else if v >= 0.0 {
            ALPHA_CONSTANT * (f_ce + state.passive_fiber_force)
        } else {
            0.0
        }
    }

    pub fn shortening_heat_rate(&self, state: &MuscleState) -> f64 {
        if !self.config.shortening_rate_on {
            return 0.0;
        }
        -self.shortening_prop_constant(state) * state.fiber_velocity
    }

    pub fn mechanical_work_rate(&self, state: &MuscleState) -> f64 {
        if !self.config.mechanical_work_rate_on || state.fiber_velocity < 0.0 {
            return 0.0;
        }
        -state.active_fiber_force * state.fiber_velocity
    }

    /// Heat and work rates for one muscle. Fails if the muscle mass was
    /// never resolved or any input is non-finite.
    pub fn compute_muscle_rate(
        &self,
        state: &MuscleState,
        params: &MuscleEnergeticsParameter,
    ) -> MetabolicsResult<MuscleRateBreakdown> {
        let mass = params.resolved_mass()?;
        state.check()?;

        let activation = self.activation_heat_rate(state, params, mass);
        let maintenance = self.maintenance_heat_rate(state, params, mass);
        let shortening = self.shortening_heat_rate(state);
        let mechanical_work = self.mechanical_work_rate(state);

        let mut total_heat = activation + maintenance + shortening;
        let mut heat_clamped = false;
        if self.config.minimum_heat_rate_applies()
            && total_heat / mass < MINIMUM_HEAT_RATE_W_PER_KG
        {
            log::trace!(
                "heat rate {:.4} W below floor for {:.4} kg muscle, clamping",
                total_heat,
                mass
            );
            total_heat = MINIMUM_HEAT_RATE_W_PER_KG * mass;
            heat_clamped = true;
        }

        let net = total_heat + mechanical_work;
        if !net.is_finite() {
            return Err(MetabolicsError::computation(format!(
                "muscle metabolic rate is not finite: {net}"
            )));
        }

        Ok(MuscleRateBreakdown {
            muscle_mass: mass,
            activation,
            maintenance,
            shortening,
            mechanical_work,
            total_heat,
            heat_clamped,
            net,
        })
    }

    /// Whole-body basal rate: basal_coefficient * body_mass^basal_exponent.
    pub fn basal_rate(&self, body_mass: f64) -> MetabolicsResult<f64> {
        if !self.config.basal_rate_on {
            return Ok(0.0);
        }
        if !body_mass.is_finite() || body_mass < 0.0 {
            return Err(MetabolicsError::computation(format!(
                "total body mass is invalid: {body_mass}"
            )));
        }
        let basal = self.config.basal_coefficient * body_mass.powf(self.config.basal_exponent);
        if !basal.is_finite() {
            return Err(MetabolicsError::computation(format!(
                "basal rate is not finite: {basal}"
            )));
        }
        Ok(basal)
    }

    /// Sum per-muscle breakdowns (in the order given) and add the basal term once.
    pub fn aggregate<'a, I>(
        &self,
        body_mass: f64,
        breakdowns: I,
    ) -> MetabolicsResult<MetabolicRateTotals>
    where
        I: IntoIterator<Item = &'a MuscleRateBreakdown>,
    {
        let basal = self.basal_rate(body_mass)?;
        let mut totals = MetabolicRateTotals {
            basal,
            total: basal,
            ..Default::default()
        };
        for b in breakdowns {
            totals.activation += b.activation;
            totals.maintenance += b.maintenance;
            totals.shortening += b.shortening;
            totals.mechanical_work += b.mechanical_work;
            totals.total += b.net;
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn unit_mass_params(r: f64) -> MuscleEnergeticsParameter {
        let mut p = MuscleEnergeticsParameter::with_provided_mass(r, 1.0);
        p.resolve_mass(0.0, 0.0).unwrap();
        p
    }

    fn engine_with(config: MetabolicRateConfig) -> MetabolicRateEngine {
        MetabolicRateEngine::new(config).unwrap()
    }

    fn heat_only_config() -> MetabolicRateConfig {
        MetabolicRateConfig {
            enforce_minimum_heat_rate_per_muscle: false,
            ..Default::default()
        }
    }

    fn state(u: f64, v: f64) -> MuscleState {
        MuscleState {
            excitation: u,
            activation: u,
            fiber_velocity: v,
            active_fiber_force: 100.0,
            active_isometric_fiber_force: 120.0,
            passive_fiber_force: 10.0,
            normalized_fiber_length: 1.0,
        }
    }

    #[test]
    fn test_zero_excitation_gives_zero_activation_and_maintenance() {
        let engine = engine_with(heat_only_config());
        for r in [0.0, 0.3, 0.5, 1.0] {
            let p = unit_mass_params(r);
            let b = engine.compute_muscle_rate(&state(0.0, 0.0), &p).unwrap();
            assert_eq!(b.activation, 0.0);
            assert_eq!(b.maintenance, 0.0);
        }
    }

    #[test]
    fn test_activation_and_maintenance_monotonic_in_excitation() {
        let engine = engine_with(heat_only_config());
        for r in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let p = unit_mass_params(r);
            let mut prev = (0.0, 0.0);
            for step in 0..=20 {
                let u = step as f64 / 20.0;
                let b = engine.compute_muscle_rate(&state(u, 0.0), &p).unwrap();
                assert!(b.activation >= 0.0 && b.maintenance >= 0.0);
                assert!(b.activation >= prev.0 && b.maintenance >= prev.1);
                prev = (b.activation, b.maintenance);
            }
        }
    }

    #[test]
    fn test_full_excitation_pure_fiber_types() {
        let engine = engine_with(heat_only_config());
        // All slow twitch: sin(pi/2) = 1
        let b = engine
            .compute_muscle_rate(&state(1.0, 0.0), &unit_mass_params(1.0))
            .unwrap();
        assert_abs_diff_eq!(b.activation, 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.maintenance, 74.0, epsilon = 1e-12);

        // All fast twitch: 1 - cos(pi/2) = 1
        let b = engine
            .compute_muscle_rate(&state(1.0, 0.0), &unit_mass_params(0.0))
            .unwrap();
        assert_abs_diff_eq!(b.activation, 133.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.maintenance, 111.0, epsilon = 1e-12);
    }

    #[test]
    fn test_maintenance_uses_length_curve() {
        let engine = engine_with(heat_only_config());
        let p = unit_mass_params(1.0);
        let mut s = state(1.0, 0.0);
        s.normalized_fiber_length = 1.5;
        let b = engine.compute_muscle_rate(&s, &p).unwrap();
        assert_abs_diff_eq!(b.maintenance, 0.5 * 74.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sloped_length_curve_never_gives_negative_maintenance() {
        let curve =
            PiecewiseLinearFunction::from_points(&[(0.5, 0.0), (1.0, 1.0), (1.5, 0.0)]).unwrap();
        let engine = engine_with(MetabolicRateConfig {
            normalized_fiber_length_dependence_on_maintenance_rate: curve,
            ..heat_only_config()
        });
        for r in [0.0, 0.5, 1.0] {
            let p = unit_mass_params(r);
            for l in [0.2, 1.8, 3.0] {
                let mut s = state(1.0, 0.0);
                s.normalized_fiber_length = l;
                let b = engine.compute_muscle_rate(&s, &p).unwrap();
                assert_eq!(b.maintenance, 0.0);
            }
        }
    }

    #[test]
    fn test_mechanical_work_sign() {
        let engine = engine_with(heat_only_config());
        let p = unit_mass_params(0.5);

        let b = engine.compute_muscle_rate(&state(0.5, -0.2), &p).unwrap();
        assert_eq!(b.mechanical_work, 0.0);

        let b = engine.compute_muscle_rate(&state(0.5, 0.2), &p).unwrap();
        assert_abs_diff_eq!(b.mechanical_work, -100.0 * 0.2, epsilon = 1e-12);
        assert!(b.mechanical_work <= 0.0);
    }

    #[test]
    fn test_constant_alpha_shortening() {
        let engine = engine_with(heat_only_config());
        let p = unit_mass_params(0.5);

        // v < 0 gives alpha = 0
        let b = engine.compute_muscle_rate(&state(0.5, -0.3), &p).unwrap();
        assert_eq!(b.shortening, 0.0);

        // v >= 0: alpha = 0.25 * (F_CE + F_PASSIVE) = 27.5
        let b = engine.compute_muscle_rate(&state(0.5, 0.1), &p).unwrap();
        assert_abs_diff_eq!(b.shortening, -27.5 * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_force_dependent_alpha() {
        let engine = engine_with(MetabolicRateConfig {
            use_force_dependent_shortening_prop_constant: true,
            ..heat_only_config()
        });
        let lengthening = state(0.5, 0.1);
        assert_abs_diff_eq!(
            engine.shortening_prop_constant(&lengthening),
            0.16 * 120.0 + 0.18 * 100.0,
            epsilon = 1e-12
        );

        let shortening = state(0.5, -0.1);
        assert_abs_diff_eq!(
            engine.shortening_prop_constant(&shortening),
            0.157 * 100.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            engine.shortening_heat_rate(&shortening),
            0.157 * 100.0 * 0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_disabled_terms_are_zero() {
        let engine = engine_with(MetabolicRateConfig {
            activation_rate_on: false,
            maintenance_rate_on: false,
            shortening_rate_on: false,
            mechanical_work_rate_on: false,
            ..Default::default()
        });
        let b = engine
            .compute_muscle_rate(&state(0.8, 0.2), &unit_mass_params(0.5))
            .unwrap();
        assert_eq!(b.activation, 0.0);
        assert_eq!(b.maintenance, 0.0);
        assert_eq!(b.shortening, 0.0);
        assert_eq!(b.mechanical_work, 0.0);
        // Floor is gated off because the heat terms are disabled
        assert!(!b.heat_clamped);
        assert_eq!(b.net, 0.0);
    }

    /// Scale the slow twitch constants so that Adot + Mdot = 0.3 W at u = 1, r = 1.
    fn low_heat_params() -> MuscleEnergeticsParameter {
        let mut p = MuscleEnergeticsParameter::with_provided_mass(1.0, 1.0);
        p.activation_constant_slow_twitch = 0.1;
        p.maintenance_constant_slow_twitch = 0.2;
        p.resolve_mass(0.0, 0.0).unwrap();
        p
    }

    #[test]
    fn test_minimum_heat_rate_clamp() {
        let engine = engine_with(MetabolicRateConfig::default());
        let s = MuscleState {
            excitation: 1.0,
            normalized_fiber_length: 1.0,
            ..Default::default()
        };
        let b = engine.compute_muscle_rate(&s, &low_heat_params()).unwrap();
        assert_abs_diff_eq!(b.activation + b.maintenance + b.shortening, 0.3, epsilon = 1e-12);
        assert!(b.heat_clamped);
        assert_abs_diff_eq!(b.total_heat, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.net, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp_does_not_touch_work() {
        let engine = engine_with(MetabolicRateConfig::default());
        let s = MuscleState {
            excitation: 1.0,
            fiber_velocity: 0.01,
            active_fiber_force: 10.0,
            normalized_fiber_length: 1.0,
            ..Default::default()
        };
        let b = engine.compute_muscle_rate(&s, &low_heat_params()).unwrap();
        assert!(b.heat_clamped);
        assert_abs_diff_eq!(b.total_heat, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.net, 1.0 - 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp_requires_all_three_heat_terms() {
        // Shortening off: the floor is not applied even though heat is below 1 W/kg.
        // This gating is deliberate and easy to trip over.
        let engine = engine_with(MetabolicRateConfig {
            shortening_rate_on: false,
            ..Default::default()
        });
        let s = MuscleState {
            excitation: 1.0,
            normalized_fiber_length: 1.0,
            ..Default::default()
        };
        let b = engine.compute_muscle_rate(&s, &low_heat_params()).unwrap();
        assert!(!b.heat_clamped);
        assert_abs_diff_eq!(b.total_heat, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_unresolved_mass_is_an_error() {
        let engine = MetabolicRateEngine::default();
        let p = MuscleEnergeticsParameter::default();
        let err = engine.compute_muscle_rate(&state(0.5, 0.0), &p).unwrap_err();
        assert!(matches!(err, MetabolicsError::Computation(_)));
    }

    #[test]
    fn test_non_finite_state_is_an_error() {
        let engine = MetabolicRateEngine::default();
        let p = unit_mass_params(0.5);
        let mut s = state(0.5, 0.0);
        s.active_fiber_force = f64::NAN;
        assert!(engine.compute_muscle_rate(&s, &p).is_err());

        let s = state(1.5, 0.0);
        assert!(engine.compute_muscle_rate(&s, &p).is_err());
    }

    #[test]
    fn test_basal_rate() {
        let engine = MetabolicRateEngine::default();
        assert_relative_eq!(engine.basal_rate(70.0).unwrap(), 84.0, max_relative = 1e-12);

        let engine = engine_with(MetabolicRateConfig {
            basal_rate_on: false,
            ..Default::default()
        });
        assert_eq!(engine.basal_rate(70.0).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_body_mass_is_an_error() {
        let engine = MetabolicRateEngine::default();
        for body_mass in [f64::NAN, f64::INFINITY, -1.0] {
            assert!(matches!(
                engine.basal_rate(body_mass),
                Err(MetabolicsError::Computation(_))
            ));
        }
    }

    #[test]
    fn test_aggregate_adds_basal_once() {
        let engine = MetabolicRateEngine::default();
        let b = MuscleRateBreakdown {
            activation: 1.0,
            maintenance: 2.0,
            shortening: 3.0,
            total_heat: 6.0,
            net: 6.0,
            ..Default::default()
        };
        let totals = engine.aggregate(70.0, &[b, b, b]).unwrap();
        assert_relative_eq!(totals.basal, 84.0, max_relative = 1e-12);
        assert_relative_eq!(totals.total, 84.0 + 18.0, max_relative = 1e-12);
        assert_abs_diff_eq!(totals.activation, 3.0);

        let empty: [MuscleRateBreakdown; 0] = [];
        let totals = engine.aggregate(70.0, &empty).unwrap();
        assert_relative_eq!(totals.total, 84.0, max_relative = 1e-12);
    }

    #[test]
    fn test_config_validation() {
        let config = MetabolicRateConfig {
            basal_exponent: f64::NAN,
            ..Default::default()
        };
        assert!(MetabolicRateEngine::new(config).is_err());

        let config = MetabolicRateConfig {
            basal_coefficient: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            MetabolicRateEngine::new(config),
            Err(MetabolicsError::Configuration(_))
        ));
    }
}
