//! Muscle metabolic power (Bhargava et al., 2004)
//!
//! Per-step metabolic energy rate of a set of muscles from the excitation,
//! fiber velocity and fiber forces computed by a host musculoskeletal
//! simulation.

pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod integrator;
pub mod parameters;
pub mod probe;
pub mod snapshot;

pub use curve::PiecewiseLinearFunction;
pub use engine::{
    MetabolicRateConfig, MetabolicRateEngine, MetabolicRateTotals, MuscleRateBreakdown,
    MuscleState,
};
pub use error::{MetabolicsError, MetabolicsResult};
pub use integrator::EnergyIntegrator;
pub use parameters::{MuscleEnergeticsParameter, MuscleEnergeticsParameterSet};
pub use probe::{BoundMetabolicProbe, MetabolicProbe, MuscleModel, MuscleProperties, ReportMode};
pub use snapshot::{SnapshotModel, Trajectory, TrajectoryFrame};
