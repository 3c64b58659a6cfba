use crate::error::{MetabolicsError, MetabolicsResult};

/// Trapezoidal time integral of probe channels
/// Turns metabolic power (W) into cumulative metabolic energy (J)
pub struct EnergyIntegrator {
    last_sample: Option<(f64, Vec<f64>)>,
    accumulated: Vec<f64>,
}

impl EnergyIntegrator {
    pub fn new(channels: usize) -> Self {
        EnergyIntegrator {
            last_sample: None,
            accumulated: vec![0.0; channels],
        }
    }

    /// Add a sample and return the running integral per channel.
    /// The first sample only anchors the start time.
    pub fn update(&mut self, time: f64, values: &[f64]) -> MetabolicsResult<&[f64]> {
        if values.len() != self.accumulated.len() {
            return Err(MetabolicsError::computation(format!(
                "integrator expects {} channels, got {}",
                self.accumulated.len(),
                values.len()
            )));
        }
        if !time.is_finite() {
            return Err(MetabolicsError::computation(format!(
                "sample time is not finite: {time}"
            )));
        }

        if let Some((last_time, last_values)) = &self.last_sample {
            let dt = time - last_time;
            if dt < 0.0 {
                return Err(MetabolicsError::computation(format!(
                    "sample time went backwards: {last_time} -> {time}"
                )));
            }
            for ((acc, prev), curr) in self
                .accumulated
                .iter_mut()
                .zip(last_values.iter())
                .zip(values.iter())
            {
                *acc += 0.5 * (prev + curr) * dt;
            }
        }

        self.last_sample = Some((time, values.to_vec()));
        Ok(&self.accumulated)
    }

    pub fn accumulated(&self) -> &[f64] {
        &self.accumulated
    }

    pub fn reset(&mut self) {
        self.last_sample = None;
        self.accumulated.iter_mut().for_each(|a| *a = 0.0);
    }
}
