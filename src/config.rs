//! JSON persistence for probe configuration and recorded trajectories.
//! Files ending in `.gz` are decompressed transparently.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;

use crate::error::MetabolicsResult;
use crate::probe::MetabolicProbe;
use crate::snapshot::Trajectory;

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> MetabolicsResult<T> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(serde_json::from_reader(BufReader::new(reader))?)
}

/// Load and validate a probe configuration. Omitted fields take their defaults.
pub fn load_probe_config(path: &Path) -> MetabolicsResult<MetabolicProbe> {
    let probe: MetabolicProbe = read_json(path)?;
    probe.validate()?;
    log::info!(
        "Loaded probe '{}' with {} muscles from {}",
        probe.probe_name,
        probe.metabolic_parameters.len(),
        path.display()
    );
    Ok(probe)
}

pub fn save_probe_config(path: &Path, probe: &MetabolicProbe) -> MetabolicsResult<()> {
    let json = serde_json::to_string_pretty(probe)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_trajectory(path: &Path) -> MetabolicsResult<Trajectory> {
    let trajectory: Trajectory = read_json(path)?;
    trajectory.validate()?;
    log::info!(
        "Loaded trajectory with {} muscles and {} frames from {}",
        trajectory.muscles.len(),
        trajectory.frames.len(),
        path.display()
    );
    Ok(trajectory)
}
