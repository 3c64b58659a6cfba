use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use muscle_metabolics_rs::config::{load_probe_config, load_trajectory};
use muscle_metabolics_rs::{EnergyIntegrator, MetabolicProbe, MuscleModel, ReportMode};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "metabolics_replay")]
#[command(about = "Replay a recorded muscle trajectory through the Bhargava (2004) metabolic probe", long_about = None)]
struct Args {
    /// Probe configuration (JSON, optionally .gz). Defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded trajectory (JSON, optionally .gz)
    #[arg(long)]
    trajectory: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report basal, activation, maintenance, shortening and work channels
    #[arg(long, default_value_t = false)]
    decomposed: bool,

    /// Also report cumulative metabolic energy (J)
    #[arg(long, default_value_t = false)]
    integrate: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut probe = match args.config.as_ref() {
        Some(path) => load_probe_config(path)?,
        None => MetabolicProbe::default(),
    };
    if args.decomposed {
        probe.report_mode = ReportMode::Decomposed;
    }

    let trajectory = load_trajectory(&args.trajectory)?;
    if trajectory.frames.is_empty() {
        anyhow::bail!("Trajectory {} has no frames", args.trajectory.display());
    }

    let model = trajectory.model();
    let bound = probe.bind(&model)?;
    let labels = bound.output_labels();
    let mut integrator = EnergyIntegrator::new(bound.num_output_channels());

    let mut frames = Vec::with_capacity(trajectory.frames.len());
    let mut peak_total = f64::NEG_INFINITY;
    let mut clamped_samples = 0u64;

    for frame in &trajectory.frames {
        let breakdowns = bound.muscle_breakdowns(frame)?;
        let totals = bound
            .engine()
            .aggregate(model.total_mass(frame), breakdowns.iter().map(|(_, b)| b))?;
        let values = bound.channel_values(&totals);
        clamped_samples += breakdowns.iter().filter(|(_, b)| b.heat_clamped).count() as u64;
        peak_total = peak_total.max(values[0]);

        let mut entry = json!({
            "time": frame.time,
            "values": values,
        });
        if args.integrate {
            let energy = integrator.update(frame.time, &values)?;
            entry["energy"] = json!(energy);
        }
        frames.push(entry);
    }

    let masses: serde_json::Map<String, serde_json::Value> = bound
        .muscle_names()
        .filter_map(|name| bound.muscle_mass(name).map(|m| (name.to_string(), json!(m))))
        .collect();

    let first_time = trajectory.frames.first().map(|f| f.time).unwrap_or(0.0);
    let last_time = trajectory.frames.last().map(|f| f.time).unwrap_or(0.0);

    let mut report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "probe": bound.probe_name(),
        "trajectory": args.trajectory.display().to_string(),
        "labels": labels,
        "muscle_masses_kg": masses,
        "frame_count": frames.len(),
        "duration_s": last_time - first_time,
        "peak_total_w": peak_total,
        "heat_floor_samples": clamped_samples,
        "frames": frames,
    });
    if args.integrate {
        let energy = integrator.accumulated();
        report["total_energy_j"] = json!(energy);
        let duration = last_time - first_time;
        if duration > 0.0 {
            report["mean_power_w"] = json!(energy.iter().map(|e| e / duration).collect::<Vec<_>>());
        }
    }

    let rendered = serde_json::to_string_pretty(&report)?;
    match args.output.as_ref() {
        Some(path) => {
            fs::write(path, rendered)?;
            log::info!("Wrote metabolics report to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
