use super::results_ser::TrainingResultsSer;
use crate::args::Args;
use chrono::{DateTime, Utc};
use log::info;
use mlnn::BackpropagationNetwork;
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::{Path, PathBuf};

/// Saves the trained network's archive next to a JSON summary of the
/// run (loss, accuracy, elapsed time, predictions).
///
/// # Arguments
///
/// * `args` - Command line arguments
/// * `network` - Trained network whose layer state gets archived
/// * `results` - Run summary to serialize alongside the network
pub fn save_to_dir(args: Args, network: &BackpropagationNetwork, results: TrainingResultsSer) -> Result<(), String> {
    let results_path: PathBuf = if let Some(output_path) = args.output {
        PathBuf::from(output_path)
    } else {
        let now: DateTime<Utc> = Utc::now();
        PathBuf::from(format!("output/{}.json", now.format("%d%m%y%H%M%S")))
    };

    if let Some(parent_dir) = results_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|err| err.to_string())?;
    }

    let network_path = results_path.with_extension("network.json");
    network.network.save(network_path.to_str().unwrap()).map_err(|e| e.to_string())?;

    save_results(results, &results_path)
}

/// Writes the run summary to `filepath` as pretty-printed JSON.
fn save_results(results: TrainingResultsSer, filepath: &Path) -> Result<(), String> {
    info!("Writing results to {:#?}...", filepath);

    let mut file = File::create(filepath).map_err(|error| format!("Failed to create file {filepath:#?}: {error}"))?;

    let results_json = serde_json::to_string_pretty(&results).map_err(|e| e.to_string())?;
    file.write_all(results_json.as_bytes()).map_err(|error| error.to_string())?;
    info!("Results written successfully.");
    Ok(())
}
