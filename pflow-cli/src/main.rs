//! Driver binary for the particle-flow cluster-refinement pipeline.
//!
//! A thin exerciser of `pflow_core`: `main.rs` parses a
//! [`clap::Parser`] and dispatches to a subcommand, with errors
//! reported via [`anyhow`]. It loads a pipeline configuration, an
//! event, and an optional photon-PDF file, runs the configured
//! operator sequence, and prints a summary table of the resulting
//! cluster list.

mod config;
mod event;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::PipelineConfig;
use event::EventFile;
use pflow_core::hit_properties;
use pflow_core::photon::pdf::PdfStore;
use pflow_core::pipeline::OperatorContext;
use pflow_core::plugins::PluginRegistry;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pflow", about = "Particle-flow cluster-refinement driver", version)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured operator sequence over one event and print the
    /// resulting cluster summary.
    Run {
        /// Pipeline configuration YAML (operator sequence, settings,
        /// geometry, hit-properties config).
        #[arg(long)]
        config: PathBuf,
        /// Event YAML (hits, tracks, preliminary clusters).
        #[arg(long)]
        event: PathBuf,
        /// Photon-reconstruction PDF file.
        /// Required only if the configured sequence includes a
        /// `PhotonReconstruction` entry; an untrained default is used if
        /// omitted.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Validate a pipeline configuration file without running it.
    Validate {
        /// Pipeline configuration YAML.
        #[arg(long)]
        config: PathBuf,
    },
}

fn load_yaml<T: for<'de> serde::Deserialize<'de>>(path: &PathBuf) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_yaml::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse {}", path.display()))
}

fn run(config_path: &PathBuf, event_path: &PathBuf, pdf_path: Option<&PathBuf>) -> Result<()> {
    let config: PipelineConfig = load_yaml(config_path)?;
    let event: EventFile = load_yaml(event_path)?;

    let pdf = pdf_path
        .map(|path| -> Result<PdfStore> {
            let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            PdfStore::read(&mut BufReader::new(file)).with_context(|| format!("failed to parse {}", path.display()))
        })
        .transpose()?;

    let mut manager = event.into_manager().context("failed to build the initial cluster population")?;
    hit_properties::compute_all(manager.hits_mut(), &config.geometry, &config.hit_properties);
    manager.recompute_all_derived();

    let pipeline = config.build_pipeline(pdf).context("failed to build pipeline from configuration")?;
    let plugins = PluginRegistry::with_reference_plugins();
    let mut ctx = OperatorContext { manager: &mut manager, geometry: &config.geometry, plugins: &plugins, settings: &config.settings };

    pipeline.run_event(&mut ctx);

    print_summary(&manager);
    Ok(())
}

fn print_summary(manager: &pflow_core::manager::ClusterManager) {
    println!("{:>10}  {:>10}  {:>8}  {:>6}  {:>6}  {:>7}", "cluster", "energy", "n_hits", "inner", "outer", "tracks");
    for id in manager.current_list() {
        let Ok(cluster) = manager.cluster(id) else { continue };
        let energy = cluster.energy(manager.hits().as_slice());
        let n_hits = cluster.all_hit_ids().count();
        println!(
            "{:>10}  {:>10.3}  {:>8}  {:>6}  {:>6}  {:>7}{}",
            id.to_string(),
            energy,
            n_hits,
            cluster.inner_pseudo_layer(),
            cluster.outer_pseudo_layer(),
            cluster.tracks().len(),
            if cluster.is_fixed_photon() { "  [photon]" } else { "" },
        );
    }
}

fn validate(config_path: &PathBuf) -> Result<()> {
    let config: PipelineConfig = load_yaml(config_path)?;
    // Building a pipeline with no PDF exercises every operator's config
    // parse path; a configured `PhotonReconstruction` entry will build
    // fine against the untrained default store.
    config.build_pipeline(None).context("configuration did not build a valid pipeline")?;
    println!("{} operator(s) configured, OK", config.operators.len());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    match &opts.command {
        Command::Run { config, event, pdf } => run(config, event, pdf.as_ref()),
        Command::Validate { config } => validate(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        Opts::command().debug_assert();
    }
}
