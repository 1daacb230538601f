use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labforge_core::{
    analysis,
    persistence::{self, ExperimentStore, FileStore, HttpExperimentStore},
    resolver::{remote, ReactionResolver},
    simulation::builder::LabBuilder,
};
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod plotting;
mod workflow;

/// Virtual chemistry bench: scripted pours, reactions and safety checks.
#[derive(Parser)]
#[command(name = "labforge", version, about)]
struct Cli {
    /// Directory holding `substances/`, `reactions/` and `safety/` YAML files.
    #[arg(long, default_value = "./data/knowledge_base")]
    knowledge_base: String,

    /// Directory the bench state is saved to between runs.
    #[arg(long, default_value = "./data/state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs a lab script against the saved bench.
    Run {
        script: PathBuf,
        /// Optional bench configuration overrides (YAML).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Inference settings (YAML); the LABFORGE_INFERENCE_* variables otherwise.
        #[arg(long)]
        inference: Option<PathBuf>,
        /// User the experiment summaries are filed under.
        #[arg(long)]
        user: Option<String>,
        /// Base URL of the experiments backend.
        #[arg(long)]
        experiment_store: Option<String>,
        /// Starts from an empty bench instead of the saved one.
        #[arg(long)]
        fresh: bool,
        #[arg(long)]
        no_plots: bool,
    },
    /// Prints the saved bench.
    Show,
    /// Deletes the saved bench.
    Reset,
}

fn main() -> Result<()> {
    println!("--- Labforge Virtual Lab ---");
    let cli = Cli::parse();
    let mut store = FileStore::new(&cli.state_dir);

    match cli.command {
        Command::Run {
            script,
            config: config_path,
            inference,
            user,
            experiment_store,
            fresh,
            no_plots,
        } => {
            let kb = config::KnowledgeBase::load(&cli.knowledge_base)?;
            let lab_config = config::load_lab_config(config_path.as_deref())?;
            let script_file = workflow::load_script(&script)?;

            let output_dir = format!(
                "./data/runs/{}_{}",
                script_file.name.as_deref().unwrap_or("lab"),
                chrono::Utc::now().format("%Y%m%d_%H%M%S")
            );
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create output directory: {}", output_dir))?;
            fs::create_dir_all(&cli.state_dir)
                .with_context(|| format!("Failed to create state directory: {:?}", cli.state_dir))?;

            // Copy the script to the output directory for traceability
            fs::copy(&script, Path::new(&output_dir).join("script.yaml"))?;
            let log_path = Path::new(&output_dir).join("lab_timeseries.csv");
            let log_path = log_path.to_string_lossy().to_string();

            let mut builder = LabBuilder::new()
                .with_config(lab_config.clone())
                .with_substances(kb.substance_list())
                .with_safety_rules(kb.safety.clone())
                .with_timeseries_logging_to_file(&log_path);
            if let Some(user) = config::user_id(user) {
                builder = builder.with_user(user);
            }
            let mut engine = builder.build()?;
            if !fresh {
                engine.restore(persistence::load_snapshot(&store));
            }

            let inference_config = config::load_inference_config(inference.as_deref())?;
            if inference_config.is_none() {
                println!("[Resolver] No inference backend configured; using the local reaction table.");
            }
            let client = remote::client_from_config(inference_config.as_ref())
                .context("Failed to set up the inference client")?;
            let resolver = ReactionResolver::new(client, kb.reaction_table());

            let timeout_ms = inference_config
                .as_ref()
                .map_or(remote::DEFAULT_INFERENCE_TIMEOUT_MS, |c| c.timeout_ms);
            let experiments = match config::experiment_store_url(experiment_store) {
                Some(url) => Some(
                    HttpExperimentStore::new(&url, timeout_ms)
                        .context("Failed to set up the experiment store")?,
                ),
                None => None,
            };

            let outcome = workflow::run_script(
                &script_file,
                &mut engine,
                &resolver,
                &mut store,
                experiments.as_ref().map(|s| s as &dyn ExperimentStore),
            )?;

            let usage = analysis::usage_from_log(&log_path).ok();
            workflow::print_bench(&engine);
            workflow::print_summary_report(&engine, &outcome, usage.as_ref());

            if !no_plots {
                plotting::generate_all_plots(&output_dir, &log_path)?;
            }
            println!("\nLab run complete. Results are in '{}'", output_dir);
        }
        Command::Show => {
            let mut engine = LabBuilder::new().build()?;
            engine.restore(persistence::load_snapshot(&store));
            workflow::print_bench(&engine);
            println!(
                "Reactions: {} | Alerts: {} | Score: {}",
                engine.reactions().len(),
                engine.alerts().len(),
                engine.score()
            );
        }
        Command::Reset => {
            persistence::clear_snapshot(&mut store)?;
            println!("Saved bench cleared from {:?}.", persistence::snapshot_path(&cli.state_dir));
        }
    }

    Ok(())
}
