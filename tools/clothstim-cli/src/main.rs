//! Clothstim CLI: command-line front end for point-light cloth trials.
//!
//! Usage:
//!   clothstim run <TRAJECTORIES>       Run a trial and write telemetry
//!   clothstim validate <TRAJECTORIES>  Check trajectory data and a trial config
//!   clothstim sample <TRAJECTORIES>    Show which dots the grid sampler picks
//!   clothstim init <PATH>              Write a default trial config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "clothstim",
    about = "Point-light cloth stimulus presentation",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a trial
    Run {
        /// Trajectory file (CSV `dot,frame,x,y` or JSON)
        trajectories: PathBuf,

        /// Trial config (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Telemetry CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tick from a simulated display instead of the wall clock
        #[arg(long)]
        simulate: bool,

        /// Display refresh rate (Hz)
        #[arg(long)]
        refresh_hz: Option<f64>,

        /// Surface width in pixels
        #[arg(long)]
        width: Option<f64>,

        /// Surface height in pixels
        #[arg(long)]
        height: Option<f64>,

        /// Override the config's random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the JSON summary next to the CSV
        #[arg(long)]
        no_summary: bool,
    },

    /// Validate trajectory data and a trial config
    Validate {
        /// Trajectory file
        trajectories: PathBuf,

        /// Trial config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Preview grid sampling
    Sample {
        /// Trajectory file
        trajectories: PathBuf,

        /// Trial config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override grid columns
        #[arg(long)]
        grid_x: Option<u32>,

        /// Override grid rows
        #[arg(long)]
        grid_y: Option<u32>,

        /// Random seed for anchor jitter
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Write a default trial config
    Init {
        /// Output path
        #[arg(default_value = "trial.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = clothstim_common::config::AppConfig::load();

    // Initialize logging
    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    clothstim_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Run {
            trajectories,
            config,
            output,
            simulate,
            refresh_hz,
            width,
            height,
            seed,
            no_summary,
        } => {
            commands::run::run(
                &app_config,
                commands::run::RunArgs {
                    trajectories,
                    config,
                    output,
                    simulate,
                    refresh_hz,
                    width,
                    height,
                    seed,
                    summary: !no_summary,
                },
            )
            .await
        }
        Commands::Validate {
            trajectories,
            config,
        } => commands::validate::run(&app_config, trajectories, config),
        Commands::Sample {
            trajectories,
            config,
            grid_x,
            grid_y,
            seed,
        } => commands::sample::run(trajectories, config, grid_x, grid_y, seed),
        Commands::Init { path, force } => commands::init::run(path, force),
    }
}
