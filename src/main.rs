// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use trackfill::config::SourceKind;
use trackfill::stages::TrackerKind;
use trackfill::Region;

mod cli;

#[derive(Parser)]
#[command(name = "trackfill")]
#[command(about = "Track an object in a camera feed and inpaint it away")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags layered on top of the config file
#[derive(clap::Args, Default)]
pub struct RunArgs {
    /// Config file (default: <config dir>/trackfill/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Frame source
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// V4L2 device path
    #[arg(short, long)]
    pub device: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Synthetic source frame rate (0 = as fast as possible)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Tracking algorithm
    #[arg(long, value_enum)]
    pub tracker: Option<TrackerKind>,

    /// Initial region as x,y,width,height (skips interactive selection)
    #[arg(short, long)]
    pub region: Option<Region>,

    /// Run without the terminal UI; stop with Ctrl+C
    #[arg(long)]
    pub headless: bool,

    /// Inpainting command with {input} and {output} placeholders
    #[arg(long)]
    pub inpaint_command: Option<String>,

    /// Directory for inpainting temp files
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Directory for snapshots taken with 'p'
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking pipeline (default)
    Run(RunArgs),

    /// List available V4L2 cameras
    List,

    /// Inpaint a single image file with the configured tool
    Inpaint {
        /// Image with the area to fill painted in the mask colour
        input: PathBuf,

        /// Output file path (default: <input>_inpainted.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));

    // The terminal UI owns stdout, so log to a file while it is up
    let tui = matches!(&command, Commands::Run(args) if !args.headless);
    init_logging(tui, cli.verbose);

    let result = match command {
        Commands::Run(args) => cli::run_pipeline(args),
        Commands::List => cli::list_cameras(),
        Commands::Inpaint {
            input,
            output,
            config,
        } => cli::inpaint_file(&input, output, config.as_deref()),
        Commands::Config { config } => cli::print_config(config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Set RUST_LOG to control the log level, e.g. RUST_LOG=trackfill=debug
fn init_logging(to_file: bool, verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if verbose { "info" } else { "warn" })
        });

    if to_file {
        let path = cli::log_file_path();
        if let Some(file) = path
            .parent()
            .and_then(|dir| std::fs::create_dir_all(dir).ok())
            .and_then(|()| std::fs::File::create(&path).ok())
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .init();
        }
        // Without a log file, stay silent rather than draw over the UI
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
