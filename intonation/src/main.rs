use clap::CommandFactory;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use intonation::generator;
use intonation::generator::GenerateOptions;
use intonation::generator::cpstun::SCORE_SKELETON;
use log::LevelFilter;
use std::{env, process};

/// Generate microtonal tuning systems as Csound cpstun tables, TUN files, and comparison reports.
///
/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
/// If RUST_LOG is not set, the log level defaults to Info.
/// Set RUST_LOG=intonation_common=debug to see generator details.
#[derive(Parser)]
#[command(version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Generate a tuning system, append it to OUTPUT.csd as a cpstun table, and write reports
    Generate(GenerateOptions),
    /// Write an empty Csound document to standard output
    ScoreSkeleton,
    /// Generate shell completion
    Completion {
        /// shell
        shell: Shell,
    },
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Info);
    }
    log_builder.init();

    match cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            intonation_common::cli_completions(shell, &mut cmd);
            Ok(())
        }
        Commands::ScoreSkeleton => {
            print!("{SCORE_SKELETON}");
            Ok(())
        }
        Commands::Generate(options) => generator::run(options),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(2);
    }
}
