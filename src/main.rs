use std::path::PathBuf;

use anyhow::{Context, Result};
use arm64x_rs::{CloneConfiguration, CloneRequest, ProjectFilter, clone_configuration, fixup_project};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// arm64x - Add ARM64EC/ARM64X support to CMake-generated Visual Studio builds
#[derive(Parser)]
#[command(name = "arm64x")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add ARM64EC configurations to a .vcxproj so it builds as ARM64X
    #[command(alias = "cmake-vcxproj-setup-arm64x")]
    FixupProject {
        /// Path to the .vcxproj file
        path: PathBuf,
    },

    /// Clone a platform's configuration mappings inside a .sln
    #[command(alias = "sln-clone-cp")]
    CloneConfiguration {
        /// Path to the .sln file
        sln: PathBuf,

        /// Comma-separated project names, or `*` for every project
        project_names: String,

        /// Platform to copy from (e.g. ARM64)
        copy_from: String,

        /// Platform to create (e.g. ARM64EC)
        copy_to: String,

        /// Also fix up each selected .vcxproj
        #[arg(short = 'u', long, default_value_t = true, action = ArgAction::Set)]
        update_project_file: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match cli.command {
        Commands::FixupProject { path } => {
            fixup_project(&path).with_context(|| format!("failed to fix up {}", path.display()))?;
        }
        Commands::CloneConfiguration {
            sln,
            project_names,
            copy_from,
            copy_to,
            update_project_file,
        } => {
            let options = CloneConfiguration {
                request: CloneRequest::new(ProjectFilter::parse(&project_names), copy_from, copy_to),
                solution: sln,
                update_project_files: update_project_file,
            };
            clone_configuration(&options)
                .with_context(|| format!("failed to update {}", options.solution.display()))?;
        }
    }

    Ok(())
}
