// src/main.rs

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gofetch::cache;
use gofetch::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log filter, e.g. `GOFETCH_LOG=debug`.
const LOG_ENV: &str = "GOFETCH_LOG";

#[derive(Debug, Parser)]
#[command(name = "gofetch", about = "Download, cache and install Go binary releases.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download go binary archive.
    ///
    /// Saves the archive to the download directory ($HOME/godl/downloads by
    /// default). An archive that is already there is not downloaded again
    /// unless --force is given.
    Download {
        version: Option<String>,
        /// Force download instead of using local version
        #[arg(short, long)]
        force: bool,
    },
    /// List the downloaded versions.
    #[command(visible_alias = "ls")]
    List,
    /// Install go binary archive, downloading it first if needed.
    Install { version: Option<String> },
    /// Show the gofetch version information.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", summary(&err));
            ExitCode::FAILURE
        }
    }
}

/// The whole cause chain on one line, outermost first.
fn summary(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Download { version, force } => {
            let version = require_version(version, "download")?;
            let settings = Settings::load()?;
            download(&version, &settings, force).await
        }
        Command::List => {
            let settings = Settings::load()?;
            for version in cache::list_downloaded(&settings.download_dir).await? {
                println!("{}", version);
            }
            Ok(())
        }
        Command::Install { version } => {
            let version = require_version(version, "install")?;
            let settings = Settings::load()?;
            install(&version, &settings).await
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Argument faults are reported before any I/O.
fn require_version(version: Option<String>, verb: &str) -> Result<String> {
    match version {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("provide binary archive version to {}", verb),
    }
}

async fn download(version: &str, settings: &Settings, force: bool) -> Result<()> {
    println!("Downloading go binary {}", version);
    let downloader = ReleaseDownloader::new(settings.download_options(force));
    let outcome = downloader
        .download(version)
        .await
        .with_context(|| format!("error downloading {}", version))?;

    match outcome {
        DownloadOutcome::Cached => println!("archive has already been downloaded"),
        DownloadOutcome::Downloaded => println!("\nDownload complete"),
    }
    Ok(())
}

async fn install(version: &str, settings: &Settings) -> Result<()> {
    println!("Installing go binary {}", version);
    let downloader = ReleaseDownloader::new(settings.download_options(false));
    let outcome = install_release(
        version,
        &settings.install_root,
        &GzUnarchiver,
        &FsRemover,
        &downloader,
    )
    .await
    .with_context(|| format!("error installing {}", version))?;

    match outcome {
        InstallOutcome::AlreadyInstalled => println!("go{} is already installed", version),
        InstallOutcome::Installed => println!(
            "Installed go{} to {}",
            version,
            settings.install_root.join("go").display()
        ),
    }
    Ok(())
}

fn print_version() {
    println!(
        "Version: {}\nGit hash: {}\nBuilt: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GOFETCH_GIT_HASH").unwrap_or("unknown commit"),
        option_env!("GOFETCH_BUILD_DATE").unwrap_or("unknown build date"),
    );
}
