//! unpkg - macOS installer package extractor
//!
//! Unpacks .pkg and .mpkg files into plain folders next to the package
//! without running any installer scripts.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use unpkg::archive::SystemRunner;
use unpkg::config::Settings;
use unpkg::destination::DirectoryAllocator;
use unpkg::extractor::{ExtractEvent, Extractor};
use unpkg::package::{self, PackageLayout, PackageRef, PackageStyle};
use unpkg::QueueCoordinator;

#[derive(Parser)]
#[command(name = "unpkg")]
#[command(version)]
#[command(about = "Extract the contents of macOS installer packages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where to extract when a package's folder is not writable
    #[arg(long, global = true, env = "UNPKG_FALLBACK_DIR")]
    fallback_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one or more .pkg / .mpkg files
    Extract {
        /// Packages to extract, processed in the given order
        #[arg(required = true)]
        packages: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a package would be extracted
    Inspect {
        /// Path to the .pkg or .mpkg
        package: PathBuf,
    },

    /// Show the active settings
    Config {
        /// Write the active settings to the settings file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(if cli.verbose {
                    "unpkg=debug".parse()?
                } else {
                    "unpkg=warn".parse()?
                }),
            )
            .init();
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(dir) = cli.fallback_dir {
        settings.fallback_dir = Some(dir);
    }

    match cli.command {
        Commands::Extract { packages, json } => extract(settings, packages, json).await,
        Commands::Inspect { package } => inspect(&package),
        Commands::Config { init } => show_config(&settings, cli.config.as_deref(), init),
    }
}

async fn extract(settings: Settings, packages: Vec<PathBuf>, json: bool) -> Result<()> {
    if let Err(e) = settings.validate() {
        tracing::warn!("{}", e);
    }

    let (accepted, skipped): (Vec<PathBuf>, Vec<PathBuf>) =
        packages.into_iter().partition(|p| package::is_package_path(p));
    for path in &skipped {
        tracing::warn!("Skipping non-package input {}", path.display());
        eprintln!("Skipping {} (not a .pkg or .mpkg)", path.display());
    }
    if accepted.is_empty() {
        bail!("No packages to extract");
    }

    let fallback = settings.resolve_fallback_dir()?;
    let extractor = Extractor::new(
        Arc::new(SystemRunner),
        settings.tools,
        DirectoryAllocator::new(fallback),
    );

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% | {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    if json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let bar = pb.clone();
    let queue = QueueCoordinator::with_callback(
        extractor,
        Arc::new(move |event: ExtractEvent| match event {
            ExtractEvent::Started { package } => {
                bar.reset();
                bar.set_prefix(package);
            }
            ExtractEvent::Operation { message } => bar.set_message(message),
            ExtractEvent::Progress { fraction } => bar.set_position((fraction * 1000.0) as u64),
            ExtractEvent::Finished { result } => {
                let mark = if result.success { "OK  " } else { "FAIL" };
                bar.println(format!("{} {}: {}", mark, result.package_name, result.summary()));
            }
            ExtractEvent::State { .. } => {}
        }),
    );

    queue.add_files_to_queue(accepted);
    queue.wait_idle().await;
    pb.finish_and_clear();

    let results = queue.results();
    let failed = results.iter().filter(|r| !r.success).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!();
        println!("=== Extraction Summary ===");
        println!("Extracted: {}", results.len() - failed);
        println!("Failed:    {}", failed);
    }

    if failed > 0 {
        bail!("{} of {} packages failed to extract", failed, results.len());
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let package = PackageRef::new(path);
    package.ensure_readable()?;
    let layout = package.layout()?;

    println!("=== Package Information ===");
    println!("Name:   {}", package.display_name());
    println!("Layout: {}", layout.describe());

    match layout {
        PackageLayout::Metapackage => {
            let members = package::find_member_packages(path)?;
            println!("\nMember packages ({}):", members.len());
            for member in members {
                let member = PackageRef::new(member);
                let style = member
                    .layout()
                    .map(|l| l.describe().to_string())
                    .unwrap_or_else(|e| format!("unreadable ({})", e));
                println!("  {} [{}]", member.display_name(), style);
            }
        }
        PackageLayout::Package(PackageStyle::Legacy) => {
            let archives = package::find_pax_files(path)?;
            println!("\nArchives ({}):", archives.len());
            for archive in archives {
                println!("  {}", archive.strip_prefix(path).unwrap_or(&archive).display());
            }
        }
        PackageLayout::Package(PackageStyle::Modern) => {
            println!("\nFlat package; payloads are listed after unpacking with xar");
        }
    }

    Ok(())
}

fn show_config(settings: &Settings, explicit: Option<&Path>, init: bool) -> Result<()> {
    if init {
        let path = match explicit {
            Some(path) => {
                settings.save_to(path)?;
                path.to_path_buf()
            }
            None => settings.save()?,
        };
        println!("Wrote {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(settings)?);

    for (name, path) in settings.tools.entries() {
        if !path.is_file() {
            eprintln!("warning: {} not found at {}", name, path.display());
        }
    }
    if let Err(e) = settings.resolve_fallback_dir() {
        eprintln!("warning: {}", e);
    }

    Ok(())
}
