//! Command-line interface for the harvester.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::config::{load_config_file, HarvesterConfig, Settings, DEFAULT_CONFIG_PATH, DEFAULT_LOGGING_LEVEL};
use crate::error::{HarvesterError, Result};
use crate::harvester::{harvest, Completion, RunReport};
use crate::sources::bhl::{self, BhlClient};
use crate::sources::SourceRegistry;

/// Literature Harvester - Collect literature metadata and documents from BHL, BibDigital and Zobodat.
#[derive(Parser)]
#[command(name = "literature-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest the configured sources one after another.
    Run {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Only run the named harvester entries (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Output directory (overrides General.output-path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the registered source identifiers.
    Sources,

    /// List all BHL collections.
    Collections {
        /// Configuration file holding the BHL API key
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            sources,
            output,
        } => run_command(&config, &sources, output.as_deref()),
        Commands::Sources => {
            init_tracing(DEFAULT_LOGGING_LEVEL);
            sources_command();
            Ok(())
        }
        Commands::Collections { config } => collections_command(&config),
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOGGING_LEVEL));

    // A subscriber may already be installed (e.g. in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn load_settings(config: &Path) -> Result<Settings> {
    let settings = load_config_file(config)?;
    init_tracing(&settings.logging_level);
    Ok(settings)
}

/// Pick the harvester entries requested on the command line.
///
/// Entries match by display name or source identifier, ignoring case.
fn select_harvesters(
    harvesters: Vec<HarvesterConfig>,
    requested: &[String],
) -> Result<Vec<HarvesterConfig>> {
    if requested.is_empty() {
        return Ok(harvesters);
    }

    for name in requested {
        let known = harvesters.iter().any(|h| {
            h.name.eq_ignore_ascii_case(name) || h.source.eq_ignore_ascii_case(name)
        });
        if !known {
            return Err(HarvesterError::Config(format!(
                "no harvester named '{name}' in the configuration"
            )));
        }
    }

    Ok(harvesters
        .into_iter()
        .filter(|h| {
            requested.iter().any(|name| {
                h.name.eq_ignore_ascii_case(name) || h.source.eq_ignore_ascii_case(name)
            })
        })
        .collect())
}

/// Execute the run command.
fn run_command(config: &Path, sources: &[String], output: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let mut harvesters = select_harvesters(settings.harvesters, sources)?;

    if let Some(output_dir) = output {
        for harvester in &mut harvesters {
            harvester.output_root = output_dir.to_path_buf();
        }
    }

    if harvesters.is_empty() {
        println!("{}", style("No harvesters configured.").yellow());
        return Ok(());
    }

    let registry = SourceRegistry::default();
    let mut failures = 0;

    for harvester in &harvesters {
        println!(
            "{} {} ({})",
            style("Harvesting").bold(),
            style(&harvester.name).cyan(),
            harvester.source
        );

        let pb = ProgressBar::new_spinner();
        #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("valid template"),
        );
        pb.set_message(format!("Running {}...", harvester.name));
        pb.enable_steady_tick(Duration::from_millis(100));

        let outcome = harvest(&registry, harvester);
        pb.finish_and_clear();

        match outcome {
            Ok(report) => {
                if report.is_aborted() {
                    failures += 1;
                }
                print_report(&report);
            }
            Err(e) => {
                failures += 1;
                println!("  {} {e}", style("Failed:").red().bold());
            }
        }
        println!();
    }

    if failures > 0 {
        println!(
            "{} {failures} of {} harvester(s) did not complete",
            style("Warning:").yellow().bold(),
            harvesters.len()
        );
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("  Items: {}", style(report.items).green());
    println!("  Files downloaded: {}", report.downloaded);
    if report.skipped > 0 {
        println!("  Files skipped: {}", report.skipped);
    }
    if report.failed > 0 {
        println!("  Failed downloads: {}", style(report.failed).yellow().bold());
    }
    println!("  Metadata files: {}", report.metadata_files);
    if let Completion::Aborted(reason) = &report.completion {
        println!("  {} {reason}", style("Aborted:").red().bold());
    }
}

fn sources_command() {
    for source in SourceRegistry::default().registered_sources() {
        println!("{source}");
    }
}

/// Execute the collections command.
fn collections_command(config: &Path) -> Result<()> {
    let settings = load_settings(config)?;
    let harvester = settings
        .harvesters
        .iter()
        .find(|h| h.source == bhl::SOURCE_ID)
        .ok_or_else(|| HarvesterError::Config("no BHL harvester configured".to_string()))?;

    let collections = BhlClient::from_config(harvester)?.get_all_collections()?;
    for collection in collections.values() {
        println!("{:>6}  {}", style(collection.id).cyan(), collection.name);
    }
    println!();
    println!("{} collection(s)", collections.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["literature-harvester", "run"]);

        let Commands::Run {
            config,
            sources,
            output,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(sources.is_empty());
        assert!(output.is_none());
    }

    #[test]
    fn test_cli_parse_run_with_sources() {
        let cli = Cli::parse_from([
            "literature-harvester",
            "run",
            "--config",
            "harvesting.yml",
            "--source",
            "BHL",
            "--source",
            "Zobodat",
            "--output",
            "/data",
        ]);

        let Commands::Run {
            config,
            sources,
            output,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(config, PathBuf::from("harvesting.yml"));
        assert_eq!(sources, vec!["BHL", "Zobodat"]);
        assert_eq!(output, Some(PathBuf::from("/data")));
    }

    #[test]
    fn test_select_harvesters() {
        let harvesters = vec![
            HarvesterConfig::builder("bhl").name("BHL").build(),
            HarvesterConfig::builder("zobodat").name("Zobodat").build(),
        ];

        let selected = select_harvesters(harvesters.clone(), &["zobodat".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Zobodat");

        assert_eq!(select_harvesters(harvesters.clone(), &[]).unwrap().len(), 2);
        assert!(select_harvesters(harvesters, &["jstor".to_string()]).is_err());
    }
}
