use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use branchwright::health::CheckResult;
use branchwright::pipeline::{PublishReport, StepStatus};
use branchwright::{
    Config, ConfigStore, GitCli, HealthCheck, HttpConnector, ProjectRef, PublishOptions,
    Publisher, TerminalPrompter,
};

#[derive(Parser)]
#[command(name = "branchwright")]
#[command(about = "Publish a project to a versioned dev branch on GitHub or Gitee")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Link, commit and push the project to its dev branch
    Publish {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Choose the hosting provider again
        #[arg(long)]
        refresh_server: bool,

        /// Enter a new access token
        #[arg(long)]
        refresh_token: bool,

        /// Choose the repository owner again
        #[arg(long)]
        refresh_owner: bool,
    },

    /// System health check and diagnostics
    Doctor {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    init_logging(cli.verbose, &config);
    info!("Starting branchwright v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Publish {
            dir,
            refresh_server,
            refresh_token,
            refresh_owner,
        } => {
            let options = PublishOptions {
                refresh_server,
                refresh_token,
                refresh_owner,
            };
            cmd_publish(dir, options, config).await
        }
        Commands::Doctor { dir } => cmd_doctor(dir, &config).await,
    }
}

/// Initialize logging; `RUST_LOG` overrides both the flag and the config
fn init_logging(verbose: bool, config: &Config) {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(config.logging.color))
        .with(filter)
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

async fn cmd_publish(dir: PathBuf, options: PublishOptions, config: Config) -> Result<()> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", dir.display()))?;
    let project = ProjectRef::load(&dir)?;

    let store = ConfigStore::open(&config)?;
    let connector = HttpConnector::new(config.providers.clone());
    let publisher = Publisher::new(
        Arc::new(config),
        store,
        Arc::new(connector),
        Arc::new(GitCli::new(&dir)),
        Arc::new(TerminalPrompter::new()),
    );

    let report = publisher.run(project, options).await?;
    print_publish_report(&report);
    Ok(())
}

async fn cmd_doctor(dir: PathBuf, config: &Config) -> Result<()> {
    let store = ConfigStore::open(config)?;
    let connector = HttpConnector::new(config.providers.clone());
    let health = HealthCheck::run(&store, &connector, &dir).await;
    print_health_report(&health);

    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_publish_report(report: &PublishReport) {
    println!();
    println!("📦 {}", report.project);
    for step in &report.steps {
        match &step.status {
            StepStatus::Completed => println!("  ✅ {}", step.name),
            StepStatus::Skipped(reason) => println!("  ⏭️  {} ({})", step.name, reason),
            StepStatus::Recovered(reason) => println!("  ⚠️  {}: {}", step.name, reason),
        }
    }
    println!();

    if let Some(remote) = &report.remote {
        println!("🔗 Remote: {}", remote.clone_url);
    }
    if let (Some(branch), Some(version)) = (&report.branch, &report.version) {
        println!("🌿 Branch: {} (version {})", branch, version);
    }
    println!("⏱️  Finished in {:.2}s", report.duration.as_secs_f64());

    if report.recovered() > 0 {
        println!(
            "⚠️  {} step(s) failed but were skipped, check the log above",
            report.recovered()
        );
    }
}

fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning {
                "⚠️ "
            } else {
                "✅"
            }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 branchwright Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
