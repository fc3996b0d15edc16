mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use pingdom_core::{normalize, plan, Action, HttpMaintenanceClient, Reconciler, StateFile};

use crate::config::{AppConfig, LogFormat};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), env!("PINGDOM_MAINT_GIT"));

/// Declarative Pingdom maintenance windows.
#[derive(Parser)]
#[command(name = "pingdom-maint", version = VERSION, about)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, default_value = "pingdom.toml")]
    config: PathBuf,

    /// Path to the JSON state file holding remote ids.
    #[arg(short, long, global = true, default_value = "pingdom.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes `apply` would make.
    Plan {
        /// Use the state file as-is instead of re-reading remote windows.
        #[arg(long, default_value_t = false)]
        skip_refresh: bool,
    },
    /// Create, update and soft-delete windows to match the config.
    Apply {
        /// Use the state file as-is instead of re-reading remote windows.
        #[arg(long, default_value_t = false)]
        skip_refresh: bool,
    },
    /// Re-read every managed window and forget ones deleted remotely.
    Refresh,
    /// Soft-delete one managed window and forget it.
    Destroy {
        /// Window name as declared in the config.
        name: String,
    },
    /// Print the epoch seconds of a time specification.
    Normalize {
        /// RFC 3339 date-time or "now".
        spec: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize { spec } => {
            init_tracing(LogFormat::Pretty, "warn");
            run_normalize(&spec)
        }
        command => match AppConfig::load(&cli.config) {
            Ok(app_config) => {
                init_tracing(app_config.logging.format, "info");
                tracing::debug!(path = %cli.config.display(), "Loaded config file");
                run(command, &app_config, &cli.state).await
            }
            Err(e) => {
                init_tracing(LogFormat::Pretty, "info");
                Err(e)
            }
        },
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_normalize(spec: &str) -> Result<(), String> {
    let epoch = normalize(spec).map_err(|e| e.to_string())?;
    println!("{}", epoch);
    Ok(())
}

async fn run(command: Commands, app_config: &AppConfig, state_path: &Path) -> Result<(), String> {
    let client_config = app_config.provider.client_config()?;
    tracing::debug!(config = ?client_config, "Client configured");
    let client = HttpMaintenanceClient::from_config(&client_config).map_err(|e| e.to_string())?;
    let reconciler = Reconciler::new(Arc::new(client));

    let mut state = StateFile::load(state_path).map_err(|e| e.to_string())?;
    let declared = app_config.declared();

    match command {
        Commands::Plan { skip_refresh } => {
            if !skip_refresh {
                refresh(&reconciler, &mut state).await?;
            }
            let actions = plan(&declared, &state);
            print_plan(&actions);
            Ok(())
        }
        Commands::Apply { skip_refresh } => {
            if !skip_refresh {
                refresh(&reconciler, &mut state).await?;
            }
            let outcome = reconciler.apply(&declared, &mut state).await;
            // Persist completed actions even when a later one failed.
            state.save(state_path).map_err(|e| e.to_string())?;
            let report = outcome.map_err(|e| e.to_string())?;
            println!(
                "{} {} created, {} updated, {} deleted, {} unchanged",
                style("Apply complete:").green().bold(),
                report.created,
                report.updated,
                report.deleted,
                report.unchanged
            );
            Ok(())
        }
        Commands::Refresh => {
            let dropped = refresh(&reconciler, &mut state).await?;
            println!(
                "{} {} managed, {} gone remotely",
                style("Refreshed:").green().bold(),
                state.windows.len(),
                dropped
            );
            Ok(())
        }
        Commands::Destroy { name } => {
            let destroyed = reconciler
                .destroy(&name, &mut state)
                .await
                .map_err(|e| e.to_string())?;
            if !destroyed {
                return Err(format!("No managed maintenance window named '{}'", name));
            }
            state.save(state_path).map_err(|e| e.to_string())?;
            println!("{} {}", style("Destroyed:").yellow().bold(), name);
            Ok(())
        }
        Commands::Normalize { .. } => {
            unreachable!("normalize is handled before the config is loaded")
        }
    }
}

async fn refresh(reconciler: &Reconciler, state: &mut StateFile) -> Result<usize, String> {
    let dropped = reconciler.refresh(state).await.map_err(|e| e.to_string())?;
    Ok(dropped.len())
}

fn print_plan(actions: &[Action]) {
    let changes = actions.iter().filter(|a| a.is_change()).count();
    for action in actions {
        let line = action.to_string();
        let styled = match action {
            Action::Create { .. } => style(line).green(),
            Action::Update { .. } => style(line).yellow(),
            Action::Delete { .. } => style(line).red(),
            Action::Unchanged { .. } => style(line).dim(),
        };
        println!("{}", styled);
    }
    if changes == 0 {
        println!("{}", style("No changes.").dim());
    } else {
        println!("{} {} to change", style("Plan:").bold(), changes);
    }
}

fn init_tracing(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt().with_env_filter(filter).with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
