#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use site_planner::constants::config::ENV_LOG_LEVEL;
use site_planner::persistence::{JsonFileStore, MemoryStore, WorkspaceStore};
use site_planner::remote::HttpBackend;
use site_planner::sessions::{SaveOutcome, SaveResolution};
use site_planner::tabs::Tab;
use site_planner::types::{DeviceType, SessionId, TabId};
use site_planner::workbench::EditOutcome;
use site_planner::{Settings, Workbench};

/// Compose battery site designs and keep their layouts in sync with the backend
#[derive(Debug, Parser)]
#[command(name = "site-planner", version)]
struct Cli {
    /// Backend base URL (overrides config file and environment)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep the workspace in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the active tab, its configuration and layout
    Status,
    /// List open tabs
    Tabs,
    /// Open a new empty tab and make it active
    AddTab,
    CloseTab { id: TabId },
    RenameTab { id: TabId, name: String },
    /// Make a tab active
    Switch { id: TabId },
    /// Set an absolute device count on the active tab
    Set { device: DeviceType, count: i64 },
    /// Add a signed delta to a device count on the active tab
    Adjust {
        device: DeviceType,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    /// Recompute and print the active tab's layout
    Layout,
    /// List saved designs
    Sessions,
    /// Save the active tab
    Save {
        /// Replace the design this tab was saved as
        #[arg(long, conflicts_with = "as_new")]
        overwrite: bool,
        /// Store as a new design even if the tab was saved before
        #[arg(long)]
        as_new: bool,
    },
    /// Load a saved design into the active tab
    Load { id: String },
    /// Delete a saved design
    Delete { id: String },
}

fn parse_level(level: &str) -> TraceLevel {
    match level.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings may fail to load; logging still needs a level first
    let settings = Settings::load();
    let level = std::env::var(ENV_LOG_LEVEL)
        .ok()
        .or_else(|| settings.as_ref().ok().map(|s| s.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = settings?.with_api_url(cli.api_url.clone());
    info!(api_url = %settings.api_url, debounce_ms = settings.debounce_ms, "Starting site-planner");

    let store: Box<dyn WorkspaceStore> = if cli.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        let path = settings
            .workspace_file
            .clone()
            .unwrap_or_else(JsonFileStore::default_path);
        Box::new(JsonFileStore::new(path))
    };

    let backend = Arc::new(
        HttpBackend::new(&settings.api_url, settings.request_timeout())
            .context("Failed to set up backend client")?,
    );
    let mut bench = Workbench::new(store, backend.clone(), backend, settings.debounce());
    if !bench.bootstrap().await {
        // Local tab commands work without the session list; only warn
        warn!(status = ?bench.last_failure(), "Session list unavailable at startup");
        bench.clear_failure();
    }

    run(&mut bench, cli.command).await?;

    bench.wait_for_layouts().await;
    if let Some(failure) = bench.last_failure() {
        bail!("{}", failure);
    }
    Ok(())
}

async fn run(bench: &mut Workbench, command: Command) -> Result<()> {
    match command {
        Command::Status => print_status(bench),
        Command::Tabs => print_tabs(bench),
        Command::AddTab => match bench.add_tab() {
            Some(id) => println!("Opened tab {}", id),
            None => bail!("No tab ids left in this workspace"),
        },
        Command::CloseTab { id } => {
            if bench.close_tab(id) {
                println!("Closed tab {}", id);
            } else {
                println!("Tab {} not closed (unknown or last tab)", id);
            }
            print_tabs(bench);
        }
        Command::RenameTab { id, name } => {
            if !bench.rename_tab(id, &name) {
                println!("Tab {} not renamed", id);
            }
            print_tabs(bench);
        }
        Command::Switch { id } => {
            if !bench.switch_tab(id) {
                println!("No tab {}", id);
            }
            print_tabs(bench);
        }
        Command::Set { device, count } => {
            print_edit(bench.set_device_count(device, count));
            bench.wait_for_layouts().await;
            print_status(bench);
        }
        Command::Adjust { device, delta } => {
            print_edit(bench.adjust_device_count(device, delta));
            bench.wait_for_layouts().await;
            print_status(bench);
        }
        Command::Layout => {
            bench.refresh_layout();
            bench.wait_for_layouts().await;
            print_status(bench);
        }
        Command::Sessions => {
            bench.refresh_sessions().await;
            print_sessions(bench);
        }
        Command::Save { overwrite, as_new } => {
            let outcome = match (overwrite, as_new) {
                (true, _) => bench.save_resolved(SaveResolution::Overwrite).await,
                (_, true) => bench.save_resolved(SaveResolution::SaveAsNew).await,
                _ => bench.save().await,
            };
            match outcome {
                SaveOutcome::Saved(id) => println!("Saved as {}", id),
                SaveOutcome::NeedsResolution { current } => {
                    bail!(
                        "Tab is already saved as {}; re-run with --overwrite or --as-new",
                        current
                    );
                }
                SaveOutcome::Failed => {}
            }
        }
        Command::Load { id } => {
            if bench.load_session(&SessionId::new(id)).await {
                bench.wait_for_layouts().await;
                print_status(bench);
            }
        }
        Command::Delete { id } => {
            let id = SessionId::new(id);
            if bench.delete_session(&id).await {
                println!("Deleted {}", id);
                print_sessions(bench);
            }
        }
    }
    Ok(())
}

fn print_edit(outcome: EditOutcome) {
    match outcome {
        EditOutcome::Changed => {}
        EditOutcome::Unchanged => println!("No change"),
        EditOutcome::BelowMinimum { required } => {
            println!("Rejected: at least {} transformers required", required)
        }
        EditOutcome::OutOfRange { max } => println!("Rejected: counts are limited to {}", max),
    }
}

fn tab_line(tab: &Tab, active: bool) -> String {
    let marker = if active { "*" } else { " " };
    let saved = tab
        .server_id
        .as_ref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();
    format!("{} {:>3}  {}{}", marker, tab.id, tab.name, saved)
}

fn print_tabs(bench: &Workbench) {
    let active = bench.active_tab_id();
    for tab in bench.tabs() {
        println!("{}", tab_line(tab, tab.id == active));
    }
}

fn print_status(bench: &Workbench) {
    let tab = bench.active_tab();
    println!("{}", tab_line(tab, true));

    let config = bench.active_config();
    for device in DeviceType::ALL {
        println!("  {:<12} {}", device.label(), config.get(device));
    }

    match bench.active_layout() {
        Some(layout) => {
            println!(
                "  Footprint    {} x {} ft ({} sq ft)",
                layout.total_width,
                layout.total_height,
                layout.area()
            );
            println!("  Cost         ${}", layout.total_cost);
            println!("  Energy       {:.1} MWh", layout.total_energy);
            println!("  Placed       {} devices", layout.placed_devices.len());
        }
        None if config.is_empty() => println!("  Layout       (empty)"),
        None => println!("  Layout       (not computed)"),
    }
}

fn print_sessions(bench: &Workbench) {
    if bench.sessions().is_empty() {
        println!("No saved designs");
        return;
    }
    for session in bench.sessions() {
        println!("{:<16} {:<24} {}", session.id.as_str(), session.date, session.summary);
    }
}
