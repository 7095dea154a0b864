//! termhome CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use tabled::{Table, Tabled};
use termhome_common::HomePaths;
use termhome_status::{MonitorEvent, State, StatusEvents, StatusMonitor};

use crate::config::HomeConfig;

/// termhome - Terminal homepage with live service status
#[derive(Parser)]
#[command(name = "termhome")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, env = "TERMHOME_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// termhome commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print every status change until interrupted
    Watch,

    /// Print a status table once
    Status {
        /// Seconds to let the first checks finish
        #[arg(short, long, default_value = "5")]
        wait: u64,
    },
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "GROUP")]
    group: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "MESSAGE")]
    message: String,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let path = HomePaths::new().resolve_config(self.config.as_deref());
        let config = HomeConfig::from_file(&path)?;
        tracing::info!(title = config.title(), path = %path.display(), "Starting termhome");

        let (monitor, events) = start(&config).await;

        match self.command {
            Commands::Watch => watch(&monitor, events).await?,
            Commands::Status { wait } => {
                tokio::time::sleep(Duration::from_secs(wait)).await;
                print_status(&config, &monitor);
            }
        }

        monitor.stop();
        Ok(())
    }
}

/// Register every configured target and hook up Docker if configured.
async fn start(config: &HomeConfig) -> (StatusMonitor, StatusEvents) {
    let (monitor, events) = StatusMonitor::new();

    if let Some(seconds) = config.status.check_interval {
        monitor.set_global_interval(seconds);
    }
    for target in config.targets() {
        monitor.add_target(target);
    }

    if let Some(docker) = &config.docker {
        if let Err(e) = monitor.run_initial_reconciliation(docker).await {
            tracing::warn!(error = %e, "Initial container reconciliation failed");
        }
        if let Err(e) = monitor.enable_reconciliation(docker.clone()).await {
            tracing::warn!(error = %e, "Container reconciliation disabled");
        }
    }

    (monitor, events)
}

async fn watch(monitor: &StatusMonitor, mut events: StatusEvents) -> Result<()> {
    println!(
        "{} watching {} targets (Ctrl-C to quit)",
        style("termhome").bold(),
        monitor.target_names().len()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(MonitorEvent::Changed(change)) => {
                    let group = monitor.group_of(&change.name).unwrap_or_default();
                    println!(
                        "{} {}/{} {}",
                        paint(change.state),
                        group,
                        change.name,
                        change.message
                    );
                }
                Some(MonitorEvent::Discovered { target }) => {
                    println!(
                        "{} {}/{}",
                        style("discovered").cyan(),
                        target.group.unwrap_or_default(),
                        target.name
                    );
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    Ok(())
}

fn print_status(config: &HomeConfig, monitor: &StatusMonitor) {
    let rows = status_rows(monitor);
    println!("{}", style(config.title()).bold());

    if rows.is_empty() {
        println!("No services configured");
        return;
    }
    println!("{}", Table::new(&rows));

    let count = |state: State| {
        monitor
            .target_names()
            .iter()
            .filter(|name| monitor.get(name).state == state)
            .count()
    };
    println!(
        "{} ok, {} warning, {} critical, {} unknown",
        style(count(State::Ok)).green(),
        style(count(State::Warning)).yellow(),
        style(count(State::Critical)).red(),
        style(count(State::Unknown)).dim(),
    );
}

fn status_rows(monitor: &StatusMonitor) -> Vec<StatusRow> {
    let mut rows: Vec<StatusRow> = monitor
        .target_names()
        .into_iter()
        .map(|name| {
            let result = monitor.get(&name);
            StatusRow {
                group: monitor.group_of(&name).unwrap_or_default(),
                state: result.state.to_string(),
                message: result.message,
                name,
            }
        })
        .collect();
    rows.sort_by(|a, b| (&a.group, &a.name).cmp(&(&b.group, &b.name)));
    rows
}

fn paint(state: State) -> String {
    let label = format!("{:<8}", state.as_str());
    match state {
        State::Ok => style(label).green(),
        State::Warning => style(label).yellow(),
        State::Critical => style(label).red().bold(),
        State::Unknown => style(label).dim(),
    }
    .to_string()
}
