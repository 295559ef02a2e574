use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use forecast_core::{
    Config, FileHistory, ForecastSession, HistoryStore, ResolutionPipeline, ResolutionState,
    StableQuery, Unit,
};
use inquire::{CustomType, CustomUserError, InquireError, Select, Text};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Multi-day weather forecast for an address")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the forecast for an address.
    Show {
        /// Address or place, e.g. "4600 Silver Hill Rd, Washington, DC 20233".
        address: String,

        /// Unit system: "metric"/"si" or "imperial"/"us". Defaults to config.
        #[arg(long, short, value_parser = parse_unit)]
        units: Option<Unit>,
    },

    /// Search interactively. Type `:units` to toggle units, nothing to quit.
    Search {
        #[arg(long, short, value_parser = parse_unit)]
        units: Option<Unit>,
    },

    /// Manage recently resolved addresses.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Interactively edit the configuration file.
    Configure,
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// List stored addresses, oldest first.
    List,
    /// Remove one address.
    Remove { address: String },
    /// Remove all addresses.
    Clear,
}

fn parse_unit(value: &str) -> Result<Unit, String> {
    Unit::try_from(value).map_err(|e| e.to_string())
}

fn open_history(config: &Config) -> anyhow::Result<Arc<dyn HistoryStore>> {
    let path = Config::history_file_path()?;
    Ok(Arc::new(FileHistory::new(path, config.history_limit)))
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Show { address, units } => {
                show(&config, &address, units.unwrap_or(config.units)).await
            }
            Command::Search { units } => search(&config, units.unwrap_or(config.units)).await,
            Command::History { action } => history(&config, action),
            Command::Configure => configure(config),
        }
    }
}

async fn show(config: &Config, address: &str, units: Unit) -> anyhow::Result<()> {
    let pipeline = ResolutionPipeline::from_config(config)?;
    let history = open_history(config)?;

    match pipeline.request(StableQuery::new(address, units)).await {
        ResolutionState::Success { result, .. } => {
            render::print_forecast(&result);
            history.append(&result.canonical_address)?;
            Ok(())
        }
        ResolutionState::Error { error, .. } => {
            let message = error.user_message();
            Err(anyhow::Error::new(error).context(message))
        }
        ResolutionState::Idle | ResolutionState::Loading(_) => bail!("Please enter an address"),
    }
}

async fn search(config: &Config, units: Unit) -> anyhow::Result<()> {
    let pipeline = ResolutionPipeline::from_config(config)?;
    let history = open_history(config)?;
    let session = ForecastSession::new(pipeline, units, config.debounce()).with_history(history.clone());

    loop {
        let recent = history.list()?;
        let suggest = move |input: &str| -> Result<Vec<String>, CustomUserError> {
            let needle = input.to_lowercase();
            Ok(recent
                .iter()
                .rev()
                .filter(|a| a.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        };

        let help = format!("units: {} (`:units` toggles), empty input quits", session.units());
        let prompt = Text::new("Address:")
            .with_help_message(&help)
            .with_autocomplete(suggest);

        let input = match tokio::task::block_in_place(|| prompt.prompt()) {
            Ok(input) => input.trim_end().to_string(),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read address"),
        };

        if input.is_empty() {
            return Ok(());
        }

        let address = if input == ":units" {
            session.set_units(session.units().toggled());
            println!("Switched to {} units", session.units());
            session.stable_address()
        } else {
            if input == session.stable_address() && session.current_state().error().is_some() {
                session.resubmit();
            } else {
                session.set_input(input.as_str());
            }
            println!("Getting weather forecast for {input}...");
            input
        };

        if address.is_empty() {
            continue;
        }

        let state = session.settled_for(&address).await;
        render::print_state(&state);
        println!();
    }
}

fn history(config: &Config, action: HistoryAction) -> anyhow::Result<()> {
    let store = open_history(config)?;

    match action {
        HistoryAction::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No recent searches.");
            }
            for entry in entries {
                println!("{entry}");
            }
        }
        HistoryAction::Remove { address } => {
            store.remove(&address)?;
            println!("Removed: {address}");
        }
        HistoryAction::Clear => {
            store.clear()?;
            println!("History cleared.");
        }
    }

    Ok(())
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let units = Unit::all().to_vec();
    let current = units.iter().position(|u| *u == config.units).unwrap_or(0);

    config.units = Select::new("Default units:", units)
        .with_starting_cursor(current)
        .prompt()
        .context("Failed to read units")?;

    config.debounce_ms = CustomType::<u64>::new("Debounce (ms):")
        .with_default(config.debounce_ms)
        .with_error_message("Please enter a whole number of milliseconds")
        .prompt()
        .context("Failed to read debounce")?;

    config.history_limit = CustomType::<usize>::new("History size:")
        .with_default(config.history_limit)
        .prompt()
        .context("Failed to read history size")?;

    let user_agent = Text::new("User-Agent for weather requests:")
        .with_default(&config.endpoints.user_agent)
        .prompt()
        .context("Failed to read user agent")?;
    if user_agent.trim().is_empty() {
        return Err(anyhow!("User-Agent must not be empty"));
    }
    config.endpoints.user_agent = user_agent;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}
