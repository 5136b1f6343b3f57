pub mod cli_args;
pub mod console;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use taborg_browser::{MemoryTabHost, TabHost, WindowState};
use taborg_config::{Config, OrganizeOption, PreferenceStore, TomlPreferenceStore};
use taborg_core::{Organizer, Outcome, Trigger};
use tracing::{debug, info};

pub use cli_args::{Cli, Commands};
pub use console::ConsoleNotifier;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli);
    execute(cli).await
}

/// Run a parsed command line
pub async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load_with_overrides(cli.config.as_deref(), cli.model.clone(), cli.timeout)?;
    let preferences: Arc<dyn PreferenceStore> =
        Arc::new(TomlPreferenceStore::new(config.preferences_path()));
    debug!("Preferences at {}", config.preferences_path().display());

    let build = |host: Arc<dyn TabHost>| {
        Organizer::from_config(&config, host, preferences.clone())
            .with_notifier(Arc::new(ConsoleNotifier::new()))
    };

    match cli.command {
        Commands::Organize {
            all,
            new,
            window,
            dry_run,
        } => {
            let trigger = match Commands::chosen_option(all, new) {
                Some(option) => popup_trigger(preferences.as_ref(), option)?,
                None => Trigger::Shortcut,
            };
            let outcome = organize_window(&window, trigger, build, !dry_run).await?;
            print_outcome(&outcome);
        }
        Commands::Message { json, window } => {
            let message: serde_json::Value =
                serde_json::from_str(&json).context("Message is not valid JSON")?;
            match Trigger::from_message(&message) {
                Some(trigger) => {
                    let outcome = organize_window(&window, trigger, build, true).await?;
                    print_outcome(&outcome);
                }
                None => info!("Ignoring message without the organizeTabs action"),
            }
        }
        Commands::SetKey { key } => {
            preferences.set_api_key(&key)?;
            println!("✓ Saved");
        }
        Commands::SetMode { mode } => {
            preferences.set_organize_option(mode)?;
            println!("Shortcut organizes: {}", mode);
        }
        Commands::ShowPrefs => {
            for line in console::describe_preferences(&preferences.load()?) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// What the popup does on "Organize": remember the choice, then send the
/// organize message for it
pub fn popup_trigger(preferences: &dyn PreferenceStore, option: OrganizeOption) -> Result<Trigger> {
    preferences.set_organize_option(option)?;
    Ok(Trigger::Message {
        regroup_all: option == OrganizeOption::All,
    })
}

/// Load a saved window, run `trigger` against it, and write it back when
/// `save` is set and the run did not fail.
pub async fn organize_window<F>(window: &Path, trigger: Trigger, build: F, save: bool) -> Result<Outcome>
where
    F: FnOnce(Arc<dyn TabHost>) -> Organizer,
{
    let host = Arc::new(MemoryTabHost::new(WindowState::load(window)?));
    let tab_host: Arc<dyn TabHost> = host.clone();
    let organizer = build(tab_host);

    let outcome = organizer.handle_trigger(trigger).await?;

    if save {
        host.state().save(window)?;
        debug!("Wrote window state to {}", window.display());
    }
    Ok(outcome)
}

fn print_outcome(outcome: &Outcome) {
    for line in console::describe_outcome(outcome) {
        println!("  {}", line);
    }
}

fn initialize_logging(cli: &Cli) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in [
        "taborg",
        "taborg_cli",
        "taborg_core",
        "taborg_config",
        "taborg_browser",
        "taborg_providers",
    ] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
