//! watchraptor: inspect the watch registry and injection rules of the shell.
//!
//! ## Subcommands
//!
//! - `registry list`: Watched checks per page
//! - `registry clear`: Forget every watched check on one page
//! - `check-url`: Whether the shell would inject a watcher into a URL

use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use watchraptor_shell::{
    default_shell_config_path, load_shell_config, InjectionPolicy, RegistryStore, ShellConfig,
    ShellError, TransitionType,
};

#[derive(Parser)]
#[command(name = "watchraptor")]
#[command(about = "Watch CI checks on pull request pages")]
#[command(version)]
struct Cli {
    /// Shell configuration file (default: ~/.watchraptor/shell.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the watch registry
    Registry {
        #[command(subcommand)]
        command: RegistryCommands,
    },

    /// Report whether a watcher would be injected into a URL
    CheckUrl {
        /// Page URL
        #[arg(value_name = "URL")]
        url: String,

        /// Navigation transition type (e.g. link, reload, typed)
        #[arg(long, value_parser = parse_transition)]
        transition: Option<TransitionType>,
    },
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// List watched checks
    List {
        /// Only show this page
        #[arg(long)]
        url: Option<String>,
    },

    /// Remove every watched check for a page
    Clear {
        #[arg(long)]
        url: String,
    },
}

fn parse_transition(value: &str) -> Result<TransitionType, String> {
    value.parse()
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = load_config(cli.config).and_then(|config| match cli.command {
        Commands::Registry { command } => run_registry(&config, command),
        Commands::CheckUrl { url, transition } => {
            check_url(&config, &url, transition);
            Ok(())
        }
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "watchraptor failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let debug_enabled = env::var("WATCHRAPTOR_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<ShellConfig, ShellError> {
    match path.or_else(default_shell_config_path) {
        Some(path) => load_shell_config(&path),
        None => Ok(ShellConfig::default()),
    }
}

fn run_registry(config: &ShellConfig, command: RegistryCommands) -> Result<(), ShellError> {
    let path = config.resolved_store_path()?;
    let mut store = RegistryStore::load(&path)?;

    match command {
        RegistryCommands::List { url } => {
            for (context, items) in store.contexts() {
                if url.as_deref().is_some_and(|url| url != context) {
                    continue;
                }
                println!("{}", context);
                for (query, status) in items {
                    println!("  {} {}  {}", status.symbol(), status, query);
                }
            }
        }
        RegistryCommands::Clear { url } => {
            if store.clear(&url) {
                store.save()?;
                println!("Cleared {}", url);
            } else {
                println!("Nothing watched on {}", url);
            }
        }
    }
    Ok(())
}

fn check_url(config: &ShellConfig, url: &str, transition: Option<TransitionType>) {
    let policy = InjectionPolicy::new(config.host_permissions.clone());
    let (trigger, injects) = match transition {
        Some(transition) => (
            format!("navigation ({})", transition),
            policy.on_committed(url, transition),
        ),
        None => ("tab created".to_string(), policy.on_tab_created(Some(url))),
    };
    println!("{}: {}", trigger, if injects { "inject" } else { "skip" });
    println!(
        "install sweep: {}",
        if policy.on_install(url) { "inject" } else { "skip" }
    );
}
