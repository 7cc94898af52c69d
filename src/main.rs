//! expensedesk main entry point

mod console;
mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use expensedesk_client::HttpClient;
use expensedesk_config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "expensedesk")]
#[command(author = "expensedesk Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A terminal console for personal expense records", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Backend base URL, overrides `api.base_url`
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse and edit expenses interactively (default)
    Console {
        /// Location to start from, e.g. "/expenses?sort=date,desc"
        #[arg(default_value = "")]
        location: String,
    },
    /// Print one page and exit
    List {
        #[arg(default_value = "")]
        location: String,
    },
    /// Print spending totals per day, category and week
    Summary {
        /// How many days back to look
        #[arg(long, default_value_t = expensedesk_core::SUMMARY_DAYS)]
        days: i64,
    },
    /// Run the in-memory development backend
    Serve,
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn write_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }
    std::fs::write(path, Config::generate_default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::InitConfig { force }) = &args.command {
        init_logging("warn");
        return write_default_config(&args.config, *force);
    }

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if let Some(url) = &args.url {
        config.api.base_url = url.clone();
        config.validate().context("Invalid --url")?;
    }
    init_logging(&config.logging.level);
    log::debug!("Using API root {}", config.api_root());

    let rt = Runtime::new().context("Failed to start the async runtime")?;
    rt.block_on(async {
        match args.command {
            Some(Command::Serve) => expensedesk_api::start_server(config).await,
            Some(Command::List { location }) => {
                let client = Arc::new(HttpClient::from_config(&config));
                console::print_once(client, config, &location).await
            }
            Some(Command::Summary { days }) => {
                anyhow::ensure!(days > 0, "--days must be at least 1");
                let client = Arc::new(HttpClient::from_config(&config));
                console::print_summary(client, config, days).await
            }
            Some(Command::Console { location }) => {
                let client = Arc::new(HttpClient::from_config(&config));
                let console = console::Console::open(client, config, &location).await?;
                console.run_interactive().await
            }
            None => {
                let client = Arc::new(HttpClient::from_config(&config));
                let console = console::Console::open(client, config, "").await?;
                console.run_interactive().await
            }
            Some(Command::InitConfig { .. }) => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["expensedesk", "console", "--config", "x.yaml", "--url", "http://h:1"])
            .unwrap();
        assert_eq!(args.config, PathBuf::from("x.yaml"));
        assert_eq!(args.url.as_deref(), Some("http://h:1"));
        assert!(matches!(args.command, Some(Command::Console { .. })));

        let args = Args::try_parse_from(["expensedesk", "summary", "--days", "7", "-c", "y.yaml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("y.yaml"));
        assert!(matches!(args.command, Some(Command::Summary { days: 7 })));
    }
}
