use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use compass_usage::cache::{MonthCache, PersistPolicy, PortalFetcher};
use compass_usage::config::ServerConfig;
use compass_usage::portal::{Credentials, PortalConfig, Session};
use compass_usage::server::{self, AppState, UsageResponse};
use compass_usage::service_log::ServiceLog;
use compass_usage::usage::MonthKey;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "compass-usage")]
#[command(about = "Fetch, cache and serve Compass Card usage history")]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Config file (defaults to ~/.compass-usage/config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Portal account email (or COMPASS_USERNAME)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Portal account password (or COMPASS_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Portal base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `GET /{card}?year=YYYY&month=MM` over HTTP
    Serve {
        /// Listen address, e.g. ":8080" or "127.0.0.1:8080"
        #[arg(long)]
        listen: Option<String>,

        /// Directory for settled months
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Fail lookups whose result cannot be written to the cache
        #[arg(long)]
        strict_persist: bool,
    },
    /// List the card serials on the account
    Cards,
    /// Print one card's usage for a month as JSON
    Usage {
        /// Card serial number
        card: String,

        /// Month as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<MonthKey>,

        /// Directory for settled months
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if cli.username.is_some() {
        config.username = cli.username;
    }
    if cli.password.is_some() {
        config.password = cli.password;
    }
    if let Some(base_url) = cli.base_url {
        config.portal.base_url = base_url;
    }

    match cli.command {
        Command::Serve {
            listen,
            cache_dir,
            strict_persist,
        } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if cache_dir.is_some() {
                config.cache_dir = cache_dir;
            }
            if strict_persist {
                config.persist_policy = PersistPolicy::Strict;
            }
            config.validate()?;
            run_server(config).await
        }
        Command::Cards => {
            config.validate()?;
            let credentials = config.credentials()?;
            let portal = config.portal.clone();
            let cards = tokio::task::spawn_blocking(move || list_cards(&portal, &credentials))
                .await
                .context("Card listing worker failed")??;
            for card in cards {
                println!("{}", card);
            }
            Ok(())
        }
        Command::Usage {
            card,
            month,
            cache_dir,
        } => {
            if cache_dir.is_some() {
                config.cache_dir = cache_dir;
            }
            config.validate()?;
            let month =
                month.unwrap_or_else(|| MonthKey::containing(chrono::Local::now().date_naive()));
            let response = tokio::task::spawn_blocking(move || lookup_usage(&config, card, month))
                .await
                .context("Usage lookup worker failed")??;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(explicit: Option<&std::path::Path>) -> Result<ServerConfig> {
    if let Some(path) = explicit {
        return ServerConfig::load(path);
    }
    let default_path = compass_usage::paths::default_config_path()?;
    if default_path.exists() {
        ServerConfig::load(&default_path)
    } else {
        Ok(ServerConfig::default())
    }
}

async fn run_server(config: ServerConfig) -> Result<()> {
    let log = ServiceLog::open_default()?;
    let addr = config.listen_addr()?;
    let cache =
        MonthCache::new(config.cache_dir()?, config.persist_policy).with_log(log.clone());
    let fetcher = PortalFetcher::new(config.portal.clone(), config.credentials()?);

    log.log(
        "server",
        &format!(
            "Starting against {} with cache at {}",
            config.portal.base_url,
            cache.dir().display()
        ),
    );

    let state = AppState {
        cache: Arc::new(cache),
        fetcher: Arc::new(fetcher),
        log,
    };
    server::run(addr, state).await
}

fn list_cards(portal: &PortalConfig, credentials: &Credentials) -> Result<Vec<String>> {
    let session = Session::connect(portal, credentials).context("Failed to sign in")?;
    let cards = session.cards().context("Failed to list cards")?;
    if let Err(e) = session.sign_out() {
        tracing::warn!("Sign-out failed: {}", e);
    }
    Ok(cards)
}

fn lookup_usage(config: &ServerConfig, card: String, month: MonthKey) -> Result<UsageResponse> {
    let cache = MonthCache::new(config.cache_dir()?, config.persist_policy)
        .with_log(ServiceLog::open_default()?);
    let fetcher = PortalFetcher::new(config.portal.clone(), config.credentials()?);
    let lines = cache
        .get(&card, month, &fetcher)
        .with_context(|| format!("Failed to load usage for {} in {}", card, month))?;
    Ok(UsageResponse { ccsn: card, lines })
}
