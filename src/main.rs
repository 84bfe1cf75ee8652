use clap::{Parser, Subcommand};
use color_eyre::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use dnsdash::api::{self, CachedDashboardClient, LogsQuery};
use dnsdash::cache::Cached;
use dnsdash::config::Config;
use dnsdash::event::{Event, EventHandler};
use dnsdash::logging;
use dnsdash::query::Query;
use dnsdash::retry::{self, RetryPolicy};
use dnsdash::status::{self, ConnectionStatus};

#[derive(Parser, Debug)]
#[command(name = "dnsdash")]
#[command(about = "Offline-tolerant client for a DNS query log dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dnsdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Check API health
  Health {
    /// Include host resources and server details
    #[arg(long)]
    detailed: bool,
  },
  /// Show record statistics
  Stats,
  /// Fetch a page of DNS query logs
  Logs {
    #[arg(long, default_value_t = 1000)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u64,
    /// Domain to leave out (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
  },
  /// Inspect or reset the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
  /// Poll the API and report connection status changes
  Watch {
    /// Seconds between polls
    #[arg(long, default_value_t = 30)]
    interval: u64,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Entry count, size and age range
  Stats,
  /// Delete every cached entry
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Health { detailed } => {
      let client = CachedDashboardClient::new(&config)?;
      if detailed {
        print_cached(&client.health_detailed().await?)?;
      } else {
        print_cached(&client.health().await?)?;
      }
    }
    Command::Stats => {
      let client = CachedDashboardClient::new(&config)?;
      print_cached(&client.stats().await?)?;
    }
    Command::Logs {
      limit,
      offset,
      exclude,
    } => {
      let client = CachedDashboardClient::new(&config)?;
      let query = LogsQuery {
        exclude,
        limit,
        offset,
      };
      print_cached(&client.logs(&query).await?)?;
    }
    Command::Cache { action } => {
      let store = api::open_store(&config)?;
      match action {
        CacheAction::Stats => println!("{}", serde_json::to_string_pretty(&store.stats())?),
        CacheAction::Clear => {
          store.clear();
          println!("cache cleared");
        }
      }
    }
    Command::Watch { interval } => {
      let client = CachedDashboardClient::new(&config)?;
      watch(client, Duration::from_secs(interval.max(1))).await?;
    }
  }

  Ok(())
}

fn print_cached<T: Serialize>(result: &Cached<T>) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(&result.data)?);
  if result.is_offline() {
    eprintln!(
      "(offline: showing data cached at {})",
      result.metadata.last_updated.to_rfc3339()
    );
  }
  Ok(())
}

async fn watch(client: CachedDashboardClient, interval: Duration) -> Result<()> {
  // Live health drives the indicator, so it bypasses the stale fallback
  let api = client.inner().clone();
  let mut health = Query::new(move || {
    let api = api.clone();
    async move {
      let health = retry::run(&RetryPolicy::critical(), || api.health())
        .await
        .map_err(|e| e.to_string())?;
      if health.healthy {
        Ok(health)
      } else {
        Err(format!("backend reports {}", health.status))
      }
    }
  })
  .with_stale_time(interval);

  let stats_client = client.clone();
  let mut stats = Query::new(move || {
    let client = stats_client.clone();
    async move { client.stats().await.map_err(|e| e.to_string()) }
  })
  .with_stale_time(interval);

  let mut events = EventHandler::new(Duration::from_millis(250));
  let mut last: Option<ConnectionStatus> = None;

  while let Some(event) = events.next().await {
    match event {
      Event::Shutdown => break,
      Event::Tick => {
        health.poll();
        stats.poll();
        if health.is_stale() {
          health.fetch();
        }
        if stats.is_stale() {
          stats.fetch();
        }

        let current = status::aggregate(&[health.snapshot(), stats.snapshot()]);
        if last != Some(current) {
          info!(
            status = current.label(),
            retries = current.total_retries,
            "connection status changed"
          );
          let offline_stats = stats.data().is_some_and(Cached::is_offline);
          println!(
            "{} {}{} (retries: {})",
            chrono::Local::now().format("%H:%M:%S"),
            current.label(),
            if offline_stats { ", stats from cache" } else { "" },
            current.total_retries
          );
          last = Some(current);
        }
      }
    }
  }

  Ok(())
}
