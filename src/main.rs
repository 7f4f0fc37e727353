mod cache;
mod config;
mod store;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use cache::{CacheError, ChangeNotifier, JsonAdapter, JsonResource, StagedCache};
use store::{HttpStore, StoreError};

#[derive(Parser, Debug)]
#[command(name = "fgcache")]
#[command(about = "Staged cache client for flowsim resource servers")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fgcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Server base URL, overriding the config file
  #[arg(short, long)]
  server: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the names known for a resource type
  Ls { type_key: String },
  /// Print a resource as JSON
  Cat { type_key: String, name: String },
  /// Create or replace a resource from a JSON file (stdin when omitted)
  Put {
    type_key: String,
    name: String,
    file: Option<PathBuf>,
  },
  /// Delete a resource
  Rm { type_key: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // A --server override is a complete configuration on its own.
  let config = match args.server {
    Some(url) => config::Config {
      server: config::ServerConfig { url },
    },
    None => config::Config::load(args.config.as_deref())?,
  };

  let base = Url::parse(&config.server.url)
    .map_err(|e| eyre!("Invalid server url {}: {}", config.server.url, e))?;
  let store = Arc::new(HttpStore::new(base, config::Config::api_token()));

  let notifier = ChangeNotifier::new();
  let cache = StagedCache::new(store, notifier.clone());

  // Stand-in for the UI listener: surface cache signals in the logs.
  let mut signals = notifier.subscribe();
  tokio::spawn(async move {
    while let Ok(signal) = signals.recv().await {
      tracing::debug!(?signal, "cache signal");
    }
  });

  match args.command {
    Command::Ls { type_key } => {
      for name in cache.get_names(&type_key).await {
        println!("{name}");
      }
    }

    Command::Cat { type_key, name } => {
      let object = cache.get(&type_key, &name, &JsonAdapter).await?;
      let locked = object.lock();
      tracing::debug!(name = locked.name(), dirty = locked.dirty(), "resource fetched");
      let resource = locked
        .as_any()
        .downcast_ref::<JsonResource>()
        .ok_or_else(|| eyre!("unexpected resource form for {}/{}", type_key, name))?;
      println!("{}", serde_json::to_string_pretty(&resource.data)?);
    }

    Command::Put {
      type_key,
      name,
      file,
    } => {
      let text = match file {
        Some(path) => std::fs::read_to_string(&path)
          .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?,
        None => {
          let mut buffer = String::new();
          std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| eyre!("Failed to read stdin: {}", e))?;
          buffer
        }
      };
      let payload: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| eyre!("Invalid JSON payload: {}", e))?;

      match cache.get(&type_key, &name, &JsonAdapter).await {
        Ok(object) => {
          let mut locked = object.lock();
          let resource = locked
            .as_any_mut()
            .downcast_mut::<JsonResource>()
            .ok_or_else(|| eyre!("unexpected resource form for {}/{}", type_key, name))?;
          resource.data = payload;
          locked.set_dirty(true);
        }
        Err(CacheError::Store(StoreError::NotFound { .. })) => {
          cache.create(&type_key, &name, &JsonAdapter, payload)?;
        }
        Err(err) => return Err(err.into()),
      }

      finish_session(&cache).await?;
    }

    Command::Rm { type_key, name } => {
      cache.destroy(&type_key, &name);
      finish_session(&cache).await?;
    }
  }

  Ok(())
}

/// Flush the session, report per-entry outcomes, and discard staged state.
async fn finish_session(cache: &StagedCache) -> Result<()> {
  let report = cache.save().await;
  for outcome in &report.outcomes {
    match &outcome.result {
      Ok(()) => println!("{} {}/{}: ok", outcome.op, outcome.type_key, outcome.name),
      Err(err) => eprintln!("{} {}/{}: {}", outcome.op, outcome.type_key, outcome.name, err),
    }
  }

  let clean = report.is_clean();
  let failed = report.failures().count();
  if cache.is_dirty() {
    tracing::warn!("session still has unsaved work after save");
  }
  cache.clear();

  if clean {
    Ok(())
  } else {
    Err(eyre!(
      "{} of {} staged entries failed to save",
      failed,
      report.outcomes.len()
    ))
  }
}
