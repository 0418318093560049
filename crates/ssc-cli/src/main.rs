//! `ssc` — command-line client for the shelter severity framework server.
//!
//! # Usage
//!
//! ```text
//! ssc --url http://localhost:8080 versions
//! ssc draft "2025 revision" --from-catalogue
//! ssc tree 6f1c…
//! ssc --config ~/.config/ssc/config.toml active
//! ```

mod client;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, DraftSource};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ssc", about = "Manage shelter severity framework versions")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the ssc server (default: http://localhost:8080).
  #[arg(long, env = "SSC_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List catalogue pillars.
  Pillars,
  /// List framework versions, newest first.
  Versions,
  /// Print the tree of a version.
  Tree { version_id: Uuid },
  /// Create a draft version (blank unless a source is given).
  Draft {
    name:           String,
    /// Copy every catalogue entry into the draft.
    #[arg(long, conflicts_with = "clone")]
    from_catalogue: bool,
    /// Copy the members of an existing version.
    #[arg(long, value_name = "VERSION_ID")]
    clone:          Option<Uuid>,
  },
  /// Publish a draft.
  Publish { version_id: Uuid },
  /// Make a published version the active one.
  Activate { version_id: Uuid },
  /// Delete a draft.
  Delete { version_id: Uuid },
  /// Show the active version.
  Active,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
  };
  tracing::debug!(base_url = %api_config.base_url, "using server");

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Pillars => {
      for pillar in client.list_pillars().await? {
        println!("{}  {}", pillar.pillar_id, pillar.name);
      }
    }
    Command::Versions => {
      for version in client.list_versions().await? {
        println!("{}", render::version_line(&version));
      }
    }
    Command::Tree { version_id } => {
      print!("{}", render::tree(&client.tree(version_id).await?));
    }
    Command::Draft { name, from_catalogue, clone } => {
      let source = match (from_catalogue, clone) {
        (_, Some(id)) => DraftSource::Clone(id),
        (true, None) => DraftSource::Catalogue,
        (false, None) => DraftSource::Blank,
      };
      let version = client.create_draft(&name, source).await?;
      println!("{}", render::version_line(&version));
    }
    Command::Publish { version_id } => {
      let version = client.publish(version_id).await?;
      println!("{}", render::version_line(&version));
    }
    Command::Activate { version_id } => {
      let active = client.activate(version_id).await?;
      println!("{} active since {}", active.version_id, active.activated_at);
    }
    Command::Delete { version_id } => {
      client.delete(version_id).await?;
      println!("deleted {version_id}");
    }
    Command::Active => match client.active().await? {
      Some(version) => println!("{}", render::version_line(&version)),
      None => println!("no version is active"),
    },
  }
  Ok(())
}
