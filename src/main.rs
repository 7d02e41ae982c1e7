use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use vuno::{Config, OfflineEngine, Provenance, ReadRequest, ResourceKind, WriteOutcome, WriteRequest};

#[derive(Parser, Debug)]
#[command(name = "vuno")]
#[command(about = "Offline-first sync engine for the Vuno farming assistant")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/vuno/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show connectivity and pending sync state
  Status,
  /// Drain the mutation queue now
  Sync,
  /// Perform a read through the engine
  Get {
    /// Path to read, e.g. /api/market/prices
    path: String,
  },
  /// Perform a write through the engine (queued if offline)
  Send {
    /// Endpoint, e.g. /api/chat/message
    endpoint: String,
    /// JSON payload
    payload: String,
  },
  /// Rule-based offline diagnosis of symptom text
  Diagnose { symptoms: String },
  /// Offline resource estimate for a plot
  Resources {
    crop: String,
    acres: f64,
    /// Single resource to report (seeds, water, fertilizer, labor, cost)
    /// or all of them
    #[arg(default_value = "all")]
    resource: ResourceKind,
  },
  /// Market price snapshot (live, cached, or fallback)
  Prices,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let engine = OfflineEngine::with_http(&config)?;

  match args.command {
    Command::Status => {
      println!("connectivity: {}", engine.connectivity_state());
      println!("pending mutations: {}", engine.pending_count()?);
      let flagged = engine.attention_entries()?;
      if !flagged.is_empty() {
        println!("needs attention:");
        for entry in flagged {
          println!(
            "  #{} {} {} ({} attempts, last error: {})",
            entry.id,
            entry.method,
            entry.endpoint,
            entry.attempts,
            entry.last_error.as_deref().unwrap_or("none"),
          );
        }
      }
    }
    Command::Sync => {
      let report = engine.drain_now().await?;
      println!(
        "synced {} mutations, {} failed, {} still pending",
        report.succeeded.len(),
        report.failed.len(),
        engine.pending_count()?
      );
    }
    Command::Get { path } => {
      let outcome = engine.perform_read(&ReadRequest::get(&path)).await?;
      print_outcome(&outcome.provenance, &outcome.body)?;
    }
    Command::Send { endpoint, payload } => {
      let payload = serde_json::from_str(&payload)?;
      match engine.perform_write(&WriteRequest::post(&endpoint, payload)).await? {
        WriteOutcome::Applied { status, body } => {
          println!("applied (status {})", status);
          println!("{}", serde_json::to_string_pretty(&body)?);
        }
        WriteOutcome::Queued { id } => {
          println!("saved, will sync (queued as #{})", id);
        }
      }
    }
    Command::Diagnose { symptoms } => {
      let diagnosis = engine.diagnose(&symptoms);
      println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    }
    Command::Resources { crop, acres, resource } => {
      let estimate = engine.estimate_resources(&crop, acres, resource);
      println!("{}", serde_json::to_string_pretty(&estimate)?);
    }
    Command::Prices => {
      let outcome = engine
        .perform_read(&ReadRequest::get("/api/market/prices"))
        .await?;
      print_outcome(&outcome.provenance, &outcome.body)?;
    }
  }

  Ok(())
}

fn print_outcome(provenance: &Provenance, body: &serde_json::Value) -> Result<()> {
  let tag = serde_json::to_value(provenance)?;
  println!("source: {}", tag.as_str().unwrap_or("unknown"));
  println!("{}", serde_json::to_string_pretty(body)?);
  Ok(())
}

/// Log to a file so CLI output stays clean; RUST_LOG controls the level.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  use tracing_subscriber::EnvFilter;

  let log_dir = dirs::data_dir()?.join("vuno").join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "vuno.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
