use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use baton_config::ManifestDef;
use baton_engine::{Engine, EngineConfig, Listener};
use baton_flow::Input;
use baton_listener_http::HttpListener;
use baton_protocol::Callers;
use baton_protocol_http::HttpCaller;
use baton_resolver::{Resolver, StandardResolver};

/// Baton - orchestrates backend calls into flows
#[derive(Parser)]
#[command(name = "baton")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log filter directives
  #[arg(long, global = true, env = "RUST_LOG", default_value = "baton=info")]
  log: String,

  /// Upper bound applied to every backend call, in milliseconds
  #[arg(long, global = true, env = "BATON_CALL_TIMEOUT_MS")]
  call_timeout_ms: Option<u64>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a single flow with the payload read from stdin
  Run {
    /// Path to the manifest file (JSON)
    manifest: PathBuf,

    /// Name of the flow or proxy to invoke
    #[arg(long)]
    flow: String,
  },

  /// Serve every flow over HTTP until interrupted
  Serve {
    /// Path to the manifest file (JSON)
    manifest: PathBuf,

    /// Address to listen on
    #[arg(long, env = "BATON_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_new(&cli.log).context("invalid log filter")?)
    .with_writer(io::stderr)
    .init();

  let call_timeout = cli.call_timeout_ms.map(Duration::from_millis);

  match cli.command {
    Some(Commands::Run { manifest, flow }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_flow(&manifest, &flow, call_timeout).await })
    }
    Some(Commands::Serve { manifest, listen }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { serve(&manifest, listen, call_timeout).await })
    }
    None => {
      println!("baton - use --help to see available commands");
      Ok(())
    }
  }
}

async fn run_flow(manifest: &Path, flow: &str, call_timeout: Option<Duration>) -> Result<()> {
  let payload = read_payload_from_stdin()?;
  let engine = load_engine(manifest, Vec::new(), call_timeout).await?;

  let Some(manager) = engine.endpoint(flow) else {
    engine.close().await;
    bail!("flow '{flow}' is not available");
  };

  let result = manager.invoke(Input::new(payload)).await;
  engine.close().await;

  let output = result.with_context(|| format!("flow '{flow}' failed"))?;
  match output.json() {
    Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
    Err(_) => println!("{}", String::from_utf8_lossy(&output.body)),
  }

  Ok(())
}

async fn serve(manifest: &Path, listen: String, call_timeout: Option<Duration>) -> Result<()> {
  let listener: Arc<dyn Listener> = Arc::new(HttpListener::new(listen));
  let engine = load_engine(manifest, vec![listener], call_timeout).await?;

  let serving = engine.serve();
  tokio::pin!(serving);

  tokio::select! {
    result = &mut serving => {
      engine.close().await;
      return result.context("listener failed");
    }
    _ = tokio::signal::ctrl_c() => {
      info!("shutdown requested");
    }
  }

  engine.close().await;
  serving.await.context("listener failed")
}

async fn load_engine(
  manifest: &Path,
  listeners: Vec<Arc<dyn Listener>>,
  call_timeout: Option<Duration>,
) -> Result<Engine> {
  let content = tokio::fs::read(manifest)
    .await
    .with_context(|| format!("failed to read manifest file: {}", manifest.display()))?;

  let def = ManifestDef::from_slice(&content)
    .with_context(|| format!("failed to parse manifest file: {}", manifest.display()))?;

  let functions = baton_functions::standard();
  let resolved = StandardResolver::new(functions.clone())
    .resolve(def)
    .context("failed to resolve manifest")?;

  info!(
    flows = resolved.flows.len(),
    proxies = resolved.proxies.len(),
    "resolved manifest"
  );

  let config = EngineConfig {
    callers: Callers::new().with(Arc::new(HttpCaller::new())),
    functions,
    listeners,
    call_timeout,
  };

  Engine::new(resolved, config).context("failed to create engine")
}

fn read_payload_from_stdin() -> Result<Vec<u8>> {
  if io::stdin().is_terminal() {
    return Ok(b"{}".to_vec());
  }

  let mut input = Vec::new();
  io::stdin()
    .read_to_end(&mut input)
    .context("failed to read payload from stdin")?;
  Ok(input)
}
