use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use bridge_poll::config::SessionConfig;
use bridge_poll::ports::parse_ports_str;
use bridge_poll::server;
use bridge_poll::session::PollSession;
use bridge_poll::sink::{EventSink, LogSink, StdoutSink};
use bridge_poll::types::Endpoint;

/// bridge-poll: follow the event stream of a local bridge, rediscovering it when it moves.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bridge-poll",
    version,
    about = "Follow the event stream of a local bridge, rediscovering it when it moves.",
    long_about = None
)]
struct Cli {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host the bridge runs on.
    #[arg(long)]
    host: Option<String>,

    /// Candidate ports, e.g. `17620-17625` or `17620,17630`.
    #[arg(long)]
    ports: Option<String>,

    /// Last known good port; probed before the candidate list.
    #[arg(long)]
    port: Option<u16>,

    /// Logical target tag sent with each pull.
    #[arg(long)]
    target: Option<String>,

    /// Cursor to resume from.
    #[arg(long)]
    since: Option<u64>,

    /// Serve the control API on this address (e.g. 127.0.0.1:17700).
    #[arg(long)]
    control: Option<String>,

    /// Do not start polling until asked through the control API.
    #[arg(long = "no-autostart", default_value_t = false)]
    no_autostart: bool,

    /// Where received events go.
    #[arg(long, value_enum, default_value_t = SinkKind::Stdout)]
    sink: SinkKind,

    /// Log level (trace, debug, info, warn, error). RUST_LOG directives still apply.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// One payload per stdout line.
    Stdout,
    /// Info-level log records.
    Log,
}

fn setup_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("unknown log level: {level}"))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<SessionConfig> {
    let mut cfg = match cli.config.as_deref() {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(host) = &cli.host {
        cfg.host = host.clone();
    }
    if let Some(list) = &cli.ports {
        cfg.ports = parse_ports_str(list).context("invalid --ports")?;
    }
    if let Some(port) = cli.port {
        cfg.preferred = Some(Endpoint::new(cfg.host.clone(), port));
    }
    if let Some(target) = &cli.target {
        cfg.target = target.clone();
    }
    if let Some(since) = cli.since {
        cfg.since = since;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;
    let cfg = build_config(&cli)?;

    info!(
        host = %cfg.host,
        ports = ?cfg.ports,
        preferred = ?cfg.preferred.as_ref().map(ToString::to_string),
        target = %cfg.target,
        since = cfg.since,
        "bridge-poll configuration"
    );

    let sink: Arc<dyn EventSink> = match cli.sink {
        SinkKind::Stdout => Arc::new(StdoutSink),
        SinkKind::Log => Arc::new(LogSink),
    };
    let session = Arc::new(PollSession::http(cfg, sink)?);

    if let Some(bind) = cli.control.clone() {
        let control = session.clone();
        tokio::spawn(async move {
            if let Err(e) = server::spawn_server(&bind, control).await {
                warn!(error = %e, "control API error");
            }
        });
    }

    if !cli.no_autostart {
        session.start().await;
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("interrupt received, stopping");
    session.stop().await;
    info!(cursor = session.cursor(), "last cursor");
    Ok(())
}
