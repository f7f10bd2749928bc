use clap::{Parser, Subcommand};
use futures::StreamExt;
use lokiq::{DisplayMode, ExecutionMode, LokiDatasource, RawQuery, TimeRange};
use lokiq_core::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lokiq", about = "Query and live-tail a Loki-style log backend")]
struct Cli {
    /// Write debug logs to /tmp/lokiq-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    /// Config file to read instead of ~/.config/lokiq/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config file.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Row cap, overriding the config file.
    #[arg(long, global = true)]
    max_lines: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one or more queries once and print the merged result as JSON.
    Query {
        /// Expressions such as '{job="api"} timeout'.
        #[arg(required = true)]
        exprs: Vec<String>,
        #[arg(long, default_value = "now-1h")]
        from: String,
        #[arg(long, default_value = "now")]
        to: String,
        /// Print per-label-set count series instead of rows.
        #[arg(long)]
        series: bool,
        /// Series bucket width.
        #[arg(long, default_value_t = 60_000)]
        interval_ms: u64,
    },
    /// Poll the trailing window until interrupted, one JSON frame per line.
    Tail {
        #[arg(required = true)]
        exprs: Vec<String>,
    },
    /// Check connectivity and list label names.
    Labels,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/lokiq-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("lokiq debug log started; tail -f /tmp/lokiq-debug.log");
    }

    let mut config = match cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.url {
        config.datasource.url = url;
    }
    if let Some(max_lines) = cli.max_lines {
        anyhow::ensure!(max_lines > 0, "--max-lines must be positive");
        config.datasource.max_lines = max_lines;
    }
    let datasource = LokiDatasource::new(config);

    match cli.command {
        Command::Query {
            exprs,
            from,
            to,
            series,
            interval_ms,
        } => {
            let display = if series { DisplayMode::TimeSeries } else { DisplayMode::Logs };
            let targets = to_targets(exprs, display);
            let range = TimeRange::new(from, to);
            match datasource.query(&targets, &range, interval_ms, display).await {
                Ok(response) => println!("{}", serde_json::to_string(&response)?),
                Err(err) => {
                    println!("{}", serde_json::to_string(&err)?);
                    anyhow::bail!(err.message);
                }
            }
        }
        Command::Tail { exprs } => {
            let targets = to_targets(exprs, DisplayMode::Logs);
            let mut feed = datasource.stream(
                targets,
                TimeRange::last("1s"),
                1_000,
                DisplayMode::Logs,
                ExecutionMode::Live,
            );
            let token = feed.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });
            while let Some(frame) = feed.next().await {
                println!("{}", serde_json::to_string(&frame)?);
            }
        }
        Command::Labels => {
            let status = datasource.check_connection().await;
            println!("{}", serde_json::to_string(&status)?);
            if let Ok(labels) = datasource.label_names().await {
                for label in labels {
                    println!("{label}");
                }
            }
        }
    }

    Ok(())
}

fn to_targets(exprs: Vec<String>, display: DisplayMode) -> Vec<RawQuery> {
    exprs
        .into_iter()
        .enumerate()
        .map(|(i, expr)| RawQuery::new(target_id(i), expr).display_mode(display))
        .collect()
}

/// `A`, `B`, … `Z`, `AA`, …
fn target_id(mut i: usize) -> String {
    let mut id = Vec::new();
    loop {
        id.push(b'A' + (i % 26) as u8);
        if i < 26 {
            break;
        }
        i = i / 26 - 1;
    }
    id.reverse();
    String::from_utf8_lossy(&id).into_owned()
}
