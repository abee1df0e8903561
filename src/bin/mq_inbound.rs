//! MQ inbound connector CLI.
//!
//! # Commands
//!
//! - `check` - Validate configuration and build the TLS context
//! - `replay` - Poll an in-process queue seeded from a file

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mq_inbound::{
    build_tls_context, Config, JsonLinesSink, MemoryBroker, QueueConsumer, Scheduler, VERSION,
};

#[derive(Parser)]
#[command(name = "mq-inbound")]
#[command(version = VERSION)]
#[command(about = "Polling inbound connector for queue-manager message queues", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/mq-inbound/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and TLS material
    Check,

    /// Seed an in-process queue with one message per line and poll it
    Replay {
        /// File with one message body per line
        #[arg(short, long)]
        messages: PathBuf,

        /// Number of ticks to run (default: one per message plus one)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Override the poll interval in milliseconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => cmd_check(&config),
        Commands::Replay {
            messages,
            ticks,
            interval_ms,
            json,
        } => cmd_replay(config, &messages, ticks, interval_ms, json),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let file = path
        .map(Path::to_path_buf)
        .or_else(|| Config::default_path().filter(|p| p.exists()));

    let config = match file {
        Some(file) => Config::from_file(&file)
            .with_context(|| format!("loading {}", file.display()))?
            .apply_env(),
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let conn = &config.connection;
    println!("Queue manager: {} at {}", conn.queue_manager, conn.address());
    println!("Channel:       {}", conn.channel);
    println!("Queue:         {}", conn.queue);
    println!(
        "User:          {}",
        conn.user_id.as_deref().unwrap_or("<none>")
    );

    if conn.ssl_enabled {
        let tls = build_tls_context(&conn.tls).context("building TLS context")?;
        println!(
            "TLS:           {} / {} (FIPS {})",
            tls.protocol(),
            tls.cipher_suite_name(),
            if tls.fips_required() { "on" } else { "off" }
        );
    } else {
        println!("TLS:           disabled");
    }

    match config.injection.sequence.as_deref() {
        Some(seq) => println!("Sequence:      {seq} ({})", config.injection.content_type),
        None => println!("Sequence:      <not set> - received messages will be reported as errors"),
    }
    println!(
        "Poll:          every {} ms, receive wait {} ms",
        config.poll.interval_ms, config.poll.receive_wait_ms
    );

    Ok(())
}

fn cmd_replay(
    config: Config,
    messages: &Path,
    ticks: Option<u64>,
    interval_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let bodies = std::fs::read_to_string(messages)
        .with_context(|| format!("reading {}", messages.display()))?;

    let conn = &config.connection;
    let mut broker = MemoryBroker::new().with_queue(&conn.queue_manager, &conn.queue);
    if let (Some(user), Some(password)) = (&conn.user_id, &conn.password) {
        broker = broker.with_credentials(&conn.queue_manager, user, password);
    }

    let mut seeded: u64 = 0;
    for body in bodies.lines().filter(|l| !l.trim().is_empty()) {
        broker.put(&conn.queue_manager, &conn.queue, body);
        seeded += 1;
    }
    tracing::info!(messages = seeded, queue = %conn.queue, "seeded in-process queue");

    let interval = interval_ms.map_or_else(|| config.poll.interval(), Duration::from_millis);
    let scheduler = Scheduler::new(interval).with_max_ticks(ticks.unwrap_or(seeded + 1));
    let shutdown = scheduler.shutdown_handle();

    let sink = Arc::new(JsonLinesSink::new(io::stdout()));
    let mut consumer = QueueConsumer::new(config, Arc::new(broker), sink);
    let stats = consumer.stats();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.shutdown();
            }
        });
        scheduler.run(&mut consumer).await
    });

    let summary = stats.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!("Ticks:              {}", summary.ticks);
        eprintln!("Connects:           {}", summary.connects);
        eprintln!("Injected:           {}", summary.injected);
        eprintln!("Injection failures: {}", summary.injection_failures);
        eprintln!("Empty polls:        {}", summary.empty_polls);
        eprintln!("Connections broken: {}", summary.connections_broken);
        eprintln!("Receive errors:     {}", summary.receive_errors);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_rejects_zero_interval() {
        let args = ["mq-inbound", "replay", "--messages", "m.txt", "--interval-ms", "0"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["mq-inbound", "replay", "--messages", "m.txt", "--interval-ms", "5"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Replay {
                interval_ms: Some(5),
                ..
            }
        ));
    }
}
