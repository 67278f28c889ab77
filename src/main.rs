//! Entropy Testing CLI
//!
//! Runs a mock noise source against the test channels and writes the raw
//! samples of one channel to a file for offline analysis.

use chrono::Local;
use clap::{Parser, ValueEnum};
use entropy_testing::{
    metrics::MetricsRegistry, CancelFlag, ChannelKind, ChannelSet, MockNoiseSource, NoiseFeeder,
    TestingConfig, TestingError,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Collect raw noise samples for offline statistical testing.
#[derive(Debug, Parser)]
#[command(name = "entropy-testing", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channel to read.
    #[arg(long, value_enum, default_value_t = ChannelArg::RawEntropy)]
    channel: ChannelArg,

    /// Number of bytes to collect.
    #[arg(short, long, default_value_t = 4096)]
    bytes: usize,

    /// Output file (defaults to a timestamped name in the current directory).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Arm one-shot boot collection on the selected channel.
    #[arg(long)]
    boot: bool,

    /// Ring capacity in samples (power of two).
    #[arg(long)]
    capacity: Option<usize>,

    /// Delay between noise events in microseconds.
    #[arg(long, default_value_t = 100)]
    rate_us: u64,

    /// Seed for a reproducible mock source.
    #[arg(long)]
    seed: Option<u64>,

    /// Serve Prometheus metrics on this port (requires the `metrics` feature).
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Print channel metrics in Prometheus text format when done.
    #[arg(long)]
    print_metrics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    RawEntropy,
    RawArray,
    IrqPerf,
}

impl From<ChannelArg> for ChannelKind {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::RawEntropy => ChannelKind::RawEntropy,
            ChannelArg::RawArray => ChannelKind::RawArray,
            ChannelArg::IrqPerf => ChannelKind::IrqPerf,
        }
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Entropy Testing v{}", entropy_testing::VERSION);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<TestingConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TestingConfig::from_file(path)?,
        None => TestingConfig::default(),
    };

    if let Some(capacity) = cli.capacity {
        config.channels.capacity = capacity;
    }
    if let Some(port) = cli.metrics_port {
        config.output.metrics_port = port;
    }
    if cli.boot {
        match ChannelKind::from(cli.channel) {
            ChannelKind::RawEntropy => config.boot.raw_entropy = 1,
            ChannelKind::RawArray => config.boot.raw_array = 1,
            ChannelKind::IrqPerf => config.boot.irq_perf = 1,
        }
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let kind = ChannelKind::from(cli.channel);
    let channels = Arc::new(ChannelSet::new(&config)?);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.raise())?;
    }

    if config.output.metrics_port != 0 {
        spawn_metrics_server(config.output.metrics_port, Arc::clone(&channels))?;
    }

    let source = match cli.seed {
        Some(seed) => MockNoiseSource::with_seed(seed),
        None => MockNoiseSource::new(),
    };
    info!("This is a demonstration using a mock noise source");
    let feeder = NoiseFeeder::spawn(
        source,
        Arc::clone(&channels),
        Duration::from_micros(cli.rate_us),
    )?;

    let path = cli.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}-{}.bin",
            kind.name(),
            Local::now().format("%Y%m%dT%H%M%S")
        ))
    });
    let mut out = BufWriter::new(File::create(&path)?);

    info!(channel = %kind, bytes = cli.bytes, path = %path.display(), "Collecting samples");
    let started = Instant::now();
    let mut reader = channels.open(kind);
    let result = reader.read_into(cli.bytes, &mut out, &cancel);
    out.flush()?;

    let fed = feeder.stop();

    match result {
        Ok(n) => {
            info!(
                bytes = n,
                samples = n / 4,
                elapsed_ms = started.elapsed().as_millis() as u64,
                path = %path.display(),
                "Collection finished"
            );
            if n < cli.bytes {
                warn!(
                    requested = cli.bytes,
                    collected = n,
                    "Stream ended early (boot collection closed or interrupted)"
                );
            }
        }
        Err(TestingError::Interrupted) => {
            warn!("Interrupted before any data was collected");
        }
        Err(e) => return Err(e.into()),
    }

    let stats = channels.channel(kind).stats();
    info!(
        source_samples = fed.samples,
        accepted = stats.accepted,
        rejected = stats.rejected,
        overwritten = stats.overwritten,
        boot_mode = %stats.boot_mode,
        "Channel summary"
    );

    if cli.print_metrics {
        let registry = MetricsRegistry::new()?;
        registry.update(&channels.stats());
        print!("{}", registry.encode()?);
    }

    Ok(())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(
    port: u16,
    channels: Arc<ChannelSet>,
) -> Result<(), Box<dyn std::error::Error>> {
    use entropy_testing::metrics::{MetricsServer, MetricsServerConfig};

    let registry = MetricsRegistry::new()?;
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry, channels);

    std::thread::Builder::new()
        .name("metrics".into())
        .spawn(move || match tokio::runtime::Runtime::new() {
            Ok(runtime) => {
                if let Err(e) = runtime.block_on(server.run()) {
                    warn!("Metrics server stopped: {}", e);
                }
            }
            Err(e) => warn!("Failed to start metrics runtime: {}", e),
        })?;
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(
    port: u16,
    _channels: Arc<ChannelSet>,
) -> Result<(), Box<dyn std::error::Error>> {
    warn!(port, "Metrics port ignored: built without the `metrics` feature");
    Ok(())
}
