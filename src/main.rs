//! Synheart Synchrony CLI
//!
//! Cross-subject heart-rate synchrony engine over OSC.

use clap::{Parser, Subcommand};
use std::time::Duration;
use synheart_synchrony::{
    config::{Config, Destination},
    service, stats, Metric, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-synchrony")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Cross-subject heart-rate synchrony engine over OSC", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive samples and emit synchrony spectra
    Start {
        /// Host to receive samples on
        #[arg(long)]
        listen: Option<String>,

        /// Port to receive samples on
        #[arg(long)]
        port: Option<u16>,

        /// Destination for similarity messages (host:port, repeatable)
        #[arg(long = "dest")]
        destinations: Vec<String>,

        /// First address segment of inbound and outbound messages
        #[arg(long)]
        namespace: Option<String>,

        /// Maximum number of subjects tracked
        #[arg(long)]
        max_subjects: Option<usize>,

        /// Ticks of history kept per subject
        #[arg(long)]
        window: Option<usize>,

        /// Interval between computations in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// EMA smoothing factor in (0, 1]
        #[arg(long)]
        alpha: Option<f64>,

        /// Window raw samples instead of baseline-centered ones
        #[arg(long)]
        raw: bool,
    },

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Start {
            listen,
            port,
            destinations,
            namespace,
            max_subjects,
            window,
            interval_ms,
            alpha,
            raw,
        } => {
            let overrides = Overrides {
                listen,
                port,
                destinations,
                namespace,
                max_subjects,
                window,
                interval_ms,
                alpha,
                raw,
            };
            cmd_start(overrides).await;
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::InitConfig { force } => {
            cmd_init_config(force);
        }
    }
}

/// Command-line values that take precedence over the configuration file.
struct Overrides {
    listen: Option<String>,
    port: Option<u16>,
    destinations: Vec<String>,
    namespace: Option<String>,
    max_subjects: Option<usize>,
    window: Option<usize>,
    interval_ms: Option<u64>,
    alpha: Option<f64>,
    raw: bool,
}

impl Overrides {
    fn apply(self, mut config: Config) -> Result<Config, synheart_synchrony::ConfigError> {
        if let Some(listen) = self.listen {
            config.listen_host = listen;
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if !self.destinations.is_empty() {
            config.destinations = self
                .destinations
                .iter()
                .map(|d| Destination::parse(d))
                .collect::<Result<_, _>>()?;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(max_subjects) = self.max_subjects {
            config.max_subjects = max_subjects;
        }
        if let Some(window) = self.window {
            config.window_depth = window;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.tick_interval = Duration::from_millis(interval_ms);
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if self.raw {
            config.centered = false;
        }
        Ok(config)
    }
}

async fn cmd_start(overrides: Overrides) {
    println!("Synheart Synchrony v{VERSION}");
    println!();

    let config = match Config::load().and_then(|c| overrides.apply(c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    println!("Starting engine...");
    println!("  Listening: {}", config.listen_addr());
    for destination in &config.destinations {
        println!("  Destination: {destination}");
    }
    println!(
        "  Metrics: {}",
        Metric::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Max subjects: {}", config.max_subjects);
    println!("  Window depth: {} ticks", config.window_depth);
    println!("  Tick interval: {}ms", config.tick_interval.as_millis());
    println!(
        "  Baseline: {}",
        if config.centered {
            format!("centered (alpha {})", config.alpha)
        } else {
            "raw".to_string()
        }
    );
    println!();

    let stats = stats::create_shared_stats();
    let handle = match service::run(config, stats.clone()).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting engine: {e:#}");
            std::process::exit(1);
        }
    };

    println!("Press Ctrl+C to stop");
    println!();

    wait_for_ctrlc().await;

    println!();
    println!("Stopping engine...");
    handle.shutdown().await;

    println!();
    println!("{}", stats.summary());
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_init_config(force: bool) {
    let path = Config::config_path();
    if path.exists() && !force {
        eprintln!("Config file already exists at {path:?} (use --force to overwrite)");
        std::process::exit(1);
    }
    match Config::default().save() {
        Ok(path) => println!("Wrote default configuration to {path:?}"),
        Err(e) => {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
    }
}

/// Wait for Ctrl+C.
///
/// The handler runs on its own thread; the signal is forwarded through a
/// channel and awaited off the async runtime.
async fn wait_for_ctrlc() {
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .expect("Error setting Ctrl+C handler");

    if let Err(e) = tokio::task::spawn_blocking(move || rx.recv()).await {
        tracing::error!("Ctrl+C listener failed: {}", e);
    }
}
