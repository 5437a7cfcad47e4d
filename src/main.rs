//! minicluster - boot a local multi-process cluster.
//!
//! - `minicluster up`: build a cluster, start it and keep it running until
//!   Ctrl-C
//! - `minicluster exec` (hidden): the role entry point every spawned process
//!   goes through
//!
//! See `minicluster --help` for full usage information.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::Level;

use minicluster::logging::{init_logging, LogConfig, LogFormat};
use minicluster::process::entry;
use minicluster::utils::{format_bytes, parse_size};
use minicluster::{ClusterConfig, MiniCluster};

const AFTER_HELP: &str = "\
EXAMPLES:
  minicluster up --dir /tmp/cluster                 Two workers, default settings
  minicluster up --dir /tmp/cluster --workers 4     Four workers
  minicluster up --config cluster.toml              Settings from a TOML file

Role executables (coordination-service, initializer, worker, coordinator) are
looked up on MINICLUSTER_CLASSPATH.";

#[derive(Parser)]
#[command(name = "minicluster")]
#[command(version)]
#[command(about = "Boot a local multi-process cluster for integration testing")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Diagnostic log format: pretty, json or compact
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster and keep it running until Ctrl-C
    ///
    /// Examples:
    ///   minicluster up --dir /tmp/cluster
    ///   minicluster up --config cluster.toml --workers 3
    Up {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Working directory (must be absent or empty)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Instance name passed to the initializer
        #[arg(long)]
        instance_name: Option<String>,
        /// Root credential passed to the initializer
        #[arg(long)]
        root_password: Option<String>,
        /// Number of worker processes
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Run a role executable found on the class path (internal)
    #[command(hide = true)]
    Exec {
        /// Directories searched for the entry, path-separator delimited
        #[arg(long)]
        class_path: OsString,
        /// Data segment bound, e.g. 128m
        #[arg(long)]
        max_heap: Option<String>,
        /// Role executable name
        entry: String,
        /// Arguments passed to the role
        #[arg(last = true)]
        args: Vec<OsString>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_logging(&LogConfig::default().level(level).format(cli.log_format));

    match cli.command {
        Commands::Up {
            config,
            dir,
            instance_name,
            root_password,
            workers,
        } => {
            let config = build_config(config, dir, instance_name, root_password, workers)?;
            up(config).await?;
        },
        Commands::Exec {
            class_path,
            max_heap,
            entry,
            args,
        } => {
            let max_heap = match max_heap {
                Some(size) => match parse_size(&size) {
                    Some(bytes) => Some(bytes),
                    None => bail!("invalid max heap '{size}' (expected e.g. 128m)"),
                },
                None => None,
            };
            entry::exec_entry(&class_path, max_heap, &entry, &args)
                .with_context(|| format!("Failed to run entry '{entry}'"))?;
        },
    }

    Ok(())
}

fn build_config(
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    instance_name: Option<String>,
    root_password: Option<String>,
    workers: Option<usize>,
) -> Result<ClusterConfig> {
    let mut config = match (file, dir) {
        (Some(file), dir) => {
            let mut config = ClusterConfig::load_from(&file)
                .with_context(|| format!("Failed to load config: {}", file.display()))?;
            if let Some(dir) = dir {
                config.dir = dir;
            }
            config
        },
        (None, Some(dir)) => ClusterConfig::new(dir, "test", "secret"),
        (None, None) => bail!("either --config or --dir is required"),
    };

    if let Some(name) = instance_name {
        config.instance_name = name;
    }
    if let Some(password) = root_password {
        config.root_password = password;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }
    Ok(config)
}

async fn up(config: ClusterConfig) -> Result<()> {
    let dir = config.dir.clone();
    let mut cluster = MiniCluster::new(config)
        .with_context(|| format!("Failed to prepare cluster in {}", dir.display()))?;

    if let Err(e) = cluster.start().await {
        cluster.stop();
        return Err(e).context("Failed to start cluster");
    }

    print_processes(&cluster);
    println!("\nPress Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    cluster.stop();
    println!("Cluster stopped. Logs kept in {}", cluster.log_dir().display());
    Ok(())
}

fn print_processes(cluster: &MiniCluster) {
    let heap = parse_size(&cluster.config().max_heap).map_or_else(
        || cluster.config().max_heap.clone(),
        format_bytes,
    );

    println!(
        "Cluster '{}' running (max heap per role: {heap})\n",
        cluster.instance_name()
    );
    println!("{:<22} {:>8}  LOG", "ROLE", "PID");
    for process in cluster.processes() {
        println!(
            "{:<22} {:>8}  {}",
            process.role,
            process.pid,
            process.stdout_log.display()
        );
    }
}
