//! cpme: permutation matrix file encryption
//!
//! Usage:
//!   cpme <FILE> -e [-k KEY] [-D DIM] [-s] [-i INSTRUCTIONS.toml] [-o NAME] [-t N] [-x] [-v]
//!   cpme <FILE> -d [-k KEY] [-D DIM] [-s] [-i INSTRUCTIONS.toml] [-o NAME] [-t N] [-x] [-v]
//!
//! Decrypt with the same instruction list used to encrypt; it is applied in
//! reverse order. Fatal errors are appended to the fatal log before exiting.

mod instructions;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use cpme_core::naming::output_path;
use cpme_core::{CpmeConfig, Direction, LogConfig};
use cpme_engine::{append_fatal, CipherJob, ProgressFn};

use crate::instructions::FirstInstruction;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cpme",
    version,
    about = "Permutation matrix file encryption",
    long_about = "cpme: encrypt or decrypt a file by layering key-derived permutation matrices \
                  over its bytes",
    group(ArgGroup::new("direction").required(true).args(["encrypt", "decrypt"]))
)]
struct Cli {
    /// File to encrypt or decrypt
    file: PathBuf,

    /// Encrypt FILE into FILE.fbz
    #[arg(short = 'e', long)]
    encrypt: bool,

    /// Decrypt FILE.fbz into d_FILE
    #[arg(short = 'd', long)]
    decrypt: bool,

    /// Key for the first instruction (prompted without echo when omitted)
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Matrix dimension for the first instruction (0 = variable)
    #[arg(short = 'D', long, default_value_t = 0)]
    dimension: usize,

    /// Skip the per-chunk integrity check for the first instruction
    #[arg(short = 's', long = "skip-check")]
    skip_check: bool,

    /// TOML file with further `[[instruction]]` entries
    #[arg(short = 'i', long = "instructions")]
    instructions: Option<PathBuf>,

    /// Output file name (placed next to FILE)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Worker threads (overrides config; 0 = all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Delete FILE after the output has been written
    #[arg(short = 'x', long = "delete")]
    delete: bool,

    /// Print the instruction list (keys redacted) before running
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Path to cpme.toml configuration file
    #[arg(long, short = 'c', env = "CPME_CONFIG", default_value = "cpme.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "CPME_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides config
    #[arg(long, env = "CPME_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

impl Cli {
    fn direction(&self) -> Direction {
        if self.encrypt {
            Direction::Encrypt
        } else {
            Direction::Decrypt
        }
    }
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let mut config = load_config(&cli.config, &LogConfig::default().fatal_log)?;
    if let Some(threads) = cli.threads {
        config.cipher.threads = threads;
    }

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or_else(|| {
        LogFormat::from_str(&config.log.format, true).unwrap_or(LogFormat::Text)
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %cli.file.display(),
        direction = %cli.direction(),
        "cpme starting"
    );

    if let Err(e) = run(&mut cli, &config) {
        error!("{e:#}");
        record_fatal(&config.log.fatal_log, &e);
        return Err(e);
    }
    Ok(())
}

/// Load the config file; a failure is recorded in `fatal_log`.
fn load_config(path: &Path, fatal_log: &Path) -> Result<CpmeConfig> {
    CpmeConfig::load_or_default(path)
        .with_context(|| format!("loading config {}", path.display()))
        .inspect_err(|e| record_fatal(fatal_log, e))
}

fn record_fatal(log: &Path, err: &anyhow::Error) {
    if let Err(log_err) = append_fatal(log, &format!("{err:#}")) {
        warn!(log = %log.display(), "could not write fatal log: {log_err}");
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── encrypt / decrypt ─────────────────────────────────────────────────────────

fn run(cli: &mut Cli, config: &CpmeConfig) -> Result<()> {
    let started = Instant::now();
    let direction = cli.direction();

    let metadata = std::fs::metadata(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("not a regular file: {}", cli.file.display());
    }
    let file_len = metadata.len();
    let out = output_path(&cli.file, cli.output.as_deref(), direction)?;

    let first = FirstInstruction {
        dimension: cli.dimension,
        key: cli.key.take(),
        integrity_check: !cli.skip_check,
    };
    let list = instructions::collect(
        first,
        cli.instructions.as_deref(),
        instructions::prompt_key,
    )?;

    if cli.verbose {
        println!("Instructions ({direction}):");
        for (n, instruction) in list.iter().enumerate() {
            println!("  {}. {instruction}", n + 1);
        }
        println!();
    }

    let mut job = CipherJob::create(&cli.file, file_len, &config.cipher)
        .with_context(|| format!("preparing {}", cli.file.display()))?;
    job.set_instructions(list)?;

    let pb = make_progress_bar(file_len, &direction.to_string());
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |done, total, msg| {
        pb_clone.set_length(total);
        pb_clone.set_position(done);
        pb_clone.set_message(msg.to_string());
    });
    job.set_progress_fn(progress);

    let result = job.run(direction);
    match &result {
        Ok(()) => pb.finish_with_message("done".to_string()),
        Err(_) => pb.abandon_with_message("failed".to_string()),
    }
    result.with_context(|| format!("{direction} {}", cli.file.display()))?;

    job.write_output(&out)
        .with_context(|| format!("writing {}", out.display()))?;
    job.close();

    if cli.delete {
        std::fs::remove_file(&cli.file)
            .with_context(|| format!("deleting input {}", cli.file.display()))?;
        info!(file = %cli.file.display(), "deleted input");
    }

    let elapsed = started.elapsed();
    println!("{direction} complete:");
    println!("  output:  {}", out.display());
    println!("  bytes:   {}", fmt_bytes(file_len));
    println!("  time:    {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(prefix.to_string());
    pb
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
