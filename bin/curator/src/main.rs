//! Curator command line.
//!
//! `config` prints the resolved configuration; `demo` drives the dashboard
//! services against an in-memory backend with injected failures.

mod demo;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use curator_config::{Config, LogSettings};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(about = "Content curation services: retrying mutations over a backend")]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the resolved configuration as TOML
	Config,
	/// Run article, plan, niche and post flows against an in-memory backend
	Demo,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	let config = Config::load_or_default(args.config.as_deref())?;

	setup_tracing(args.verbose, &config.log);
	if let Some(path) = &args.config {
		info!(path = %path.display(), "configuration loaded");
	}

	match args.command {
		Command::Config => {
			print!("{}", config.to_toml()?);
		}
		Command::Demo => {
			info!(retries = config.retry.retries, delay_ms = config.retry.retry_delay_ms, "starting demo");
			demo::run(config.retry).await?;
		}
	}
	Ok(())
}

fn setup_tracing(verbose: bool, log: &LogSettings) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("curator=debug,info")
			} else {
				EnvFilter::new(&log.filter)
			}
		})
	};

	// CURATOR_LOG_DIR overrides the configured directory
	let log_dir = std::env::var_os("CURATOR_LOG_DIR").map(PathBuf::from).or_else(|| log.dir.clone());
	if let Some(log_dir) = log_dir
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_file(&log_dir);
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}

fn log_file(dir: &Path) -> PathBuf {
	dir.join(format!("curator.{}.log", std::process::id()))
}
