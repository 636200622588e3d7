//! Command-line entry point for the gasless relay.
//!
//! Every subcommand boots a local node from the configuration file, so the
//! forwarder address and registered types a request is signed against are
//! the same ones `simulate` relays it through.

use clap::{Parser, Subcommand};
use gasless_config::Config;
use std::path::PathBuf;

mod commands;

use commands::{InspectArgs, SignArgs, SimulateArgs};

/// Command-line arguments for the gasless relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Sign a call and print the JSON-RPC request carrying its envelope
	Sign(SignArgs),
	/// Decode an envelope and recover its signer
	Inspect(InspectArgs),
	/// Relay an envelope through a freshly booted local node
	Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	// Results go to stdout; logs stay on stderr.
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path {} is not valid UTF-8", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(chain_id = config.chain.chain_id, "Loaded configuration");

	let output = match args.command {
		Command::Sign(sign) => commands::sign(config, &sign).await?,
		Command::Inspect(inspect) => commands::inspect(config, &inspect).await?,
		Command::Simulate(simulate) => commands::simulate(config, &simulate).await?,
	};
	println!("{}", output);
	Ok(())
}
