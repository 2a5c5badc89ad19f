
use std::ops::Deref;
use std::process::ExitCode;

use anyhow::{bail, Result};
use display_error_chain::ErrorChainExt;
use gumdrop::Options;
use tracing::info;

use lumos::commands;
use lumos::config::Config;
use lumos::logging;


#[derive(Options)]
struct Args {

	#[options(help_flag)]
	help: bool,

	/// settings for log output
	#[options(default_expr = "logging::DEFAULT_FILTER.to_string()")]
	log: String,

	/// TOML config file to use instead of the built-in one
	#[options(no_short, meta = "FILE")]
	config_file: Option<String>,

	#[options(command)]
	cmd: Option<Command>
}

#[derive(Options)]
enum Command {

	/// Render greyscale QC mosaics, one per channel
	Qc(commands::qc::Args),

	/// Render color composites of a plate, its wells, or its sites
	Cp(commands::cp::Args)
}


fn main() -> ExitCode {

	let args = Args::parse_args_default_or_exit();

	// init logging, with a log file in the temp folder of the command
	let log_dir = match &args.cmd {
		Some(Command::Qc(qc_args)) => Some(qc_args.temp_dir()),
		Some(Command::Cp(cp_args)) => Some(cp_args.temp_dir()),
		None => None
	};
	if let Err(e) = logging::init(&args.log, log_dir.as_deref()) {
		println!("ERROR: {}", e.deref().chain());
		return ExitCode::FAILURE;
	}

	match run(args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			println!("ERROR: {}", e.deref().chain());
			ExitCode::FAILURE
		}
	}
}


#[tracing::instrument(skip_all, level = 5, name = "Lumos")]
fn run(args: Args) -> Result<()> {

	let config = match &args.config_file {
		Some(path) => {
			info!("Using config file: {}", path);
			Config::read(path)?
		}
		None => Config::default_config()?
	};

	match args.cmd {
		Some(Command::Qc(qc_args)) => commands::qc::run(&config, qc_args),
		Some(Command::Cp(cp_args)) => commands::cp::run(&config, cp_args),
		None => bail!("No command, try one of:\n{}", Args::command_list().unwrap_or_default())
	}
}
