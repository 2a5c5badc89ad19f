
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use gumdrop::Options;
use tracing::info;

use crate::commands::{in_work_dir, required_path, temp_dir};
use crate::config::{Config, OutputFormat};
use crate::discover::{self, PlateInput};
use crate::logging::ResultExt;
use crate::plate::ChannelId;
use crate::render::{self, RenderPaths};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QcScope {
	/// every plate under the source folder
	Run,
	/// all the default channels of one plate
	Plate,
	/// one channel of one plate
	Channel
}

impl FromStr for QcScope {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"run" => Ok(Self::Run),
			"plate" => Ok(Self::Plate),
			"channel" => Ok(Self::Channel),
			_ => bail!("Unrecognized scope: {}, try one of: run, plate, channel", s)
		}
	}
}

impl fmt::Display for QcScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Run => "run",
			Self::Plate => "plate",
			Self::Channel => "channel"
		})
	}
}


#[derive(Options)]
pub struct Args {

	#[options(help_flag)]
	help: bool,

	/// What to render: run, plate, or channel
	#[options(no_short, meta = "SCOPE")]
	scope: Option<QcScope>,

	/// The channel to render, for the channel scope only
	#[options(no_short, meta = "ID")]
	channel: Option<String>,

	/// The folder of the run, or of a single plate
	#[options(no_short, meta = "DIR")]
	source_path: Option<String>,

	/// The folder where the plate images get saved
	#[options(no_short, meta = "DIR")]
	output_path: Option<String>,

	/// The folder for working files, defaults to the system temp folder
	#[options(no_short, meta = "DIR")]
	temp_path: Option<String>,

	/// Image format of the outputs: jpg, jpeg, or png
	#[options(no_short, meta = "FORMAT")]
	output_format: Option<OutputFormat>,

	/// Also render this brightfield channel, can be repeated
	#[options(no_short, meta = "ID")]
	brightfield: Vec<String>,

	/// Render one channel at a time, instead of all channels of a plate at once
	#[options(no_short)]
	serial: bool,

	/// Don't remove the working files when done
	#[options(no_short)]
	keep_temp: bool
}

impl Args {

	pub fn temp_dir(&self) -> PathBuf {
		temp_dir(self.temp_path.clone())
	}
}


pub fn run(config: &Config, args: Args) -> Result<()> {

	let scope = args.scope
		.context("Missing --scope, try one of: run, plate, channel")?;
	let temp_path = args.temp_dir();
	let source_path = required_path(args.source_path, "source-path")?;
	let output_path = required_path(args.output_path, "output-path")?;
	let format = args.output_format
		.unwrap_or(config.default_output_format);

	// pick the channels
	let channels = match (scope, args.channel) {
		(QcScope::Channel, Some(channel)) => vec![ChannelId::new(channel)],
		(QcScope::Channel, None) => bail!("Missing --channel, it's needed for the channel scope"),
		(_, Some(_)) => bail!("--channel only works with the channel scope, remove it to render the {}", scope),
		(_, None) => {
			let mut channels = config.default_channels.clone();
			channels.extend(args.brightfield.into_iter().map(ChannelId::new));
			channels
		}
	};
	for channel in &channels {
		config.channel(channel)?;
	}

	// find the plates
	let plates = match scope {
		QcScope::Run => discover::discover_plates(&source_path)?,
		QcScope::Plate | QcScope::Channel => vec![discover::discover_plate(&source_path)?]
	};

	for plate in &plates {
		plate.check_naming(config.naming_scheme)?;
	}

	for plate in &plates {
		info!("Plate {}: {} images, rendering channels {:?}",
			plate.name,
			plate.files.len(),
			channels.iter().map(|c| c.as_str()).collect::<Vec<_>>()
		);
		let render_channel = |channel: &ChannelId| -> Result<()> {
			let paths = RenderPaths {
				work_dir: render::work_dir(&temp_path, &plate.name, channel),
				output_dir: output_path.clone(),
				format
			};
			in_work_dir(&paths.work_dir, args.keep_temp, || {
				render::render_qc_channel(config, plate, channel, &paths)
			})?;
			Ok(())
		};
		render_plate(plate, &channels, render_channel, args.serial)?;
	}

	Ok(())
}


/// Renders every channel of the plate, concurrently unless serial.
/// Channels don't share anything but the config, so one failing channel doesn't stop the others.
fn render_plate<F>(plate: &PlateInput, channels: &[ChannelId], render_channel: F, serial: bool) -> Result<()>
	where
		F: Fn(&ChannelId) -> Result<()> + Sync
{
	let results = if serial || channels.len() <= 1 {
		channels.iter()
			.map(|channel| render_channel(channel))
			.collect::<Vec<_>>()
	} else {
		let render_channel = &render_channel;
		thread::scope(|scope| {
			let handles = channels.iter()
				.map(|channel| scope.spawn(move || render_channel(channel)))
				.collect::<Vec<_>>();
			handles.into_iter()
				.map(|handle| {
					handle.join()
						.unwrap_or_else(|_| Err(anyhow!("Channel render panicked")))
				})
				.collect::<Vec<_>>()
		})
	};

	let mut failed = Vec::new();
	for (channel, result) in channels.iter().zip(results) {
		let logged = result
			.context(format!("Failed to render channel {} of plate {}", channel, plate.name))
			.log_err();
		if logged.is_err() {
			failed.push(channel.as_str());
		}
	}
	if !failed.is_empty() {
		bail!("Failed to render channels {:?} of plate {}", failed, plate.name);
	}

	Ok(())
}
