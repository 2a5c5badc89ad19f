
use std::path::PathBuf;

use anyhow::{Context, Result};
use gumdrop::Options;
use tracing::info;

use crate::colorize::Style;
use crate::commands::{in_work_dir, required_path, temp_dir};
use crate::config::{Config, OutputFormat};
use crate::discover;
use crate::platemap::Platemap;
use crate::render::{self, CpOptions, CpScope, RenderPaths};


#[derive(Options)]
pub struct Args {

	#[options(help_flag)]
	help: bool,

	/// What to render: plate, wells, or sites
	#[options(no_short, meta = "SCOPE")]
	scope: Option<CpScope>,

	/// The folder of the plate
	#[options(no_short, meta = "DIR")]
	source_path: Option<String>,

	/// The folder where the images get saved
	#[options(no_short, meta = "DIR")]
	output_path: Option<String>,

	/// The rendering style: classic, or one of the configured fingerprint styles
	#[options(no_short, meta = "NAME", default = "classic")]
	style: String,

	/// Write the recipe of each site on the site
	#[options(no_short)]
	display_fingerprint: bool,

	/// Don't write the well id (and compound) on the wells
	#[options(no_short)]
	hide_well_details: bool,

	/// Tab-separated file with the compound of each well
	#[options(no_short, meta = "FILE")]
	platemap_path: Option<String>,

	/// The folder for working files, defaults to the system temp folder
	#[options(no_short, meta = "DIR")]
	temp_path: Option<String>,

	/// Image format of the outputs: jpg, jpeg, or png
	#[options(no_short, meta = "FORMAT")]
	output_format: Option<OutputFormat>,

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
		.context("Missing --scope, try one of: plate, wells, sites")?;
	let temp_path = args.temp_dir();
	let source_path = required_path(args.source_path, "source-path")?;
	let output_path = required_path(args.output_path, "output-path")?;
	let format = args.output_format
		.unwrap_or(config.default_output_format);

	let channels = config.composite_channels();
	let style = Style::from_config(&args.style, config, &channels)?;

	let platemap = match args.platemap_path {
		Some(path) => Some(Platemap::read(path, &config.platemap)?),
		None => None
	};

	let plate = discover::discover_plate(&source_path)?;
	info!("Plate {}: {} images", plate.name, plate.files.len());

	let options = CpOptions {
		scope,
		display_fingerprint: args.display_fingerprint,
		well_details: !args.hide_well_details,
		platemap: platemap.as_ref()
	};
	let paths = RenderPaths {
		work_dir: render::work_dir(&temp_path, &plate.name, format!("picasso-{}", style.name())),
		output_dir: output_path,
		format
	};

	let mut rng = fastrand::Rng::new();
	let outputs = in_work_dir(&paths.work_dir, args.keep_temp, || {
		render::render_cp_style(config, &plate, &channels, &style, options, &paths, &mut rng)
	})?;
	info!("Rendered {} images", outputs.len());

	Ok(())
}
