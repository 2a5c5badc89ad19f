
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, Luma, Rgb, RgbImage};
use tracing::{info, warn};

use crate::canvas::{self, Drawing, ANNOTATION_INTENSITY};
use crate::colorize::{self, RandomSource, Style};
use crate::compose::concatenate_images_in_grid;
use crate::config::{Config, OutputFormat};
use crate::discover::PlateInput;
use crate::loader;
use crate::normalize::normalize_channel;
use crate::platemap::Platemap;
use crate::plate::{ChannelId, ImageDims, WellId};
use crate::reconcile::{reconcile, PlateTable};


/// Where one render keeps its intermediate well images, and where its outputs go.
/// The working folder belongs to the render: nothing else writes there.
#[derive(Debug, Clone)]
pub struct RenderPaths {
	pub work_dir: PathBuf,
	pub output_dir: PathBuf,
	pub format: OutputFormat
}

impl RenderPaths {

	fn wells_dir(&self) -> PathBuf {
		self.work_dir.join("wells")
	}

	fn well_path(&self, well: WellId) -> PathBuf {
		self.wells_dir().join(format!("well-{}.png", well))
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpScope {
	/// one mosaic of the whole plate
	Plate,
	/// one image per well
	Wells,
	/// one image per site
	Sites
}

impl CpScope {

	pub fn rescale_ratio(&self, config: &Config) -> f64 {
		match self {
			Self::Plate => config.rescale_ratio_cp_plate,
			Self::Wells | Self::Sites => config.rescale_ratio_cp_wells
		}
	}
}

impl FromStr for CpScope {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"plate" => Ok(Self::Plate),
			"wells" => Ok(Self::Wells),
			"sites" => Ok(Self::Sites),
			_ => bail!("Unrecognized scope: {}, try one of: plate, wells, sites", s)
		}
	}
}

impl fmt::Display for CpScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Plate => "plate",
			Self::Wells => "wells",
			Self::Sites => "sites"
		})
	}
}


/// Renders the QC mosaic of one channel of one plate, and returns the path of the saved image.
#[tracing::instrument(skip_all, level = 5, name = "QC", fields(plate = %plate.name, channel = %channel))]
pub fn render_qc_channel(config: &Config, plate: &PlateInput, channel: &ChannelId, paths: &RenderPaths) -> Result<PathBuf> {

	let info = config.channel(channel)?;
	info!("Rendering channel {}: {}", channel, info.name);

	let table = reconcile(config, &plate.files, std::slice::from_ref(channel))?;

	let tile = config.image_dims.rescaled(config.rescale_ratio_qc);
	let placeholder = canvas::placeholder(tile, config.placeholder_background_intensity, config.placeholder_markers_intensity);
	let label_size = canvas::label_size(tile.height);

	prepare_wells_dir(paths)?;

	let mut placeholder_count = 0;
	for (well_i, well) in table.wells().iter().enumerate() {

		let sites = (1 ..= table.site_count())
			.map(|site| {
				match loader::load_site_image(table.well_records(well_i), site) {
					Some(raw) => normalize_channel(&raw, tile, info.qc_coef),
					None => {
						placeholder_count += 1;
						placeholder.clone()
					}
				}
			})
			.collect::<Vec<_>>();

		let mut well_img = concatenate_images_in_grid(&sites, config.site_grid)
			.context(format!("Failed to tile the sites of well {}", well))?;
		well_img.text(tile.width/20, tile.height/20, label_size, Luma([ANNOTATION_INTENSITY]), format!("{} {}", well, info.name));
		well_img.border(Luma([ANNOTATION_INTENSITY]));
		canvas::save(&well_img, paths.well_path(*well))?;
	}
	report_placeholders(&table, placeholder_count);

	// every well is on disk: compose the plate
	let mut wells = Vec::with_capacity(table.wells().len());
	for well in table.wells() {
		wells.push(canvas::load_gray(paths.well_path(*well))?);
	}
	let plate_img = concatenate_images_in_grid(&wells, config.well_grid)
		.context("Failed to tile the wells of the plate")?;

	// outputs are color, even when they only hold one channel
	let plate_img = DynamicImage::ImageLuma8(plate_img)
		.into_rgb8();

	let out_path = paths.output_dir.join(format!("{}-{}-{}.{}", plate.name, channel, info.qc_coef, paths.format.extension()));
	canvas::save(&plate_img, &out_path)?;
	info!("Saved {}x{} image: {}", plate_img.width(), plate_img.height(), out_path.to_string_lossy());

	Ok(out_path)
}


/// Options of a composite render besides the style
#[derive(Debug, Clone, Copy)]
pub struct CpOptions<'a> {
	pub scope: CpScope,
	pub display_fingerprint: bool,
	pub well_details: bool,
	pub platemap: Option<&'a Platemap>
}


/// Renders the color composites of one plate in one style, and returns the paths of the saved images.
#[tracing::instrument(skip_all, level = 5, name = "CP", fields(plate = %plate.name, style = %style.name()))]
pub fn render_cp_style(
	config: &Config,
	plate: &PlateInput,
	channels: &[ChannelId],
	style: &Style,
	options: CpOptions,
	paths: &RenderPaths,
	rng: &mut impl RandomSource
) -> Result<Vec<PathBuf>> {

	info!("Rendering {} composites in style {}", options.scope, style.name());

	let table = reconcile(config, &plate.files, channels)?;
	let tile = config.image_dims.rescaled(options.scope.rescale_ratio(config));

	let mut colorize_site = |well_i: usize, site: u32| -> Result<RgbImage> {
		let raw = colorize::load_site_channels(table.site_records(well_i, site));
		let recipe = style.recipe(&mut *rng, config.fingerprint_max_random_coef);
		let mut img = colorize::colorize(&raw, &recipe, tile)?;
		if options.display_fingerprint {
			colorize::annotate_recipe(&mut img, &recipe);
		}
		Ok(img)
	};

	let mut outputs = Vec::new();

	match options.scope {

		CpScope::Sites => {
			let out_dir = paths.output_dir.join(format!("sites_{}_{}", plate.name, style.name()));
			create_dir(&out_dir)?;
			for (well_i, well) in table.wells().iter().enumerate() {
				for site in 1 ..= table.site_count() {
					let img = colorize_site(well_i, site)?;
					let path = out_dir.join(format!("{}_s{}.{}", well, site, paths.format.extension()));
					canvas::save(&img, &path)?;
					outputs.push(path);
				}
			}
			info!("Saved {} site images in: {}", outputs.len(), out_dir.to_string_lossy());
		}

		CpScope::Wells => {
			let out_dir = paths.output_dir.join(format!("wells_{}_{}", plate.name, style.name()));
			create_dir(&out_dir)?;
			for (well_i, well) in table.wells().iter().enumerate() {
				let well_img = render_cp_well(config, &table, well_i, *well, tile, &options, &mut colorize_site)?;
				let path = out_dir.join(format!("{}.{}", well, paths.format.extension()));
				canvas::save(&well_img, &path)?;
				outputs.push(path);
			}
			info!("Saved {} well images in: {}", outputs.len(), out_dir.to_string_lossy());
		}

		CpScope::Plate => {
			prepare_wells_dir(paths)?;
			for (well_i, well) in table.wells().iter().enumerate() {
				let mut well_img = render_cp_well(config, &table, well_i, *well, tile, &options, &mut colorize_site)?;
				well_img.border(Rgb([ANNOTATION_INTENSITY; 3]));
				canvas::save(&well_img, paths.well_path(*well))?;
			}

			let mut wells = Vec::with_capacity(table.wells().len());
			for well in table.wells() {
				wells.push(canvas::load_rgb(paths.well_path(*well))?);
			}
			let plate_img = concatenate_images_in_grid(&wells, config.well_grid)
				.context("Failed to tile the wells of the plate")?;

			let path = paths.output_dir.join(format!("{}-picasso-{}.{}", plate.name, style.name(), paths.format.extension()));
			canvas::save(&plate_img, &path)?;
			info!("Saved {}x{} image: {}", plate_img.width(), plate_img.height(), path.to_string_lossy());
			outputs.push(path);
		}
	}

	Ok(outputs)
}


fn render_cp_well(
	config: &Config,
	table: &PlateTable,
	well_i: usize,
	well: WellId,
	tile: ImageDims,
	options: &CpOptions,
	colorize_site: &mut impl FnMut(usize, u32) -> Result<RgbImage>
) -> Result<RgbImage> {

	let sites = (1 ..= table.site_count())
		.map(|site| colorize_site(well_i, site))
		.collect::<Result<Vec<_>>>()?;

	let mut well_img = concatenate_images_in_grid(&sites, config.site_grid)
		.context(format!("Failed to tile the sites of well {}", well))?;

	if options.well_details {
		let label = match options.platemap.and_then(|platemap| platemap.compound(well.to_string())) {
			Some(compound) => format!("{} {}", well, compound),
			None => well.to_string()
		};
		let size = canvas::label_size(tile.height);
		well_img.text(tile.width/12, tile.height/12, size, Rgb([ANNOTATION_INTENSITY; 3]), label);
	}

	Ok(well_img)
}


fn create_dir(dir: &Path) -> Result<()> {
	fs::create_dir_all(dir)
		.context(format!("Failed to create folder: {}", dir.to_string_lossy()))
}


fn prepare_wells_dir(paths: &RenderPaths) -> Result<()> {
	create_dir(&paths.wells_dir())?;
	create_dir(&paths.output_dir)
}


fn report_placeholders(table: &PlateTable, placeholder_count: usize) {
	let site_count = table.wells().len()*(table.site_count() as usize);
	if placeholder_count > 0 {
		warn!("{} of {} site images were unavailable and rendered as placeholders", placeholder_count, site_count);
	}
}


/// Purges and recreates a working folder, so a render never sees leftovers of an interrupted one
pub fn reset_work_dir(dir: &Path) -> Result<()> {
	if dir.exists() {
		fs::remove_dir_all(dir)
			.context(format!("Failed to purge working folder: {}", dir.to_string_lossy()))?;
	}
	create_dir(dir)
}


/// the working folder of one render, namespaced by plate and channel (or style)
pub fn work_dir(temp_dir: &Path, plate: &str, what: impl fmt::Display) -> PathBuf {
	temp_dir.join(format!("tmpgen-{}-{}", plate, what))
}


#[cfg(test)]
mod test {

	use assert_fs::TempDir;
	use galvanic_assert::{assert_that, matchers::*};

	use crate::colorize::test::FixedRandom;
	use crate::config::test::tiny_config;
	use crate::loader::Gray16Image;
	use crate::logging;

	use super::*;


	fn ids(ids: &[&str]) -> Vec<ChannelId> {
		ids.iter()
			.map(|id| ChannelId::new(*id))
			.collect()
	}


	struct Fixture {
		dir: TempDir,
		plate: PlateInput,
		paths: RenderPaths
	}

	impl Fixture {

		/// a plate where only some of the images exist, at the tiny config's 20x30 size
		fn new(images: &[(&str, u16)]) -> Self {
			let dir = TempDir::new().unwrap();
			let plate_dir = dir.path().join("P1");
			fs::create_dir_all(&plate_dir).unwrap();
			let files = images.iter()
				.map(|(name, v)| {
					let path = plate_dir.join(name);
					Gray16Image::from_pixel(30, 20, Luma([*v]))
						.save(&path)
						.unwrap();
					path
				})
				.collect();
			let paths = RenderPaths {
				work_dir: dir.path().join("tmp"),
				output_dir: dir.path().join("out"),
				format: OutputFormat::Png
			};
			Self {
				plate: PlateInput {
					name: "P1".to_string(),
					dir: plate_dir,
					files
				},
				paths,
				dir
			}
		}
	}


	#[test]
	fn qc() {
		let _logging = logging::init_test();

		let config = tiny_config();
		let fixture = Fixture::new(&[
			("P1_A01_T0001F001L01A01Z01C01.tif", 10*256 + 128),
			("P1_B03_T0001F004L01A01Z01C01.tif", 65535)
		]);

		let path = render_qc_channel(&config, &fixture.plate, &ChannelId::new("C01"), &fixture.paths)
			.unwrap();
		assert_that!(&path, eq(fixture.dir.path().join("out/P1-C01-16.png")));

		// 2x3 wells of 2x2 sites of 10x15
		let img = canvas::load_rgb(&path)
			.unwrap();
		assert_that!(&img.dimensions(), eq((3*2*15, 2*2*10)));

		// the first site of A01 is 10*16, the last site of B03 is clamped to white,
		// sampled away from the label and the border
		assert_that!(&img.get_pixel(12, 8).0, eq([160, 160, 160]));
		assert_that!(&img.get_pixel(85, 35).0, eq([255, 255, 255]));

		// intermediate wells are in the working folder, one per well
		let wells = fs::read_dir(fixture.paths.wells_dir())
			.unwrap()
			.count();
		assert_that!(&wells, eq(6));
	}

	#[test]
	fn cp_sites() {
		let _logging = logging::init_test();

		let config = tiny_config();
		let fixture = Fixture::new(&[
			("P1_A01_T0001F001L01A01Z01C01.tif", 100*256 + 128),
			("P1_A01_T0001F001L01A01Z01C02.tif", 100*256 + 128),
			("P1_A02_T0001F003L01A01Z01C03.tif", 100*256 + 128)
		]);
		let style = Style::from_config("classic", &config, &ids(&["C01", "C02", "C03"]))
			.unwrap();
		let options = CpOptions {
			scope: CpScope::Sites,
			display_fingerprint: false,
			well_details: true,
			platemap: None
		};

		let outputs = render_cp_style(&config, &fixture.plate, &ids(&["C01", "C02", "C03"]), &style, options, &fixture.paths, &mut FixedRandom { coefficient: 1 })
			.unwrap();
		assert_that!(&outputs.len(), eq(6*4));

		let site = |name: &str| {
			canvas::load_rgb(fixture.dir.path().join("out/sites_P1_classic").join(name))
				.unwrap()
		};
		let a01 = site("A01_s1.png");
		assert_that!(&a01.get_pixel(5, 5).0, eq([0, 100, 100]));
		let a02 = site("A02_s3.png");
		assert_that!(&a02.get_pixel(5, 5).0, eq([100, 0, 0]));
		assert_that!(&site("A01_s2.png").pixels().all(|p| p.0 == [0, 0, 0]), eq(true));
		assert_that!(&site("B03_s4.png").pixels().all(|p| p.0 == [0, 0, 0]), eq(true));
	}

	#[test]
	fn cp_plate() {
		let _logging = logging::init_test();

		let config = tiny_config();
		let fixture = Fixture::new(&[
			("P1_A01_T0001F001L01A01Z01C01.tif", 200*256),
			("P1_B02_T0001F002L01A01Z01C05.tif", 200*256)
		]);
		let channels = ids(&["C01", "C02", "C03", "C04", "C05"]);
		let style = Style::from_config("random", &config, &channels)
			.unwrap();
		let options = CpOptions {
			scope: CpScope::Plate,
			display_fingerprint: true,
			well_details: true,
			platemap: None
		};

		let outputs = render_cp_style(&config, &fixture.plate, &channels, &style, options, &fixture.paths, &mut FixedRandom { coefficient: 2 })
			.unwrap();
		assert_that!(&outputs, eq(vec![fixture.dir.path().join("out/P1-picasso-random.png")]));

		// 2x3 wells of 2x2 sites, at the plate ratio
		let img = canvas::load_rgb(&outputs[0])
			.unwrap();
		let tile = config.image_dims.rescaled(config.rescale_ratio_cp_plate);
		assert_that!(&img.dimensions(), eq((3*2*tile.width, 2*2*tile.height)));
	}

	#[test]
	fn scopes() {
		assert_that!(&"wells".parse::<CpScope>().unwrap(), eq(CpScope::Wells));
		assert_that!(&"well".parse::<CpScope>().is_err(), eq(true));
		assert_that!(&CpScope::Sites.to_string(), eq("sites".to_string()));
	}

	#[test]
	fn reset() {
		let dir = TempDir::new().unwrap();
		let work = work_dir(dir.path(), "P1", "C01");
		assert_that!(&work.ends_with("tmpgen-P1-C01"), eq(true));
		fs::create_dir_all(work.join("wells")).unwrap();
		fs::write(work.join("wells/stale.png"), b"").unwrap();
		reset_work_dir(&work).unwrap();
		assert_that!(&work.is_dir(), eq(true));
		assert_that!(&fs::read_dir(&work).unwrap().count(), eq(0));
	}
}
