
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::plate::{ChannelId, PlateCoordinate, WellId};


/// A discovered image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
	pub filename: String,
	pub fullpath: PathBuf
}

/// One theoretical plate position, and the file found for it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
	pub coordinate: PlateCoordinate,
	pub source: Option<SourceImage>
}

impl ImageRecord {

	pub fn fullpath(&self) -> Option<&Path> {
		self.source.as_ref()
			.map(|source| source.fullpath.as_path())
	}
}


/// The complete (well x site x channel) table of a plate.
/// Holes in the plate are records without a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateTable {
	wells: Vec<WellId>,
	site_count: u32,
	channels: Vec<ChannelId>,
	/// well-major, then site, then channel in selection order
	records: Vec<ImageRecord>
}

impl PlateTable {

	/// wells in plate order (row-major)
	pub fn wells(&self) -> &[WellId] {
		&self.wells
	}

	pub fn site_count(&self) -> u32 {
		self.site_count
	}

	pub fn channels(&self) -> &[ChannelId] {
		&self.channels
	}

	pub fn records(&self) -> &[ImageRecord] {
		&self.records
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// all records of one well, ordered by site then channel
	pub fn well_records(&self, well_i: usize) -> &[ImageRecord] {
		let per_well = (self.site_count as usize)*self.channels.len();
		let start = well_i*per_well;
		&self.records[start .. start + per_well]
	}

	/// the records of one site, one per selected channel, in selection order
	pub fn site_records(&self, well_i: usize, site: u32) -> &[ImageRecord] {
		let per_site = self.channels.len();
		let start = (site as usize - 1)*per_site;
		&self.well_records(well_i)[start .. start + per_site]
	}

	pub fn found_count(&self) -> usize {
		self.records.iter()
			.filter(|record| record.source.is_some())
			.count()
	}
}


/// Joins the discovered files of one plate onto the plate's theoretical grid.
///
/// Every filename must parse under the configured naming scheme, otherwise the whole run is wrong.
/// Files for channels outside the selection, or positions outside the grid, are dropped.
/// Count and well-set mismatches are only reported.
pub fn reconcile(config: &Config, files: &[PathBuf], channels: &[ChannelId]) -> Result<PlateTable> {

	if channels.is_empty() {
		bail!("No channels selected");
	}

	let wells = config.naming_scheme.reference_wells(config.well_grid)?;
	let site_count = config.site_grid.area();

	// parse everything first, so a naming mismatch aborts before any work happens
	let mut discovered = HashMap::<PlateCoordinate,SourceImage>::new();
	let mut discovered_wells = BTreeSet::<WellId>::new();
	let mut selected_count = 0usize;
	for path in files {
		let coordinate = config.naming_scheme.parse_path(path)?;
		if !channels.contains(&coordinate.channel) {
			trace!("Skipping image of unselected channel: {}", path.to_string_lossy());
			continue;
		}
		selected_count += 1;
		discovered_wells.insert(coordinate.well);
		let source = SourceImage {
			filename: path.file_name()
				.map(|name| name.to_string_lossy().to_string())
				.unwrap_or_default(),
			fullpath: path.clone()
		};
		if let Some(previous) = discovered.insert(coordinate.clone(), source) {
			warn!("Multiple images for {}, ignoring {}", coordinate, previous.fullpath.to_string_lossy());
		}
	}

	let expected_count = (config.images_per_channel() as usize)*channels.len();
	if selected_count != expected_count {
		warn!("The plate does not have the exact image count: expected {}, got {}", expected_count, selected_count);
	}

	let reference_wells = wells.iter()
		.copied()
		.collect::<BTreeSet<_>>();
	let missing_wells = reference_wells.difference(&discovered_wells)
		.map(|well| well.to_string())
		.collect::<Vec<_>>();
	let unexpected_wells = discovered_wells.difference(&reference_wells)
		.map(|well| well.to_string())
		.collect::<Vec<_>>();
	info!("Well delta: {} wells without images, {} wells outside the plate grid", missing_wells.len(), unexpected_wells.len());
	debug!("Wells without images: {:?}", missing_wells);
	if !unexpected_wells.is_empty() {
		warn!("Ignoring images of wells outside the {} plate grid: {:?}", config.well_grid, unexpected_wells);
	}

	// left join: one record per theoretical coordinate
	let mut records = Vec::with_capacity(wells.len()*(site_count as usize)*channels.len());
	for well in &wells {
		for site in 1 ..= site_count {
			for channel in channels {
				let coordinate = PlateCoordinate {
					well: *well,
					site,
					channel: channel.clone()
				};
				let source = discovered.remove(&coordinate);
				records.push(ImageRecord {
					coordinate,
					source
				});
			}
		}
	}

	// whatever wasn't joined lies outside the grid
	for coordinate in discovered.keys() {
		if reference_wells.contains(&coordinate.well) {
			warn!("Ignoring image of site {} outside the {} site grid: {}", coordinate.site, config.site_grid, coordinate);
		}
	}

	Ok(PlateTable {
		wells,
		site_count,
		channels: channels.to_vec(),
		records
	})
}
