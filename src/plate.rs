
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;


/// A rows x columns layout, written as "RxC"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
	pub rows: u32,
	pub cols: u32
}

impl GridShape {

	pub fn new(rows: u32, cols: u32) -> Self {
		Self {
			rows,
			cols
		}
	}

	pub fn area(&self) -> u32 {
		self.rows*self.cols
	}
}

impl FromStr for GridShape {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		let (rows, cols) = parse_pair(s)
			.context(format!("Malformed grid shape, expected RxC: {}", s))?;
		Ok(Self::new(rows, cols))
	}
}

impl fmt::Display for GridShape {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}x{}", self.rows, self.cols)
	}
}


/// Source image size in pixels, written as "HxW"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDims {
	pub height: u32,
	pub width: u32
}

impl ImageDims {

	pub fn new(height: u32, width: u32) -> Self {
		Self {
			height,
			width
		}
	}

	/// the size after resizing by the ratio, never collapsing to zero
	pub fn rescaled(&self, ratio: f64) -> Self {
		let scale = |v: u32| ((v as f64)*ratio).round().max(1.0) as u32;
		Self::new(scale(self.height), scale(self.width))
	}

	/// size of a grid of equally-sized tiles of this size
	pub fn tiled(&self, grid: GridShape) -> Self {
		Self::new(self.height*grid.rows, self.width*grid.cols)
	}
}

impl FromStr for ImageDims {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		let (height, width) = parse_pair(s)
			.context(format!("Malformed image dimensions, expected HxW: {}", s))?;
		Ok(Self::new(height, width))
	}
}


fn parse_pair(s: &str) -> Result<(u32,u32)> {
	let (a, b) = s.trim().split_once(['x', 'X'])
		.context("missing the 'x' separator")?;
	let a = a.trim().parse::<u32>()
		.context(format!("not a positive integer: {}", a))?;
	let b = b.trim().parse::<u32>()
		.context(format!("not a positive integer: {}", b))?;
	if a == 0 || b == 0 {
		bail!("sizes must be non-zero");
	}
	Ok((a, b))
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamingScheme {
	/// eg, `Plate1_A01_T0001F001L01A01Z01C01.tif`
	LetterWells,
	/// eg, `r01c01f01p01-ch1sk1fk1fl1.tif`
	RowsAndColumns
}

impl NamingScheme {

	pub fn id(&self) -> &'static str {
		match self {
			Self::LetterWells => "letter_wells",
			Self::RowsAndColumns => "rows_and_columns"
		}
	}

	/// The plate layout must be expressible by the scheme's fixed-width well ids
	pub fn check_grid(&self, well_grid: GridShape) -> Result<()> {
		let max_rows = match self {
			Self::LetterWells => 26,
			Self::RowsAndColumns => 99
		};
		if well_grid.rows > max_rows || well_grid.cols > 99 {
			bail!("Well grid {} is too large for naming scheme {}", well_grid, self.id());
		}
		Ok(())
	}

	/// all wells of the plate, in row-major order
	pub fn reference_wells(&self, well_grid: GridShape) -> Result<Vec<WellId>> {
		self.check_grid(well_grid)?;
		let wells = (1 ..= well_grid.rows)
			.flat_map(|row| (1 ..= well_grid.cols).map(move |col| WellId::new(*self, row, col)))
			.collect();
		Ok(wells)
	}

	/// Splits a discovered image filename into its plate coordinate.
	/// A filename that doesn't follow the scheme means the scheme is wrong for the dataset.
	pub fn parse_filename(&self, filename: &str) -> Result<PlateCoordinate> {
		let coordinate = match self {
			Self::LetterWells => parse_letter_wells(filename),
			Self::RowsAndColumns => parse_rows_and_columns(filename)
		};
		coordinate.context(format!(
			"Image filename does not match the {} naming scheme, check input_file_naming_scheme: {}",
			self.id(),
			filename
		))
	}

	pub fn parse_path(&self, path: &Path) -> Result<PlateCoordinate> {
		let filename = path.file_name()
			.context(format!("Image path has no filename: {}", path.to_string_lossy()))?
			.to_string_lossy();
		self.parse_filename(&filename)
	}
}

impl FromStr for NamingScheme {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"letter_wells" => Ok(Self::LetterWells),
			"rows_and_columns" => Ok(Self::RowsAndColumns),
			_ => bail!("Unrecognized naming scheme: {}, try one of: letter_wells, rows_and_columns", s)
		}
	}
}


static LETTER_WELLS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^.+_(?P<row>[A-Z])(?P<col>\d{2})_T\d+F(?P<site>\d+)L\d+A\d+Z(?P<z>\d+)C(?P<c>\d+)\.tiff?$")
		.expect("invalid letter wells pattern")
});

static ROWS_AND_COLUMNS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^r(?P<row>\d{2})c(?P<col>\d{2})f(?P<site>\d+)p\d+-(?P<ch>ch\d+)sk\d+fk\d+fl\d+\.tiff?$")
		.expect("invalid rows and columns pattern")
});


fn parse_letter_wells(filename: &str) -> Result<PlateCoordinate> {

	let captures = LETTER_WELLS.captures(filename)
		.context("expected <plate>_<well>_T<t>F<site>L<l>A<a>Z<z>C<c>.tif")?;

	let row = captures["row"].as_bytes()[0] - b'A' + 1;
	let col = captures["col"].parse::<u32>()?;
	let site = captures["site"].parse::<u32>()?;

	// brightfield depths share a channel number, so the plane is part of their id
	let channel = match &captures["z"] {
		"01" => format!("C{}", &captures["c"]),
		z => format!("Z{}C{}", z, &captures["c"])
	};

	PlateCoordinate::new(WellId::new(NamingScheme::LetterWells, row as u32, col), site, channel)
}


fn parse_rows_and_columns(filename: &str) -> Result<PlateCoordinate> {

	let captures = ROWS_AND_COLUMNS.captures(filename)
		.context("expected r<row>c<col>f<site>p<plane>-ch<n>sk<n>fk<n>fl<n>.tif")?;

	let row = captures["row"].parse::<u32>()?;
	let col = captures["col"].parse::<u32>()?;
	let site = captures["site"].parse::<u32>()?;

	PlateCoordinate::new(WellId::new(NamingScheme::RowsAndColumns, row, col), site, &captures["ch"])
}


/// A well position, 1-based.
/// Wells order by their position on the plate (row-major), not by their label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WellId {
	row: u32,
	col: u32,
	scheme: NamingScheme
}

impl WellId {

	pub fn new(scheme: NamingScheme, row: u32, col: u32) -> Self {
		Self {
			row,
			col,
			scheme
		}
	}

	pub fn row(&self) -> u32 {
		self.row
	}

	pub fn col(&self) -> u32 {
		self.col
	}
}

impl fmt::Display for WellId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.scheme {
			NamingScheme::LetterWells => {
				let letter = (b'A' + (self.row - 1) as u8) as char;
				write!(f, "{}{:02}", letter, self.col)
			}
			NamingScheme::RowsAndColumns => write!(f, "r{:02}c{:02}", self.row, self.col)
		}
	}
}


#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(String);

impl ChannelId {

	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}


#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlateCoordinate {
	pub well: WellId,
	/// 1-based
	pub site: u32,
	pub channel: ChannelId
}

impl PlateCoordinate {

	fn new(well: WellId, site: u32, channel: impl Into<String>) -> Result<Self> {
		if site == 0 {
			bail!("site indices start at 1");
		}
		Ok(Self {
			well,
			site,
			channel: ChannelId::new(channel)
		})
	}
}

impl fmt::Display for PlateCoordinate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} site {} channel {}", self.well, self.site, self.channel)
	}
}
