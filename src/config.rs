
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use toml::{Table, Value};

use crate::plate::{ChannelId, GridShape, ImageDims, NamingScheme};


const DEFAULT_CONFIG: &str = include_str!("default_config.toml");


/// Everything the renderers read, loaded once at startup and never mutated
#[derive(Debug, Clone)]
pub struct Config {
	pub image_dims: ImageDims,
	pub site_grid: GridShape,
	pub well_grid: GridShape,
	pub naming_scheme: NamingScheme,
	pub default_output_format: OutputFormat,
	pub default_channels: Vec<ChannelId>,
	pub channels: BTreeMap<ChannelId,ChannelInfo>,
	pub rescale_ratio_qc: f64,
	pub rescale_ratio_cp_wells: f64,
	pub rescale_ratio_cp_plate: f64,
	pub placeholder_background_intensity: u8,
	pub placeholder_markers_intensity: u8,
	pub fingerprint_max_random_coef: u32,
	pub fingerprint_styles: BTreeMap<String,FingerprintStyle>,
	pub platemap: PlatemapColumns
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
	pub name: String,
	pub qc_coef: u32,
	pub cp_contrast: f32,
	pub cp_intensity: f32,
	/// red, green, blue tint weights, only needed for classic composites
	pub rgb: Option<[f32; 3]>
}

/// A fingerprint recipe as written in the config, validated when the style gets built
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FingerprintStyle {
	pub intensity_coeffs: Vec<u32>,
	pub channel_order: Vec<usize>,
	pub target_rgb: Vec<usize>
}

impl FingerprintStyle {

	pub fn is_empty(&self) -> bool {
		self.intensity_coeffs.is_empty() && self.channel_order.is_empty() && self.target_rgb.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatemapColumns {
	pub well_column: String,
	pub id_column: String
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
	Jpg,
	Jpeg,
	Png
}

impl OutputFormat {

	pub fn extension(&self) -> &'static str {
		match self {
			Self::Jpg => "jpg",
			Self::Jpeg => "jpeg",
			Self::Png => "png"
		}
	}
}

impl FromStr for OutputFormat {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"jpg" => Ok(Self::Jpg),
			"jpeg" => Ok(Self::Jpeg),
			"png" => Ok(Self::Png),
			_ => bail!("Unsupported output format: {}, try one of: jpg, jpeg, png", s)
		}
	}
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.extension())
	}
}


impl Config {

	pub fn default_config() -> Result<Self> {
		Self::from_toml(DEFAULT_CONFIG)
			.context("Failed to parse built-in config")
	}

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let toml = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file at: {}", path.to_string_lossy()))?;
		Self::from_toml(&toml)
			.with_context(|| format!("Failed to parse config file at: {}", path.to_string_lossy()))
	}

	pub fn from_toml(toml: &str) -> Result<Self> {

		let toml = toml.parse::<Table>()
			.context("Config is not valid TOML")?;

		let channels = {
			let toml_channels = get_table(&toml, "channel_info")?;
			let mut channels = BTreeMap::new();
			for (id, toml_channel) in toml_channels {
				let toml_channel = toml_channel.as_table()
					.context(format!("channel_info.{} is not a table", id))?;
				let info = ChannelInfo::from_toml(toml_channel)
					.context(format!("Invalid channel_info.{}", id))?;
				channels.insert(ChannelId::new(id), info);
			}
			channels
		};

		let default_channels = get_array(&toml, "default_channels_to_render")?
			.iter()
			.map(|v| {
				v.as_str()
					.map(ChannelId::new)
					.context("default_channels_to_render must hold strings")
			})
			.collect::<Result<Vec<_>>>()?;
		for channel in &default_channels {
			if !channels.contains_key(channel) {
				bail!("default_channels_to_render names channel {}, which has no channel_info", channel);
			}
		}

		let fingerprint_styles = match toml.get("fingerprint_style_dict") {
			None => BTreeMap::new(),
			Some(value) => {
				let toml_styles = value.as_table()
					.context("fingerprint_style_dict is not a table")?;
				let mut styles = BTreeMap::new();
				for (name, value) in toml_styles {
					let style = FingerprintStyle::from_toml(value)
						.context(format!("Invalid fingerprint_style_dict.{}", name))?;
					styles.insert(name.clone(), style);
				}
				styles
			}
		};

		let platemap = match toml.get("platemap") {
			None => PlatemapColumns {
				well_column: "well_position".to_string(),
				id_column: "jump-identifier".to_string()
			},
			Some(value) => {
				let toml_platemap = value.as_table()
					.context("platemap is not a table")?;
				PlatemapColumns {
					well_column: get_str(toml_platemap, "well_column")?.to_string(),
					id_column: get_str(toml_platemap, "id_column")?.to_string()
				}
			}
		};

		let config = Config {
			image_dims: get_str(&toml, "image_dimensions")?.parse()?,
			site_grid: get_str(&toml, "site_grid")?.parse()?,
			well_grid: get_str(&toml, "well_grid")?.parse()?,
			naming_scheme: get_str(&toml, "input_file_naming_scheme")?.parse()?,
			default_output_format: get_str(&toml, "default_output_format")?.parse()?,
			default_channels,
			channels,
			rescale_ratio_qc: get_ratio(&toml, "rescale_ratio_qc")?,
			rescale_ratio_cp_wells: get_ratio(&toml, "rescale_ratio_cp_wells")?,
			rescale_ratio_cp_plate: get_ratio(&toml, "rescale_ratio_cp_plate")?,
			placeholder_background_intensity: get_u8(&toml, "placeholder_background_intensity")?,
			placeholder_markers_intensity: get_u8(&toml, "placeholder_markers_intensity")?,
			fingerprint_max_random_coef: match toml.get("fingerprint_max_random_coef") {
				None => 8,
				Some(_) => get_u32(&toml, "fingerprint_max_random_coef")?.max(1)
			},
			fingerprint_styles,
			platemap
		};

		config.naming_scheme.check_grid(config.well_grid)?;

		Ok(config)
	}

	pub fn channel(&self, id: &ChannelId) -> Result<&ChannelInfo> {
		self.channels.get(id)
			.context(format!("Unknown channel: {}, configured channels are: {}", id, self.channel_list()))
	}

	fn channel_list(&self) -> String {
		self.channels.keys()
			.map(|id| id.to_string())
			.collect::<Vec<_>>()
			.join(", ")
	}

	/// number of images a complete plate holds for each channel
	pub fn images_per_channel(&self) -> u32 {
		self.well_grid.area()*self.site_grid.area()
	}

	/// The channels of a composite, ordered by channel id whatever the order of default_channels_to_render.
	/// Fingerprint channel orders index into this list.
	pub fn composite_channels(&self) -> Vec<ChannelId> {
		let mut channels = self.default_channels.clone();
		channels.sort();
		channels.dedup();
		channels
	}
}


impl ChannelInfo {

	fn from_toml(toml: &Table) -> Result<Self> {
		let rgb = match toml.get("rgb") {
			None => None,
			Some(value) => {
				let weights = value.as_array()
					.context("rgb is not an array")?
					.iter()
					.map(|v| {
						let weight = as_f64(v, "rgb")?;
						if !(weight >= 0.0) {
							bail!("rgb weights can't be negative: {}", weight);
						}
						Ok(weight as f32)
					})
					.collect::<Result<Vec<_>>>()?;
				let rgb: [f32; 3] = weights.try_into()
					.map_err(|_| anyhow::anyhow!("rgb must have exactly 3 weights"))?;
				Some(rgb)
			}
		};
		Ok(Self {
			name: get_str(toml, "name")?.to_string(),
			qc_coef: get_u32(toml, "qc_coef")?,
			cp_contrast: match toml.get("cp_contrast") {
				None => 0.0,
				Some(_) => get_f64(toml, "cp_contrast")? as f32
			},
			cp_intensity: match toml.get("cp_intensity") {
				None => 1.0,
				Some(_) => get_f64(toml, "cp_intensity")? as f32
			},
			rgb
		})
	}
}


impl FingerprintStyle {

	fn from_toml(value: &Value) -> Result<Self> {

		let parts = value.as_array()
			.context("recipe is not an array")?;
		let [intensity_coeffs, channel_order, target_rgb] = parts.as_slice()
			else { bail!("recipe must have 3 parts: coefficients, channel order, target RGB planes"); };

		let ints = |value: &Value, what: &str| -> Result<Vec<i64>> {
			value.as_array()
				.context(format!("{} is not an array", what))?
				.iter()
				.map(|v| {
					v.as_integer()
						.filter(|i| *i >= 0)
						.context(format!("{} must hold non-negative integers", what))
				})
				.collect()
		};

		Ok(Self {
			intensity_coeffs: ints(intensity_coeffs, "coefficients")?
				.into_iter()
				.map(|i| i as u32)
				.collect(),
			channel_order: ints(channel_order, "channel order")?
				.into_iter()
				.map(|i| i as usize)
				.collect(),
			target_rgb: ints(target_rgb, "target RGB planes")?
				.into_iter()
				.map(|i| i as usize)
				.collect()
		})
	}
}


fn get<'a>(toml: &'a Table, key: &str) -> Result<&'a Value> {
	toml.get(key)
		.context(format!("Missing config key: {}", key))
}

fn get_table<'a>(toml: &'a Table, key: &str) -> Result<&'a Table> {
	get(toml, key)?
		.as_table()
		.context(format!("{} is not a table", key))
}

fn get_array<'a>(toml: &'a Table, key: &str) -> Result<&'a Vec<Value>> {
	get(toml, key)?
		.as_array()
		.context(format!("{} is not an array", key))
}

fn get_str<'a>(toml: &'a Table, key: &str) -> Result<&'a str> {
	get(toml, key)?
		.as_str()
		.context(format!("{} is not a string", key))
}

fn get_f64(toml: &Table, key: &str) -> Result<f64> {
	as_f64(get(toml, key)?, key)
}

fn as_f64(value: &Value, key: &str) -> Result<f64> {
	match value {
		Value::Float(f) => Ok(*f),
		Value::Integer(i) => Ok(*i as f64),
		_ => bail!("{} is not a number", key)
	}
}

fn get_u32(toml: &Table, key: &str) -> Result<u32> {
	let i = get(toml, key)?
		.as_integer()
		.context(format!("{} is not an integer", key))?;
	u32::try_from(i)
		.context(format!("{} is out of range: {}", key, i))
}

fn get_u8(toml: &Table, key: &str) -> Result<u8> {
	as_u8(get(toml, key)?, key)
}

fn as_u8(value: &Value, key: &str) -> Result<u8> {
	let i = value.as_integer()
		.context(format!("{} is not an integer", key))?;
	u8::try_from(i)
		.context(format!("{} must be in [0,255]: {}", key, i))
}

fn get_ratio(toml: &Table, key: &str) -> Result<f64> {
	let ratio = get_f64(toml, key)?;
	if !(ratio > 0.0) {
		bail!("{} must be positive: {}", key, ratio);
	}
	Ok(ratio)
}
