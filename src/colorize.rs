
use std::fmt;

use anyhow::{bail, Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::canvas::{self, Drawing, ANNOTATION_INTENSITY};
use crate::config::{Config, FingerprintStyle};
use crate::loader::{self, Gray16Image};
use crate::normalize::{multiply_clipped, resize_to, to_8bit};
use crate::plate::{ChannelId, ImageDims};
use crate::reconcile::ImageRecord;


/// fingerprints remap exactly this many channels into the three color planes
pub const FINGERPRINT_CHANNELS: usize = 5;

pub const CLASSIC: &str = "classic";


/// Source of the coefficients and permutations for styles without a fixed recipe
pub trait RandomSource {

	/// a coefficient in 1..=max
	fn coefficient(&mut self, max: u32) -> u32;

	fn shuffle(&mut self, values: &mut [usize]);
}

impl RandomSource for fastrand::Rng {

	fn coefficient(&mut self, max: u32) -> u32 {
		self.u32(1 ..= max.max(1))
	}

	fn shuffle(&mut self, values: &mut [usize]) {
		fastrand::Rng::shuffle(self, values)
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct ClassicChannel {
	pub contrast: f32,
	pub intensity: f32,
	/// red, green, blue weights
	pub tint: [f32; 3]
}

/// per-channel adjustments, in channel selection order
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicParams {
	pub channels: Vec<ClassicChannel>
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRecipe {
	pub intensity: [u32; FINGERPRINT_CHANNELS],
	/// the first three channels become blue, green, red; the last two get folded in
	pub channel_order: [usize; FINGERPRINT_CHANNELS],
	/// where the two folded channels go
	pub target_rgb: [usize; 3]
}

impl FingerprintRecipe {

	pub fn new(intensity: [u32; FINGERPRINT_CHANNELS], channel_order: [usize; FINGERPRINT_CHANNELS], target_rgb: [usize; 3]) -> Result<Self> {
		check_permutation(&channel_order)
			.context("Invalid channel order")?;
		check_permutation(&target_rgb)
			.context("Invalid target RGB planes")?;
		Ok(Self {
			intensity,
			channel_order,
			target_rgb
		})
	}

	fn from_style(style: &FingerprintStyle) -> Result<Self> {
		let intensity = style.intensity_coeffs.as_slice()
			.try_into()
			.context(format!("Expected {} intensity coefficients, got {}", FINGERPRINT_CHANNELS, style.intensity_coeffs.len()))?;
		let channel_order = style.channel_order.as_slice()
			.try_into()
			.context(format!("Expected {} channels in the channel order, got {}", FINGERPRINT_CHANNELS, style.channel_order.len()))?;
		let target_rgb = style.target_rgb.as_slice()
			.try_into()
			.context(format!("Expected 3 target RGB planes, got {}", style.target_rgb.len()))?;
		Self::new(intensity, channel_order, target_rgb)
	}

	pub fn random(rng: &mut impl RandomSource, max_coef: u32) -> Self {
		let intensity = [(); FINGERPRINT_CHANNELS]
			.map(|_| rng.coefficient(max_coef));
		let mut channel_order = [0, 1, 2, 3, 4];
		rng.shuffle(&mut channel_order);
		let mut target_rgb = [0, 1, 2];
		rng.shuffle(&mut target_rgb);
		Self {
			intensity,
			channel_order,
			target_rgb
		}
	}
}

impl fmt::Display for FingerprintRecipe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}{:?}{:?}", self.intensity, self.channel_order, self.target_rgb)
	}
}


fn check_permutation(values: &[usize]) -> Result<()> {
	let mut sorted = values.to_vec();
	sorted.sort();
	if sorted.iter().enumerate().any(|(i, v)| i != *v) {
		bail!("{:?} is not a permutation of 0..{}", values, values.len());
	}
	Ok(())
}


/// How the channels of a site get merged into one color image
#[derive(Debug, Clone, PartialEq)]
pub enum Style {
	Classic(ClassicParams),
	Fingerprint {
		name: String,
		/// None draws a new recipe for every site
		recipe: Option<FingerprintRecipe>
	}
}

impl Style {

	/// Looks up the named style, checking it can render the selected channels
	pub fn from_config(name: &str, config: &Config, channels: &[ChannelId]) -> Result<Self> {

		if name == CLASSIC {
			let channels = channels.iter()
				.map(|id| {
					let info = config.channel(id)?;
					let tint = info.rgb
						.context(format!("Channel {} has no rgb tint, so it can't be rendered in the classic style", id))?;
					Ok(ClassicChannel {
						contrast: info.cp_contrast,
						intensity: info.cp_intensity,
						tint
					})
				})
				.collect::<Result<Vec<_>>>()?;
			return Ok(Self::Classic(ClassicParams {
				channels
			}));
		}

		let style = config.fingerprint_styles.get(name)
			.context(format!("Unknown style: {}, try one of: {}", name, style_names(config).join(", ")))?;

		if channels.len() != FINGERPRINT_CHANNELS {
			bail!("Fingerprint styles need exactly {} channels, got {}", FINGERPRINT_CHANNELS, channels.len());
		}

		// an empty recipe means every site gets a random one
		let recipe = if style.is_empty() {
			None
		} else {
			let recipe = FingerprintRecipe::from_style(style)
				.context(format!("Invalid recipe for style {}", name))?;
			Some(recipe)
		};

		Ok(Self::Fingerprint {
			name: name.to_string(),
			recipe
		})
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Classic(_) => CLASSIC,
			Self::Fingerprint { name, .. } => name.as_str()
		}
	}

	/// The recipe for the next site
	pub fn recipe(&self, rng: &mut impl RandomSource, max_coef: u32) -> Recipe<'_> {
		match self {
			Self::Classic(params) => Recipe::Classic(params),
			Self::Fingerprint { recipe: Some(recipe), .. } => Recipe::Fingerprint(recipe.clone()),
			Self::Fingerprint { recipe: None, .. } => Recipe::Fingerprint(FingerprintRecipe::random(rng, max_coef))
		}
	}
}


pub fn style_names(config: &Config) -> Vec<&str> {
	let mut names = vec![CLASSIC];
	names.extend(config.fingerprint_styles.keys().map(String::as_str));
	names
}


/// The parameters of one site colorization
#[derive(Debug, Clone, PartialEq)]
pub enum Recipe<'a> {
	Classic(&'a ClassicParams),
	Fingerprint(FingerprintRecipe)
}

impl fmt::Display for Recipe<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Classic(params) => {
				let contrast = params.channels.iter()
					.map(|c| c.contrast)
					.collect::<Vec<_>>();
				let intensity = params.channels.iter()
					.map(|c| c.intensity)
					.collect::<Vec<_>>();
				write!(f, "contrast{:?} intensity{:?}", contrast, intensity)
			}
			Self::Fingerprint(recipe) => write!(f, "{}", recipe)
		}
	}
}


/// Loads the channels of one site, in record order.
/// Unavailable channels are None.
pub fn load_site_channels(records: &[ImageRecord]) -> Vec<Option<Gray16Image>> {
	records.iter()
		.map(loader::load_record)
		.collect()
}


/// Merges the channels of one site into a color tile of the given size.
/// Unavailable channels are rendered black.
pub fn colorize(channels: &[Option<Gray16Image>], recipe: &Recipe, tile: ImageDims) -> Result<RgbImage> {

	let planes = channels.iter()
		.map(|raw| match raw {
			Some(raw) => to_8bit(&resize_to(raw, tile)),
			None => GrayImage::new(tile.width, tile.height)
		})
		.collect::<Vec<_>>();

	match recipe {
		Recipe::Classic(params) => merge_classic(&planes, params, tile),
		Recipe::Fingerprint(recipe) => merge_fingerprint(planes, recipe, tile)
	}
}


/// the linear contrast stretch around mid-grey: (alpha, beta)
pub fn contrast_transform(contrast: f32) -> (f32, f32) {
	let alpha = 131.0*(contrast + 127.0)/(127.0*(131.0 - contrast));
	let beta = 127.0*(1.0 - alpha);
	(alpha, beta)
}


fn saturate(v: f32) -> u8 {
	v.round().clamp(0.0, 255.0) as u8
}


fn merge_classic(planes: &[GrayImage], params: &ClassicParams, tile: ImageDims) -> Result<RgbImage> {

	if planes.len() != params.channels.len() {
		bail!("Classic style was set up for {} channels, got {}", params.channels.len(), planes.len());
	}

	let mut rgb = vec![[0f32; 3]; (tile.width*tile.height) as usize];

	for (plane, channel) in planes.iter().zip(&params.channels) {
		let (alpha, beta) = contrast_transform(channel.contrast);
		for (acc, Luma([v])) in rgb.iter_mut().zip(plane.pixels()) {
			let v = saturate((*v as f32)*alpha + beta);
			let v = multiply_clipped(v, channel.intensity) as f32;
			for (c, weight) in acc.iter_mut().zip(channel.tint) {
				*c += v/255.0*weight;
			}
		}
	}

	let mut img = RgbImage::new(tile.width, tile.height);
	for (pixel, acc) in img.pixels_mut().zip(rgb) {
		*pixel = Rgb(acc.map(saturate));
	}
	Ok(img)
}


fn merge_fingerprint(mut planes: Vec<GrayImage>, recipe: &FingerprintRecipe, tile: ImageDims) -> Result<RgbImage> {

	if planes.len() != FINGERPRINT_CHANNELS {
		bail!("Fingerprint styles need exactly {} channels, got {}", FINGERPRINT_CHANNELS, planes.len());
	}

	// unlike classic, fingerprints wrap around on 8-bit overflow
	for (plane, coef) in planes.iter_mut().zip(recipe.intensity) {
		for Luma([v]) in plane.pixels_mut() {
			*v = (*v as u32).wrapping_mul(coef) as u8;
		}
	}

	// fold the last two channels of the order into the targets, in sequence
	fold_into(&mut planes, recipe.channel_order[3], recipe.target_rgb[0]);
	fold_into(&mut planes, recipe.channel_order[4], recipe.target_rgb[1]);

	let [blue, green, red] = [0, 1, 2].map(|i| &planes[recipe.channel_order[i]]);
	Ok(RgbImage::from_fn(tile.width, tile.height, |x, y| {
		Rgb([red.get_pixel(x, y).0[0], green.get_pixel(x, y).0[0], blue.get_pixel(x, y).0[0]])
	}))
}


fn fold_into(planes: &mut [GrayImage], src: usize, dst: usize) {
	let src_plane = planes[src].clone();
	for (d, s) in planes[dst].pixels_mut().zip(src_plane.pixels()) {
		d.0[0] = d.0[0].wrapping_add(s.0[0]);
	}
}


/// Writes the recipe in the bottom-left corner of a site tile
pub fn annotate_recipe(img: &mut RgbImage, recipe: &Recipe) {
	let (width, height) = img.dimensions();
	let size = (canvas::label_size(height)*0.5).max(6.0);
	let x = ((width as f32)*0.01).ceil() as u32;
	let y = (((height as f32)*0.99).ceil() - size).max(0.0) as u32;
	img.text(x, y, size, Rgb([ANNOTATION_INTENSITY; 3]), recipe.to_string());
}
