
use std::ops::Deref;
use std::path::Path;
use std::sync::LazyLock;

use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use image::{GrayImage, ImageBuffer, Luma, Pixel, PixelWithColorType, RgbImage};
use imageproc::drawing::{
	draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, Canvas
};
use imageproc::rect::Rect;
use tracing::debug;

use crate::plate::ImageDims;


static FONT: LazyLock<FontRef> = LazyLock::new(|| {
	FontRef::try_from_slice(include_bytes!("DejaVuSansMono.ttf"))
		.expect("failed to load embedded font")
});


/// intensity of well labels, fingerprints and well borders
pub const ANNOTATION_INTENSITY: u8 = 192;


/// Text and frame drawing shared by the greyscale (QC) and color (composite) tiles
pub trait Drawing: Canvas {

	fn text(&mut self, x: u32, y: u32, size: f32, color: Self::Pixel, text: impl AsRef<str>);

	/// a 1px frame around the whole tile
	fn border(&mut self, color: Self::Pixel);
}

impl<C> Drawing for C
	where
		C: Canvas,
		C::Pixel: Pixel<Subpixel = u8>
{

	fn text(&mut self, x: u32, y: u32, size: f32, color: Self::Pixel, text: impl AsRef<str>) {
		draw_text_mut(
			self,
			color,
			x as i32,
			y as i32,
			PxScale {
				x: size,
				y: size
			},
			FONT.deref(),
			text.as_ref()
		)
	}

	fn border(&mut self, color: Self::Pixel) {
		let (width, height) = self.dimensions();
		draw_hollow_rect_mut(self, Rect::at(0, 0).of_size(width, height), color);
	}
}


/// text height for labels on a tile, proportional to the tile so labels survive rescaling
pub fn label_size(tile_height: u32) -> f32 {
	((tile_height as f32)*0.06).ceil().max(6.0)
}


/// Builds the stand-in for a site image that couldn't be loaded:
/// a flat background with four corner brackets, a circle and a slash.
/// Only depends on its arguments, so every placeholder of a render is identical.
pub fn placeholder(dims: ImageDims, background: u8, markers: u8) -> GrayImage {

	let mut img = GrayImage::from_pixel(dims.width, dims.height, Luma([background]));
	let color = Luma([markers]);

	let width = dims.width as i32;
	let height = dims.height as i32;
	let short = width.min(height);
	let thickness = (short/50).max(1);
	let arm = (short/5).max(1);
	let margin = short/10;

	// corner brackets: one horizontal and one vertical bar per corner
	let left = margin;
	let top = margin;
	let right = width - margin;
	let bottom = height - margin;
	for (x, y, w, h) in [
		(left, top, arm, thickness),
		(left, top, thickness, arm),
		(right - arm, top, arm, thickness),
		(right - thickness, top, thickness, arm),
		(left, bottom - thickness, arm, thickness),
		(left, bottom - arm, thickness, arm),
		(right - arm, bottom - thickness, arm, thickness),
		(right - thickness, bottom - arm, thickness, arm)
	] {
		draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w as u32, h as u32), color);
	}

	// circle, thickened inwards
	let center = (width/2, height/2);
	let radius = (short/4).max(1);
	for i in 0 .. thickness.min(radius) {
		draw_hollow_circle_mut(&mut img, center, radius - i, color);
	}

	// slash across the circle, from bottom-left to top-right
	let reach = (radius as f32)*0.75;
	let (cx, cy) = (center.0 as f32, center.1 as f32);
	for i in 0 .. thickness {
		let offset = i as f32;
		draw_line_segment_mut(&mut img, (cx - reach + offset, cy + reach), (cx + reach + offset, cy - reach), color);
	}

	img
}


pub fn save<P>(img: &ImageBuffer<P,Vec<u8>>, path: impl AsRef<Path>) -> Result<()>
	where
		P: PixelWithColorType + Pixel<Subpixel = u8>
{
	let path = path.as_ref();
	img.save(path)
		.context(format!("Failed to save image to: {}", path.to_string_lossy()))?;
	debug!("Saved image: {}", path.to_string_lossy());
	Ok(())
}


pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage> {
	let path = path.as_ref();
	let img = image::open(path)
		.context(format!("Failed to load image: {}", path.to_string_lossy()))?;
	Ok(img.into_luma8())
}


pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
	let path = path.as_ref();
	let img = image::open(path)
		.context(format!("Failed to load image: {}", path.to_string_lossy()))?;
	Ok(img.into_rgb8())
}
