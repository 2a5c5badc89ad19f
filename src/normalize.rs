
use image::{GrayImage, ImageBuffer, Luma, Pixel};
use image::imageops::{self, FilterType};

use crate::loader::Gray16Image;
use crate::plate::ImageDims;


/// Resizes with cubic interpolation, unless the image already has the target size
pub fn resize_to<P>(img: &ImageBuffer<P,Vec<P::Subpixel>>, dims: ImageDims) -> ImageBuffer<P,Vec<P::Subpixel>>
	where
		P: Pixel + 'static,
		P::Subpixel: 'static
{
	if img.dimensions() == (dims.width, dims.height) {
		return img.clone();
	}
	imageops::resize(img, dims.width, dims.height, FilterType::CatmullRom)
}


/// Drops the low byte of every sample. No histogram stretching, so dim channels stay dim.
pub fn to_8bit(img: &Gray16Image) -> GrayImage {
	let (width, height) = img.dimensions();
	GrayImage::from_fn(width, height, |x, y| {
		let Luma([v]) = *img.get_pixel(x, y);
		Luma([(v/256) as u8])
	})
}


/// Multiplies one sample by the coefficient, clamping at 255 instead of wrapping.
pub fn multiply_clipped(v: u8, coef: f32) -> u8 {
	if !(coef > 0.0) {
		0
	} else if (v as f32) > 255.0/coef {
		255
	} else {
		((v as f32)*coef) as u8
	}
}


pub fn multiply_image_clipped(img: &mut GrayImage, coef: f32) {
	for Luma([v]) in img.pixels_mut() {
		*v = multiply_clipped(*v, coef);
	}
}


/// Turns one raw channel image into a QC tile:
/// resized to the tile size, truncated to 8 bits, then multiplied by the channel coefficient.
pub fn normalize_channel(raw: &Gray16Image, tile: ImageDims, coef: u32) -> GrayImage {
	let mut img = to_8bit(&resize_to(raw, tile));
	multiply_image_clipped(&mut img, coef as f32);
	img
}
