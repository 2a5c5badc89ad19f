
use anyhow::{bail, Context, Result};
use image::{GenericImage, ImageBuffer, Pixel};

use crate::plate::GridShape;


/// Tiles the images into one, row by row: the first `cols` images make the top row, left to right.
/// All images must have the same size, and there must be exactly rows*cols of them.
pub fn concatenate_images_in_grid<P>(images: &[ImageBuffer<P,Vec<P::Subpixel>>], grid: GridShape) -> Result<ImageBuffer<P,Vec<P::Subpixel>>>
	where
		P: Pixel
{
	if images.len() != grid.area() as usize {
		bail!("Can't tile {} images into a {} grid", images.len(), grid);
	}

	let Some(first) = images.first()
		else { bail!("No images to tile"); };
	let (width, height) = first.dimensions();
	if let Some((i, img)) = images.iter().enumerate().find(|(_, img)| img.dimensions() != (width, height)) {
		bail!("Image {} is {}x{}, but the grid tiles are {}x{}", i, img.width(), img.height(), width, height);
	}

	let mut out = ImageBuffer::<P,Vec<P::Subpixel>>::new(width*grid.cols, height*grid.rows);
	for (i, img) in images.iter().enumerate() {
		let row = (i as u32)/grid.cols;
		let col = (i as u32)%grid.cols;
		out.copy_from(img, col*width, row*height)
			.context(format!("Failed to place tile {}", i))?;
	}

	Ok(out)
}
