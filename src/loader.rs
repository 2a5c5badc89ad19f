
use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{ImageBuffer, Luma};

use crate::logging::ResultExt;
use crate::reconcile::ImageRecord;


/// raw acquisitions are single-channel, usually 16-bit
pub type Gray16Image = ImageBuffer<Luma<u16>,Vec<u16>>;


/// Reads one raw channel image, as 16-bit greyscale.
/// 8-bit sources are widened, so the later /256 conversion treats both alike.
pub fn load_raw(path: &Path) -> Result<Gray16Image> {

	if !path.is_file() {
		bail!("File does not exist: {}", path.to_string_lossy());
	}

	let img = image::open(path)
		.context(format!("Failed to read image: {}", path.to_string_lossy()))?
		.into_luma16();

	if img.width() == 0 || img.height() == 0 {
		bail!("Image is empty: {}", path.to_string_lossy());
	}

	Ok(img)
}


/// Loads the image of the requested site among the records of a well (or of a site).
/// Returns None whenever the image is unavailable: a hole in the plate, a missing file,
/// or an unreadable one. Callers substitute a placeholder; missing images are routine, so there are no retries.
pub fn load_site_image<'a>(records: impl IntoIterator<Item = &'a ImageRecord>, site: u32) -> Option<Gray16Image> {
	let record = records.into_iter()
		.find(|record| record.coordinate.site == site)?;
	load_record(record)
}


pub fn load_record(record: &ImageRecord) -> Option<Gray16Image> {

	let Some(path) = record.fullpath()
		else {
			tracing::debug!("No image for {}", record.coordinate);
			return None;
		};

	load_raw(path)
		.degrade(&record.coordinate)
}
