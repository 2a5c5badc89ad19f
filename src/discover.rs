
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::plate::NamingScheme;


/// Microscopes often write a plate's images into an `Images` folder inside the plate folder
const IMAGES_DIR: &str = "Images";


/// The images of one plate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateInput {
	pub name: String,
	pub dir: PathBuf,
	pub files: Vec<PathBuf>
}

impl PlateInput {

	/// Every image must be named by the scheme, before any channel starts rendering
	pub fn check_naming(&self, scheme: NamingScheme) -> Result<()> {
		for path in &self.files {
			scheme.parse_path(path)
				.context(format!("Plate {} can't be rendered", self.name))?;
		}
		Ok(())
	}
}


fn is_image(path: &Path) -> bool {
	path.extension()
		.map(|ext| {
			let ext = ext.to_string_lossy().to_lowercase();
			ext == "tif" || ext == "tiff"
		})
		.unwrap_or(false)
}


fn walk_images(dir: &Path) -> Result<Vec<PathBuf>> {

	if !dir.is_dir() {
		bail!("Source folder does not exist: {}", dir.to_string_lossy());
	}

	let mut files = Vec::new();
	for entry in WalkDir::new(dir).follow_links(true) {
		let entry = match entry {
			Ok(entry) => entry,
			Err(e) => {
				warn!("Skipping unreadable entry under {}: {}", dir.to_string_lossy(), e);
				continue;
			}
		};
		if entry.file_type().is_file() && is_image(entry.path()) {
			files.push(entry.into_path());
		}
	}
	files.sort();

	Ok(files)
}


/// Lists all the images under the plate folder.
/// No images at all means the folder or naming is wrong, rather than a sparse plate.
pub fn discover_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
	let dir = dir.as_ref();
	let files = walk_images(dir)?;
	if files.is_empty() {
		bail!("No image files found under: {}", dir.to_string_lossy());
	}
	debug!("Found {} images under {}", files.len(), dir.to_string_lossy());
	Ok(files)
}


pub fn plate_name(dir: &Path) -> Result<String> {
	let name = |dir: &Path| {
		dir.file_name()
			.map(|name| name.to_string_lossy().to_string())
			.context(format!("Can't name a plate after folder: {}", dir.to_string_lossy()))
	};
	let dir_name = name(dir)?;
	if dir_name == IMAGES_DIR {
		if let Some(parent) = dir.parent() {
			return name(parent);
		}
	}
	Ok(dir_name)
}


pub fn discover_plate(dir: impl AsRef<Path>) -> Result<PlateInput> {
	let dir = dir.as_ref();
	Ok(PlateInput {
		name: plate_name(dir)?,
		dir: dir.to_path_buf(),
		files: discover_images(dir)?
	})
}


/// Finds the plates of a run: every folder that directly holds images, in name order
pub fn discover_plates(run_dir: impl AsRef<Path>) -> Result<Vec<PlateInput>> {
	let run_dir = run_dir.as_ref();

	let mut by_dir = BTreeMap::<PathBuf,Vec<PathBuf>>::new();
	for file in walk_images(run_dir)? {
		if let Some(dir) = file.parent() {
			by_dir.entry(dir.to_path_buf())
				.or_default()
				.push(file);
		}
	}
	if by_dir.is_empty() {
		bail!("No image files found under: {}", run_dir.to_string_lossy());
	}

	let mut plates = by_dir.into_iter()
		.map(|(dir, files)| {
			Ok(PlateInput {
				name: plate_name(&dir)?,
				dir,
				files
			})
		})
		.collect::<Result<Vec<_>>>()?;
	plates.sort_by(|a, b| a.name.cmp(&b.name));

	for pair in plates.windows(2) {
		if pair[0].name == pair[1].name {
			bail!("Two folders would render as plate {}: {} and {}", pair[0].name, pair[0].dir.to_string_lossy(), pair[1].dir.to_string_lossy());
		}
	}

	info!("Found {} plates: {:?}", plates.len(), plates.iter().map(|p| p.name.as_str()).collect::<Vec<_>>());
	Ok(plates)
}
