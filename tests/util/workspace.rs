
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use image::{ImageBuffer, Luma, RgbImage};
use lumos::logging::is_log_file;


/// A throwaway folder with a config, plate folders of raw images, and output/temp folders
pub struct Workspace {
	dir: TempDir
}

impl Workspace {

	pub fn new() -> Self {
		Self {
			dir: TempDir::new()
				.expect("Failed to make temp folder")
		}
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn write_config(&self, toml: impl AsRef<str>) -> PathBuf {
		let path = self.path().join("lumos.toml");
		fs::write(&path, toml.as_ref())
			.expect(&format!("Failed to write config: {}", path.to_string_lossy()));
		path
	}

	pub fn plate_dir(&self, name: &str) -> PathBuf {
		let path = self.path().join("run").join(name);
		fs::create_dir_all(&path)
			.expect(&format!("Failed to make plate folder: {}", path.to_string_lossy()));
		path
	}

	/// writes a flat 16-bit raw image
	pub fn write_image(&self, plate: &str, filename: &str, width: u32, height: u32, value: u16) {
		let path = self.plate_dir(plate).join(filename);
		ImageBuffer::<Luma<u16>,Vec<u16>>::from_pixel(width, height, Luma([value]))
			.save(&path)
			.expect(&format!("Failed to write image: {}", path.to_string_lossy()));
	}

	pub fn output_dir(&self) -> PathBuf {
		let path = self.path().join("out");
		fs::create_dir_all(&path)
			.expect("Failed to make output folder");
		path
	}

	pub fn temp_dir(&self) -> PathBuf {
		let path = self.path().join("tmp");
		fs::create_dir_all(&path)
			.expect("Failed to make temp folder");
		path
	}

	/// what's left in the temp folder, besides the log files
	pub fn temp_leftovers(&self) -> Vec<String> {
		self.temp_entries()
			.into_iter()
			.filter(|name| !is_log_file(name))
			.collect()
	}

	pub fn log_files(&self) -> Vec<String> {
		self.temp_entries()
			.into_iter()
			.filter(|name| is_log_file(name))
			.collect()
	}

	fn temp_entries(&self) -> Vec<String> {
		fs::read_dir(self.temp_dir())
			.expect("Failed to list temp folder")
			.map(|entry| {
				entry.expect("Failed to read temp folder entry")
					.file_name()
					.to_string_lossy()
					.to_string()
			})
			.collect()
	}

	pub fn read_output(&self, name: impl AsRef<Path>) -> RgbImage {
		let path = self.output_dir().join(name);
		image::open(&path)
			.expect(&format!("Failed to read output: {}", path.to_string_lossy()))
			.into_rgb8()
	}

	pub fn print(&self) {
		for entry in walkdir::WalkDir::new(self.path()).max_depth(3) {
			match entry {
				Ok(entry) => println!("\t{}", entry.path().to_string_lossy()),
				Err(e) => println!("\tError: {}", e)
			}
		}
	}
}

