
pub mod cp;
pub mod qc;


use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::render;


fn required_path(path: Option<String>, option: &str) -> Result<PathBuf> {
	path.map(PathBuf::from)
		.context(format!("Missing --{}", option))
}


fn temp_dir(temp_path: Option<String>) -> PathBuf {
	temp_path.map(PathBuf::from)
		.unwrap_or_else(env::temp_dir)
}


/// Runs the render inside its own freshly-purged working folder,
/// then removes the folder, unless asked to keep it for inspection
fn in_work_dir<T>(work_dir: &Path, keep: bool, render: impl FnOnce() -> Result<T>) -> Result<T> {

	render::reset_work_dir(work_dir)?;

	let result = render();

	if keep {
		debug!("Keeping working folder: {}", work_dir.to_string_lossy());
	} else {
		// leftovers get purged by the next render
		if let Err(e) = fs::remove_dir_all(work_dir) {
			warn!("Failed to remove working folder: {}: {}", work_dir.to_string_lossy(), e);
		}
	}

	result
}


#[cfg(test)]
mod test {

	use anyhow::bail;
	use assert_fs::TempDir;
	use galvanic_assert::{assert_that, matchers::*};

	use super::*;


	#[test]
	fn work_dir_lifecycle() {
		let dir = TempDir::new().unwrap();
		let work_dir = dir.path().join("tmpgen-P1-C01");

		let seen = in_work_dir(&work_dir, false, || Ok(work_dir.is_dir()))
			.unwrap();
		assert_that!(&seen, eq(true));
		assert_that!(&work_dir.exists(), eq(false));

		in_work_dir(&work_dir, true, || Ok(()))
			.unwrap();
		assert_that!(&work_dir.is_dir(), eq(true));
	}

	#[test]
	fn render_error_outlives_cleanup_error() {
		let dir = TempDir::new().unwrap();
		let work_dir = dir.path().join("tmpgen-P1-C01");

		// the folder is already gone when cleanup runs
		let result = in_work_dir(&work_dir, false, || -> Result<()> {
			fs::remove_dir_all(&work_dir)?;
			bail!("Render failed");
		});
		let e = result.unwrap_err();
		assert_that!(&e.to_string(), eq("Render failed".to_string()));
	}
}
