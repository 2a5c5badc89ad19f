
mod util;


use std::fs;
use std::path::Path;

use assert_cmd::assert::Assert;
use galvanic_assert::{assert_that, matchers::*};
use lumos::canvas;
use lumos::plate::ImageDims;

use crate::util::cmd::{lumos, AssertExt};
use crate::util::workspace::Workspace;
use crate::util::PLATE_CONFIG;


/// one image per channel, each in a different well and site
const SPARSE_PLATE: [(&str, &str, u32); 5] = [
	("C01", "A01", 1),
	("C02", "B05", 2),
	("C03", "H12", 6),
	("C04", "M20", 3),
	("C05", "P24", 4)
];

const FILL: u16 = 32768;


fn sparse_plate(ws: &Workspace, plate: &str) {
	for (channel, well, site) in SPARSE_PLATE {
		let filename = format!("{}_{}_T0001F{:03}L01A01Z01{}.tif", plate, well, site, channel);
		ws.write_image(plate, &filename, 100, 100, FILL);
	}
}


fn qc(ws: &Workspace, args: &[&str]) -> Assert {
	lumos(ws, PLATE_CONFIG, "qc")
		.args(args)
		.assert()
		.print_stdout()
		.print_stderr()
}


fn source(path: &Path) -> String {
	path.to_string_lossy().to_string()
}


/// 16x24 wells of 2x3 sites, each site 20x20 at the qc ratio
const WELL_GRID: (u32, u32) = (16, 24);
const SITE_GRID: (u32, u32) = (2, 3);
const TILE: u32 = 20;


/// the plate position of a site's pixel: (well index, 1-based site, x, y)
fn site_pixels() -> impl Iterator<Item = (u32, u32, u32, u32)> {
	let well_width = TILE*SITE_GRID.1;
	let well_height = TILE*SITE_GRID.0;
	(0 .. WELL_GRID.0*WELL_GRID.1).flat_map(move |well_i| {
		(0 .. well_height).flat_map(move |y| {
			(0 .. well_width).map(move |x| {
				let site = (y/TILE)*SITE_GRID.1 + x/TILE + 1;
				let plate_x = (well_i%WELL_GRID.1)*well_width + x;
				let plate_y = (well_i/WELL_GRID.1)*well_height + y;
				(well_i, site, plate_x, plate_y)
			})
		})
	})
}


/// Only the bottom row of sites, inside the 1px well border, stays clear of the well label
fn is_measured(plate_x: u32, plate_y: u32) -> bool {
	let x = plate_x%(TILE*SITE_GRID.1);
	let y = plate_y%(TILE*SITE_GRID.0);
	y >= TILE && y < TILE*SITE_GRID.0 - 1 && x >= 1 && x < TILE*SITE_GRID.1 - 1
}


#[test]
fn sparse_plate_renders_every_channel() {
	let ws = Workspace::new();
	sparse_plate(&ws, "Plate1");

	qc(&ws, &["--scope", "plate", "--source-path", &source(&ws.plate_dir("Plate1"))])
		.success();
	ws.print();

	let placeholder = canvas::placeholder(ImageDims::new(TILE, TILE), 64, 0);

	for (channel, well, site) in SPARSE_PLATE {
		let coef = if channel == "C01" { 16 } else { 8 };
		let img = ws.read_output(format!("Plate1-{}-{}.png", channel, coef));
		assert_that!(&img.dimensions(), eq((TILE*SITE_GRID.1*WELL_GRID.1, TILE*SITE_GRID.0*WELL_GRID.0)));

		// the one real site is the clipped fill, everything else is the placeholder
		let real = ((FILL/256) as u32*coef).min(255) as f64;
		let well_i = well_index(well);
		let (mut observed, mut expected, mut count) = (0f64, 0f64, 0f64);
		for (pixel_well, pixel_site, x, y) in site_pixels() {
			if !is_measured(x, y) {
				continue;
			}
			observed += img.get_pixel(x, y).0[0] as f64;
			expected += if pixel_well == well_i && pixel_site == site {
				real
			} else {
				placeholder.get_pixel(x%TILE, y%TILE).0[0] as f64
			};
			count += 1.0;
		}
		let (observed, expected) = (observed/count, expected/count);
		println!("{}: mean {}, expected {}", channel, observed, expected);
		assert_that!(&((observed - expected).abs() < 0.5), eq(true));

		// and the real site is there, away from its label
		let (site_x, site_y) = site_origin(well_i, site);
		assert_that!(&img.get_pixel(site_x + TILE/2, site_y + TILE*3/4).0, eq([real as u8; 3]));
	}

	// working folders are gone
	assert_that!(&ws.temp_leftovers(), eq(Vec::<String>::new()));
	assert_that!(&ws.log_files().len(), eq(1));
}


/// row-major index of a letter well, eg B05 is 24 + 4
fn well_index(well: &str) -> u32 {
	let row = (well.as_bytes()[0] - b'A') as u32;
	let col = well[1..].parse::<u32>().unwrap() - 1;
	row*WELL_GRID.1 + col
}


fn site_origin(well_i: u32, site: u32) -> (u32, u32) {
	let x = (well_i%WELL_GRID.1)*TILE*SITE_GRID.1 + ((site - 1)%SITE_GRID.1)*TILE;
	let y = (well_i/WELL_GRID.1)*TILE*SITE_GRID.0 + ((site - 1)/SITE_GRID.1)*TILE;
	(x, y)
}


#[test]
fn single_channel() {
	let ws = Workspace::new();
	sparse_plate(&ws, "Plate1");

	qc(&ws, &["--scope", "channel", "--channel", "C03", "--source-path", &source(&ws.plate_dir("Plate1")), "--keep-temp"])
		.success();

	let outputs = fs::read_dir(ws.output_dir())
		.unwrap()
		.map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
		.collect::<Vec<_>>();
	assert_that!(&outputs, eq(vec!["Plate1-C03-8.png".to_string()]));

	// the working folder was kept, with one image per well
	let wells = fs::read_dir(ws.temp_dir().join("tmpgen-Plate1-C03/wells"))
		.unwrap()
		.count();
	assert_that!(&wells, eq(384));
}


#[test]
fn run_renders_every_plate() {
	let ws = Workspace::new();
	sparse_plate(&ws, "PlateA");
	sparse_plate(&ws, "PlateB");

	qc(&ws, &["--scope", "run", "--source-path", &source(&ws.path().join("run")), "--serial", "--output-format", "jpg"])
		.success();

	for plate in ["PlateA", "PlateB"] {
		let img = ws.read_output(format!("{}-C01-16.jpg", plate));
		assert_that!(&img.dimensions(), eq((1440, 640)));
	}
}


#[test]
fn bad_options() {
	let ws = Workspace::new();
	sparse_plate(&ws, "Plate1");
	let plate = source(&ws.plate_dir("Plate1"));

	// channel scope needs a channel, other scopes can't have one
	qc(&ws, &["--scope", "channel", "--source-path", &plate])
		.failure();
	qc(&ws, &["--scope", "plate", "--channel", "C01", "--source-path", &plate])
		.failure();
	qc(&ws, &["--scope", "channel", "--channel", "C42", "--source-path", &plate])
		.failure();
	qc(&ws, &["--source-path", &plate])
		.failure();

	// a folder without images
	fs::create_dir_all(ws.path().join("empty")).unwrap();
	qc(&ws, &["--scope", "plate", "--source-path", &source(&ws.path().join("empty"))])
		.failure();
}
