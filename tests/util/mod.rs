
#![allow(unused)]

pub mod cmd;
pub mod workspace;


/// A 16x24-well plate of 2x3 sites, with small 100x100 images so full plates render quickly
pub const PLATE_CONFIG: &str = indoc::indoc! { r#"
	image_dimensions = "100x100"
	site_grid = "2x3"
	well_grid = "16x24"
	input_file_naming_scheme = "letter_wells"
	default_output_format = "png"
	default_channels_to_render = ["C01", "C02", "C03", "C04", "C05"]
	rescale_ratio_qc = 0.2
	rescale_ratio_cp_wells = 1.0
	rescale_ratio_cp_plate = 0.2
	placeholder_background_intensity = 64
	placeholder_markers_intensity = 0

	[channel_info.C01]
	name = "DNA"
	qc_coef = 16
	cp_contrast = 1.0
	cp_intensity = 10.0
	rgb = [0, 70, 255]

	[channel_info.C02]
	name = "ER"
	qc_coef = 8
	cp_contrast = 1.0
	cp_intensity = 5.0
	rgb = [0, 255, 0]

	[channel_info.C03]
	name = "RNA"
	qc_coef = 8
	cp_contrast = 0.7
	cp_intensity = 1.8
	rgb = [225, 255, 0]

	[channel_info.C04]
	name = "AGP"
	qc_coef = 8
	cp_contrast = 1.0
	cp_intensity = 5.0
	rgb = [255, 79, 0]

	[channel_info.C05]
	name = "MITO"
	qc_coef = 8
	cp_contrast = 2.5
	cp_intensity = 7.0
	rgb = [255, 0, 0]

	[fingerprint_style_dict]
	random = [[], [], []]
	alien = [[3, 6, 4, 3, 3], [1, 3, 2, 4, 0], [1, 0, 2]]
"# };
