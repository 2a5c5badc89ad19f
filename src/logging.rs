
use std::fmt::Display;
use std::fs;
use std::ops::Deref;
use std::path::Path;

use anyhow::{Context, Result};
use display_error_chain::ErrorChainExt;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tracing::{error, warn};
use tracing::dispatcher::DefaultGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber};
use tracing_subscriber::fmt::format::{Format, Full};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;


/// filter used when the command line doesn't ask for anything else
pub const DEFAULT_FILTER: &str = "lumos=info";


pub const LOG_FILE_PREFIX: &str = "lumos";
const LOG_FILE_SUFFIX: &str = "log";
/// log files rotate daily, and only the newest few are kept
const LOG_FILES_KEPT: usize = 3;


/// Installs the process-wide subscriber, writing to the console and,
/// when a folder is given, to a rolling log file in it.
/// Rendering workers on other threads inherit it, so call this once, before spawning any.
pub fn init(filter: impl AsRef<str>, log_dir: Option<&Path>) -> Result<()> {

	let file_layer = match log_dir {
		Some(dir) => {
			let appender = log_file(dir)?;
			Some(
				fmt::layer()
					.event_format(log_format())
					.with_ansi(false)
					.with_writer(appender)
			)
		}
		None => None
	};

	let log_subscriber = tracing_subscriber::registry()
		.with(log_filter(filter)?)
		.with(fmt::layer().event_format(log_format()))
		.with(file_layer);

	tracing::subscriber::set_global_default(log_subscriber)
		.context("Failed to set logging subscriber")?;

	Ok(())
}


fn log_file(dir: &Path) -> Result<RollingFileAppender> {
	fs::create_dir_all(dir)
		.context(format!("Failed to create log folder: {}", dir.to_string_lossy()))?;
	RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_FILE_PREFIX)
		.filename_suffix(LOG_FILE_SUFFIX)
		.max_log_files(LOG_FILES_KEPT)
		.build(dir)
		.context(format!("Failed to open log file in: {}", dir.to_string_lossy()))
}


/// true for the files the rolling log writes, eg `lumos.2024-06-01.log`
pub fn is_log_file(name: &str) -> bool {
	name.starts_with(LOG_FILE_PREFIX) && name.ends_with(LOG_FILE_SUFFIX)
}


pub fn init_test() -> DefaultGuard {

	let subscriber = FmtSubscriber::builder()
		.with_env_filter(log_filter("lumos=trace").unwrap())
		.event_format(log_format())
		.with_test_writer()
		.finish();

	tracing::subscriber::set_default(subscriber)
}


fn log_filter(filter: impl AsRef<str>) -> Result<EnvFilter> {
	let filter = filter.as_ref();
	EnvFilter::builder()
		.parse(filter)
		.context(format!("Failed to parse log filter: {}", filter))
}


fn log_format() -> Format<Full,OffsetTime<&'static [FormatItem<'static>]>> {

	let time_format = format_description!(
		version = 2,
		"[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:4] [offset_hour sign:mandatory]:[offset_minute]"
	);

	let time_offset = UtcOffset::current_local_offset()
		.unwrap_or(UtcOffset::UTC);

	Format::default()
		.with_timer(OffsetTime::new(time_offset, time_format))
		.with_target(false)
}


pub trait ResultExt<T> {

	/// logs the whole error chain, for fatal errors at the top of a command
	fn log_err(self) -> Result<T,()>;

	/// logs the whole error chain as a warning and drops the error,
	/// for per-image failures that get replaced by a placeholder
	fn degrade(self, item: impl Display) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T,anyhow::Error> {

	fn log_err(self) -> Result<T,()> {
		self.map_err(|e| {
			error!("{}", e.deref().chain());
		})
	}

	fn degrade(self, item: impl Display) -> Option<T> {
		match self {
			Ok(value) => Some(value),
			Err(e) => {
				warn!("Unavailable {}: {}", item, e.deref().chain());
				None
			}
		}
	}
}
