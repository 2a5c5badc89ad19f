
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::config::PlatemapColumns;


/// Compound identifiers by well id, read from a tab-separated platemap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platemap {
	compounds: HashMap<String,String>
}

impl Platemap {

	pub fn read(path: impl AsRef<Path>, columns: &PlatemapColumns) -> Result<Self> {
		let path = path.as_ref();
		let reader = csv::ReaderBuilder::new()
			.delimiter(b'\t')
			.from_path(path)
			.with_context(|| format!("Failed to open platemap: {}", path.to_string_lossy()))?;
		Self::from_reader(reader, columns)
			.with_context(|| format!("Failed to read platemap: {}", path.to_string_lossy()))
	}

	fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>, columns: &PlatemapColumns) -> Result<Self> {

		let headers = reader.headers()?
			.clone();
		let column = |name: &str| -> Result<usize> {
			match headers.iter().position(|h| h == name) {
				Some(i) => Ok(i),
				None => bail!("Platemap has no column {}, found: {}", name, headers.iter().collect::<Vec<_>>().join(", "))
			}
		};
		let well_i = column(&columns.well_column)?;
		let id_i = column(&columns.id_column)?;

		let mut compounds = HashMap::new();
		for (line, record) in reader.records().enumerate() {
			let record = record
				.context(format!("Malformed platemap record {}", line + 1))?;
			let (Some(well), Some(id)) = (record.get(well_i), record.get(id_i))
				else {
					warn!("Platemap record {} is missing columns, ignoring it", line + 1);
					continue;
				};
			compounds.insert(well.trim().to_string(), id.trim().to_string());
		}
		debug!("Read {} compounds from the platemap", compounds.len());

		Ok(Self {
			compounds
		})
	}

	pub fn compound(&self, well: impl AsRef<str>) -> Option<&str> {
		self.compounds.get(well.as_ref())
			.map(String::as_str)
			.filter(|id| !id.is_empty())
	}

	pub fn len(&self) -> usize {
		self.compounds.len()
	}

	pub fn is_empty(&self) -> bool {
		self.compounds.is_empty()
	}
}
