use std::collections::HashMap;

use crate::{Error, Resolution, FORMAT_VERSION, HEADER_SIZE};

/// The zlib release whose stream format the block payloads follow, recorded as `[ZLIB VERSION]`.
///
/// This names the format level, not the library that compressed the archive: `flate2`'s default
/// `miniz_oxide` backend writes plain RFC 1950 streams that any zlib 1.x inflates. Only the major
/// version is checked when an archive is opened.
pub const ZLIB_VERSION: &str = "1.2.13";

const END_OF_HEADER: &str = "[END OF HEADER]";

/// The ASCII header at the start of every archive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveHeader {
	pub header_size: usize,
	pub version: String,
	pub zlib_version: String,
	pub creation_date: String,
	/// Absent in archives that predate the field.
	pub resolution: Option<Resolution>,
	pub entry_bits: Option<usize>,
}

impl ArchiveHeader {
	pub fn new(resolution: Resolution) -> Self {
		Self {
			header_size: HEADER_SIZE,
			version: format!("SRTM compressed topographic elevation V{}", FORMAT_VERSION),
			zlib_version: ZLIB_VERSION.to_string(),
			creation_date: chrono::Utc::now().format("%a %b %e %H:%M:%S %Y").to_string(),
			resolution: Some(resolution),
			entry_bits: Some(resolution.entry_bits()),
		}
	}

	/// The header, zero padded to [`HEADER_SIZE`].
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut text = String::new();
		text.push_str(&format!("[VERSION] = {}\n", self.version));
		text.push_str(&format!("[ZLIB VERSION] = {}\n", self.zlib_version));
		text.push_str(&format!("[CREATION DATE] = {}\n", self.creation_date));
		text.push_str(&format!("[HEADER SIZE] = {}\n", self.header_size));
		if let Some(resolution) = self.resolution {
			text.push_str(&format!("[RESOLUTION] = {}\n", resolution.arc_seconds()));
		}
		if let Some(bits) = self.entry_bits {
			text.push_str(&format!("[DIRECTORY ENTRY BITS] = {}\n", bits));
		}
		text.push_str(END_OF_HEADER);
		text.push('\n');

		let mut bytes = text.into_bytes();
		bytes.resize(HEADER_SIZE.max(bytes.len()), 0);
		bytes
	}

	/// Parses the header text. Fields are not checked against this build; see [`ArchiveHeader::validate`].
	pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
		let end = bytes.iter().position(|&x| x == 0).unwrap_or(bytes.len());
		let text = String::from_utf8_lossy(&bytes[..end]);

		let mut fields = HashMap::new();
		let mut terminated = false;
		for line in text.lines() {
			let line = line.trim();
			if line == END_OF_HEADER {
				terminated = true;
				break;
			}
			if let Some((key, value)) = line.split_once('=') {
				fields.insert(key.trim().to_string(), value.trim().to_string());
			}
		}
		if !terminated {
			return Err(Error::UnterminatedHeader);
		}

		let mut take = |field: &'static str| fields.remove(field).ok_or(Error::MissingHeaderField(field));
		let header_size = take("[HEADER SIZE]")?;
		let header_size = header_size.parse().map_err(|_| Error::InvalidHeaderField {
			field: "[HEADER SIZE]",
			value: header_size,
		})?;
		let version = take("[VERSION]")?;
		let zlib_version = take("[ZLIB VERSION]")?;
		let creation_date = take("[CREATION DATE]").unwrap_or_default();

		let resolution = match take("[RESOLUTION]") {
			Ok(value) => Some(value.parse().map_err(|_| Error::InvalidHeaderField {
				field: "[RESOLUTION]",
				value,
			})?),
			Err(_) => None,
		};
		let entry_bits = match take("[DIRECTORY ENTRY BITS]") {
			Ok(value) => Some(value.parse().map_err(|_| Error::InvalidHeaderField {
				field: "[DIRECTORY ENTRY BITS]",
				value,
			})?),
			Err(_) => None,
		};

		Ok(Self {
			header_size,
			version,
			zlib_version,
			creation_date,
			resolution,
			entry_bits,
		})
	}

	/// Checks that an archive with this header can be decoded as `resolution` by this build.
	pub fn validate(&self, resolution: Resolution) -> Result<(), Error> {
		if self.header_size != HEADER_SIZE {
			return Err(Error::HeaderSize {
				found: self.header_size,
				expected: HEADER_SIZE,
			});
		}

		if major_version(&self.zlib_version).is_none() || major_version(&self.zlib_version) != major_version(ZLIB_VERSION)
		{
			return Err(Error::CompressorVersion {
				found: self.zlib_version.clone(),
				expected: ZLIB_VERSION.to_string(),
			});
		}

		if let Some(found) = self.resolution {
			if found != resolution {
				return Err(Error::ResolutionMismatch {
					found,
					expected: resolution,
				});
			}
		}
		if let Some(bits) = self.entry_bits {
			if bits != resolution.entry_bits() {
				return Err(Error::InvalidHeaderField {
					field: "[DIRECTORY ENTRY BITS]",
					value: bits.to_string(),
				});
			}
		}

		Ok(())
	}
}

fn major_version(version: &str) -> Option<u32> { version.split('.').next()?.trim().parse().ok() }
