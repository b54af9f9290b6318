//! Readers for the raw elevation products each archive is built from.

use std::io;

use srtm::{CellGrid, Resolution};

pub use self::{dted::DtedSource, hgt::HgtSource, srtm30::Srtm30Source};

mod dted;
mod hgt;
mod srtm30;

/// Produces one grid per one-degree cell for a single resolution.
pub trait ElevationSource: Sync {
	fn resolution(&self) -> Resolution;

	/// Loads the cell with its south-west corner at `lat`, `lon`, or `None` if the source does not cover it.
	///
	/// Errors are for source files that exist but cannot be used.
	fn load_cell(&self, lat: i16, lon: i16) -> io::Result<Option<CellGrid>>;
}

/// The big-endian sample at `index`.
fn read_be_i16(bytes: &[u8], index: usize) -> i16 { i16::from_be_bytes([bytes[index * 2], bytes[index * 2 + 1]]) }

fn invalid_data(message: String) -> io::Error { io::Error::new(io::ErrorKind::InvalidData, message) }

/// `N47`, `S03` and the like for a latitude, `E007` and `W123` for a longitude.
fn hemisphere_name(value: i16, positive: char, negative: char, digits: usize) -> String {
	let hemisphere = if value < 0 { negative } else { positive };
	format!("{}{:0width$}", hemisphere, value.unsigned_abs(), width = digits)
}
