//! A library for reading and writing compressed topographic elevation (`.cte`) archives of SRTM data.

use std::{fmt::Display, str::FromStr};

pub mod bits;
pub mod delta;
mod error;
pub use error::*;
mod header;
pub use header::*;
mod directory;
pub use directory::*;
mod block;
pub use block::*;
mod builder;
pub use builder::*;
mod reader;
pub use reader::*;
mod root;
pub use root::*;
mod fallback;
pub use fallback::*;

/// ## Archive layout
/// Every archive holds a single resolution and covers the whole globe in one-degree cells.
/// * [0..16384]: ASCII header of `[KEY] = value` lines, terminated by `[END OF HEADER]` and zero padded.
/// * [16384..16384 + dir_len]: The directory. 180 * 360 bit-packed entries, south to north, west to east. Each entry
///   is 36 bits wide (44 bits in the 2 second archive, where the trailing 8 bits hold the vertical accuracy of the
///   source in meters). An entry of `0` marks a cell that is all water, `2` a cell with no source data, and anything
///   else is the offset of the cell's block from the beginning of the file.
/// * [16384 + dir_len..]: Blocks, in the order they were appended.
///
/// Directory addresses are wider than 31 bits, so they are stored as a quotient and remainder of `i32::MAX` (see
/// [`bits::double_pack`]).
///
/// ## Blocks
/// * [0..8]: 3 bits of shape flag, 30 bits of compressed size, 31 bits of uncompressed size.
/// * [8..8 + compressed size]: A zlib stream containing the packed deltas of the cell.
///
/// ## Packed deltas
/// * 16 bits: The first defined elevation, two's complement.
/// * 16 bits: The bias added to every delta, two's complement.
/// * 4 bits: The width of every following field.
/// * `rows * cols` fields, in serpentine order (even rows west to east, odd rows east to west). A field is either
///   `delta + bias` from the previous defined sample, or all ones for a sample without an elevation.
///
/// Rows run north to south, so row 0 is the northern edge of the cell.
pub const FORMAT_VERSION: &str = "1.00";

/// Size of the ASCII header that starts every archive.
pub const HEADER_SIZE: usize = 16384;

/// Number of one-degree cells in the directory.
pub const CELL_COUNT: usize = 180 * 360;

/// Elevation reported for water.
pub const WATER: i16 = 0;
/// Elevation reported for samples and cells without source data.
pub const UNDEFINED: i16 = -32768;
/// Elevation reported when no archive could be opened for the query.
pub const NO_ARCHIVE: i16 = 32767;

/// The source resolution of an archive.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Resolution {
	One,
	Two,
	Three,
	Thirty,
}

impl Resolution {
	/// All resolutions, finest first.
	pub const ALL: [Resolution; 4] = [Resolution::One, Resolution::Two, Resolution::Three, Resolution::Thirty];

	pub fn arc_seconds(self) -> u8 {
		match self {
			Self::One => 1,
			Self::Two => 2,
			Self::Three => 3,
			Self::Thirty => 30,
		}
	}

	pub fn from_arc_seconds(seconds: u8) -> Option<Self> {
		Self::ALL.into_iter().find(|x| x.arc_seconds() == seconds)
	}

	/// Position in [`Resolution::ALL`].
	pub fn index(self) -> usize {
		match self {
			Self::One => 0,
			Self::Two => 1,
			Self::Three => 2,
			Self::Thirty => 3,
		}
	}

	pub fn file_name(self) -> String { format!("srtm{}.cte", self.arc_seconds()) }

	/// Whether directory entries carry the 8 bit vertical accuracy.
	pub fn has_accuracy(self) -> bool { self == Self::Two }

	pub fn entry_bits(self) -> usize {
		if self.has_accuracy() {
			ADDRESS_BITS + ACCURACY_BITS
		} else {
			ADDRESS_BITS
		}
	}

	/// The shape of a cell stored with the given block flag.
	pub fn cell_shape(self, flag: u8) -> Option<CellShape> {
		match (self, flag) {
			(Self::One, 0) | (Self::Two, 0) => Some(CellShape::square(3600)),
			(Self::Two, 1) => Some(CellShape { rows: 3600, cols: 1800 }),
			(Self::Three, 0) => Some(CellShape::square(1200)),
			(Self::Thirty, 0) => Some(CellShape::square(120)),
			_ => None,
		}
	}

	/// The block flag for a cell of the given shape.
	pub fn flag_for_shape(self, shape: CellShape) -> Option<u8> {
		(0..8).find(|&flag| self.cell_shape(flag) == Some(shape))
	}
}

impl Display for Resolution {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { write!(f, "{}\"", self.arc_seconds()) }
}

impl FromStr for Resolution {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim_end_matches('"')
			.parse::<u8>()
			.ok()
			.and_then(Self::from_arc_seconds)
			.ok_or_else(|| format!("unknown resolution `{}`, expected one of 1, 2, 3, 30", s))
	}
}

/// Dimensions of a decoded cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CellShape {
	pub rows: usize,
	pub cols: usize,
}

impl CellShape {
	pub fn square(side: usize) -> Self { Self { rows: side, cols: side } }

	pub fn len(self) -> usize { self.rows * self.cols }

	pub fn is_empty(self) -> bool { self.len() == 0 }
}

/// A fractional position resolved to its one-degree cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Location {
	/// Latitude of the cell's southern edge.
	pub lat: i16,
	/// Longitude of the cell's western edge.
	pub lon: i16,
	/// Distance from the northern edge of the cell, in `[0, 1]`.
	pub south: f64,
	/// Distance from the western edge of the cell, in `[0, 1)`.
	pub east: f64,
}

/// Folds any longitude into `[-180, 180)`.
pub fn normalize_lon(lon: f64) -> f64 { (lon + 180.0).rem_euclid(360.0) - 180.0 }

/// Resolves a position in degrees to its cell, or `None` if the latitude is off the globe.
pub fn locate(lat: f64, lon: f64) -> Option<Location> {
	if !(-90.0..=90.0).contains(&lat) || !lon.is_finite() {
		return None;
	}

	let lon = normalize_lon(lon);
	let cell_lat = (lat.floor() as i16).min(89);
	let cell_lon = (lon.floor() as i16).clamp(-180, 179);

	Some(Location {
		lat: cell_lat,
		lon: cell_lon,
		south: (cell_lat as f64 + 1.0 - lat).clamp(0.0, 1.0),
		east: (lon - cell_lon as f64).clamp(0.0, 1.0),
	})
}

pub fn map_lat_lon_to_index(lat: i16, lon: i16) -> usize {
	debug_assert!((-90..90).contains(&lat), "Latitude out of range");
	debug_assert!((-180..180).contains(&lon), "Longitude out of range");

	let lat = (lat + 90) as usize;
	let lon = (lon + 180) as usize;
	lat * 360 + lon
}

pub fn map_index_to_lat_lon(index: usize) -> (i16, i16) {
	debug_assert!(index < CELL_COUNT, "Index out of range");

	let lat = (index / 360) as i16 - 90;
	let lon = (index % 360) as i16 - 180;
	(lat, lon)
}

/// Like [`map_lat_lon_to_index`], but folds longitudes at or past the antimeridian and rejects latitudes outside
/// `[-90, 90)`.
pub fn checked_index(lat: i16, lon: i16) -> Result<usize, Error> {
	if !(-90..90).contains(&lat) {
		return Err(Error::OutOfRange { lat, lon });
	}
	let lon = (lon as i32 + 180).rem_euclid(360) - 180;
	Ok(map_lat_lon_to_index(lat, lon as i16))
}
