use std::{
	fs::File,
	io,
	path::{Path, PathBuf},
};

use log::warn;
use memmap2::Mmap;
use srtm::{CellGrid, CellShape, Resolution, UNDEFINED};

use super::{hemisphere_name, invalid_data, ElevationSource};

const UHL_SIZE: usize = 80;
const DSI_SIZE: usize = 648;
const ACC_SIZE: usize = 2700;
const DATA_START: usize = UHL_SIZE + DSI_SIZE + ACC_SIZE;
/// Sentinel, block count, longitude count and latitude count.
const RECORD_HEADER_SIZE: usize = 8;
const RECORD_CHECKSUM_SIZE: usize = 4;
const RECORD_SENTINEL: u8 = 0xAA;
const DTED_VOID: i16 = -32767;
/// Accuracy recorded for cells whose source gives none.
pub const UNKNOWN_ACCURACY: u8 = 255;

/// One DTED level 2 file.
#[derive(Clone, Debug, PartialEq)]
pub struct DtedCell {
	/// Tenths of an arc second.
	pub lon_interval: u32,
	pub lat_interval: u32,
	/// Absolute vertical accuracy in meters.
	pub accuracy: u8,
	pub shape: CellShape,
	/// Row-major, north to south. Voids are [`UNDEFINED`].
	pub data: Vec<i16>,
}

fn ascii_field(bytes: &[u8], range: std::ops::Range<usize>) -> &str {
	std::str::from_utf8(&bytes[range]).unwrap_or("").trim()
}

fn numeric_field(bytes: &[u8], range: std::ops::Range<usize>, name: &str) -> io::Result<u32> {
	ascii_field(bytes, range)
		.parse()
		.map_err(|_| invalid_data(format!("DTED header field `{}` is not a number", name)))
}

fn signed_magnitude(high: u8, low: u8) -> i16 {
	let raw = u16::from_be_bytes([high, low]);
	let magnitude = (raw & 0x7FFF) as i16;
	if raw & 0x8000 != 0 {
		-magnitude
	} else {
		magnitude
	}
}

/// Parses a DTED file into a grid without its southern row and eastern column.
pub fn parse(bytes: &[u8]) -> io::Result<DtedCell> {
	tracy::zone!("Parse DTED");

	if bytes.len() < DATA_START || &bytes[0..3] != b"UHL" {
		return Err(invalid_data("missing DTED user header label".to_string()));
	}
	let uhl = &bytes[..UHL_SIZE];

	let lon_interval = numeric_field(uhl, 20..24, "longitude interval")?;
	let lat_interval = numeric_field(uhl, 24..28, "latitude interval")?;
	let accuracy = match ascii_field(uhl, 28..32) {
		"NA" | "" => UNKNOWN_ACCURACY,
		x => x.parse::<u32>().map(|x| x.min(UNKNOWN_ACCURACY as u32) as u8).map_err(|_| {
			invalid_data("DTED header field `vertical accuracy` is not a number".to_string())
		})?,
	};
	let lon_lines = numeric_field(uhl, 47..51, "longitude lines")? as usize;
	let lat_points = numeric_field(uhl, 51..55, "latitude points")? as usize;
	if lon_lines < 2 || lat_points < 2 {
		return Err(invalid_data(format!("DTED grid of {} x {} posts", lon_lines, lat_points)));
	}

	let record_size = RECORD_HEADER_SIZE + lat_points * 2 + RECORD_CHECKSUM_SIZE;
	let expected = DATA_START + lon_lines * record_size;
	if bytes.len() < expected {
		return Err(invalid_data(format!(
			"DTED file is {} bytes, expected {}",
			bytes.len(),
			expected
		)));
	}

	let shape = CellShape {
		rows: lat_points - 1,
		cols: lon_lines - 1,
	};
	let mut data = vec![UNDEFINED; shape.len()];
	// Records run west to east, each holding one column from south to north.
	for col in 0..shape.cols {
		let record = &bytes[DATA_START + col * record_size..DATA_START + (col + 1) * record_size];
		if record[0] != RECORD_SENTINEL {
			return Err(invalid_data(format!("DTED record {} has no sentinel", col)));
		}

		let points = &record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + lat_points * 2];
		for row in 0..shape.rows {
			let point = lat_points - 1 - row;
			let value = signed_magnitude(points[point * 2], points[point * 2 + 1]);
			data[row * shape.cols + col] = if value == DTED_VOID { UNDEFINED } else { value };
		}
	}

	Ok(DtedCell {
		lon_interval,
		lat_interval,
		accuracy,
		shape,
		data,
	})
}

/// Combines two grids of the same cell: the more accurate one wins, with ties going to `first`. Voids in the winner
/// are filled from the other where the grids line up.
pub fn merge_by_accuracy(first: CellGrid, second: CellGrid) -> CellGrid {
	let accuracy = |x: &CellGrid| x.accuracy.unwrap_or(UNKNOWN_ACCURACY);
	let (mut winner, loser) = if accuracy(&second) < accuracy(&first) {
		(second, first)
	} else {
		(first, second)
	};

	if winner.shape == loser.shape {
		for (sample, &fill) in winner.data.iter_mut().zip(loser.data.iter()) {
			if *sample == UNDEFINED {
				*sample = fill;
			}
		}
	}

	winner
}

/// DTED level 2 files under `<root>/e123/n47.dt2`, from up to two datasets.
pub struct DtedSource {
	roots: Vec<PathBuf>,
}

impl DtedSource {
	pub fn new(roots: Vec<PathBuf>) -> Self { Self { roots } }

	fn load_from(&self, root: &Path, lat: i16, lon: i16) -> io::Result<Option<CellGrid>> {
		let path = root.join(file_path(lat, lon));
		if !path.is_file() {
			return Ok(None);
		}

		let file = File::open(&path)?;
		let map = unsafe { Mmap::map(&file)? };
		let cell = parse(&map)?;

		let flag = match (cell.lat_interval, cell.lon_interval) {
			(10, 10) => 0,
			(10, 20) => 1,
			(lat, lon) => {
				warn!(
					"Skipping {}: post spacing of {} x {} tenths of a second",
					path.display(),
					lat,
					lon
				);
				return Ok(None);
			},
		};
		if Resolution::Two.cell_shape(flag) != Some(cell.shape) {
			return Err(invalid_data(format!(
				"{} has {} x {} samples",
				path.display(),
				cell.shape.rows,
				cell.shape.cols
			)));
		}

		Ok(Some(CellGrid {
			shape: cell.shape,
			data: cell.data,
			accuracy: Some(cell.accuracy),
		}))
	}
}

impl ElevationSource for DtedSource {
	fn resolution(&self) -> Resolution { Resolution::Two }

	fn load_cell(&self, lat: i16, lon: i16) -> io::Result<Option<CellGrid>> {
		let mut merged: Option<CellGrid> = None;
		let mut failure = None;
		for root in &self.roots {
			let grid = match self.load_from(root, lat, lon) {
				Ok(Some(x)) => x,
				Ok(None) => continue,
				Err(err) => {
					warn!("Skipping {}: {}", root.join(file_path(lat, lon)).display(), err);
					failure = Some(err);
					continue;
				},
			};
			merged = Some(match merged {
				Some(first) => merge_by_accuracy(first, grid),
				None => grid,
			});
		}

		// A dataset that failed only matters when no other one had the cell.
		match (merged, failure) {
			(Some(grid), _) => Ok(Some(grid)),
			(None, Some(err)) => Err(err),
			(None, None) => Ok(None),
		}
	}
}

/// `w123/n47.dt2` for the cell with its south-west corner at 47, -123.
pub fn file_path(lat: i16, lon: i16) -> PathBuf {
	Path::new(&hemisphere_name(lon, 'e', 'w', 3)).join(format!("{}.dt2", hemisphere_name(lat, 'n', 's', 2)))
}
