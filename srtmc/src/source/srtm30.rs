use std::{
	collections::HashMap,
	fs::File,
	io,
	path::{Path, PathBuf},
};

use log::debug;
use memmap2::Mmap;
use srtm::{CellGrid, CellShape, Resolution, WATER};

use super::{hemisphere_name, invalid_data, read_be_i16, ElevationSource};

const SAMPLES_PER_DEGREE: usize = 120;
const OCEAN: i16 = -9999;
/// Southern edge of the tiles that are 40 degrees wide and 50 tall.
const ANTARCTIC_TOP: i16 = -60;

/// The north-west corner of the tile covering a cell.
pub fn tile_origin(lat: i16, lon: i16) -> (i16, i16) {
	if lat < ANTARCTIC_TOP {
		(ANTARCTIC_TOP, -180 + (lon + 180) / 60 * 60)
	} else {
		(90 - (89 - lat) / 50 * 50, -180 + (lon + 180) / 40 * 40)
	}
}

/// Width and height of a tile in degrees.
fn tile_degrees(top: i16) -> (usize, usize) { if top == ANTARCTIC_TOP { (60, 30) } else { (40, 50) } }

/// `W180N90` for the tile with its north-west corner at 90, -180.
pub fn tile_name(top: i16, left: i16) -> String {
	// The prime meridian is written as `W000`.
	let left_name = if left == 0 { "W000".to_string() } else { hemisphere_name(left, 'E', 'W', 3) };
	format!("{}{}", left_name, hemisphere_name(top, 'N', 'S', 2))
}

/// The north-west corner named by a tile file stem such as `W180N90` or `e020s10`.
pub fn parse_tile_name(name: &str) -> Option<(i16, i16)> {
	let name = name.to_ascii_uppercase();
	if name.len() != 7 || !name.is_ascii() {
		return None;
	}

	let left: i16 = name[1..4].parse().ok()?;
	let top: i16 = name[5..7].parse().ok()?;
	let left = match &name[0..1] {
		"E" => left,
		"W" => -left,
		_ => return None,
	};
	let top = match &name[4..5] {
		"N" => top,
		"S" => -top,
		_ => return None,
	};

	(tile_origin(top - 1, left) == (top, left)).then(|| (top, left))
}

/// The cell with its south-west corner at `lat`, `lon` from a tile's row-major samples, with ocean as water.
pub fn extract_cell(tile: &[u8], top: i16, left: i16, lat: i16, lon: i16) -> Option<Vec<i16>> {
	let (width, height) = tile_degrees(top);
	let cols = width * SAMPLES_PER_DEGREE;
	if tile.len() != cols * height * SAMPLES_PER_DEGREE * 2 {
		return None;
	}

	let row_start = (top - lat - 1) as usize * SAMPLES_PER_DEGREE;
	let col_start = (lon - left) as usize * SAMPLES_PER_DEGREE;
	let mut data = Vec::with_capacity(SAMPLES_PER_DEGREE * SAMPLES_PER_DEGREE);
	for row in row_start..row_start + SAMPLES_PER_DEGREE {
		data.extend((col_start..col_start + SAMPLES_PER_DEGREE).map(|col| {
			match read_be_i16(tile, row * cols + col) {
				OCEAN => WATER,
				x => x,
			}
		}));
	}

	Some(data)
}

/// SRTM30 `.DEM` tiles in one directory.
pub struct Srtm30Source {
	tiles: HashMap<(i16, i16), PathBuf>,
}

impl Srtm30Source {
	pub fn new(root: &Path) -> io::Result<Self> {
		let mut tiles = HashMap::new();
		for entry in std::fs::read_dir(root)? {
			let path = entry?.path();
			let is_dem = path
				.extension()
				.and_then(|x| x.to_str())
				.map_or(false, |x| x.eq_ignore_ascii_case("dem"));
			let origin = path.file_stem().and_then(|x| x.to_str()).and_then(parse_tile_name);

			if let (true, Some(origin)) = (is_dem, origin) {
				debug!("Found tile {}", tile_name(origin.0, origin.1));
				tiles.insert(origin, path);
			}
		}

		Ok(Self { tiles })
	}
}

impl ElevationSource for Srtm30Source {
	fn resolution(&self) -> Resolution { Resolution::Thirty }

	fn load_cell(&self, lat: i16, lon: i16) -> io::Result<Option<CellGrid>> {
		let (top, left) = tile_origin(lat, lon);
		let path = match self.tiles.get(&(top, left)) {
			Some(x) => x,
			None => return Ok(None),
		};

		tracy::zone!("Load SRTM30 cell");
		let file = File::open(path)?;
		let map = unsafe { Mmap::map(&file)? };
		let data = extract_cell(&map, top, left, lat, lon)
			.ok_or_else(|| invalid_data(format!("{} is not a whole tile", path.display())))?;

		Ok(Some(CellGrid::new(CellShape::square(SAMPLES_PER_DEGREE), data)))
	}
}
