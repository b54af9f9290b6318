use std::{
	fs::File,
	io,
	path::{Path, PathBuf},
};

use memmap2::Mmap;
use srtm::{CellGrid, CellShape, Resolution};

use super::{hemisphere_name, invalid_data, read_be_i16, ElevationSource};

/// SRTM `.hgt` files, one per cell, named by their south-west corner.
pub struct HgtSource {
	root: PathBuf,
	resolution: Resolution,
}

impl HgtSource {
	pub fn new(root: &Path, resolution: Resolution) -> Self {
		debug_assert!(matches!(resolution, Resolution::One | Resolution::Three));

		Self {
			root: root.to_path_buf(),
			resolution,
		}
	}

	/// Posts along each edge, both edges included.
	fn posts(&self) -> usize { if self.resolution == Resolution::One { 3601 } else { 1201 } }
}

impl ElevationSource for HgtSource {
	fn resolution(&self) -> Resolution { self.resolution }

	fn load_cell(&self, lat: i16, lon: i16) -> io::Result<Option<CellGrid>> {
		let path = self.root.join(file_name(lat, lon));
		if !path.is_file() {
			return Ok(None);
		}

		tracy::zone!("Load hgt");
		let file = File::open(&path)?;
		let map = unsafe { Mmap::map(&file)? };
		let side = self.posts() - 1;
		let data = parse(&map, self.posts())
			.ok_or_else(|| invalid_data(format!("{} is not {} x {} posts", path.display(), side + 1, side + 1)))?;

		Ok(Some(CellGrid::new(CellShape::square(side), data)))
	}
}

/// `N47W123.hgt` for the cell with its south-west corner at 47, -123.
pub fn file_name(lat: i16, lon: i16) -> String {
	format!("{}{}.hgt", hemisphere_name(lat, 'N', 'S', 2), hemisphere_name(lon, 'E', 'W', 3))
}

/// Row-major samples of a square `.hgt` grid, without its southern row and eastern column.
pub fn parse(bytes: &[u8], posts: usize) -> Option<Vec<i16>> {
	if bytes.len() != posts * posts * 2 {
		return None;
	}

	let side = posts - 1;
	let mut data = Vec::with_capacity(side * side);
	for row in 0..side {
		data.extend((0..side).map(|col| read_be_i16(bytes, row * posts + col)));
	}

	Some(data)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_follow_the_south_west_corner() {
		assert_eq!(file_name(47, -123), "N47W123.hgt");
		assert_eq!(file_name(-3, 7), "S03E007.hgt");
		assert_eq!(file_name(0, 0), "N00E000.hgt");
	}

	#[test]
	fn drops_the_shared_edges() {
		let samples: [i16; 9] = [1, 2, 3, 4, -32768, 6, 7, 8, 9];
		let bytes: Vec<u8> = samples.iter().flat_map(|x| x.to_be_bytes()).collect();

		assert_eq!(parse(&bytes, 3).unwrap(), [1, 2, 4, -32768]);
		assert_eq!(parse(&bytes[2..], 3), None);
	}

	#[test]
	fn missing_files_are_not_covered() {
		let dir = tempfile::tempdir().unwrap();
		let source = HgtSource::new(dir.path(), Resolution::Three);
		assert_eq!(source.load_cell(47, -123).unwrap(), None);

		std::fs::write(dir.path().join("N47W123.hgt"), [0u8; 10]).unwrap();
		assert!(source.load_cell(47, -123).is_err());
	}
}
