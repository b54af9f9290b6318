use std::{
	fs::{File, OpenOptions},
	io::{Seek, SeekFrom, Write},
	path::Path,
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::debug;

use crate::{
	block::compress_block,
	checked_index,
	delta::{self, Classification},
	reader::read_prefix,
	ArchiveHeader,
	CellEntry,
	CellShape,
	Directory,
	Error,
	Resolution,
	HEADER_SIZE,
	UNDEFINED,
};

/// One cell of source elevations, ready to be encoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CellGrid {
	pub shape: CellShape,
	/// Row-major, north to south and west to east. Samples without an elevation are [`UNDEFINED`].
	pub data: Vec<i16>,
	/// Vertical accuracy of the source in meters, stored by 2 second archives.
	pub accuracy: Option<u8>,
}

impl CellGrid {
	pub fn new(shape: CellShape, data: Vec<i16>) -> Self {
		Self {
			shape,
			data,
			accuracy: None,
		}
	}
}

/// A cell after classification and compression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodedCell {
	Water,
	Undefined,
	/// A complete block, header included.
	Block(Vec<u8>),
}

/// Classifies a cell and, if it holds land, delta codes and compresses it.
pub fn encode_cell(resolution: Resolution, grid: &CellGrid) -> Result<EncodedCell, Error> {
	tracy::zone!("Encode cell");

	let flag = resolution
		.flag_for_shape(grid.shape)
		.ok_or(Error::ShapeMismatch {
			resolution,
			rows: grid.shape.rows,
			cols: grid.shape.cols,
		})?;
	if grid.data.len() != grid.shape.len() {
		return Err(Error::GridSize {
			found: grid.data.len(),
			expected: grid.shape.len(),
		});
	}

	Ok(match delta::classify(&grid.data, UNDEFINED) {
		Classification::Water => EncodedCell::Water,
		Classification::Undefined => EncodedCell::Undefined,
		Classification::Land => {
			let stream = delta::encode(&grid.data, grid.shape, UNDEFINED)?;
			EncodedCell::Block(compress_block(flag, &stream)?)
		},
	})
}

struct Locked {
	directory: Directory,
	file: File,
}

/// Writes an archive, one cell at a time.
///
/// Blocks are appended to the end of the file and only then is the cell's directory entry rewritten in place, so an
/// interrupted build never leaves an entry pointing at a partial block.
pub struct ArchiveBuilder {
	resolution: Resolution,
	locked: RwLock<Locked>,
}

impl ArchiveBuilder {
	/// Creates a new archive, replacing anything at `path`.
	pub fn new(path: &Path, resolution: Resolution) -> Result<Self, Error> {
		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;

		let header = ArchiveHeader::new(resolution);
		let directory = Directory::new(resolution);
		Self::write_to_file(&mut file, &header, &directory)?;

		Ok(Self {
			resolution,
			locked: RwLock::new(Locked { directory, file }),
		})
	}

	/// Opens an existing archive to add more cells to it.
	pub fn open(path: &Path, resolution: Resolution) -> Result<Self, Error> {
		let mut file = OpenOptions::new().read(true).write(true).open(path)?;
		let (_, directory) = read_prefix(&mut file, resolution)?;

		Ok(Self {
			resolution,
			locked: RwLock::new(Locked { directory, file }),
		})
	}

	pub fn resolution(&self) -> Resolution { self.resolution }

	pub fn cell_entry(&self, lat: i16, lon: i16) -> Result<CellEntry, Error> {
		let index = checked_index(lat, lon)?;
		self.read()?.directory.entry(index)
	}

	/// Whether a cell has already been written as water or land.
	pub fn cell_exists(&self, lat: i16, lon: i16) -> bool {
		!matches!(self.cell_entry(lat, lon), Ok(CellEntry::Undefined) | Err(_))
	}

	/// Encodes and writes a cell.
	pub fn add_cell(&self, lat: i16, lon: i16, grid: &CellGrid) -> Result<CellEntry, Error> {
		let encoded = encode_cell(self.resolution, grid)?;
		self.write_cell(lat, lon, encoded, grid.accuracy)
	}

	/// Writes a cell encoded with [`encode_cell`].
	pub fn write_cell(
		&self, lat: i16, lon: i16, encoded: EncodedCell, accuracy: Option<u8>,
	) -> Result<CellEntry, Error> {
		tracy::zone!("Write cell");

		let index = checked_index(lat, lon)?;
		let mut locked = self.write()?;
		let Locked { directory, file } = &mut *locked;

		let entry = match encoded {
			EncodedCell::Water => CellEntry::Water,
			EncodedCell::Undefined => CellEntry::Undefined,
			EncodedCell::Block(block) => {
				let offset = file.seek(SeekFrom::End(0))?;
				file.write_all(&block)?;
				debug!("Cell ({}, {}): {} byte block at {}", lat, lon, block.len(), offset);
				CellEntry::Block { offset }
			},
		};

		let range = directory.set(index, entry, accuracy)?;
		file.seek(SeekFrom::Start((HEADER_SIZE + range.start) as u64))?;
		file.write_all(&directory.as_bytes()[range])?;

		Ok(entry)
	}

	/// Makes everything written so far durable.
	pub fn flush(&self) -> Result<(), Error> {
		tracy::zone!("Flush");

		let mut locked = self.write()?;
		locked.file.flush()?;
		locked.file.sync_data()?;

		Ok(())
	}

	pub fn finish(self) -> Result<(), Error> { self.flush() }

	fn read(&self) -> Result<RwLockReadGuard<'_, Locked>, Error> { self.locked.read().map_err(|_| Error::LockPoisoned) }

	fn write(&self) -> Result<RwLockWriteGuard<'_, Locked>, Error> {
		self.locked.write().map_err(|_| Error::LockPoisoned)
	}

	fn write_to_file(file: &mut File, header: &ArchiveHeader, directory: &Directory) -> Result<(), Error> {
		file.write_all(&header.to_bytes())?;
		file.write_all(directory.as_bytes())?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn water_cells_have_no_block() {
		let grid = CellGrid::new(CellShape::square(120), vec![0; 120 * 120]);
		assert_eq!(encode_cell(Resolution::Thirty, &grid).unwrap(), EncodedCell::Water);
	}

	#[test]
	fn void_cells_stay_undefined() {
		let grid = CellGrid::new(CellShape::square(120), vec![UNDEFINED; 120 * 120]);
		assert_eq!(encode_cell(Resolution::Thirty, &grid).unwrap(), EncodedCell::Undefined);
	}

	#[test]
	fn land_cells_get_a_block() {
		let mut data = vec![0; 120 * 120];
		data[500] = 3;
		let grid = CellGrid::new(CellShape::square(120), data);
		assert!(matches!(
			encode_cell(Resolution::Thirty, &grid).unwrap(),
			EncodedCell::Block(_)
		));
	}

	#[test]
	fn rejects_foreign_shapes() {
		let grid = CellGrid::new(CellShape::square(100), vec![1; 100 * 100]);
		assert!(matches!(
			encode_cell(Resolution::Thirty, &grid),
			Err(Error::ShapeMismatch { .. })
		));

		let grid = CellGrid::new(CellShape::square(120), vec![1; 10]);
		assert!(matches!(
			encode_cell(Resolution::Thirty, &grid),
			Err(Error::GridSize { .. })
		));
	}
}
