use std::ops::Range;

use crate::{
	bits::{bytes_for_bits, double_pack, double_pack_capacity, double_unpack, pack, unpack},
	map_index_to_lat_lon,
	Error,
	Resolution,
	CELL_COUNT,
	HEADER_SIZE,
};

/// Width of the address part of a directory entry.
pub const ADDRESS_BITS: usize = 36;
/// Width of the vertical accuracy that follows the address in 2 second archives.
pub const ACCURACY_BITS: usize = 8;

/// Directory value of a cell that is entirely water.
pub const WATER_VALUE: u64 = 0;
/// Directory value of a cell without source data.
pub const UNDEFINED_VALUE: u64 = 2;

/// What the directory knows about a cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CellEntry {
	Water,
	Undefined,
	/// The cell's block starts `offset` bytes into the archive.
	Block { offset: u64 },
}

impl CellEntry {
	fn value(self) -> u64 {
		match self {
			Self::Water => WATER_VALUE,
			Self::Undefined => UNDEFINED_VALUE,
			Self::Block { offset } => offset,
		}
	}
}

/// Counts of directory entries by kind.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DirectoryStats {
	pub water: usize,
	pub undefined: usize,
	pub blocks: usize,
	pub invalid: usize,
}

/// The bit-packed cell index that follows the header.
#[derive(Clone)]
pub struct Directory {
	resolution: Resolution,
	bytes: Vec<u8>,
}

impl Directory {
	/// A directory with every cell undefined.
	pub fn new(resolution: Resolution) -> Self {
		let mut directory = Self {
			resolution,
			bytes: vec![0; Self::byte_len(resolution)],
		};
		for index in 0..CELL_COUNT {
			directory.write(index, UNDEFINED_VALUE, 0);
		}
		directory
	}

	pub fn from_bytes(resolution: Resolution, bytes: Vec<u8>) -> Self {
		debug_assert_eq!(bytes.len(), Self::byte_len(resolution));
		Self { resolution, bytes }
	}

	/// Size of the directory region of an archive.
	pub fn byte_len(resolution: Resolution) -> usize { bytes_for_bits(CELL_COUNT * resolution.entry_bits()) }

	/// Offset of the first block in an archive.
	pub fn data_start(resolution: Resolution) -> u64 { (HEADER_SIZE + Self::byte_len(resolution)) as u64 }

	pub fn resolution(&self) -> Resolution { self.resolution }

	pub fn as_bytes(&self) -> &[u8] { &self.bytes }

	/// The raw address stored for a cell.
	pub fn raw(&self, index: usize) -> u64 {
		double_unpack(&self.bytes, self.start_bit(index), ADDRESS_BITS as u32)
	}

	pub fn entry(&self, index: usize) -> Result<CellEntry, Error> {
		match self.raw(index) {
			WATER_VALUE => Ok(CellEntry::Water),
			UNDEFINED_VALUE => Ok(CellEntry::Undefined),
			offset if offset >= HEADER_SIZE as u64 => Ok(CellEntry::Block { offset }),
			value => {
				let (lat, lon) = map_index_to_lat_lon(index);
				Err(Error::InvalidDirectoryEntry { lat, lon, value })
			},
		}
	}

	/// The vertical accuracy of the source of a cell, in meters, for archives that record it.
	pub fn accuracy(&self, index: usize) -> Option<u8> {
		self.resolution
			.has_accuracy()
			.then(|| unpack(&self.bytes, self.start_bit(index) + ADDRESS_BITS, ACCURACY_BITS as u32) as u8)
	}

	/// Updates a cell, returning the byte range of the directory that changed.
	pub fn set(&mut self, index: usize, entry: CellEntry, accuracy: Option<u8>) -> Result<Range<usize>, Error> {
		let value = entry.value();
		if value > double_pack_capacity(ADDRESS_BITS as u32) {
			return Err(Error::ArchiveFull(value));
		}

		self.write(index, value, accuracy.unwrap_or(0));

		let start = self.start_bit(index);
		Ok(start / 8..bytes_for_bits(start + self.resolution.entry_bits()))
	}

	pub fn stats(&self) -> DirectoryStats {
		let mut stats = DirectoryStats::default();
		for index in 0..CELL_COUNT {
			match self.entry(index) {
				Ok(CellEntry::Water) => stats.water += 1,
				Ok(CellEntry::Undefined) => stats.undefined += 1,
				Ok(CellEntry::Block { .. }) => stats.blocks += 1,
				Err(_) => stats.invalid += 1,
			}
		}
		stats
	}

	fn start_bit(&self, index: usize) -> usize { index * self.resolution.entry_bits() }

	fn write(&mut self, index: usize, value: u64, accuracy: u8) {
		let start = self.start_bit(index);
		double_pack(&mut self.bytes, start, ADDRESS_BITS as u32, value);
		if self.resolution.has_accuracy() {
			pack(&mut self.bytes, start + ADDRESS_BITS, ACCURACY_BITS as u32, accuracy as u32);
		}
	}
}
