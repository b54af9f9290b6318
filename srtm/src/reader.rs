use std::{
	fs::File,
	io::{Read, Seek, SeekFrom},
	path::Path,
	sync::Arc,
};

use log::debug;

use crate::{
	block::{decompress_payload, BlockHeader, BLOCK_HEADER_SIZE},
	checked_index,
	delta,
	locate,
	map_index_to_lat_lon,
	ArchiveHeader,
	CellEntry,
	CellShape,
	Directory,
	Error,
	Location,
	Resolution,
	StreamError,
	HEADER_SIZE,
	NO_ARCHIVE,
	UNDEFINED,
	WATER,
};

/// Reads and validates the header and directory at the start of an archive.
pub(crate) fn read_prefix<R: Read + Seek>(
	source: &mut R, resolution: Resolution,
) -> Result<(ArchiveHeader, Directory), Error> {
	tracy::zone!("Read directory");

	source.seek(SeekFrom::Start(0))?;
	let mut header = vec![0; HEADER_SIZE];
	source.read_exact(&mut header)?;
	let header = ArchiveHeader::parse(&header)?;
	header.validate(resolution)?;

	let mut directory = vec![0; Directory::byte_len(resolution)];
	source.read_exact(&mut directory)?;

	Ok((header, Directory::from_bytes(resolution, directory)))
}

/// The elevations of one cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedCell {
	lat: i16,
	lon: i16,
	resolution: Resolution,
	flag: u8,
	shape: CellShape,
	data: Vec<i16>,
}

impl DecodedCell {
	pub fn new(lat: i16, lon: i16, resolution: Resolution, flag: u8, shape: CellShape, data: Vec<i16>) -> Self {
		debug_assert_eq!(data.len(), shape.len(), "Cell data does not match its shape");
		Self {
			lat,
			lon,
			resolution,
			flag,
			shape,
			data,
		}
	}

	pub fn lat(&self) -> i16 { self.lat }

	pub fn lon(&self) -> i16 { self.lon }

	pub fn resolution(&self) -> Resolution { self.resolution }

	pub fn flag(&self) -> u8 { self.flag }

	pub fn shape(&self) -> CellShape { self.shape }

	/// Row-major elevations, north to south and west to east.
	pub fn data(&self) -> &[i16] { &self.data }

	pub fn get(&self, row: usize, col: usize) -> i16 { self.data[row * self.shape.cols + col] }

	/// The sample covering a position inside the cell, given as fractions from its north-west corner.
	pub fn sample(&self, south: f64, east: f64) -> i16 {
		let row = ((south * self.shape.rows as f64) as usize).min(self.shape.rows - 1);
		let col = ((east * self.shape.cols as f64) as usize).min(self.shape.cols - 1);
		self.get(row, col)
	}
}

/// The result of looking up a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
	Water,
	/// No source covered the cell.
	Undefined,
	/// The archive for the resolution could not be found.
	NoArchive,
	Data(Arc<DecodedCell>),
}

impl Cell {
	/// Whether the cell answers the query, as opposed to having nothing to say about it.
	pub fn is_known(&self) -> bool { matches!(self, Self::Water | Self::Data(_)) }

	/// The elevation at a location inside this cell, or the sentinel for the cell's state.
	pub fn elevation(&self, location: &Location) -> i16 {
		match self {
			Self::Water => WATER,
			Self::Undefined => UNDEFINED,
			Self::NoArchive => NO_ARCHIVE,
			Self::Data(cell) => cell.sample(location.south, location.east),
		}
	}
}

/// Anything that can answer cell lookups for one resolution.
pub trait CellSource {
	fn resolution(&self) -> Resolution;

	/// Looks up the cell with its south-west corner at `lat`, `lon`.
	fn fetch_cell(&mut self, lat: i16, lon: i16) -> Result<Cell, Error>;

	/// Whether the underlying archive has been opened.
	fn is_open(&self) -> bool;

	/// Whether the underlying archive is known to be missing for good.
	fn is_unavailable(&self) -> bool;

	/// Releases the archive and any cached cell.
	fn close(&mut self);

	/// Looks up the cell covering a position in degrees. Positions off the globe are undefined.
	fn fetch_cell_grid(&mut self, lat: f64, lon: f64) -> Result<Cell, Error> {
		match locate(lat, lon) {
			Some(location) => self.fetch_cell(location.lat, location.lon),
			None => Ok(Cell::Undefined),
		}
	}

	/// The elevation at a position in degrees, [`WATER`], [`UNDEFINED`] or [`NO_ARCHIVE`].
	///
	/// Only a damaged or incompatible archive makes this fail.
	fn elevation_at(&mut self, lat: f64, lon: f64) -> Result<i16, Error> {
		match locate(lat, lon) {
			Some(location) => Ok(self.fetch_cell(location.lat, location.lon)?.elevation(&location)),
			None => Ok(UNDEFINED),
		}
	}
}

/// Counters of the work a reader has done.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadStats {
	/// Blocks read from the archive and decoded.
	pub blocks_decoded: usize,
	/// Lookups answered by the cached cell.
	pub cache_hits: usize,
}

/// Reads cells from one archive, keeping the last decoded cell.
pub struct TileReader<R = File> {
	resolution: Resolution,
	header: ArchiveHeader,
	directory: Directory,
	source: R,
	cache: Option<Arc<DecodedCell>>,
	stats: ReadStats,
}

impl TileReader {
	pub fn open(path: &Path, resolution: Resolution) -> Result<Self, Error> {
		Self::from_reader(File::open(path)?, resolution)
	}
}

impl<R: Read + Seek> TileReader<R> {
	pub fn from_reader(mut source: R, resolution: Resolution) -> Result<Self, Error> {
		let (header, directory) = read_prefix(&mut source, resolution)?;

		Ok(Self {
			resolution,
			header,
			directory,
			source,
			cache: None,
			stats: ReadStats::default(),
		})
	}

	pub fn header(&self) -> &ArchiveHeader { &self.header }

	pub fn directory(&self) -> &Directory { &self.directory }

	pub fn stats(&self) -> ReadStats { self.stats }

	pub fn cached(&self) -> Option<&DecodedCell> { self.cache.as_deref() }

	pub fn entry(&self, lat: i16, lon: i16) -> Result<CellEntry, Error> {
		self.directory.entry(checked_index(lat, lon)?)
	}

	pub fn accuracy(&self, lat: i16, lon: i16) -> Result<Option<u8>, Error> {
		Ok(self.directory.accuracy(checked_index(lat, lon)?))
	}

	pub fn fetch_cell(&mut self, lat: i16, lon: i16) -> Result<Cell, Error> {
		let index = checked_index(lat, lon)?;
		let offset = match self.directory.entry(index)? {
			CellEntry::Water => return Ok(Cell::Water),
			CellEntry::Undefined => return Ok(Cell::Undefined),
			CellEntry::Block { offset } => offset,
		};

		let (lat, lon) = map_index_to_lat_lon(index);
		if let Some(cell) = self.cache.as_ref().filter(|x| x.lat == lat && x.lon == lon) {
			self.stats.cache_hits += 1;
			return Ok(Cell::Data(cell.clone()));
		}

		let cell = Arc::new(self.read_block(lat, lon, offset)?);
		self.stats.blocks_decoded += 1;
		self.cache = Some(cell.clone());

		Ok(Cell::Data(cell))
	}

	pub fn clear_cache(&mut self) { self.cache = None; }

	fn read_block(&mut self, lat: i16, lon: i16, offset: u64) -> Result<DecodedCell, Error> {
		tracy::zone!("Read block");
		debug!("Decoding {} cell ({}, {}) at {}", self.resolution, lat, lon, offset);

		let corrupt = move |source: StreamError| Error::CorruptBlock {
			lat,
			lon,
			offset,
			source,
		};

		self.source.seek(SeekFrom::Start(offset))?;
		let mut header = [0; BLOCK_HEADER_SIZE];
		self.source
			.read_exact(&mut header)
			.map_err(|x| corrupt(x.into()))?;
		let header = BlockHeader::from_bytes(&header);
		let shape = self
			.resolution
			.cell_shape(header.flag)
			.ok_or_else(|| corrupt(StreamError::UnknownFlag(header.flag)))?;

		let mut payload = vec![0; header.compressed_size as usize];
		self.source
			.read_exact(&mut payload)
			.map_err(|x| corrupt(x.into()))?;

		let stream = decompress_payload(&payload, header.uncompressed_size as usize).map_err(corrupt)?;
		let data = delta::decode(&stream, shape, UNDEFINED).map_err(corrupt)?;

		Ok(DecodedCell::new(lat, lon, self.resolution, header.flag, shape, data))
	}
}

impl<R: Read + Seek> CellSource for TileReader<R> {
	fn resolution(&self) -> Resolution { self.resolution }

	fn fetch_cell(&mut self, lat: i16, lon: i16) -> Result<Cell, Error> {
		TileReader::<R>::fetch_cell(self, lat, lon)
	}

	fn is_open(&self) -> bool { true }

	fn is_unavailable(&self) -> bool { false }

	fn close(&mut self) { self.clear_cache(); }
}
