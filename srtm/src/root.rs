//! Locating archives under the data root and opening them on demand.

use std::path::{Path, PathBuf};

use log::info;

use crate::{checked_index, Cell, CellSource, Error, Resolution, TileReader};

/// Environment variable naming the directory that holds the archives.
pub const DATA_ROOT_ENV: &str = "SRTM_DATA";

/// The directory holding `srtm1.cte`, `srtm2.cte`, `srtm3.cte` and `srtm30.cte`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataRoot {
	path: Option<PathBuf>,
}

impl DataRoot {
	pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: Some(path.into()) } }

	/// The data root named by [`DATA_ROOT_ENV`], unconfigured if it is not set.
	pub fn from_env() -> Self {
		Self {
			path: std::env::var_os(DATA_ROOT_ENV)
				.filter(|x| !x.is_empty())
				.map(PathBuf::from),
		}
	}

	/// A root without a directory, under which no archive is available.
	pub fn unconfigured() -> Self { Self { path: None } }

	pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

	pub fn archive_path(&self, resolution: Resolution) -> Option<PathBuf> {
		self.path.as_ref().map(|x| x.join(resolution.file_name()))
	}
}

/// Opens the archive for a resolution, or `None` if the root is unconfigured or has no such archive.
///
/// An archive that exists but cannot be decoded is an error.
pub fn open_archive(root: &DataRoot, resolution: Resolution) -> Result<Option<TileReader>, Error> {
	let path = match root.archive_path(resolution) {
		Some(path) if path.is_file() => path,
		_ => return Ok(None),
	};

	TileReader::open(&path, resolution).map(Some)
}

enum SlotState {
	Closed,
	Open(Box<TileReader>),
	Unavailable,
}

/// The archive of one resolution, opened on first use.
///
/// Once an archive is found to be missing, the slot answers [`Cell::NoArchive`] for the rest of its life.
pub struct ArchiveSlot {
	root: DataRoot,
	resolution: Resolution,
	state: SlotState,
}

impl ArchiveSlot {
	pub fn new(root: DataRoot, resolution: Resolution) -> Self {
		Self {
			root,
			resolution,
			state: SlotState::Closed,
		}
	}

	/// The open reader, if the archive has been opened.
	pub fn reader(&self) -> Option<&TileReader> {
		match &self.state {
			SlotState::Open(reader) => Some(reader.as_ref()),
			_ => None,
		}
	}
}

impl CellSource for ArchiveSlot {
	fn resolution(&self) -> Resolution { self.resolution }

	fn fetch_cell(&mut self, lat: i16, lon: i16) -> Result<Cell, Error> {
		// Cells outside the globe never open the archive.
		checked_index(lat, lon)?;
		if let SlotState::Closed = self.state {
			self.state = match open_archive(&self.root, self.resolution)? {
				Some(reader) => SlotState::Open(Box::new(reader)),
				None => {
					info!("No {} archive available, skipping the resolution", self.resolution);
					SlotState::Unavailable
				},
			};
		}

		match &mut self.state {
			SlotState::Open(reader) => reader.fetch_cell(lat, lon),
			_ => Ok(Cell::NoArchive),
		}
	}

	fn is_open(&self) -> bool { matches!(self.state, SlotState::Open(_)) }

	fn is_unavailable(&self) -> bool { matches!(self.state, SlotState::Unavailable) }

	fn close(&mut self) {
		if self.is_open() {
			self.state = SlotState::Closed;
		}
	}
}
