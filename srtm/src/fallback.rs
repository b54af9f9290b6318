use log::debug;

use crate::{checked_index, locate, ArchiveSlot, Cell, CellSource, DataRoot, Error, Resolution, NO_ARCHIVE, UNDEFINED};

/// The answer to a fallback query, with the resolution that gave it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
	/// `None` when no resolution knew the cell.
	pub resolution: Option<Resolution>,
	pub cell: Cell,
}

/// Queries the 1, 2, 3 and 30 second archives in that order, answering with the first that knows the cell.
///
/// The order is a fixed priority: finer data always wins when it is present.
pub struct FallbackReader<S = ArchiveSlot> {
	sources: [S; 4],
	opened: [bool; 4],
}

impl FallbackReader {
	pub fn new(root: DataRoot) -> Self {
		Self::with_sources(Resolution::ALL.map(|x| ArchiveSlot::new(root.clone(), x)))
	}

	/// A reader over the archives under [`DataRoot::from_env`].
	pub fn from_env() -> Self { Self::new(DataRoot::from_env()) }
}

impl<S: CellSource> FallbackReader<S> {
	/// Wraps one source per resolution, finest first.
	pub fn with_sources(sources: [S; 4]) -> Self {
		debug_assert!(
			sources.iter().map(|x| x.resolution()).eq(Resolution::ALL),
			"Sources must be ordered by resolution"
		);

		Self {
			sources,
			opened: [false; 4],
		}
	}

	/// Whether any archive might still answer. Once every resolution is known to be missing, this stays false.
	pub fn is_available(&self) -> bool { !self.sources.iter().all(|x| x.is_unavailable()) }

	/// Whether the archive for a resolution was ever opened.
	pub fn was_opened(&self, resolution: Resolution) -> bool { self.opened[resolution.index()] }

	pub fn opened(&self) -> Vec<Resolution> {
		Resolution::ALL
			.into_iter()
			.filter(|&x| self.was_opened(x))
			.collect()
	}

	pub fn source(&self, resolution: Resolution) -> &S { &self.sources[resolution.index()] }

	/// Looks up the cell with its south-west corner at `lat`, `lon`.
	pub fn query(&mut self, lat: i16, lon: i16) -> Result<Resolved, Error> {
		checked_index(lat, lon)?;
		if !self.is_available() {
			return Ok(Resolved {
				resolution: None,
				cell: Cell::NoArchive,
			});
		}

		for (source, opened) in self.sources.iter_mut().zip(self.opened.iter_mut()) {
			// Recorded before the error propagates, so close still releases the archive.
			let fetched = source.fetch_cell(lat, lon);
			*opened |= source.is_open();
			let cell = fetched?;
			if cell.is_known() {
				return Ok(Resolved {
					resolution: Some(source.resolution()),
					cell,
				});
			}
		}

		debug!("No resolution has data for cell ({}, {})", lat, lon);
		Ok(Resolved {
			resolution: None,
			cell: if self.is_available() {
				Cell::Undefined
			} else {
				Cell::NoArchive
			},
		})
	}

	/// Looks up the cell covering a position in degrees.
	pub fn query_position(&mut self, lat: f64, lon: f64) -> Result<Resolved, Error> {
		match locate(lat, lon) {
			Some(location) => self.query(location.lat, location.lon),
			None => Ok(Resolved {
				resolution: None,
				cell: Cell::Undefined,
			}),
		}
	}

	/// The elevation at a position in degrees from the finest resolution that knows it.
	pub fn elevation_at(&mut self, lat: f64, lon: f64) -> Result<i16, Error> {
		if !self.is_available() {
			return Ok(NO_ARCHIVE);
		}
		match locate(lat, lon) {
			Some(location) => Ok(self.query(location.lat, location.lon)?.cell.elevation(&location)),
			None => Ok(UNDEFINED),
		}
	}

	/// Releases every archive that was opened.
	pub fn close(&mut self) {
		for (source, opened) in self.sources.iter_mut().zip(self.opened.iter_mut()) {
			if *opened {
				source.close();
				*opened = false;
			}
		}
	}
}
