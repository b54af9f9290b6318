//! Error types for archive access.

use thiserror::Error;

use crate::Resolution;

/// Errors that can occur when building or reading an archive.
///
/// Missing archives, water and undefined cells are not errors; they are reported through [`crate::Cell`] and the
/// elevation sentinels. Everything here means the archive cannot be trusted or written.
#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Archive header declares a size of {found} bytes, expected {expected}")]
	HeaderSize { found: usize, expected: usize },

	#[error("Archive header is missing `{0}`")]
	MissingHeaderField(&'static str),

	#[error("Archive header has no `[END OF HEADER]` marker")]
	UnterminatedHeader,

	#[error("Archive header field `{field}` has an invalid value `{value}`")]
	InvalidHeaderField { field: &'static str, value: String },

	#[error("Archive was compressed with zlib {found}, which is incompatible with {expected}")]
	CompressorVersion { found: String, expected: String },

	#[error("Archive holds {found} data, expected {expected}")]
	ResolutionMismatch { found: Resolution, expected: Resolution },

	#[error("Cell ({lat}, {lon}) is outside the globe")]
	OutOfRange { lat: i16, lon: i16 },

	#[error("Directory entry for cell ({lat}, {lon}) has invalid value {value}")]
	InvalidDirectoryEntry { lat: i16, lon: i16, value: u64 },

	#[error("Block of cell ({lat}, {lon}) at offset {offset} is corrupt")]
	CorruptBlock {
		lat: i16,
		lon: i16,
		offset: u64,
		#[source]
		source: StreamError,
	},

	#[error("Cell grid of {rows}x{cols} cannot be stored in a {resolution} archive")]
	ShapeMismatch {
		resolution: Resolution,
		rows: usize,
		cols: usize,
	},

	#[error("Cell grid has {found} samples, expected {expected}")]
	GridSize { found: usize, expected: usize },

	#[error("Elevation deltas span {range}, which does not fit in a 15 bit field")]
	DeltaRange { range: i32 },

	#[error("Block of {0} bytes is too large to be described by a block header")]
	BlockTooLarge(usize),

	#[error("Archive is full: offset {0} cannot be stored in a directory entry")]
	ArchiveFull(u64),

	#[error("Archive lock was poisoned")]
	LockPoisoned,
}

/// Ways a block payload can fail to decode.
#[derive(Debug, Error)]
pub enum StreamError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("unknown shape flag {0}")]
	UnknownFlag(u8),

	#[error("decompressed to {found} bytes, expected {expected}")]
	SizeMismatch { found: usize, expected: usize },

	#[error("packed deltas need {expected} bytes, found {found}")]
	Truncated { found: usize, expected: usize },

	#[error("invalid field width {0}")]
	InvalidWidth(u8),

	#[error("sample {0} overflows a 16 bit elevation")]
	Overflow(usize),
}
