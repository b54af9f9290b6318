//! Building archives on disk and reading them back.

use std::{
	fs::File,
	io::{Read, Seek, SeekFrom, Write},
	path::Path,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};

use srtm::{
	ArchiveBuilder,
	Cell,
	CellEntry,
	CellGrid,
	CellShape,
	CellSource,
	Directory,
	Error,
	Resolution,
	TileReader,
	BLOCK_HEADER_SIZE,
	UNDEFINED,
	WATER,
};

fn terrain(shape: CellShape, seed: i32) -> Vec<i16> {
	(0..shape.len())
		.map(|i| {
			let row = (i / shape.cols) as i32;
			let col = (i % shape.cols) as i32;
			(seed + row * 13 - col * 7 + (row * col + seed) % 31) as i16
		})
		.collect()
}

fn thirty_second_cell(seed: i32) -> CellGrid {
	let shape = CellShape::square(120);
	CellGrid::new(shape, terrain(shape, seed))
}

/// Builds a 30 second archive with land at (47, -123) and (48, -123), water at (0, 0), and a void-riddled cell at
/// (-10, 30).
fn build_archive(path: &Path) -> CellGrid {
	let builder = ArchiveBuilder::new(path, Resolution::Thirty).unwrap();

	let land = thirty_second_cell(1500);
	assert!(matches!(builder.add_cell(47, -123, &land).unwrap(), CellEntry::Block { .. }));
	builder.add_cell(48, -123, &thirty_second_cell(200)).unwrap();

	let water = CellGrid::new(CellShape::square(120), vec![WATER; 120 * 120]);
	assert_eq!(builder.add_cell(0, 0, &water).unwrap(), CellEntry::Water);

	let mut voids = thirty_second_cell(-20);
	for sample in voids.data.iter_mut().step_by(5) {
		*sample = UNDEFINED;
	}
	builder.add_cell(-10, 30, &voids).unwrap();

	builder.finish().unwrap();
	land
}

struct Counting<R> {
	inner: R,
	operations: Arc<AtomicUsize>,
}

impl<R: Read> Read for Counting<R> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.operations.fetch_add(1, Ordering::Relaxed);
		self.inner.read(buf)
	}
}

impl<R: Seek> Seek for Counting<R> {
	fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
		self.operations.fetch_add(1, Ordering::Relaxed);
		self.inner.seek(pos)
	}
}

#[test]
fn cells_read_back_as_written() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	let land = build_archive(&path);

	let mut reader = TileReader::open(&path, Resolution::Thirty).unwrap();
	assert_eq!(reader.header().header_size, 16384);
	assert_eq!(reader.entry(0, 0).unwrap(), CellEntry::Water);
	assert_eq!(reader.entry(1, 1).unwrap(), CellEntry::Undefined);

	match reader.fetch_cell(47, -123).unwrap() {
		Cell::Data(cell) => {
			assert_eq!((cell.lat(), cell.lon()), (47, -123));
			assert_eq!(cell.shape(), CellShape::square(120));
			assert_eq!(cell.data(), &land.data[..]);
		},
		other => panic!("expected data, got {:?}", other),
	}

	// Row 0 is the northern edge, so 47.999 is in row 0 and 47.001 in the last row.
	assert_eq!(reader.elevation_at(47.999, -122.999).unwrap(), land.data[0]);
	assert_eq!(reader.elevation_at(47.001, -122.001).unwrap(), land.data[120 * 120 - 1]);
	assert_eq!(reader.elevation_at(0.5, 0.5).unwrap(), WATER);
	assert_eq!(reader.elevation_at(1.5, 1.5).unwrap(), UNDEFINED);

	match reader.fetch_cell(-10, 30).unwrap() {
		Cell::Data(cell) => {
			assert_eq!(cell.data()[0], UNDEFINED);
			assert_eq!(cell.data()[5], UNDEFINED);
			assert_ne!(cell.data()[1], UNDEFINED);
		},
		other => panic!("expected data, got {:?}", other),
	}
}

#[test]
fn blocks_follow_the_directory() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);

	let reader = TileReader::open(&path, Resolution::Thirty).unwrap();
	let stats = reader.directory().stats();
	assert_eq!((stats.water, stats.blocks, stats.invalid), (1, 3, 0));

	match reader.entry(47, -123).unwrap() {
		CellEntry::Block { offset } => assert_eq!(offset, Directory::data_start(Resolution::Thirty)),
		other => panic!("expected a block, got {:?}", other),
	}
}

#[test]
fn water_and_void_cells_append_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);
	let length = std::fs::metadata(&path).unwrap().len();

	let shape = CellShape::square(120);
	let builder = ArchiveBuilder::open(&path, Resolution::Thirty).unwrap();
	assert_eq!(
		builder.add_cell(-5, -5, &CellGrid::new(shape, vec![WATER; shape.len()])).unwrap(),
		CellEntry::Water
	);
	assert_eq!(
		builder.add_cell(-6, -6, &CellGrid::new(shape, vec![UNDEFINED; shape.len()])).unwrap(),
		CellEntry::Undefined
	);
	builder.finish().unwrap();

	assert_eq!(std::fs::metadata(&path).unwrap().len(), length);
	let reader = TileReader::open(&path, Resolution::Thirty).unwrap();
	assert_eq!(reader.directory().raw(srtm::map_lat_lon_to_index(-5, -5)), 0);
	assert_eq!(reader.directory().raw(srtm::map_lat_lon_to_index(-6, -6)), 2);
}

#[test]
fn same_cell_lookups_hit_the_cache() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);

	let operations = Arc::new(AtomicUsize::new(0));
	let source = Counting {
		inner: File::open(&path).unwrap(),
		operations: operations.clone(),
	};
	let mut reader = TileReader::from_reader(source, Resolution::Thirty).unwrap();

	let before = operations.load(Ordering::Relaxed);
	reader.elevation_at(47.2, -122.8).unwrap();
	let after_first = operations.load(Ordering::Relaxed);
	assert!(after_first > before);

	reader.elevation_at(47.9, -122.1).unwrap();
	assert_eq!(operations.load(Ordering::Relaxed), after_first);
	assert_eq!(reader.stats().blocks_decoded, 1);
	assert_eq!(reader.stats().cache_hits, 1);

	// Alternating between two cells evicts each time.
	reader.elevation_at(48.5, -122.5).unwrap();
	reader.elevation_at(47.5, -122.5).unwrap();
	assert_eq!(reader.stats().blocks_decoded, 3);
	assert_eq!(reader.cached().map(|x| x.lat()), Some(47));

	// Water and undefined cells never touch the file.
	let before = operations.load(Ordering::Relaxed);
	reader.elevation_at(0.5, 0.5).unwrap();
	reader.elevation_at(1.5, 1.5).unwrap();
	assert_eq!(operations.load(Ordering::Relaxed), before);
}

#[test]
fn positions_outside_the_globe() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	let land = build_archive(&path);
	let mut reader = TileReader::open(&path, Resolution::Thirty).unwrap();

	assert_eq!(reader.elevation_at(91.0, 0.0).unwrap(), UNDEFINED);
	assert_eq!(reader.elevation_at(-90.5, 0.0).unwrap(), UNDEFINED);
	assert!(matches!(reader.fetch_cell(90, 0), Err(Error::OutOfRange { lat: 90, lon: 0 })));
	assert_eq!(reader.stats().blocks_decoded, 0);

	// Longitudes past the antimeridian fold back.
	assert_eq!(reader.elevation_at(47.999, 237.001).unwrap(), land.data[0]);
	assert_eq!(reader.entry(47, 237).unwrap(), reader.entry(47, -123).unwrap());
}

#[test]
fn foreign_header_size_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);

	let mut bytes = std::fs::read(&path).unwrap();
	let needle = b"[HEADER SIZE] = 16384";
	let at = bytes.windows(needle.len()).position(|x| x == needle).unwrap();
	bytes[at..at + needle.len()].copy_from_slice(b"[HEADER SIZE] = 16000");
	std::fs::write(&path, &bytes).unwrap();

	assert!(matches!(
		TileReader::open(&path, Resolution::Thirty),
		Err(Error::HeaderSize {
			found: 16000,
			expected: 16384
		})
	));
	assert!(matches!(
		ArchiveBuilder::open(&path, Resolution::Thirty),
		Err(Error::HeaderSize { .. })
	));
}

#[test]
fn archive_of_other_resolution_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);

	assert!(matches!(
		TileReader::open(&path, Resolution::Three),
		Err(Error::ResolutionMismatch { .. })
	));
}

#[test]
fn corrupt_blocks_name_their_cell() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	build_archive(&path);

	let offset = match TileReader::open(&path, Resolution::Thirty).unwrap().entry(48, -123).unwrap() {
		CellEntry::Block { offset } => offset,
		other => panic!("expected a block, got {:?}", other),
	};

	let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
	file.seek(SeekFrom::Start(offset + BLOCK_HEADER_SIZE as u64 + 4)).unwrap();
	file.write_all(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0xFF]).unwrap();
	drop(file);

	let mut reader = TileReader::open(&path, Resolution::Thirty).unwrap();
	match reader.fetch_cell(48, -123) {
		Err(Error::CorruptBlock {
			lat: 48,
			lon: -123,
			offset: found,
			..
		}) => assert_eq!(found, offset),
		Err(other) => panic!("unexpected error {}", other),
		Ok(_) => panic!("corrupt block decoded"),
	}

	// Other cells are still readable.
	assert!(matches!(reader.fetch_cell(47, -123).unwrap(), Cell::Data(_)));
}

#[test]
fn builds_resume_where_they_left_off() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm30.cte");
	let land = build_archive(&path);

	let builder = ArchiveBuilder::open(&path, Resolution::Thirty).unwrap();
	assert!(builder.cell_exists(47, -123));
	assert!(builder.cell_exists(0, 0));
	assert!(!builder.cell_exists(12, 12));

	let extra = thirty_second_cell(800);
	builder.add_cell(12, 12, &extra).unwrap();
	builder.finish().unwrap();

	let mut reader = TileReader::open(&path, Resolution::Thirty).unwrap();
	match reader.fetch_cell(12, 12).unwrap() {
		Cell::Data(cell) => assert_eq!(cell.data(), &extra.data[..]),
		other => panic!("expected data, got {:?}", other),
	}
	match reader.fetch_cell(47, -123).unwrap() {
		Cell::Data(cell) => assert_eq!(cell.data(), &land.data[..]),
		other => panic!("expected data, got {:?}", other),
	}
}

#[test]
fn two_second_cells_keep_shape_and_accuracy() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("srtm2.cte");

	let shape = CellShape { rows: 3600, cols: 1800 };
	let mut data = vec![120; shape.len()];
	data[shape.cols * 10 + 3] = 121;
	data[shape.len() - 1] = UNDEFINED;
	let grid = CellGrid {
		shape,
		data,
		accuracy: Some(9),
	};

	let builder = ArchiveBuilder::new(&path, Resolution::Two).unwrap();
	builder.add_cell(61, 24, &grid).unwrap();
	builder.finish().unwrap();

	let mut reader = TileReader::open(&path, Resolution::Two).unwrap();
	assert_eq!(reader.accuracy(61, 24).unwrap(), Some(9));
	assert_eq!(reader.accuracy(61, 25).unwrap(), Some(0));
	match reader.fetch_cell(61, 24).unwrap() {
		Cell::Data(cell) => {
			assert_eq!(cell.flag(), 1);
			assert_eq!(cell.shape(), shape);
			assert_eq!(cell.get(10, 3), 121);
			assert_eq!(cell.get(3599, 1799), UNDEFINED);
			assert_eq!(cell.data(), &grid.data[..]);
		},
		other => panic!("expected data, got {:?}", other),
	}
}
