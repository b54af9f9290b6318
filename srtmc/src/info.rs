use std::{
	fmt::Display,
	fs::File,
	io::Read,
	path::{Path, PathBuf},
};

use clap::Args;
use srtm::{ArchiveHeader, Directory, Error, Resolution, TileReader, HEADER_SIZE};

#[derive(Args)]
/// Give information about an archive.
pub struct Info {
	input: PathBuf,
	/// Arc seconds per sample, for archives whose header does not record it.
	#[clap(short = 'r', long = "res")]
	resolution: Option<Resolution>,
}

struct Size(u64);

impl Display for Size {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let size = self.0;
		if size < 1000 {
			write!(f, "{} B", size)
		} else if size < 1000 * 1000 {
			write!(f, "{:.2} KB", size as f64 / 1000.0)
		} else if size < 1000 * 1000 * 1000 {
			write!(f, "{:.2} MB", size as f64 / 1000.0 / 1000.0)
		} else {
			write!(f, "{:.2} GB", size as f64 / 1000.0 / 1000.0 / 1000.0)
		}
	}
}

/// The resolution an archive was written at, from its header or else its file name.
fn detect_resolution(path: &Path) -> Result<Option<Resolution>, Error> {
	let mut header = vec![0; HEADER_SIZE];
	File::open(path)?.read_exact(&mut header)?;
	let from_name = || Resolution::ALL.into_iter().find(|x| path.ends_with(x.file_name()));

	Ok(ArchiveHeader::parse(&header)?.resolution.or_else(from_name))
}

pub fn info(info: Info) {
	let detected = match info.resolution {
		Some(x) => Ok(Some(x)),
		None => detect_resolution(&info.input),
	};
	let resolution = match detected {
		Ok(Some(x)) => x,
		Ok(None) => {
			eprintln!("archive does not record its resolution, pass it with --res");
			return;
		},
		Err(err) => {
			eprintln!("archive could not be loaded: {}", err);
			return;
		},
	};
	let reader = match TileReader::open(&info.input, resolution) {
		Ok(x) => x,
		Err(err) => {
			eprintln!("archive could not be loaded: {}", err);
			return;
		},
	};
	let header = reader.header();

	println!("Header");
	println!("  Version: {}", header.version);
	println!("  Zlib version: {}", header.zlib_version);
	println!("  Created: {}", header.creation_date);
	println!("  Header size: {}", header.header_size);
	println!("  Resolution: {}", resolution);
	println!("  Directory entry bits: {}", resolution.entry_bits());

	println!();

	let stats = reader.directory().stats();
	println!("Cells");
	println!("  Land: {}", stats.blocks);
	println!("  Water: {}", stats.water);
	println!("  Undefined: {}", stats.undefined);
	if stats.invalid > 0 {
		println!("  Invalid: {}", stats.invalid);
	}

	if let Ok(metadata) = std::fs::metadata(&info.input) {
		let data = metadata.len().saturating_sub(Directory::data_start(resolution));

		println!();

		println!("Size");
		println!("  File: {}", Size(metadata.len()));
		println!("  Blocks: {}", Size(data));
		if stats.blocks > 0 {
			println!("  Average block: {}", Size(data / stats.blocks as u64));
		}
	}
}
