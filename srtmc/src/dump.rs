use std::path::PathBuf;

use clap::Args;
use srtm::{ArchiveSlot, Cell, CellSource, DataRoot, DecodedCell, FallbackReader, Resolution};

#[derive(Args)]
/// Print the elevations of one cell as text.
pub struct Dump {
	/// Latitude of the cell's south-west corner.
	#[clap(allow_hyphen_values = true)]
	lat: i16,
	/// Longitude of the cell's south-west corner.
	#[clap(allow_hyphen_values = true)]
	lon: i16,
	/// Directory holding the archives.
	#[clap(short = 'd', long = "data", env = "SRTM_DATA")]
	data: Option<PathBuf>,
	/// Read only this resolution instead of the finest one that has the cell.
	#[clap(short = 'r', long = "res")]
	resolution: Option<Resolution>,
	/// Print every nth sample of every nth row.
	#[clap(short = 's', long = "step", default_value_t = 1)]
	step: usize,
}

/// One row of a cell, every `step`th sample, right-aligned.
fn format_row(cell: &DecodedCell, row: usize, step: usize) -> String {
	(0..cell.shape().cols)
		.step_by(step)
		.map(|col| format!("{:7}", cell.get(row, col)))
		.collect()
}

pub fn dump(dump: Dump) {
	if dump.step == 0 {
		eprintln!("step must be at least 1");
		return;
	}

	let root = dump.data.map(DataRoot::new).unwrap_or_else(DataRoot::unconfigured);
	// The middle of the cell, so any rounding stays inside it.
	let (lat, lon) = (dump.lat as f64 + 0.5, dump.lon as f64 + 0.5);
	let found = match dump.resolution {
		Some(resolution) => ArchiveSlot::new(root, resolution)
			.fetch_cell_grid(lat, lon)
			.map(|x| (Some(resolution), x)),
		None => FallbackReader::new(root)
			.query_position(lat, lon)
			.map(|x| (x.resolution, x.cell)),
	};

	match found {
		Ok((_, Cell::Water)) => println!("Cell {}, {} is water", dump.lat, dump.lon),
		Ok((_, Cell::Undefined)) => println!("Cell {}, {} has no data", dump.lat, dump.lon),
		Ok((_, Cell::NoArchive)) => println!("No archive available"),
		Ok((resolution, Cell::Data(cell))) => {
			let shape = cell.shape();
			println!(
				"Cell {}, {} from the {} archive, {} x {} samples",
				cell.lat(),
				cell.lon(),
				resolution.unwrap_or_else(|| cell.resolution()),
				shape.rows,
				shape.cols
			);
			for row in (0..shape.rows).step_by(dump.step) {
				println!("{}", format_row(&cell, row, dump.step));
			}
		},
		Err(err) => {
			eprintln!("{}", err);
			std::process::exit(1);
		},
	}
}
