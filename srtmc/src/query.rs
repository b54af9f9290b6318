use std::path::PathBuf;

use clap::Args;
use srtm::{locate, Cell, DataRoot, FallbackReader, Resolved, UNDEFINED};

#[derive(Args)]
/// Look up elevations, taking each from the finest archive that has it.
pub struct Query {
	/// Latitude and longitude pairs in degrees.
	#[clap(required = true, allow_hyphen_values = true)]
	positions: Vec<f64>,
	/// Directory holding the archives.
	#[clap(short = 'd', long = "data", env = "SRTM_DATA")]
	data: Option<PathBuf>,
}

fn describe(lat: f64, lon: f64, resolved: &Resolved) -> String {
	let elevation = locate(lat, lon).map_or(UNDEFINED, |x| resolved.cell.elevation(&x));
	let what = match &resolved.cell {
		Cell::Water => "water".to_string(),
		Cell::Undefined => "no data".to_string(),
		Cell::NoArchive => "no archive".to_string(),
		Cell::Data(_) => format!("{} m", elevation),
	};

	match resolved.resolution {
		Some(resolution) => format!("{}, {}: {} ({})", lat, lon, what, resolution),
		None => format!("{}, {}: {}", lat, lon, what),
	}
}

pub fn query(query: Query) {
	if query.positions.len() % 2 != 0 {
		eprintln!("positions must be latitude and longitude pairs");
		return;
	}

	let root = query.data.map(DataRoot::new).unwrap_or_else(DataRoot::unconfigured);
	let mut reader = FallbackReader::new(root);
	for position in query.positions.chunks_exact(2) {
		let (lat, lon) = (position[0], position[1]);
		match reader.query_position(lat, lon) {
			Ok(resolved) => println!("{}", describe(lat, lon, &resolved)),
			Err(err) => {
				eprintln!("{}", err);
				std::process::exit(1);
			},
		}
	}
	reader.close();
}
