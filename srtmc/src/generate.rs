use std::path::PathBuf;

use clap::Args;
use log::warn;
use srtm::Resolution;

use crate::{
	common::for_cell_in_output,
	source::{DtedSource, ElevationSource, HgtSource, Srtm30Source},
};

#[derive(Args)]
/// Generate an archive from raw elevation sources.
pub struct Generate {
	/// Directory of source files. 2 second archives can merge a second DTED dataset.
	#[clap(required = true, max_values = 2)]
	input: Vec<PathBuf>,
	#[clap(short = 'o', long = "out")]
	output: PathBuf,
	/// Arc seconds per sample: 1, 2, 3 or 30.
	#[clap(short = 'r', long = "res", default_value_t = Resolution::Three)]
	resolution: Resolution,
}

fn make_source(generate: &Generate) -> Result<Box<dyn ElevationSource>, String> {
	if generate.input.len() > 1 && generate.resolution != Resolution::Two {
		return Err(format!("only {} archives merge two datasets", Resolution::Two));
	}

	let root = &generate.input[0];
	Ok(match generate.resolution {
		Resolution::One | Resolution::Three => Box::new(HgtSource::new(root, generate.resolution)),
		Resolution::Two => Box::new(DtedSource::new(generate.input.clone())),
		Resolution::Thirty => Box::new(Srtm30Source::new(root).map_err(|e| format!("{}: {}", root.display(), e))?),
	})
}

pub fn generate(generate: Generate) {
	let source = match make_source(&generate) {
		Ok(source) => source,
		Err(err) => {
			eprintln!("Error loading data source: {}", err);
			return;
		},
	};
	debug_assert_eq!(source.resolution(), generate.resolution);

	let completed = for_cell_in_output(&generate.output, generate.resolution, |lat, lon, builder| {
		let grid = match source.load_cell(lat, lon) {
			Ok(Some(grid)) => grid,
			Ok(None) => return Ok(()),
			Err(e) => {
				warn!("Skipping source cell {}, {}: {}", lat, lon, e);
				return Ok(());
			},
		};

		builder.add_cell(lat, lon, &grid)?;
		Ok(())
	});

	if !completed {
		std::process::exit(1);
	}
}
