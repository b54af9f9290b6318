use std::{
	io::Write,
	path::Path,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use crossbeam::channel::{self, RecvTimeoutError};
use log::{info, warn};
use rayon::prelude::*;
use srtm::{map_index_to_lat_lon, ArchiveBuilder, Error, Resolution, CELL_COUNT};

const FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Set once the run should wind down, by Ctrl + C or by a failed cell.
#[derive(Clone, Default)]
struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
	/// A flag raised by the first Ctrl + C. The second one exits at once.
	fn on_interrupt() -> Self {
		let flag = Self::default();
		let handler = flag.clone();
		if let Err(e) = ctrlc::set_handler(move || {
			if handler.is_raised() {
				std::process::exit(1);
			}
			println!("\nFinishing up, press Ctrl + C again to exit immediately (will result in some data loss)");
			handler.raise();
		}) {
			warn!("Ctrl + C will not stop the run cleanly: {}", e);
		}
		flag
	}

	fn raise(&self) { self.0.store(true, Ordering::Release) }

	fn is_raised(&self) -> bool { self.0.load(Ordering::Acquire) }
}

/// A `done/total` counter redrawn in place.
struct Progress {
	done: AtomicUsize,
	total: usize,
}

impl Progress {
	fn new(total: usize) -> Self {
		let progress = Self {
			done: AtomicUsize::new(0),
			total,
		};
		progress.draw(0);
		progress
	}

	fn tick(&self) { self.draw(self.done.fetch_add(1, Ordering::Relaxed) + 1) }

	fn draw(&self, done: usize) {
		print!("\r{}/{}", done, self.total);
		let _ = std::io::stdout().flush();
	}
}

/// Opens the output to continue an earlier run, or starts it over if it is missing or unusable.
pub fn open_output(path: &Path, resolution: Resolution) -> Result<ArchiveBuilder, Error> {
	if path.is_file() {
		match ArchiveBuilder::open(path, resolution) {
			Ok(x) => {
				info!("Continuing {} from the last run", path.display());
				return Ok(x);
			},
			Err(e) => warn!("Starting {} over: {}", path.display(), e),
		}
	}
	ArchiveBuilder::new(path, resolution)
}

/// Cells the archive has no entry for yet, in directory order.
pub fn pending_cells(builder: &ArchiveBuilder) -> Vec<(i16, i16)> {
	(0..CELL_COUNT)
		.map(map_index_to_lat_lon)
		.filter(|&(lat, lon)| !builder.cell_exists(lat, lon))
		.collect()
}

/// Runs `exec` for every cell of the output archive that has not been written yet.
///
/// Returns false if the run stopped on an error. Everything written before the error is kept, so the next run
/// continues from there.
pub fn for_cell_in_output(
	output: &Path, resolution: Resolution, exec: impl Fn(i16, i16, &ArchiveBuilder) -> Result<(), Error> + Sync,
) -> bool {
	let stop = StopFlag::on_interrupt();
	let builder = match open_output(output, resolution) {
		Ok(x) => x,
		Err(e) => {
			eprintln!("{}", e);
			return false;
		},
	};

	let pending = pending_cells(&builder);
	info!("{} of {} cells left to write", pending.len(), CELL_COUNT);
	let progress = Progress::new(pending.len());
	let failed = StopFlag::default();

	// Dropping `finished` wakes the flusher for good.
	let (finished, wake) = channel::bounded::<()>(0);
	let _ = crossbeam::scope(|scope| {
		let builder = &builder;
		scope.spawn(move |_| {
			while let Err(RecvTimeoutError::Timeout) = wake.recv_timeout(FLUSH_INTERVAL) {
				if let Err(e) = builder.flush() {
					warn!("Periodic flush failed: {}", e);
				}
			}
		});

		pending.par_iter().for_each(|&(lat, lon)| {
			tracy::zone!("Process cell");
			if stop.is_raised() {
				return;
			}
			if let Err(e) = exec(lat, lon, builder) {
				println!("\nError in cell {}, {}: {}", lat, lon, e);
				failed.raise();
				stop.raise();
			}
			progress.tick();
		});
		drop(finished);
	});
	println!();

	if let Err(e) = builder.finish() {
		println!("Error saving output: {}", e);
		return false;
	}
	!failed.is_raised()
}
