//! Serpentine delta coding of a cell's elevations.

use crate::{
	bits::{bytes_for_bits, pack, unpack},
	CellShape,
	Error,
	StreamError,
	WATER,
};

/// Bits taken by the start value, bias and field width.
pub const STREAM_HEADER_BITS: usize = 16 + 16 + 4;

/// Widest delta field the 4 bit width can describe.
pub const MAX_FIELD_BITS: u32 = 15;

/// The fixed part of a packed delta stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeltaHeader {
	pub start_val: i16,
	pub bias: i16,
	pub num_bits: u32,
}

impl DeltaHeader {
	/// The field value reserved for samples without an elevation.
	pub fn sentinel(&self) -> u32 { (1 << self.num_bits) - 1 }

	pub fn read(stream: &[u8]) -> Result<Self, StreamError> {
		if stream.len() < bytes_for_bits(STREAM_HEADER_BITS) {
			return Err(StreamError::Truncated {
				found: stream.len(),
				expected: bytes_for_bits(STREAM_HEADER_BITS),
			});
		}

		let header = Self {
			start_val: unpack(stream, 0, 16) as u16 as i16,
			bias: unpack(stream, 16, 16) as u16 as i16,
			num_bits: unpack(stream, 32, 4),
		};
		if header.num_bits == 0 || header.num_bits > MAX_FIELD_BITS {
			return Err(StreamError::InvalidWidth(header.num_bits as u8));
		}

		Ok(header)
	}

	fn write(&self, stream: &mut [u8]) {
		pack(stream, 0, 16, self.start_val as u16 as u32);
		pack(stream, 16, 16, self.bias as u16 as u32);
		pack(stream, 32, 4, self.num_bits);
	}
}

/// What a cell's samples amount to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Classification {
	/// Every sample is water.
	Water,
	/// No sample has an elevation.
	Undefined,
	/// Anything else, which needs a block.
	Land,
}

pub fn classify(grid: &[i16], null: i16) -> Classification {
	let mut water = true;
	let mut undefined = true;
	for &sample in grid {
		water &= sample == WATER;
		undefined &= sample == null;
		if !water && !undefined {
			return Classification::Land;
		}
	}

	if water {
		Classification::Water
	} else {
		Classification::Undefined
	}
}

/// Indices into a row-major grid, visiting even rows west to east and odd rows east to west.
pub fn serpentine(shape: CellShape) -> impl Iterator<Item = usize> {
	let CellShape { rows, cols } = shape;
	(0..rows * cols).map(move |i| {
		let row = i / cols;
		let col = i % cols;
		if row % 2 == 0 {
			row * cols + col
		} else {
			row * cols + cols - 1 - col
		}
	})
}

/// Number of bytes a packed stream for `shape` with `num_bits` wide fields takes.
pub fn stream_len(shape: CellShape, num_bits: u32) -> usize {
	bytes_for_bits(STREAM_HEADER_BITS + shape.len() * num_bits as usize)
}

/// Delta codes a row-major grid. Samples equal to `null` are stored as the sentinel and skipped by the delta chain.
pub fn encode(grid: &[i16], shape: CellShape, null: i16) -> Result<Vec<u8>, Error> {
	tracy::zone!("Delta encode");

	if grid.len() != shape.len() {
		return Err(Error::GridSize {
			found: grid.len(),
			expected: shape.len(),
		});
	}

	let mut start = None;
	let mut prev = 0i32;
	let mut min_delta = 0i32;
	let mut max_delta = 0i32;
	for index in serpentine(shape) {
		let sample = grid[index];
		if sample == null {
			continue;
		}
		let sample = sample as i32;
		if start.is_none() {
			start = Some(sample as i16);
		} else {
			let delta = sample - prev;
			min_delta = min_delta.min(delta);
			max_delta = max_delta.max(delta);
		}
		prev = sample;
	}

	// The sentinel sits one above the largest biased delta.
	let range = max_delta - min_delta;
	let num_bits = 32 - ((range + 1) as u32).leading_zeros();
	if num_bits > MAX_FIELD_BITS {
		return Err(Error::DeltaRange { range });
	}

	let header = DeltaHeader {
		start_val: start.unwrap_or(0),
		bias: -min_delta as i16,
		num_bits,
	};
	let sentinel = header.sentinel();
	let bias = header.bias as i32;

	let mut stream = vec![0; stream_len(shape, num_bits)];
	header.write(&mut stream);

	let mut prev = header.start_val as i32;
	let mut bit = STREAM_HEADER_BITS;
	for index in serpentine(shape) {
		let sample = grid[index];
		let field = if sample == null {
			sentinel
		} else {
			let sample = sample as i32;
			let field = (sample - prev + bias) as u32;
			prev = sample;
			field
		};
		pack(&mut stream, bit, num_bits, field);
		bit += num_bits as usize;
	}

	Ok(stream)
}

/// Reverses [`encode`], writing `null` for every sentinel field.
pub fn decode(stream: &[u8], shape: CellShape, null: i16) -> Result<Vec<i16>, StreamError> {
	tracy::zone!("Delta decode");

	let header = DeltaHeader::read(stream)?;
	let expected = stream_len(shape, header.num_bits);
	if stream.len() < expected {
		return Err(StreamError::Truncated {
			found: stream.len(),
			expected,
		});
	}

	let sentinel = header.sentinel();
	let bias = header.bias as i32;
	let num_bits = header.num_bits;

	let mut grid = vec![null; shape.len()];
	let mut prev = header.start_val as i32;
	let mut bit = STREAM_HEADER_BITS;
	for index in serpentine(shape) {
		let field = unpack(stream, bit, num_bits);
		bit += num_bits as usize;
		if field == sentinel {
			continue;
		}

		let sample = prev + field as i32 - bias;
		if sample < i16::MIN as i32 || sample > i16::MAX as i32 {
			return Err(StreamError::Overflow(index));
		}
		grid[index] = sample as i16;
		prev = sample;
	}

	Ok(grid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::UNDEFINED;

	fn terrain(shape: CellShape) -> Vec<i16> {
		(0..shape.len())
			.map(|i| {
				let row = (i / shape.cols) as i32;
				let col = (i % shape.cols) as i32;
				(row * 37 - col * 11 + (row * col) % 97 - 400) as i16
			})
			.collect()
	}

	#[test]
	fn serpentine_alternates_direction() {
		let order: Vec<_> = serpentine(CellShape { rows: 3, cols: 3 }).collect();
		assert_eq!(order, [0, 1, 2, 5, 4, 3, 6, 7, 8]);
	}

	#[test]
	fn round_trips_terrain() {
		let shape = CellShape { rows: 40, cols: 25 };
		let grid = terrain(shape);
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn round_trips_voids() {
		let shape = CellShape::square(30);
		let mut grid = terrain(shape);
		for i in (0..grid.len()).step_by(7) {
			grid[i] = UNDEFINED;
		}
		// A leading void must not become the start value.
		grid[0] = UNDEFINED;

		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		let header = DeltaHeader::read(&stream).unwrap();
		assert_eq!(header.start_val, grid[1]);
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn round_trips_all_void() {
		let shape = CellShape::square(12);
		let grid = vec![UNDEFINED; shape.len()];
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		assert_eq!(DeltaHeader::read(&stream).unwrap().num_bits, 1);
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn round_trips_all_water() {
		let shape = CellShape::square(12);
		let grid = vec![WATER; shape.len()];
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		let header = DeltaHeader::read(&stream).unwrap();
		assert_eq!((header.start_val, header.bias, header.num_bits), (0, 0, 1));
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn round_trips_widest_range() {
		// A range of 32766 plus the sentinel fills all 15 bits.
		let shape = CellShape { rows: 1, cols: 3 };
		let grid = vec![16383, -16383, -16383];
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		let header = DeltaHeader::read(&stream).unwrap();
		assert_eq!(header.num_bits, 15);
		assert_eq!(header.bias, 32766);
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn rejects_range_past_field_width() {
		let shape = CellShape { rows: 1, cols: 3 };
		let grid = vec![-16384, 16383, -16384];
		assert!(matches!(
			encode(&grid, shape, UNDEFINED),
			Err(Error::DeltaRange { range: 65534 })
		));
	}

	#[test]
	fn width_leaves_room_for_sentinel() {
		// Deltas 0 and 1 need a third value for the sentinel.
		let shape = CellShape { rows: 1, cols: 3 };
		let grid = vec![5, 5, 6];
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		let header = DeltaHeader::read(&stream).unwrap();
		assert_eq!(header.num_bits, 2);
		assert_eq!(header.sentinel(), 3);
		assert_eq!(decode(&stream, shape, UNDEFINED).unwrap(), grid);
	}

	#[test]
	fn decode_rejects_truncated_streams() {
		let shape = CellShape::square(10);
		let grid = terrain(shape);
		let stream = encode(&grid, shape, UNDEFINED).unwrap();
		assert!(matches!(
			decode(&stream[..stream.len() - 1], shape, UNDEFINED),
			Err(StreamError::Truncated { .. })
		));
		assert!(matches!(
			decode(&stream[..3], shape, UNDEFINED),
			Err(StreamError::Truncated { .. })
		));
	}

	#[test]
	fn classifies_cells() {
		assert_eq!(classify(&[0, 0, 0], UNDEFINED), Classification::Water);
		assert_eq!(classify(&[UNDEFINED; 3], UNDEFINED), Classification::Undefined);
		assert_eq!(classify(&[0, 12, 0], UNDEFINED), Classification::Land);
		assert_eq!(classify(&[0, UNDEFINED, 0], UNDEFINED), Classification::Land);
	}
}
