use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::{
	bits::{pack, unpack},
	Error,
	StreamError,
};

/// Size of the header in front of every block.
pub const BLOCK_HEADER_SIZE: usize = 8;

const FLAG_BITS: u32 = 3;
const COMPRESSED_BITS: u32 = 30;
const UNCOMPRESSED_BITS: u32 = 31;

/// Sizes and shape of a block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
	/// Which of the archive's cell shapes the block holds.
	pub flag: u8,
	pub compressed_size: u32,
	pub uncompressed_size: u32,
}

impl BlockHeader {
	pub fn new(flag: u8, compressed_size: usize, uncompressed_size: usize) -> Result<Self, Error> {
		if compressed_size >= 1 << COMPRESSED_BITS {
			return Err(Error::BlockTooLarge(compressed_size));
		}
		if uncompressed_size >= 1 << UNCOMPRESSED_BITS {
			return Err(Error::BlockTooLarge(uncompressed_size));
		}
		debug_assert!(flag < 1 << FLAG_BITS, "Invalid block flag");

		Ok(Self {
			flag,
			compressed_size: compressed_size as u32,
			uncompressed_size: uncompressed_size as u32,
		})
	}

	pub fn to_bytes(self) -> [u8; BLOCK_HEADER_SIZE] {
		let mut bytes = [0; BLOCK_HEADER_SIZE];
		pack(&mut bytes, 0, FLAG_BITS, self.flag as u32);
		pack(&mut bytes, FLAG_BITS as usize, COMPRESSED_BITS, self.compressed_size);
		pack(
			&mut bytes,
			(FLAG_BITS + COMPRESSED_BITS) as usize,
			UNCOMPRESSED_BITS,
			self.uncompressed_size,
		);
		bytes
	}

	pub fn from_bytes(bytes: &[u8; BLOCK_HEADER_SIZE]) -> Self {
		Self {
			flag: unpack(bytes, 0, FLAG_BITS) as u8,
			compressed_size: unpack(bytes, FLAG_BITS as usize, COMPRESSED_BITS),
			uncompressed_size: unpack(bytes, (FLAG_BITS + COMPRESSED_BITS) as usize, UNCOMPRESSED_BITS),
		}
	}
}

/// Compresses a packed delta stream into a complete block, header included.
pub fn compress_block(flag: u8, stream: &[u8]) -> Result<Vec<u8>, Error> {
	tracy::zone!("Compress block");

	let mut encoder = ZlibEncoder::new(vec![0; BLOCK_HEADER_SIZE], Compression::best());
	encoder.write_all(stream)?;
	let mut block = encoder.finish()?;

	let header = BlockHeader::new(flag, block.len() - BLOCK_HEADER_SIZE, stream.len())?;
	block[..BLOCK_HEADER_SIZE].copy_from_slice(&header.to_bytes());
	Ok(block)
}

/// Inflates a block payload, which must come out at exactly `uncompressed_size` bytes.
pub fn decompress_payload(payload: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, StreamError> {
	tracy::zone!("Decompress block");

	// One byte past the expected size is read, so overlong payloads show up as a mismatch.
	let mut stream = Vec::with_capacity(uncompressed_size + uncompressed_size / 10 + 12);
	ZlibDecoder::new(payload)
		.take(uncompressed_size as u64 + 1)
		.read_to_end(&mut stream)?;

	if stream.len() != uncompressed_size {
		return Err(StreamError::SizeMismatch {
			found: stream.len(),
			expected: uncompressed_size,
		});
	}
	Ok(stream)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_layout() {
		let header = BlockHeader::new(1, 0x2000_0001, 0x4000_0003).unwrap();
		let bytes = header.to_bytes();
		assert_eq!(bytes[0] >> 5, 1);
		assert_eq!(BlockHeader::from_bytes(&bytes), header);

		assert!(BlockHeader::new(0, 1 << 30, 10).is_err());
		assert!(BlockHeader::new(0, 10, 1 << 31).is_err());
	}

	#[test]
	fn block_round_trips() {
		let stream: Vec<u8> = (0..5000u32).map(|x| (x % 251) as u8).collect();
		let block = compress_block(0, &stream).unwrap();

		let header = BlockHeader::from_bytes(block[..BLOCK_HEADER_SIZE].try_into().unwrap());
		assert_eq!(header.flag, 0);
		assert_eq!(header.uncompressed_size as usize, stream.len());
		assert_eq!(header.compressed_size as usize, block.len() - BLOCK_HEADER_SIZE);

		let payload = &block[BLOCK_HEADER_SIZE..];
		assert_eq!(decompress_payload(payload, stream.len()).unwrap(), stream);
	}

	#[test]
	fn size_mismatch_is_reported() {
		let stream = vec![7u8; 100];
		let block = compress_block(0, &stream).unwrap();
		let payload = &block[BLOCK_HEADER_SIZE..];

		assert!(matches!(
			decompress_payload(payload, 99),
			Err(StreamError::SizeMismatch { found: 100, expected: 99 })
		));
		assert!(matches!(
			decompress_payload(payload, 101),
			Err(StreamError::SizeMismatch { found: 100, expected: 101 })
		));
	}

	#[test]
	fn garbage_payload_fails() {
		assert!(decompress_payload(&[1, 2, 3, 4, 5], 10).is_err());
	}

	#[test]
	fn payloads_are_plain_zlib_streams() {
		let block = compress_block(1, &[7; 300]).unwrap();
		let payload = &block[BLOCK_HEADER_SIZE..];

		// Deflate with a 32 KiB window, no preset dictionary, and a valid header check.
		assert_eq!(payload[0], 0x78);
		assert_eq!(payload[1] & 0x20, 0);
		assert_eq!(u16::from_be_bytes([payload[0], payload[1]]) % 31, 0);

		let mut stream = Vec::new();
		flate2::read::ZlibDecoder::new(payload).read_to_end(&mut stream).unwrap();
		assert_eq!(stream, [7; 300]);
	}
}
