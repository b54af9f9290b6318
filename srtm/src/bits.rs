//! Packing of arbitrary width unsigned integers into byte buffers, most significant bit first.

/// Divisor used to split values wider than 31 bits.
pub const DOUBLE_PACK_DIVISOR: u64 = i32::MAX as u64;

/// Writes the low `num_bits` bits of `value` into `buffer`, starting `start_bit` bits into it.
///
/// Bits outside of `[start_bit, start_bit + num_bits)` are left untouched.
pub fn pack(buffer: &mut [u8], start_bit: usize, num_bits: u32, value: u32) {
	debug_assert!((1..=32).contains(&num_bits), "Invalid field width");

	let value = value as u64;
	let mut remaining = num_bits;
	let mut bit = start_bit;
	while remaining > 0 {
		let used = (bit % 8) as u32;
		let space = 8 - used;
		let take = space.min(remaining);
		let shift = space - take;
		let mask = (((1u16 << take) - 1) as u8) << shift;
		let chunk = ((value >> (remaining - take)) as u8) << shift;

		let byte = &mut buffer[bit / 8];
		*byte = (*byte & !mask) | (chunk & mask);

		remaining -= take;
		bit += take as usize;
	}
}

/// Reads back a field written by [`pack`].
pub fn unpack(buffer: &[u8], start_bit: usize, num_bits: u32) -> u32 {
	debug_assert!((1..=32).contains(&num_bits), "Invalid field width");

	let mut value = 0u64;
	let mut remaining = num_bits;
	let mut bit = start_bit;
	while remaining > 0 {
		let used = (bit % 8) as u32;
		let space = 8 - used;
		let take = space.min(remaining);
		let shift = space - take;
		let chunk = (buffer[bit / 8] >> shift) & ((1u16 << take) - 1) as u8;
		value = (value << take) | chunk as u64;

		remaining -= take;
		bit += take as usize;
	}

	value as u32
}

/// Packs a value of 32 to 62 bits as `value / i32::MAX` in the leading `num_bits - 31` bits, followed by
/// `value % i32::MAX` in 31 bits.
///
/// The quotient is truncated to its field, so values of `2^(num_bits - 31) * i32::MAX` and above do not survive.
/// Existing archives use exactly this layout; see [`double_pack_capacity`].
pub fn double_pack(buffer: &mut [u8], start_bit: usize, num_bits: u32, value: u64) {
	debug_assert!((32..=62).contains(&num_bits), "Invalid double field width");

	let high_bits = num_bits - 31;
	let high = (value / DOUBLE_PACK_DIVISOR) as u32;
	let low = (value % DOUBLE_PACK_DIVISOR) as u32;

	pack(buffer, start_bit, high_bits, high);
	pack(buffer, start_bit + high_bits as usize, 31, low);
}

/// Reads back a field written by [`double_pack`].
pub fn double_unpack(buffer: &[u8], start_bit: usize, num_bits: u32) -> u64 {
	debug_assert!((32..=62).contains(&num_bits), "Invalid double field width");

	let high_bits = num_bits - 31;
	let high = unpack(buffer, start_bit, high_bits) as u64;
	let low = unpack(buffer, start_bit + high_bits as usize, 31) as u64;

	high * DOUBLE_PACK_DIVISOR + low
}

/// The largest value that survives a [`double_pack`] of `num_bits` bits.
pub fn double_pack_capacity(num_bits: u32) -> u64 { (1u64 << (num_bits - 31)) * DOUBLE_PACK_DIVISOR - 1 }

/// Bytes needed to hold `bits` bits.
pub fn bytes_for_bits(bits: usize) -> usize { (bits + 7) / 8 }
