//! Payload pseudo-instruction parsing (SPEC_FULL.md §4.3.1, §6):
//! packed-switch, sparse-switch and fill-array-data. These three are
//! never reached by straight-line decoding; an owning `packed-switch`/
//! `sparse-switch`/`fill-array-data` instruction names the code-unit
//! offset of its payload via a 32-bit branch-style operand, and the
//! payload is parsed on demand from that offset.
//!
//! Grounded on `original_source/dare/decompiler/src/tyde/tyde_instruction.cpp`'s
//! payload readers.

const PACKED_SWITCH_MAGIC: u16 = 0x0100;
const SPARSE_SWITCH_MAGIC: u16 = 0x0200;
const FILL_ARRAY_DATA_MAGIC: u16 = 0x0300;

/// A decoded packed-switch payload: consecutive keys starting at
/// `first_key`, one code-unit-offset target per case (relative to the
/// *owning switch instruction*, per the Dalvik format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSwitchPayload {
	pub first_key: i32,
	pub targets: Vec<i32>,
}

/// A decoded sparse-switch payload: explicit `(key, target)` pairs, keys
/// given in strictly ascending order by the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseSwitchPayload {
	pub entries: Vec<(i32, i32)>,
}

/// A decoded fill-array-data payload: the element width in bytes and the
/// raw data words, each sign-extended/widened to 64 bits so the caller
/// (the decoder, later the constant promoter) doesn't need to special-
/// case narrower element widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillArrayDataPayload {
	pub element_width: u32,
	pub words: Vec<i64>,
}

/// Reads a packed-switch payload at absolute code-unit offset
/// `payload_offset` within `units`.
pub fn read_packed_switch(units: &[u16], payload_offset: usize) -> anyhow::Result<PackedSwitchPayload> {
	anyhow::ensure!(units.get(payload_offset) == Some(&PACKED_SWITCH_MAGIC), "bad packed-switch-payload magic");
	let size = units[payload_offset + 1] as usize;
	let first_key = u32_at(units, payload_offset + 2) as i32;
	let mut targets = Vec::with_capacity(size);
	for i in 0..size {
		targets.push(u32_at(units, payload_offset + 4 + i * 2) as i32);
	}
	Ok(PackedSwitchPayload { first_key, targets })
}

/// Reads a sparse-switch payload at absolute code-unit offset
/// `payload_offset` within `units`.
pub fn read_sparse_switch(units: &[u16], payload_offset: usize) -> anyhow::Result<SparseSwitchPayload> {
	anyhow::ensure!(units.get(payload_offset) == Some(&SPARSE_SWITCH_MAGIC), "bad sparse-switch-payload magic");
	let size = units[payload_offset + 1] as usize;
	let keys_start = payload_offset + 2;
	let targets_start = keys_start + size * 2;
	let entries = (0..size)
		.map(|i| (u32_at(units, keys_start + i * 2) as i32, u32_at(units, targets_start + i * 2) as i32))
		.collect();
	Ok(SparseSwitchPayload { entries })
}

/// Reads a fill-array-data payload at absolute code-unit offset
/// `payload_offset` within `units`.
pub fn read_fill_array_data(units: &[u16], payload_offset: usize) -> anyhow::Result<FillArrayDataPayload> {
	anyhow::ensure!(units.get(payload_offset) == Some(&FILL_ARRAY_DATA_MAGIC), "bad fill-array-data-payload magic");
	let element_width = units[payload_offset + 1] as u32;
	let size = u32_at(units, payload_offset + 2) as usize;
	let total_bytes = size * element_width as usize;

	let mut bytes = Vec::with_capacity(total_bytes);
	for i in 0..total_bytes.div_ceil(2) {
		let word = units.get(payload_offset + 4 + i).copied().unwrap_or(0);
		bytes.push((word & 0xff) as u8);
		bytes.push((word >> 8) as u8);
	}

	let words = (0..size)
		.map(|i| {
			let base = i * element_width as usize;
			let mut value: i64 = 0;
			for b in 0..element_width as usize {
				value |= (bytes[base + b] as i64) << (b * 8);
			}
			// sign-extend from element_width bytes to 64 bits
			let shift = 64 - element_width * 8;
			(value << shift) >> shift
		})
		.collect();

	Ok(FillArrayDataPayload { element_width, words })
}

fn u32_at(units: &[u16], code_unit_offset: usize) -> u32 {
	units[code_unit_offset] as u32 | ((units[code_unit_offset + 1] as u32) << 16)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packed_switch_roundtrip() {
		// magic, size=2, first_key=10, targets=[20, 30]
		let units = [0x0100, 2, 10, 0, 20, 0, 30, 0];
		let payload = read_packed_switch(&units, 0).unwrap();
		assert_eq!(payload.first_key, 10);
		assert_eq!(payload.targets, vec![20, 30]);
	}

	#[test]
	fn sparse_switch_roundtrip() {
		// magic, size=2, keys=[1,2], targets=[100,200]
		let units = [0x0200, 2, 1, 0, 2, 0, 100, 0, 200, 0];
		let payload = read_sparse_switch(&units, 0).unwrap();
		assert_eq!(payload.entries, vec![(1, 100), (2, 200)]);
	}

	#[test]
	fn fill_array_data_width_4() {
		// magic, element_width=4, size=2, words = [1, -1]
		let units = [0x0300, 4, 2, 0, 1, 0, 0xffff, 0xffff];
		let payload = read_fill_array_data(&units, 0).unwrap();
		assert_eq!(payload.element_width, 4);
		assert_eq!(payload.words, vec![1, -1]);
	}

	#[test]
	fn fill_array_data_width_1_sign_extends() {
		// element_width=1, size=2, raw bytes 0xff, 0x01 packed into one word
		let units = [0x0300, 1, 2, 0, 0x01ff];
		let payload = read_fill_array_data(&units, 0).unwrap();
		assert_eq!(payload.words, vec![-1, 1]);
	}
}
