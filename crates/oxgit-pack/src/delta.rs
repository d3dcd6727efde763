//! Git delta instruction streams.
//!
//! A delta starts with the base and result sizes as varints, followed by
//! instructions. A byte with the high bit set is a copy from the base: its
//! low seven bits select which offset (4) and size (3) bytes follow, and a
//! size of zero means 0x10000. Any other non-zero byte inserts that many
//! literal bytes. Zero is reserved.

use crate::entry::{decode_varint, encode_varint};
use crate::error::{PackError, PackResult};

/// Apply `delta` to `base`, producing the target object payload.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> PackResult<Vec<u8>> {
    let (base_size, mut pos) = decode_varint(delta)?;
    if base_size != base.len() as u64 {
        return Err(PackError::InvalidDelta(format!(
            "base is {} bytes, delta expects {base_size}",
            base.len()
        )));
    }
    let (result_size, used) = decode_varint(&delta[pos..])?;
    pos += used;

    let mut out = Vec::with_capacity(result_size as usize);
    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;

        if op & 0x80 != 0 {
            let mut offset = 0usize;
            let mut size = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    let b = *delta.get(pos).ok_or_else(truncated)?;
                    offset |= usize::from(b) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    let b = *delta.get(pos).ok_or_else(truncated)?;
                    size |= usize::from(b) << (8 * i);
                    pos += 1;
                }
            }
            if size == 0 {
                size = 0x10000;
            }
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| PackError::InvalidDelta("copy outside base".into()))?;
            out.extend_from_slice(&base[offset..end]);
        } else if op != 0 {
            let len = usize::from(op);
            let literal = delta
                .get(pos..pos + len)
                .ok_or_else(truncated)?;
            out.extend_from_slice(literal);
            pos += len;
        } else {
            return Err(PackError::InvalidDelta("reserved opcode 0".into()));
        }
    }

    if out.len() as u64 != result_size {
        return Err(PackError::InvalidDelta(format!(
            "produced {} bytes, expected {result_size}",
            out.len()
        )));
    }
    Ok(out)
}

fn truncated() -> PackError {
    PackError::InvalidDelta("truncated instruction".into())
}

/// Delta instruction for [`encode_delta`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeltaOp<'a> {
    Copy { offset: u32, size: u32 },
    Insert(&'a [u8]),
}

/// Serialize a delta from explicit instructions.
///
/// The pack writer stores whole objects; this exists to produce deltas for
/// thin transfers and tests.
pub fn encode_delta(base_size: u64, result_size: u64, ops: &[DeltaOp<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_varint(&mut out, base_size);
    encode_varint(&mut out, result_size);
    for op in ops {
        match op {
            DeltaOp::Copy { offset, size } => {
                let mut cmd = 0x80u8;
                let mut args = Vec::with_capacity(7);
                for (i, b) in offset.to_le_bytes().iter().enumerate() {
                    if *b != 0 {
                        cmd |= 1 << i;
                        args.push(*b);
                    }
                }
                let size = if *size == 0x10000 { 0 } else { *size };
                for (i, b) in size.to_le_bytes().iter().take(3).enumerate() {
                    if *b != 0 {
                        cmd |= 0x10 << i;
                        args.push(*b);
                    }
                }
                out.push(cmd);
                out.extend_from_slice(&args);
            }
            DeltaOp::Insert(data) => {
                for chunk in data.chunks(0x7f) {
                    out.push(chunk.len() as u8);
                    out.extend_from_slice(chunk);
                }
            }
        }
    }
    out
}
