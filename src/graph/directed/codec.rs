//! Delta + varint coding for ascending runs of node ids.
//!
//! A run is stored as its first element in raw native width followed by the
//! gap to each next element. Gaps are written seven bits at a time, least
//! significant group first; the last byte of a gap has its high bit set and
//! every earlier byte has it clear.

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use zerocopy::{AsBytes, FromBytes};

const DATA_BITS: u32 = 7;
const DATA_MASK: u64 = 0x7f;
const STOP_BIT: u8 = 0x80;

/// Appends the encoding of the ascending run `run` to `out`.
///
/// Empty runs encode to nothing.
pub fn encode_increasing<T>(out: &mut Vec<u8>, run: &[T])
where
    T: PrimInt + Unsigned + AsPrimitive<u64> + AsBytes,
{
    let Some((&first, rest)) = run.split_first() else {
        return;
    };
    out.extend_from_slice(first.as_bytes());

    let mut prev = first;
    for &curr in rest {
        debug_assert!(curr >= prev, "run must be ascending");
        let mut gap: u64 = (curr - prev).as_();
        while gap > DATA_MASK {
            out.push((gap & DATA_MASK) as u8);
            gap >>= DATA_BITS;
        }
        out.push(gap as u8 | STOP_BIT);
        prev = curr;
    }
}

/// Decodes exactly `out.len()` elements from the front of `input`.
///
/// Returns the number of bytes consumed, or `None` if `input` ends early or a
/// gap overflows the element type.
pub fn decode_increasing<T>(input: &[u8], out: &mut [T]) -> Option<usize>
where
    T: PrimInt + Unsigned + AsPrimitive<u64> + AsBytes + FromBytes,
    u64: AsPrimitive<T>,
{
    let Some((first, rest)) = out.split_first_mut() else {
        return Some(0);
    };
    let width = core::mem::size_of::<T>();
    *first = T::read_from(input.get(..width)?)?;

    let limit: u64 = T::max_value().as_();
    let mut pos = width;
    let mut prev: u64 = (*first).as_();
    for slot in rest {
        let mut gap = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *input.get(pos)?;
            pos += 1;
            if shift >= u64::BITS {
                return None;
            }
            gap |= (u64::from(byte) & DATA_MASK) << shift;
            if byte & STOP_BIT != 0 {
                break;
            }
            shift += DATA_BITS;
        }
        let curr = prev.checked_add(gap).filter(|&v| v <= limit)?;
        *slot = curr.as_();
        prev = curr;
    }
    Some(pos)
}
