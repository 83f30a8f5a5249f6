//! Block-chunked transfer of typed slices.
//!
//! Values are moved as their raw native-width bytes (no endianness
//! conversion). Transfers are split into blocks of at most [`BLOCK_BYTES`]
//! so very large matrices never hit per-call size limits of the platform.

use std::io::{self, ErrorKind, Read, Write};

use zerocopy::{AsBytes, FromBytes};

use crate::error::{Error, Result};

/// Upper bound on the size of a single read or write call.
pub const BLOCK_BYTES: usize = 1 << 30;

/// Writes every element of `data`, one block at a time.
pub fn write_chunked<W: Write, T: AsBytes>(writer: &mut W, data: &[T]) -> io::Result<()> {
    for block in data.as_bytes().chunks(BLOCK_BYTES) {
        writer.write_all(block)?;
    }
    Ok(())
}

/// Fills `out` from `reader` and returns how many whole elements arrived.
///
/// A count short of `out.len()` means the stream ended early; the tail of
/// `out` past the returned count is unspecified.
pub fn read_chunked<R: Read, T: AsBytes + FromBytes>(
    reader: &mut R,
    out: &mut [T],
) -> io::Result<usize> {
    let width = core::mem::size_of::<T>();
    if width == 0 {
        return Ok(out.len());
    }
    let bytes = out.as_bytes_mut();
    let mut filled = 0usize;
    while filled < bytes.len() {
        let end = bytes.len().min(filled + BLOCK_BYTES);
        match reader.read(&mut bytes[filled..end]) {
            Ok(0) => break,
            Ok(got) => filled += got,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled / width)
}

/// Reads exactly `out.len()` elements or reports which section fell short.
pub(crate) fn read_section<R: Read, T: AsBytes + FromBytes>(
    reader: &mut R,
    out: &mut [T],
    section: &'static str,
) -> Result<()> {
    let found = read_chunked(reader, out)?;
    if found == out.len() {
        Ok(())
    } else {
        Err(Error::Truncated {
            section,
            expected: out.len(),
            found,
        })
    }
}

/// Elements allocated before the first read of [`read_vec`].
const FIRST_GROWTH: usize = 1 << 16;

/// Reads `len` elements into a freshly allocated vector.
///
/// The vector grows geometrically as data arrives, so a `len` taken from a
/// corrupt header costs at most twice the bytes the stream really holds.
pub(crate) fn read_vec<R: Read, T: AsBytes + FromBytes + Copy>(
    reader: &mut R,
    len: usize,
    section: &'static str,
) -> Result<Vec<T>> {
    let mut out: Vec<T> = Vec::new();
    while out.len() < len {
        let start = out.len();
        let chunk = (len - start).min(start.max(FIRST_GROWTH));
        out.resize(start + chunk, T::new_zeroed());
        let got = read_chunked(reader, &mut out[start..])?;
        if got < chunk {
            return Err(Error::Truncated {
                section,
                expected: len,
                found: start + got,
            });
        }
    }
    Ok(out)
}

/// Reads a single scalar.
pub(crate) fn read_value<R: Read, T: AsBytes + FromBytes + Copy>(
    reader: &mut R,
    section: &'static str,
) -> Result<T> {
    let mut value = [T::new_zeroed()];
    read_section(reader, &mut value, section)?;
    Ok(value[0])
}

/// Writes a single scalar.
pub(crate) fn write_value<W: Write, T: AsBytes>(writer: &mut W, value: &T) -> io::Result<()> {
    writer.write_all(value.as_bytes())
}

/// Writes a row-major affinity matrix.
pub fn save_matrix<W: Write>(writer: &mut W, data: &[f32]) -> io::Result<()> {
    write_chunked(writer, data)?;
    writer.flush()
}

/// Reads a row-major `rows x cols` affinity matrix.
///
/// # Errors
/// Returns [`Error::Truncated`] when the stream holds fewer than `rows * cols` values.
pub fn load_matrix<R: Read>(reader: &mut R, rows: usize, cols: usize) -> Result<Vec<f32>> {
    read_vec(reader, rows * cols, "affinity matrix")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn matrix_round_trip() {
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.25).collect();
        let mut buf = Vec::new();
        save_matrix(&mut buf, &data).unwrap();
        assert_eq!(buf.len(), 12 * 4);

        let back = load_matrix(&mut Cursor::new(buf), 3, 4).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn short_read_reports_count() {
        let data = [1u32, 2, 3];
        let mut buf = Vec::new();
        write_chunked(&mut buf, &data).unwrap();
        buf.pop();

        let mut out = [0u32; 3];
        let got = read_chunked(&mut Cursor::new(&buf), &mut out).unwrap();
        assert_eq!(got, 2);
        assert_eq!(&out[..2], &[1, 2]);
    }

    #[test]
    fn truncated_matrix_is_an_error() {
        let mut buf = Vec::new();
        save_matrix(&mut buf, &[1.0, 2.0, 3.0]).unwrap();
        let err = load_matrix(&mut Cursor::new(buf), 2, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn oversized_length_fails_without_allocating_it() {
        let buf = [7u8; 10];
        let err = read_vec::<_, u64>(&mut Cursor::new(&buf), 1 << 61, "huge").unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                section: "huge",
                expected,
                found: 1,
            } if expected == 1 << 61
        ));
    }
}
