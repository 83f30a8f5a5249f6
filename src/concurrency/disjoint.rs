//! `DisjointRows`: a row-granular mutable view shared by executor lanes.
//!
//! A row-major buffer is handed to every lane at once; each lane may create
//! `&mut` borrows only of the rows it owns in the current round. The static
//! round-robin schedule of [`BarrierExecutor`](super::BarrierExecutor)
//! provides that ownership, so the safe entry points live there
//! ([`round_rows`](super::BarrierExecutor::round_rows),
//! [`round_map`](super::BarrierExecutor::round_map)).

use std::marker::PhantomData;

/// A mutable row-major buffer whose rows may be borrowed independently.
pub struct DisjointRows<'a, T> {
    /// Pointer to the first element of row 0.
    ptr: *mut T,
    rows: usize,
    width: usize,
    /// The view holds the exclusive borrow of the whole buffer.
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<'a, T: Send> Send for DisjointRows<'a, T> {}
unsafe impl<'a, T: Send> Sync for DisjointRows<'a, T> {}

impl<'a, T> DisjointRows<'a, T> {
    /// Splits `data` into rows of `width` elements.
    ///
    /// # Panics
    /// Panics if `width == 0` or `data.len()` is not a multiple of `width`.
    pub fn new(data: &'a mut [T], width: usize) -> Self {
        assert!(width != 0, "row width must be > 0");
        assert!(
            data.len() % width == 0,
            "buffer length {} is not a multiple of row width {width}",
            data.len()
        );
        Self {
            ptr: data.as_mut_ptr(),
            rows: data.len() / width,
            width,
            _marker: PhantomData,
        }
    }

    /// Number of rows.
    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Elements per row.
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Borrows row `row` mutably.
    ///
    /// # Panics
    /// Panics if `row >= rows()`.
    ///
    /// # Safety
    /// The caller must ensure no other borrow of the same row is alive for
    /// the lifetime of the returned slice.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn row_mut(&self, row: usize) -> &mut [T] {
        assert!(row < self.rows, "row {row} out of bounds ({} rows)", self.rows);
        std::slice::from_raw_parts_mut(self.ptr.add(row * self.width), self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_cover_buffer() {
        let mut data = vec![0u32; 12];
        {
            let rows = DisjointRows::new(&mut data, 4);
            assert_eq!(rows.rows(), 3);
            for r in 0..rows.rows() {
                // SAFETY: each row is borrowed once and dropped before the next.
                let row = unsafe { rows.row_mut(r) };
                row.fill(r as u32 + 1);
            }
        }
        assert_eq!(data, [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn ragged_buffer_panics() {
        let mut data = [0u8; 5];
        let _ = DisjointRows::new(&mut data, 2);
    }
}
