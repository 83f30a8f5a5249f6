//! Ping-pong storage with an explicit current slot.

/// Two values of the same shape, one designated current and one scratch.
///
/// `swap` exchanges the roles in O(1); neither value is moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> DoubleBuffer<T> {
    /// Creates a buffer whose current slot is `current`.
    pub fn new(current: T, scratch: T) -> Self {
        Self {
            slots: [current, scratch],
            current: 0,
        }
    }

    /// The current value.
    #[inline(always)]
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    /// The current value, mutably.
    #[inline(always)]
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current]
    }

    /// The scratch value.
    #[inline(always)]
    pub fn scratch(&self) -> &T {
        &self.slots[self.current ^ 1]
    }

    /// The scratch value, mutably.
    #[inline(always)]
    pub fn scratch_mut(&mut self) -> &mut T {
        &mut self.slots[self.current ^ 1]
    }

    /// Borrows `(current, scratch)` at once.
    #[inline]
    pub fn split_mut(&mut self) -> (&mut T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.current == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Exchanges the roles of the two slots.
    #[inline]
    pub fn swap(&mut self) {
        self.current ^= 1;
    }
}

impl<T: Clone> DoubleBuffer<T> {
    /// Creates a buffer with both slots equal to `value`.
    pub fn splat(value: T) -> Self {
        Self::new(value.clone(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_exchanges_roles() {
        let mut buf = DoubleBuffer::new(vec![1], vec![2]);
        assert_eq!(buf.current(), &[1]);
        buf.swap();
        assert_eq!(buf.current(), &[2]);
        assert_eq!(buf.scratch(), &[1]);

        let (cur, scratch) = buf.split_mut();
        cur.push(3);
        scratch.push(4);
        buf.swap();
        assert_eq!(buf.current(), &[1, 4]);
        assert_eq!(buf.scratch(), &[2, 3]);
    }
}
