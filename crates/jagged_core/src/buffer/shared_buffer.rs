use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use jagged_error::{DbError, ErrorKind, Result};

use super::buffer_manager::{BufferManager, Reservation};

/// An immutable, reference counted buffer of values with zero-copy sub-views.
///
/// Cloning a buffer increments the reference count on the underlying storage.
/// Slicing produces a new view over the same storage, so the storage lives
/// until the last view is dropped.
pub struct SharedBuffer<T> {
    raw: Arc<RawBuffer<T>>,
    /// Range of `raw` visible through this view.
    range: Range<usize>,
}

struct RawBuffer<T> {
    values: Vec<T>,
    /// Held only to keep the bytes accounted for until the storage is
    /// dropped.
    _reservation: Reservation,
}

impl<T> SharedBuffer<T> {
    /// Create a buffer from owned values, reserving their size from the
    /// manager.
    pub fn try_from_vec(manager: &BufferManager, values: Vec<T>) -> Result<Self> {
        let reservation = manager.reserve(std::mem::size_of::<T>() * values.len())?;
        let len = values.len();

        Ok(SharedBuffer {
            raw: Arc::new(RawBuffer {
                values,
                _reservation: reservation,
            }),
            range: 0..len,
        })
    }

    pub fn try_from_iter<I>(manager: &BufferManager, iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        Self::try_from_vec(manager, iter.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.raw.values[self.range.clone()]
    }

    /// Create a zero-copy view over `[start, stop)` of this buffer.
    pub fn slice(&self, start: usize, stop: usize) -> Result<Self> {
        if start > stop || stop > self.len() {
            return Err(DbError::new("Buffer slice out of range")
                .with_kind(ErrorKind::OutOfRange)
                .with_field("start", start)
                .with_field("stop", stop)
                .with_field("len", self.len()));
        }

        Ok(SharedBuffer {
            raw: self.raw.clone(),
            range: (self.range.start + start)..(self.range.start + stop),
        })
    }

    /// Returns if both buffers view the same underlying storage.
    ///
    /// The visible ranges may differ.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }

    /// Number of views currently referencing the underlying storage.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.raw)
    }

    /// Offset of this view into the underlying storage.
    pub fn storage_offset(&self) -> usize {
        self.range.start
    }
}

impl<T: Copy> SharedBuffer<T> {
    pub fn get(&self, idx: usize) -> Option<T> {
        self.as_slice().get(idx).copied()
    }
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        SharedBuffer {
            raw: self.raw.clone(),
            range: self.range.clone(),
        }
    }
}

impl<T> AsRef<[T]> for SharedBuffer<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PartialEq> PartialEq for SharedBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("values", &self.as_slice())
            .field("storage_offset", &self.range.start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_zero_copy() {
        let manager = BufferManager::new();
        let buf = SharedBuffer::try_from_vec(&manager, vec![1_i64, 2, 3, 4, 5]).unwrap();
        assert_eq!(40, manager.reserved_bytes());

        let sliced = buf.slice(1, 4).unwrap();
        assert_eq!(&[2, 3, 4], sliced.as_slice());
        assert!(sliced.ptr_eq(&buf));
        assert_eq!(1, sliced.storage_offset());
        assert_eq!(2, buf.ref_count());

        // No additional reservation for the view.
        assert_eq!(40, manager.reserved_bytes());
    }

    #[test]
    fn slice_of_slice() {
        let manager = BufferManager::new();
        let buf = SharedBuffer::try_from_vec(&manager, vec![1_i32, 2, 3, 4, 5]).unwrap();

        let s1 = buf.slice(1, 5).unwrap();
        let s2 = s1.slice(2, 4).unwrap();
        assert_eq!(&[4, 5], s2.as_slice());
        assert_eq!(3, s2.storage_offset());
    }

    #[test]
    fn slice_out_of_range() {
        let manager = BufferManager::new();
        let buf = SharedBuffer::try_from_vec(&manager, vec![1_u8, 2, 3]).unwrap();

        let err = buf.slice(1, 4).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());

        let err = buf.slice(2, 1).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());

        let empty = buf.slice(3, 3).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn storage_released_after_last_view() {
        let manager = BufferManager::new();
        let buf = SharedBuffer::try_from_vec(&manager, vec![0.5_f64; 4]).unwrap();
        let view = buf.slice(0, 2).unwrap();

        std::mem::drop(buf);
        assert_eq!(32, manager.reserved_bytes());
        assert_eq!(1, view.ref_count());

        std::mem::drop(view);
        assert_eq!(0, manager.reserved_bytes());
        assert_eq!(0, manager.live_reservations());
    }

    #[test]
    fn get_out_of_bounds_is_none() {
        let manager = BufferManager::new();
        let buf = SharedBuffer::try_from_vec(&manager, vec![7_i64, 8]).unwrap();
        assert_eq!(Some(8), buf.get(1));
        assert_eq!(None, buf.get(2));
    }
}
