use std::sync::Arc;

use jagged_error::{DbError, ErrorKind, OptionExt, Result};

use super::array::{Array, ArrayValue};
use super::datatype::DataType;
use super::identity::Identity;
use super::primitive::{NativePrimitive, PrimitiveArray, index_out_of_range};
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::shared_buffer::SharedBuffer;

/// Offsets delimiting each list in a list-offset array.
pub type OffsetsBuffer = SharedBuffer<i64>;

/// Variable length lists stored as offsets into a contiguous content array.
///
/// List `i` spans `content[offsets[i]..offsets[i+1]]`, so offsets always
/// holds one more value than the number of lists. Each field is reference
/// counted on its own, and derived arrays and projected fields share the
/// underlying storage instead of copying it.
///
/// Arrays are never modified in place.
#[derive(Debug, Clone)]
pub struct ListOffsetArray {
    offsets: OffsetsBuffer,
    content: Arc<Array>,
    identity: Option<Identity>,
}

impl ListOffsetArray {
    /// Create a new list-offset array, validating that the offsets describe a
    /// valid layout for the content.
    pub fn try_new(
        offsets: OffsetsBuffer,
        content: impl Into<Arc<Array>>,
        identity: Option<Identity>,
    ) -> Result<Self> {
        let arr = Self::new_unvalidated(offsets, content, identity);
        arr.validate()?;
        Ok(arr)
    }

    /// Create a new list-offset array from offsets that have already been
    /// validated by the producer.
    ///
    /// Invalid offsets don't cause undefined behavior, but operations on the
    /// array may return errors or nonsensical lists.
    pub fn new_unvalidated(
        offsets: OffsetsBuffer,
        content: impl Into<Arc<Array>>,
        identity: Option<Identity>,
    ) -> Self {
        debug_assert!(!offsets.is_empty(), "offsets must hold at least one value");

        ListOffsetArray {
            offsets,
            content: content.into(),
            identity,
        }
    }

    /// Build a list-offset array over primitive values from a list of lists.
    pub fn try_from_lists<T, I>(manager: &BufferManager, lists: I) -> Result<Self>
    where
        T: NativePrimitive,
        I: IntoIterator,
        I::Item: IntoIterator<Item = T>,
    {
        let mut offsets = vec![0_i64];
        let mut values = Vec::new();
        for list in lists {
            values.extend(list);
            offsets.push(values.len() as i64);
        }

        let offsets = SharedBuffer::try_from_vec(manager, offsets)?;
        let content = Array::Primitive(PrimitiveArray::try_from_vec(manager, values)?);

        Ok(Self::new_unvalidated(offsets, content, None))
    }

    /// Check that the offsets describe a valid layout.
    ///
    /// Offsets must be non-empty, non-negative, non-decreasing, and the last
    /// offset can't be past the end of content. If there's an identity, it
    /// needs to cover every list.
    pub fn validate(&self) -> Result<()> {
        let offsets = self.offsets.as_slice();
        let first = match offsets.first() {
            Some(first) => *first,
            None => {
                return Err(DbError::new("Offsets must contain at least one value")
                    .with_kind(ErrorKind::InvalidLayout));
            }
        };

        if first < 0 {
            return Err(DbError::new("Offsets must not be negative")
                .with_kind(ErrorKind::InvalidLayout)
                .with_field("offset", first));
        }

        for (idx, window) in offsets.windows(2).enumerate() {
            if window[0] > window[1] {
                return Err(DbError::new("Offsets must be non-decreasing")
                    .with_kind(ErrorKind::InvalidLayout)
                    .with_field("index", idx)
                    .with_field("start", window[0])
                    .with_field("stop", window[1]));
            }
        }

        let content_len = self.content.len();
        let last = offsets.last().copied().required("last offset")?;
        if last as u64 > content_len as u64 {
            return Err(DbError::new("Offsets extend past end of content")
                .with_kind(ErrorKind::InvalidLayout)
                .with_field("offset", last)
                .with_field("content_len", content_len));
        }

        if let Some(identity) = &self.identity {
            if identity.len() < self.len() {
                return Err(DbError::new("Identity shorter than array")
                    .with_kind(ErrorKind::InvalidLayout)
                    .with_field("identity_len", identity.len())
                    .with_field("len", self.len()));
            }
        }

        Ok(())
    }

    pub fn datatype(&self) -> DataType {
        DataType::list_offset(self.content.datatype())
    }

    /// Number of lists in the array.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offsets(&self) -> &OffsetsBuffer {
        &self.offsets
    }

    pub fn content(&self) -> &Arc<Array> {
        &self.content
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Produce a new array sharing offsets and content with this one, but with
    /// a different identity.
    pub fn with_identity(&self, identity: Option<Identity>) -> Self {
        ListOffsetArray {
            offsets: self.offsets.clone(),
            content: self.content.clone(),
            identity,
        }
    }

    pub fn into_parts(self) -> (OffsetsBuffer, Arc<Array>, Option<Identity>) {
        (self.offsets, self.content, self.identity)
    }

    /// Get the content range `[start, stop)` for the list at `idx`.
    pub fn list_range(&self, idx: usize) -> Result<(usize, usize)> {
        let start = self
            .offsets
            .get(idx)
            .ok_or_else(|| index_out_of_range(idx, self.len()))?;
        let stop = self
            .offsets
            .get(idx + 1)
            .ok_or_else(|| index_out_of_range(idx, self.len()))?;

        Ok((offset_to_usize(start)?, offset_to_usize(stop)?))
    }

    /// Get the list at `idx`.
    ///
    /// `idx` must already be normalized, negative indices aren't wrapped. The
    /// list is produced by slicing content, so the returned array shares
    /// storage with this array's content.
    pub fn get_index(&self, idx: usize) -> Result<ArrayValue> {
        let (start, stop) = self.list_range(idx)?;
        let list = self.content.get_slice(start, stop)?;
        Ok(ArrayValue::Array(list))
    }

    /// Get the lists in `[lo, hi)` as a new array.
    ///
    /// The new array's offsets are a view into this array's offsets, and the
    /// content is shared unmodified. Identity is not carried over.
    pub fn get_slice(&self, lo: usize, hi: usize) -> Result<ListOffsetArray> {
        if lo > hi {
            return Err(DbError::new("Slice start after slice stop")
                .with_kind(ErrorKind::OutOfRange)
                .with_field("lo", lo)
                .with_field("hi", hi));
        }
        if hi > self.len() {
            return Err(DbError::new("Slice stop past end of array")
                .with_kind(ErrorKind::OutOfRange)
                .with_field("hi", hi)
                .with_field("len", self.len()));
        }

        let offsets = self.offsets.slice(lo, hi + 1)?;

        Ok(ListOffsetArray {
            offsets,
            content: self.content.clone(),
            identity: None,
        })
    }

    /// Logical equality of lists, ignoring identity and storage.
    pub(crate) fn lists_eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        for idx in 0..self.len() {
            match (self.get_index(idx), other.get_index(idx)) {
                (Ok(a), Ok(b)) if a == b => (),
                _ => return false,
            }
        }

        true
    }
}

fn offset_to_usize(offset: i64) -> Result<usize> {
    usize::try_from(offset).map_err(|_| {
        DbError::new("Negative offset in list-offset array")
            .with_kind(ErrorKind::InvalidLayout)
            .with_field("offset", offset)
    })
}
