use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jagged_error::{DbError, ErrorKind, Result};

use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::shared_buffer::SharedBuffer;

static NEXT_REFERENCE: AtomicU64 = AtomicU64::new(0);

/// Opaque provenance tag attached to an array.
///
/// Each row of the identity is `width` integers locating the corresponding
/// array element in its original source. Identities are carried by reference,
/// cloning only increments a reference count.
#[derive(Debug, Clone)]
pub struct Identity {
    inner: Arc<IdentityInner>,
}

#[derive(Debug)]
struct IdentityInner {
    reference: u64,
    fieldloc: Vec<(i64, String)>,
    width: usize,
    values: SharedBuffer<i64>,
}

impl Identity {
    /// Get a fresh reference number.
    pub fn new_reference() -> u64 {
        NEXT_REFERENCE.fetch_add(1, Ordering::Relaxed)
    }

    pub fn try_new(
        reference: u64,
        fieldloc: Vec<(i64, String)>,
        width: usize,
        values: SharedBuffer<i64>,
    ) -> Result<Self> {
        if width == 0 {
            return Err(DbError::new("Identity width must be at least 1")
                .with_kind(ErrorKind::InvalidLayout));
        }
        if values.len() % width != 0 {
            return Err(
                DbError::new("Identity values not a multiple of identity width")
                    .with_kind(ErrorKind::InvalidLayout)
                    .with_field("width", width)
                    .with_field("values", values.len()),
            );
        }

        Ok(Identity {
            inner: Arc::new(IdentityInner {
                reference,
                fieldloc,
                width,
                values,
            }),
        })
    }

    /// Create an identity of width 1 numbering rows `0..len`.
    pub fn new_sequential(manager: &BufferManager, len: usize) -> Result<Self> {
        let values = SharedBuffer::try_from_iter(manager, 0..(len as i64))?;
        Self::try_new(Self::new_reference(), Vec::new(), 1, values)
    }

    pub fn reference(&self) -> u64 {
        self.inner.reference
    }

    pub fn fieldloc(&self) -> &[(i64, String)] {
        &self.inner.fieldloc
    }

    pub fn width(&self) -> usize {
        self.inner.width
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.inner.values.len() / self.inner.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> &SharedBuffer<i64> {
        &self.inner.values
    }

    /// Get the identity row for `row`.
    pub fn row(&self, row: usize) -> Option<&[i64]> {
        let width = self.inner.width;
        let start = row.checked_mul(width)?;
        let stop = start.checked_add(width)?;
        self.inner.values.as_slice().get(start..stop)
    }

    /// Returns if both handles reference the same identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }

        self.inner.reference == other.inner.reference
            && self.inner.fieldloc == other.inner.fieldloc
            && self.inner.width == other.inner.width
            && self.inner.values == other.inner.values
    }
}
