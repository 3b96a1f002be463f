//! Compiled operations specialized per native array type.
//!
//! Each concrete `DataType` gets its own kernel table. Primitive kernels are
//! monomorphized per element type, list-offset kernels are built on top of the
//! kernels for their content type and delegate to them. Kernel tables are
//! cached in a `KernelRegistry` keyed by data type.

pub mod list_offset;
pub mod primitive;
pub mod registry;

use std::fmt::Debug;
use std::sync::Arc;

use jagged_error::{DbError, ErrorKind, Result};

use crate::arrays::array::{Array, ArrayValue};
use crate::arrays::datatype::{DataType, ValueType};
use crate::arrays::identity::Identity;
use crate::arrays::index::{IndexExpr, IndexKind};
use crate::arrays::list_offset::OffsetsBuffer;

/// Named field of a list-offset array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Offsets,
    Content,
    Identity,
}

impl Attribute {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offsets => "offsets",
            Self::Content => "content",
            Self::Identity => "identity",
        }
    }
}

/// A field projected out of a list-offset array.
///
/// Holds its own reference to the underlying storage, so it stays valid after
/// the array it was projected from is dropped.
#[derive(Debug, Clone)]
pub enum Projection {
    Offsets(OffsetsBuffer),
    Content(Arc<Array>),
    Identity(Option<Identity>),
}

/// Operations compiled for a single native array type.
///
/// Kernels only accept arrays of the type they were compiled for. Passing
/// anything else returns a `Type` error.
pub trait ArrayKernels: Debug + Sync + Send {
    /// The type these kernels were compiled for.
    fn datatype(&self) -> &DataType;

    fn len(&self, array: &Array) -> Result<usize>;

    /// Get the element at a normalized index.
    fn get_index(&self, array: &Array, idx: usize) -> Result<ArrayValue>;

    /// Get a zero-copy view of `[start, stop)`.
    fn get_slice(&self, array: &Array, start: usize, stop: usize) -> Result<Array>;

    /// Project a named field, incrementing its reference count.
    fn project(&self, array: &Array, attr: Attribute) -> Result<Projection>;

    /// Apply a multi-dimensional index expression using host indexing
    /// conventions.
    fn getitem(&self, array: &Array, exprs: &[IndexExpr]) -> Result<ArrayValue>;

    /// Type of the value `getitem` produces for an expression of the given
    /// kinds.
    fn result_type(&self, kinds: &[IndexKind]) -> Result<ValueType> {
        self.datatype().getitem_type(kinds)
    }
}

pub(crate) fn unexpected_array_err(expected: &DataType, array: &Array) -> DbError {
    DbError::new("Array doesn't match the type the kernels were compiled for")
        .with_kind(ErrorKind::Type)
        .with_field("expected", expected)
        .with_field("have", array.datatype())
}

pub(crate) fn too_many_indices_err(datatype: &DataType, remaining: usize) -> DbError {
    DbError::new("Too many indices for array")
        .with_kind(ErrorKind::Type)
        .with_field("datatype", datatype)
        .with_field("remaining", remaining)
}
