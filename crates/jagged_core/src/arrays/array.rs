use jagged_error::{DbError, ErrorKind, Result};

use super::datatype::{DataType, ValueType};
use super::identity::Identity;
use super::index::{IndexExpr, regularize_index, regularize_range};
use super::list_offset::ListOffsetArray;
use super::primitive::PrimitiveArray;
use super::scalar::ScalarValue;

/// A native array, either flat primitive values or lists of some other array.
///
/// List-offset arrays hold an `Array` as their content, so nesting depth is
/// unbounded.
#[derive(Debug, Clone)]
pub enum Array {
    Primitive(PrimitiveArray),
    ListOffset(ListOffsetArray),
}

impl Array {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Primitive(arr) => arr.datatype(),
            Self::ListOffset(arr) => arr.datatype(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Primitive(arr) => arr.len(),
            Self::ListOffset(arr) => arr.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Primitive(_) => None,
            Self::ListOffset(arr) => arr.identity(),
        }
    }

    /// Get the element at a normalized index.
    ///
    /// Primitive arrays produce a scalar, list-offset arrays produce the list
    /// at that position.
    pub fn get_index(&self, idx: usize) -> Result<ArrayValue> {
        match self {
            Self::Primitive(arr) => Ok(ArrayValue::Scalar(arr.scalar(idx)?)),
            Self::ListOffset(arr) => arr.get_index(idx),
        }
    }

    /// Get a zero-copy view of elements in `[start, stop)`.
    pub fn get_slice(&self, start: usize, stop: usize) -> Result<Array> {
        Ok(match self {
            Self::Primitive(arr) => Self::Primitive(arr.slice(start, stop)?),
            Self::ListOffset(arr) => Self::ListOffset(arr.get_slice(start, stop)?),
        })
    }

    /// Get the element at `idx`, counting from the end if negative.
    pub fn get_at(&self, idx: i64) -> Result<ArrayValue> {
        let idx = regularize_index(idx, self.len())?;
        self.get_index(idx)
    }

    /// Slice with host conventions. Missing bounds mean start/end, negative
    /// bounds count from the end, and out of range bounds are clamped.
    pub fn get_range(&self, start: Option<i64>, stop: Option<i64>) -> Result<Array> {
        let (start, stop) = regularize_range(start, stop, self.len());
        self.get_slice(start, stop)
    }

    /// Apply a multi-dimensional index expression.
    ///
    /// Components are applied one at a time, each to the result of the
    /// previous. The type of the result always matches
    /// `DataType::getitem_type` for the same expression.
    pub fn getitem(&self, exprs: &[IndexExpr]) -> Result<ArrayValue> {
        let (head, tail) = match exprs.split_first() {
            Some(split) => split,
            None => return Ok(ArrayValue::Array(self.clone())),
        };

        let value = match head {
            IndexExpr::At(idx) => self.get_at(*idx)?,
            IndexExpr::Range { start, stop } => ArrayValue::Array(self.get_range(*start, *stop)?),
        };

        if tail.is_empty() {
            return Ok(value);
        }

        match value {
            ArrayValue::Array(arr) => arr.getitem(tail),
            ArrayValue::Scalar(scalar) => Err(DbError::new("Too many indices for array")
                .with_kind(ErrorKind::Type)
                .with_field("datatype", scalar.datatype())
                .with_field("remaining", tail.len())),
        }
    }

    pub fn try_as_primitive(&self) -> Result<&PrimitiveArray> {
        match self {
            Self::Primitive(arr) => Ok(arr),
            other => Err(DbError::new("Expected primitive array")
                .with_kind(ErrorKind::Type)
                .with_field("have", other.datatype())),
        }
    }

    pub fn try_as_list_offset(&self) -> Result<&ListOffsetArray> {
        match self {
            Self::ListOffset(arr) => Ok(arr),
            other => Err(DbError::new("Expected list-offset array")
                .with_kind(ErrorKind::Type)
                .with_field("have", other.datatype())),
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::ListOffset(a), Self::ListOffset(b)) => a.lists_eq(b),
            _ => false,
        }
    }
}

impl From<PrimitiveArray> for Array {
    fn from(value: PrimitiveArray) -> Self {
        Array::Primitive(value)
    }
}

impl From<ListOffsetArray> for Array {
    fn from(value: ListOffsetArray) -> Self {
        Array::ListOffset(value)
    }
}

/// Value produced by indexing into an array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Scalar(ScalarValue),
    Array(Array),
}

impl ArrayValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Scalar(scalar) => ValueType::Scalar(scalar.datatype()),
            Self::Array(arr) => ValueType::Array(arr.datatype()),
        }
    }

    pub fn try_into_array(self) -> Result<Array> {
        match self {
            Self::Array(arr) => Ok(arr),
            Self::Scalar(scalar) => Err(DbError::new("Expected array value, got scalar")
                .with_kind(ErrorKind::Type)
                .with_field("scalar", scalar)),
        }
    }

    pub fn try_into_scalar(self) -> Result<ScalarValue> {
        match self {
            Self::Scalar(scalar) => Ok(scalar),
            Self::Array(arr) => Err(DbError::new("Expected scalar value, got array")
                .with_kind(ErrorKind::Type)
                .with_field("datatype", arr.datatype())),
        }
    }
}
