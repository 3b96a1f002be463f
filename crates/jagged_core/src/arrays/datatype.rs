use std::fmt;

use jagged_error::{DbError, ErrorKind, Result};
use serde::{Deserialize, Serialize};

use super::index::IndexKind;

/// Native type of an array.
///
/// List-offset types are parameterized by the type of their content, so
/// arbitrarily deep nesting is expressed recursively. Two list-offset types are
/// equal iff their content types are equal, which makes this suitable as the
/// cache key for compiled kernels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    ListOffset(Box<DataType>),
}

impl DataType {
    pub fn list_offset(content: DataType) -> Self {
        DataType::ListOffset(Box::new(content))
    }

    pub const fn is_primitive(&self) -> bool {
        !matches!(self, DataType::ListOffset(_))
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Get the content type if this is a list-offset type.
    pub fn content_type(&self) -> Option<&DataType> {
        match self {
            DataType::ListOffset(content) => Some(content),
            _ => None,
        }
    }

    /// Number of list levels before reaching a primitive type.
    pub fn list_depth(&self) -> usize {
        let mut depth = 0;
        let mut curr = self;
        while let DataType::ListOffset(content) = curr {
            depth += 1;
            curr = content;
        }
        depth
    }

    /// Compute the type produced by applying an index expression with the
    /// given component kinds to an array of this type.
    ///
    /// Each integer component strips one list level, range components keep
    /// the current level. Components are applied left to right, each to the
    /// result of the previous one.
    pub fn getitem_type(&self, kinds: &[IndexKind]) -> Result<ValueType> {
        let (head, tail) = match kinds.split_first() {
            Some(split) => split,
            None => return Ok(ValueType::Array(self.clone())),
        };

        match (self, head) {
            (DataType::ListOffset(content), IndexKind::At) => content.getitem_type(tail),
            (_, IndexKind::Range) => self.getitem_type(tail),
            (primitive, IndexKind::At) => {
                if tail.is_empty() {
                    Ok(ValueType::Scalar(primitive.clone()))
                } else {
                    Err(DbError::new("Too many indices for array")
                        .with_kind(ErrorKind::Type)
                        .with_field("datatype", primitive)
                        .with_field("remaining", tail.len()))
                }
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float16 => write!(f, "Float16"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::ListOffset(content) => write!(f, "ListOffset({content})"),
        }
    }
}

/// The type of a value produced by indexing into an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// A single element of the given primitive type.
    Scalar(DataType),
    /// An array of the given type.
    Array(DataType),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(datatype) => write!(f, "scalar {datatype}"),
            Self::Array(datatype) => write!(f, "array {datatype}"),
        }
    }
}
