//! Display and JSON rendering for arrays.

use std::fmt;

use super::array::{Array, ArrayValue};
use super::list_offset::ListOffsetArray;
use super::primitive::PrimitiveArray;

impl fmt::Display for PrimitiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, scalar) in self.iter_scalars().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{scalar}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for ListOffsetArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for idx in 0..self.len() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match self.get_index(idx) {
                Ok(value) => write!(f, "{value}")?,
                Err(_) => write!(f, "<invalid>")?,
            }
        }
        write!(f, "]")
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(arr) => fmt::Display::fmt(arr, f),
            Self::ListOffset(arr) => fmt::Display::fmt(arr, f),
        }
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => fmt::Display::fmt(scalar, f),
            Self::Array(arr) => fmt::Display::fmt(arr, f),
        }
    }
}

impl PrimitiveArray {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.iter_scalars().map(|s| s.to_json()).collect())
    }
}

impl ListOffsetArray {
    /// Render the lists as nested JSON arrays.
    ///
    /// Lists that can't be read (invalid offsets) are rendered as null.
    pub fn to_json(&self) -> serde_json::Value {
        let lists = (0..self.len())
            .map(|idx| match self.get_index(idx) {
                Ok(value) => value.to_json(),
                Err(_) => serde_json::Value::Null,
            })
            .collect();
        serde_json::Value::Array(lists)
    }

    /// Render the physical layout (offsets, content and identity).
    pub fn layout_json(&self) -> serde_json::Value {
        let content = match self.content().as_ref() {
            Array::Primitive(arr) => arr.to_json(),
            Array::ListOffset(arr) => arr.layout_json(),
        };
        let identity = match self.identity() {
            Some(identity) => serde_json::json!({
                "ref": identity.reference(),
                "width": identity.width(),
                "values": identity.values().as_slice(),
            }),
            None => serde_json::Value::Null,
        };

        serde_json::json!({
            "class": "ListOffsetArray",
            "offsets": self.offsets().as_slice(),
            "content": content,
            "identity": identity,
        })
    }
}

impl Array {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Primitive(arr) => arr.to_json(),
            Self::ListOffset(arr) => arr.to_json(),
        }
    }
}

impl ArrayValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(scalar) => scalar.to_json(),
            Self::Array(arr) => arr.to_json(),
        }
    }
}
