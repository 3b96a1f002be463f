use std::sync::Arc;

use jagged_error::Result;

use super::{ArrayKernels, Attribute, Projection, unexpected_array_err};
use crate::arrays::array::{Array, ArrayValue};
use crate::arrays::datatype::DataType;
use crate::arrays::index::{IndexExpr, regularize_index, regularize_range};
use crate::arrays::list_offset::ListOffsetArray;

/// Kernels for list-offset arrays, built on the kernels of the content type.
///
/// Getting a list delegates to the content kernels' `get_slice`, so lists of
/// lists are handled by composing kernels rather than by recursion on the
/// array enum.
#[derive(Debug)]
pub struct ListOffsetKernels {
    datatype: DataType,
    content: Arc<dyn ArrayKernels>,
}

impl ListOffsetKernels {
    pub fn new(content: Arc<dyn ArrayKernels>) -> Self {
        ListOffsetKernels {
            datatype: DataType::list_offset(content.datatype().clone()),
            content,
        }
    }

    pub fn content_kernels(&self) -> &Arc<dyn ArrayKernels> {
        &self.content
    }

    fn list<'a>(&self, array: &'a Array) -> Result<&'a ListOffsetArray> {
        match array {
            Array::ListOffset(list) => Ok(list),
            other => Err(unexpected_array_err(&self.datatype, other)),
        }
    }
}

impl ArrayKernels for ListOffsetKernels {
    fn datatype(&self) -> &DataType {
        &self.datatype
    }

    fn len(&self, array: &Array) -> Result<usize> {
        Ok(self.list(array)?.len())
    }

    fn get_index(&self, array: &Array, idx: usize) -> Result<ArrayValue> {
        let list = self.list(array)?;
        let (start, stop) = list.list_range(idx)?;
        let values = self.content.get_slice(list.content(), start, stop)?;
        Ok(ArrayValue::Array(values))
    }

    fn get_slice(&self, array: &Array, start: usize, stop: usize) -> Result<Array> {
        let list = self.list(array)?;
        Ok(Array::ListOffset(list.get_slice(start, stop)?))
    }

    fn project(&self, array: &Array, attr: Attribute) -> Result<Projection> {
        let list = self.list(array)?;
        Ok(match attr {
            Attribute::Offsets => Projection::Offsets(list.offsets().clone()),
            Attribute::Content => Projection::Content(list.content().clone()),
            Attribute::Identity => Projection::Identity(list.identity().cloned()),
        })
    }

    fn getitem(&self, array: &Array, exprs: &[IndexExpr]) -> Result<ArrayValue> {
        let (head, tail) = match exprs.split_first() {
            Some(split) => split,
            None => {
                let _ = self.list(array)?;
                return Ok(ArrayValue::Array(array.clone()));
            }
        };

        match head {
            IndexExpr::At(idx) => {
                let idx = regularize_index(*idx, self.len(array)?)?;
                let value = self.get_index(array, idx)?;
                if tail.is_empty() {
                    return Ok(value);
                }
                // Value is a slice of content, continue with the content
                // kernels.
                let inner = value.try_into_array()?;
                self.content.getitem(&inner, tail)
            }
            IndexExpr::Range { start, stop } => {
                let (start, stop) = regularize_range(*start, *stop, self.len(array)?);
                let sliced = self.get_slice(array, start, stop)?;
                self.getitem(&sliced, tail)
            }
        }
    }
}
