use std::marker::PhantomData;

use jagged_error::{DbError, ErrorKind, Result};

use super::{ArrayKernels, Attribute, Projection, too_many_indices_err, unexpected_array_err};
use crate::arrays::array::{Array, ArrayValue};
use crate::arrays::datatype::DataType;
use crate::arrays::index::{IndexExpr, regularize_index, regularize_range};
use crate::arrays::primitive::{NativePrimitive, index_out_of_range};
use crate::buffer::shared_buffer::SharedBuffer;

/// Kernels for flat arrays of `T`.
#[derive(Debug)]
pub struct PrimitiveKernels<T: NativePrimitive> {
    datatype: DataType,
    _t: PhantomData<T>,
}

impl<T> PrimitiveKernels<T>
where
    T: NativePrimitive,
{
    pub fn new() -> Self {
        PrimitiveKernels {
            datatype: T::DATATYPE,
            _t: PhantomData,
        }
    }

    fn buffer<'a>(&self, array: &'a Array) -> Result<&'a SharedBuffer<T>> {
        match array {
            Array::Primitive(arr) => {
                T::downcast(arr).ok_or_else(|| unexpected_array_err(&self.datatype, array))
            }
            _ => Err(unexpected_array_err(&self.datatype, array)),
        }
    }
}

impl<T> Default for PrimitiveKernels<T>
where
    T: NativePrimitive,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArrayKernels for PrimitiveKernels<T>
where
    T: NativePrimitive,
{
    fn datatype(&self) -> &DataType {
        &self.datatype
    }

    fn len(&self, array: &Array) -> Result<usize> {
        Ok(self.buffer(array)?.len())
    }

    fn get_index(&self, array: &Array, idx: usize) -> Result<ArrayValue> {
        let buf = self.buffer(array)?;
        let v = buf.get(idx).ok_or_else(|| index_out_of_range(idx, buf.len()))?;
        Ok(ArrayValue::Scalar(v.into_scalar()))
    }

    fn get_slice(&self, array: &Array, start: usize, stop: usize) -> Result<Array> {
        let buf = self.buffer(array)?;
        Ok(Array::Primitive(T::wrap(buf.slice(start, stop)?)))
    }

    fn project(&self, array: &Array, attr: Attribute) -> Result<Projection> {
        // Still verify the type so misuse is reported consistently.
        let _ = self.buffer(array)?;
        Err(DbError::new("Primitive arrays have no projectable attributes")
            .with_kind(ErrorKind::Type)
            .with_field("attribute", attr.as_str())
            .with_field("datatype", &self.datatype))
    }

    fn getitem(&self, array: &Array, exprs: &[IndexExpr]) -> Result<ArrayValue> {
        let (head, tail) = match exprs.split_first() {
            Some(split) => split,
            None => {
                let _ = self.buffer(array)?;
                return Ok(ArrayValue::Array(array.clone()));
            }
        };

        match head {
            IndexExpr::At(idx) => {
                if !tail.is_empty() {
                    return Err(too_many_indices_err(&self.datatype, tail.len()));
                }
                let idx = regularize_index(*idx, self.len(array)?)?;
                self.get_index(array, idx)
            }
            IndexExpr::Range { start, stop } => {
                let (start, stop) = regularize_range(*start, *stop, self.len(array)?);
                let sliced = self.get_slice(array, start, stop)?;
                self.getitem(&sliced, tail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;
    use crate::arrays::primitive::PrimitiveArray;
    use crate::arrays::scalar::ScalarValue;
    use crate::buffer::buffer_manager::BufferManager;
    use crate::testutil::{int64_array, list_offset_array};

    #[test]
    fn len_and_index() {
        let manager = BufferManager::new();
        let arr = int64_array(&manager, &[3, 4, 5]);
        let kernels = PrimitiveKernels::<i64>::new();

        assert_eq!(3, kernels.len(&arr).unwrap());
        assert_eq!(
            ArrayValue::Scalar(ScalarValue::Int64(5)),
            kernels.get_index(&arr, 2).unwrap()
        );
        let err = kernels.get_index(&arr, 3).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());
    }

    #[test]
    fn wrong_element_type() {
        let manager = BufferManager::new();
        let arr = Array::Primitive(
            PrimitiveArray::try_from_vec(&manager, vec![f16::from_f32(1.0)]).unwrap(),
        );
        let kernels = PrimitiveKernels::<i64>::new();

        let err = kernels.len(&arr).unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());

        let kernels = PrimitiveKernels::<f16>::new();
        assert_eq!(1, kernels.len(&arr).unwrap());
    }

    #[test]
    fn wrong_array_variant() {
        let manager = BufferManager::new();
        let arr = Array::ListOffset(list_offset_array(&manager, &[0, 1], &[1]));
        let kernels = PrimitiveKernels::<i64>::new();

        let err = kernels.get_slice(&arr, 0, 1).unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());
    }

    #[test]
    fn project_not_supported() {
        let manager = BufferManager::new();
        let arr = int64_array(&manager, &[1]);
        let kernels = PrimitiveKernels::<i64>::new();

        let err = kernels.project(&arr, Attribute::Offsets).unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());
    }

    #[test]
    fn getitem() {
        let manager = BufferManager::new();
        let arr = int64_array(&manager, &[3, 4, 5, 6]);
        let kernels = PrimitiveKernels::<i64>::new();

        assert_eq!(
            ArrayValue::Scalar(ScalarValue::Int64(6)),
            kernels.getitem(&arr, &[IndexExpr::At(-1)]).unwrap()
        );
        assert_eq!(
            ArrayValue::Scalar(ScalarValue::Int64(5)),
            kernels
                .getitem(&arr, &[IndexExpr::range(1, 4), IndexExpr::At(1)])
                .unwrap()
        );

        let err = kernels
            .getitem(&arr, &[IndexExpr::At(0), IndexExpr::At(0)])
            .unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());
    }
}
