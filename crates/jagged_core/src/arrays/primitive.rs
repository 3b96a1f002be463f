use std::fmt::Debug;

use half::f16;
use jagged_error::{DbError, ErrorKind, Result};

use super::datatype::DataType;
use super::scalar::ScalarValue;
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::shared_buffer::SharedBuffer;

/// Element types that can be stored flat in a primitive array.
pub trait NativePrimitive: Copy + Debug + PartialEq + Send + Sync + 'static {
    const DATATYPE: DataType;

    fn wrap(buffer: SharedBuffer<Self>) -> PrimitiveArray;

    fn downcast(array: &PrimitiveArray) -> Option<&SharedBuffer<Self>>;

    fn into_scalar(self) -> ScalarValue;
}

macro_rules! impl_native_primitive {
    ($prim:ty, $variant:ident) => {
        impl NativePrimitive for $prim {
            const DATATYPE: DataType = DataType::$variant;

            fn wrap(buffer: SharedBuffer<Self>) -> PrimitiveArray {
                PrimitiveArray::$variant(buffer)
            }

            fn downcast(array: &PrimitiveArray) -> Option<&SharedBuffer<Self>> {
                match array {
                    PrimitiveArray::$variant(buf) => Some(buf),
                    _ => None,
                }
            }

            fn into_scalar(self) -> ScalarValue {
                ScalarValue::$variant(self)
            }
        }
    };
}

impl_native_primitive!(bool, Boolean);
impl_native_primitive!(i8, Int8);
impl_native_primitive!(i16, Int16);
impl_native_primitive!(i32, Int32);
impl_native_primitive!(i64, Int64);
impl_native_primitive!(u8, UInt8);
impl_native_primitive!(u16, UInt16);
impl_native_primitive!(u32, UInt32);
impl_native_primitive!(u64, UInt64);
impl_native_primitive!(f16, Float16);
impl_native_primitive!(f32, Float32);
impl_native_primitive!(f64, Float64);

/// Flat array of primitive values backed by a shared buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    Boolean(SharedBuffer<bool>),
    Int8(SharedBuffer<i8>),
    Int16(SharedBuffer<i16>),
    Int32(SharedBuffer<i32>),
    Int64(SharedBuffer<i64>),
    UInt8(SharedBuffer<u8>),
    UInt16(SharedBuffer<u16>),
    UInt32(SharedBuffer<u32>),
    UInt64(SharedBuffer<u64>),
    Float16(SharedBuffer<f16>),
    Float32(SharedBuffer<f32>),
    Float64(SharedBuffer<f64>),
}

/// Evaluate an expression against the typed buffer of a primitive array.
macro_rules! with_buffer {
    ($array:expr, $buf:ident => $body:expr) => {
        match $array {
            PrimitiveArray::Boolean($buf) => $body,
            PrimitiveArray::Int8($buf) => $body,
            PrimitiveArray::Int16($buf) => $body,
            PrimitiveArray::Int32($buf) => $body,
            PrimitiveArray::Int64($buf) => $body,
            PrimitiveArray::UInt8($buf) => $body,
            PrimitiveArray::UInt16($buf) => $body,
            PrimitiveArray::UInt32($buf) => $body,
            PrimitiveArray::UInt64($buf) => $body,
            PrimitiveArray::Float16($buf) => $body,
            PrimitiveArray::Float32($buf) => $body,
            PrimitiveArray::Float64($buf) => $body,
        }
    };
}

impl PrimitiveArray {
    pub fn try_from_vec<T: NativePrimitive>(manager: &BufferManager, values: Vec<T>) -> Result<Self> {
        Ok(T::wrap(SharedBuffer::try_from_vec(manager, values)?))
    }

    pub fn datatype(&self) -> DataType {
        with_buffer!(self, buf => datatype_of(buf))
    }

    pub fn len(&self) -> usize {
        with_buffer!(self, buf => buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the value at `idx`.
    pub fn scalar(&self, idx: usize) -> Result<ScalarValue> {
        let len = self.len();
        with_buffer!(self, buf => buf
            .get(idx)
            .map(|v| v.into_scalar())
            .ok_or_else(|| index_out_of_range(idx, len)))
    }

    /// Zero-copy view over `[start, stop)`.
    pub fn slice(&self, start: usize, stop: usize) -> Result<Self> {
        with_buffer!(self, buf => Ok(NativePrimitive::wrap(buf.slice(start, stop)?)))
    }

    /// Iterate over all values as scalars.
    pub fn iter_scalars(&self) -> impl Iterator<Item = ScalarValue> + '_ {
        (0..self.len()).filter_map(|idx| self.scalar(idx).ok())
    }

    /// Returns if both arrays view the same underlying storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.ptr_eq(b),
            (Self::Int8(a), Self::Int8(b)) => a.ptr_eq(b),
            (Self::Int16(a), Self::Int16(b)) => a.ptr_eq(b),
            (Self::Int32(a), Self::Int32(b)) => a.ptr_eq(b),
            (Self::Int64(a), Self::Int64(b)) => a.ptr_eq(b),
            (Self::UInt8(a), Self::UInt8(b)) => a.ptr_eq(b),
            (Self::UInt16(a), Self::UInt16(b)) => a.ptr_eq(b),
            (Self::UInt32(a), Self::UInt32(b)) => a.ptr_eq(b),
            (Self::UInt64(a), Self::UInt64(b)) => a.ptr_eq(b),
            (Self::Float16(a), Self::Float16(b)) => a.ptr_eq(b),
            (Self::Float32(a), Self::Float32(b)) => a.ptr_eq(b),
            (Self::Float64(a), Self::Float64(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Number of views referencing the underlying storage.
    pub fn ref_count(&self) -> usize {
        with_buffer!(self, buf => buf.ref_count())
    }

    pub fn try_as_buffer<T: NativePrimitive>(&self) -> Result<&SharedBuffer<T>> {
        T::downcast(self).ok_or_else(|| {
            DbError::new("Primitive array has unexpected element type")
                .with_kind(ErrorKind::Type)
                .with_field("need", T::DATATYPE)
                .with_field("have", self.datatype())
        })
    }
}

fn datatype_of<T: NativePrimitive>(_buf: &SharedBuffer<T>) -> DataType {
    T::DATATYPE
}

pub(crate) fn index_out_of_range(idx: usize, len: usize) -> DbError {
    DbError::new("Index out of range")
        .with_kind(ErrorKind::OutOfRange)
        .with_field("index", idx)
        .with_field("len", len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_and_len() {
        let manager = BufferManager::new();
        let arr = PrimitiveArray::try_from_vec(&manager, vec![1.0_f32, 2.0]).unwrap();
        assert_eq!(DataType::Float32, arr.datatype());
        assert_eq!(2, arr.len());
    }

    #[test]
    fn scalar_access() {
        let manager = BufferManager::new();
        let arr = PrimitiveArray::try_from_vec(&manager, vec![10_i64, 20, 30]).unwrap();
        assert_eq!(ScalarValue::Int64(20), arr.scalar(1).unwrap());

        let err = arr.scalar(3).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());
    }

    #[test]
    fn slice_shares_storage() {
        let manager = BufferManager::new();
        let arr = PrimitiveArray::try_from_vec(&manager, vec![1_u16, 2, 3, 4]).unwrap();
        let sliced = arr.slice(1, 3).unwrap();

        assert!(sliced.ptr_eq(&arr));
        let vals: Vec<_> = sliced.iter_scalars().collect();
        assert_eq!(vec![ScalarValue::UInt16(2), ScalarValue::UInt16(3)], vals);
    }

    #[test]
    fn ptr_eq_different_types() {
        let manager = BufferManager::new();
        let a = PrimitiveArray::try_from_vec(&manager, vec![1_i32]).unwrap();
        let b = PrimitiveArray::try_from_vec(&manager, vec![1_i64]).unwrap();
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn try_as_buffer_wrong_type() {
        let manager = BufferManager::new();
        let arr = PrimitiveArray::try_from_vec(&manager, vec![true, false]).unwrap();
        arr.try_as_buffer::<bool>().unwrap();

        let err = arr.try_as_buffer::<i64>().unwrap_err();
        assert_eq!(ErrorKind::Type, err.kind());
    }
}
