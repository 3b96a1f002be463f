use jagged_error::{DbError, ErrorKind, Result};
use num_traits::ToPrimitive;

use crate::arrays::datatype::DataType;
use crate::arrays::primitive::PrimitiveArray;
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::shared_buffer::SharedBuffer;
use crate::config::OffsetsCoercion;
use crate::host::{Host, HostClass, HostValue};

/// Convert a host value into an int64 buffer.
///
/// Accepts host arrays, `Index` wrappers around host arrays, and (when
/// materializing) plain host lists of integer scalars. Int64 host arrays are
/// shared without copying. Other integer widths are copied into a new buffer
/// reserved from `manager`, failing if any value doesn't fit in an i64.
/// Non-integer values are always rejected.
pub fn coerce_int64<H>(
    host: &H,
    manager: &BufferManager,
    coercion: OffsetsCoercion,
    value: &HostValue,
) -> Result<SharedBuffer<i64>>
where
    H: Host + ?Sized,
{
    match value {
        HostValue::Object(obj) if obj.class() == HostClass::Index => {
            let array = host.getattr(value, "array")?;
            coerce_int64(host, manager, coercion, &array)
        }
        HostValue::Object(obj) if obj.class() == HostClass::NumpyArray => {
            let buffer = obj.buffer().ok_or_else(|| {
                DbError::new("Host array has no buffer").with_kind(ErrorKind::Marshal)
            })?;
            coerce_array(manager, coercion, buffer)
        }
        HostValue::List(items) => {
            require_materialize(coercion, "list")?;
            let values = items
                .iter()
                .map(|item| match item {
                    HostValue::Scalar(scalar) => scalar.try_as_i64().ok_or_else(|| {
                        not_representable(scalar.datatype())
                    }),
                    other => Err(DbError::new("Expected integer in offsets list")
                        .with_kind(ErrorKind::Marshal)
                        .with_field("have", other.type_name())),
                })
                .collect::<Result<Vec<_>>>()?;
            SharedBuffer::try_from_vec(manager, values)
        }
        other => Err(DbError::new("Cannot convert host value to offsets")
            .with_kind(ErrorKind::Marshal)
            .with_field("have", other.type_name())),
    }
}

fn coerce_array(
    manager: &BufferManager,
    coercion: OffsetsCoercion,
    array: &PrimitiveArray,
) -> Result<SharedBuffer<i64>> {
    match array {
        PrimitiveArray::Int64(buf) => Ok(buf.clone()),
        PrimitiveArray::Int8(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::Int16(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::Int32(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::UInt8(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::UInt16(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::UInt32(buf) => materialize(manager, coercion, buf),
        PrimitiveArray::UInt64(buf) => materialize(manager, coercion, buf),
        other => Err(DbError::new("Offsets must be integers")
            .with_kind(ErrorKind::Marshal)
            .with_field("datatype", other.datatype())),
    }
}

fn materialize<T>(
    manager: &BufferManager,
    coercion: OffsetsCoercion,
    buf: &SharedBuffer<T>,
) -> Result<SharedBuffer<i64>>
where
    T: ToPrimitive + Copy + std::fmt::Debug,
{
    require_materialize(coercion, "integer array")?;

    let values = buf
        .as_slice()
        .iter()
        .map(|v| {
            v.to_i64().ok_or_else(|| {
                DbError::new("Offset not representable as i64")
                    .with_kind(ErrorKind::Marshal)
                    .with_field("value", v)
            })
        })
        .collect::<Result<Vec<_>>>()?;

    SharedBuffer::try_from_vec(manager, values)
}

fn require_materialize(coercion: OffsetsCoercion, source: &'static str) -> Result<()> {
    match coercion {
        OffsetsCoercion::Materialize => Ok(()),
        OffsetsCoercion::Strict => Err(DbError::new("Offsets must be int64 without conversion")
            .with_kind(ErrorKind::Marshal)
            .with_field("source", source)),
    }
}

fn not_representable(datatype: DataType) -> DbError {
    DbError::new("Value not representable as i64")
        .with_kind(ErrorKind::Marshal)
        .with_field("datatype", datatype)
}
