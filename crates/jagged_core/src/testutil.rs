//! Helpers for building and checking arrays in tests.

use crate::arrays::array::{Array, ArrayValue};
use crate::arrays::list_offset::{ListOffsetArray, OffsetsBuffer};
use crate::arrays::primitive::PrimitiveArray;
use crate::arrays::scalar::ScalarValue;
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::shared_buffer::SharedBuffer;

pub fn offsets_buffer(manager: &BufferManager, offsets: &[i64]) -> OffsetsBuffer {
    SharedBuffer::try_from_vec(manager, offsets.to_vec()).unwrap()
}

pub fn int64_array(manager: &BufferManager, values: &[i64]) -> Array {
    Array::Primitive(PrimitiveArray::try_from_vec(manager, values.to_vec()).unwrap())
}

/// Create a validated list-offset array over i64 content.
pub fn list_offset_array(
    manager: &BufferManager,
    offsets: &[i64],
    content: &[i64],
) -> ListOffsetArray {
    ListOffsetArray::try_new(
        offsets_buffer(manager, offsets),
        int64_array(manager, content),
        None,
    )
    .unwrap()
}

/// Assert that a value is a flat i64 array with the given values.
#[track_caller]
pub fn assert_list_values(value: &ArrayValue, expected: &[i64]) {
    let arr = match value {
        ArrayValue::Array(Array::Primitive(arr)) => arr,
        other => panic!("expected flat array, got {other:?}"),
    };

    let got: Vec<_> = arr.iter_scalars().collect();
    let expected: Vec<_> = expected.iter().map(|v| ScalarValue::Int64(*v)).collect();
    assert_eq!(expected, got);
}
