//! Moving arrays across the host boundary.
//!
//! Host values are unboxed into native arrays once per call, operated on
//! natively, and only the final result is boxed back into host objects.
//!
//! Every host handle and native buffer acquired while marshaling is an owned
//! value, so anything acquired before a failure is released when the error
//! propagates.

pub mod call;
pub mod offsets;

use jagged_error::{DbError, ErrorKind, Result, ResultExt};
use tracing::trace;

use crate::arrays::array::{Array, ArrayValue};
use crate::arrays::datatype::DataType;
use crate::arrays::identity::Identity;
use crate::arrays::list_offset::ListOffsetArray;
use crate::arrays::primitive::PrimitiveArray;
use crate::arrays::scalar::ScalarValue;
use crate::buffer::buffer_manager::BufferManager;
use crate::config::MarshalConfig;
use crate::host::{Host, HostClass, HostValue};

#[derive(Debug)]
pub struct Marshaler<'a, H: Host + ?Sized> {
    host: &'a H,
    manager: &'a BufferManager,
    config: MarshalConfig,
}

impl<'a, H> Marshaler<'a, H>
where
    H: Host + ?Sized,
{
    pub fn new(host: &'a H, manager: &'a BufferManager, config: MarshalConfig) -> Self {
        Marshaler {
            host,
            manager,
            config,
        }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    /// Infer the native type of a host value.
    pub fn typeof_value(&self, value: &HostValue) -> Result<DataType> {
        let obj = value.try_as_object()?;
        match obj.class() {
            HostClass::NumpyArray => obj.buffer().map(|buf| buf.datatype()).ok_or_else(|| {
                DbError::new("Host array has no buffer").with_kind(ErrorKind::Marshal)
            }),
            HostClass::ListOffsetArray => {
                let content = self.host.getattr(value, "content")?;
                Ok(DataType::list_offset(self.typeof_value(&content)?))
            }
            other => Err(DbError::new("Host value has no native array type")
                .with_kind(ErrorKind::Marshal)
                .with_field("class", other)),
        }
    }

    /// Convert a host value into a native array of `datatype`.
    pub fn unbox(&self, datatype: &DataType, value: &HostValue) -> Result<Array> {
        let result = match datatype {
            DataType::ListOffset(content_type) => self
                .unbox_list_offset(content_type, value)
                .map(Array::ListOffset),
            _ => self.unbox_primitive(datatype, value).map(Array::Primitive),
        };

        if let Err(err) = &result {
            trace!(%datatype, %err, "failed to unbox host value");
        }

        result
    }

    fn unbox_primitive(&self, datatype: &DataType, value: &HostValue) -> Result<PrimitiveArray> {
        let obj = value.try_as_class(HostClass::NumpyArray)?;
        let buffer = obj.buffer().ok_or_else(|| {
            DbError::new("Host array has no buffer").with_kind(ErrorKind::Marshal)
        })?;

        if &buffer.datatype() != datatype {
            return Err(DbError::new("Host array has unexpected element type")
                .with_kind(ErrorKind::Marshal)
                .with_field("expected", datatype)
                .with_field("have", buffer.datatype()));
        }

        Ok(buffer.clone())
    }

    fn unbox_list_offset(
        &self,
        content_type: &DataType,
        value: &HostValue,
    ) -> Result<ListOffsetArray> {
        value.try_as_class(HostClass::ListOffsetArray)?;

        let offsets = self.host.getattr(value, "offsets")?;
        let offsets = offsets::coerce_int64(
            self.host,
            self.manager,
            self.config.offsets_coercion,
            &offsets,
        )?;

        let content = self.host.getattr(value, "content")?;
        let content = self.unbox(content_type, &content)?;

        let identity = self.host.getattr(value, "identity")?;
        let identity = self.unbox_identity(&identity)?;

        if offsets.is_empty() {
            return Err(DbError::new("Offsets must contain at least one value")
                .with_kind(ErrorKind::InvalidLayout));
        }

        if self.config.validate_offsets {
            ListOffsetArray::try_new(offsets, content, identity)
        } else {
            Ok(ListOffsetArray::new_unvalidated(offsets, content, identity))
        }
    }

    fn unbox_identity(&self, value: &HostValue) -> Result<Option<Identity>> {
        if value.is_none() {
            return Ok(None);
        }
        value.try_as_class(HostClass::Identity)?;

        let reference = self.host.getattr(value, "ref")?;
        let reference = scalar_to_i64(&reference, "ref")?;
        let reference = u64::try_from(reference)
            .context("Identity ref must be non-negative")
            .map_err(|e| e.with_kind(ErrorKind::Marshal))?;

        let width = self.host.getattr(value, "width")?;
        let width = scalar_to_i64(&width, "width")?;
        let width = usize::try_from(width)
            .context("Identity width must be non-negative")
            .map_err(|e| e.with_kind(ErrorKind::Marshal))?;

        let fieldloc = self.host.getattr(value, "fieldloc")?;
        let fieldloc = unbox_fieldloc(&fieldloc)?;

        let array = self.host.getattr(value, "array")?;
        let values = offsets::coerce_int64(
            self.host,
            self.manager,
            self.config.offsets_coercion,
            &array,
        )?;

        Identity::try_new(reference, fieldloc, width, values).map(Some)
    }

    /// Convert a native array into host objects.
    ///
    /// List-offset arrays are built bottom up: offsets are wrapped in a host
    /// `Index`, content and identity are boxed, and the three are passed to
    /// the host `ListOffsetArray` constructor. Intermediate host objects are
    /// released once the constructor returns, whether or not it succeeded.
    pub fn box_array(&self, array: &Array) -> Result<HostValue> {
        match array {
            Array::Primitive(arr) => self.host.new_array(arr.clone()),
            Array::ListOffset(arr) => {
                let offsets = self
                    .host
                    .new_array(PrimitiveArray::Int64(arr.offsets().clone()))?;
                let offsets = self.host.construct(HostClass::Index, &[offsets])?;
                let content = self.box_array(arr.content())?;
                let identity = self.box_identity(arr.identity())?;

                self.host
                    .construct(HostClass::ListOffsetArray, &[offsets, content, identity])
            }
        }
    }

    fn box_identity(&self, identity: Option<&Identity>) -> Result<HostValue> {
        let identity = match identity {
            Some(identity) => identity,
            None => return Ok(HostValue::None),
        };

        let fieldloc: Vec<HostValue> = identity
            .fieldloc()
            .iter()
            .map(|(pos, name)| {
                HostValue::from(vec![
                    HostValue::Scalar(ScalarValue::Int64(*pos)),
                    HostValue::from(name.as_str()),
                ])
            })
            .collect();

        let reference = i64::try_from(identity.reference())?;
        let width = i64::try_from(identity.width())?;
        let array = self
            .host
            .new_array(PrimitiveArray::Int64(identity.values().clone()))?;

        self.host.construct(
            HostClass::Identity,
            &[
                HostValue::Scalar(ScalarValue::Int64(reference)),
                HostValue::from(fieldloc),
                HostValue::Scalar(ScalarValue::Int64(width)),
                array,
            ],
        )
    }

    /// Convert the result of an array operation into a host value.
    pub fn box_value(&self, value: &ArrayValue) -> Result<HostValue> {
        match value {
            ArrayValue::Scalar(scalar) => Ok(HostValue::Scalar(*scalar)),
            ArrayValue::Array(arr) => self.box_array(arr),
        }
    }
}

fn scalar_to_i64(value: &HostValue, attr: &'static str) -> Result<i64> {
    match value {
        HostValue::Scalar(scalar) => scalar.try_as_i64(),
        _ => None,
    }
    .ok_or_else(|| {
        DbError::new("Expected integer attribute")
            .with_kind(ErrorKind::Marshal)
            .with_field("attribute", attr)
            .with_field("have", value.type_name())
    })
}

fn unbox_fieldloc(value: &HostValue) -> Result<Vec<(i64, String)>> {
    let items = match value {
        HostValue::List(items) => items,
        other => {
            return Err(DbError::new("Identity fieldloc must be a list")
                .with_kind(ErrorKind::Marshal)
                .with_field("have", other.type_name()));
        }
    };

    items
        .iter()
        .map(|item| match item {
            HostValue::List(pair) => match pair.as_ref() {
                [pos, HostValue::Str(name)] => {
                    Ok((scalar_to_i64(pos, "fieldloc")?, name.to_string()))
                }
                _ => Err(DbError::new("Identity fieldloc entry must be (int, str)")
                    .with_kind(ErrorKind::Marshal)),
            },
            other => Err(DbError::new("Identity fieldloc entry must be a list")
                .with_kind(ErrorKind::Marshal)
                .with_field("have", other.type_name())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OffsetsCoercion;
    use crate::host::HostHeap;
    use crate::testutil::{assert_list_values, list_offset_array, offsets_buffer};

    /// Build the host representation of a list-offset array directly,
    /// the way a host-side producer would.
    fn host_lists(
        heap: &HostHeap,
        manager: &BufferManager,
        offsets: PrimitiveArray,
        content: &[i64],
    ) -> HostValue {
        let offsets = heap.new_array(offsets).unwrap();
        let offsets = heap.construct(HostClass::Index, &[offsets]).unwrap();
        let content = heap
            .new_array(PrimitiveArray::try_from_vec(manager, content.to_vec()).unwrap())
            .unwrap();
        heap.construct(
            HostClass::ListOffsetArray,
            &[offsets, content, HostValue::None],
        )
        .unwrap()
    }

    fn i64_offsets(manager: &BufferManager, offsets: &[i64]) -> PrimitiveArray {
        PrimitiveArray::try_from_vec(manager, offsets.to_vec()).unwrap()
    }

    #[test]
    fn typeof_nested() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let inner = Array::ListOffset(list_offset_array(&manager, &[0, 1, 3], &[1, 2, 3]));
        let outer = Array::ListOffset(
            ListOffsetArray::try_new(offsets_buffer(&manager, &[0, 2]), inner, None).unwrap(),
        );
        let boxed = marshaler.box_array(&outer).unwrap();

        assert_eq!(outer.datatype(), marshaler.typeof_value(&boxed).unwrap());

        let err = marshaler.typeof_value(&HostValue::None).unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
    }

    #[test]
    fn unbox_example() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let value = host_lists(
            &heap,
            &manager,
            i64_offsets(&manager, &[0, 2, 2, 5]),
            &[10, 20, 30, 40, 50],
        );
        let datatype = marshaler.typeof_value(&value).unwrap();
        let arr = marshaler.unbox(&datatype, &value).unwrap();

        assert_eq!(3, arr.len());
        assert_list_values(&arr.get_index(0).unwrap(), &[10, 20]);
        assert_list_values(&arr.get_index(1).unwrap(), &[]);
        assert_list_values(&arr.get_index(2).unwrap(), &[30, 40, 50]);
    }

    #[test]
    fn unbox_shares_host_buffers() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let offsets = i64_offsets(&manager, &[0, 1, 2]);
        let value = host_lists(&heap, &manager, offsets.clone(), &[1, 2]);
        let reserved = manager.reserved_bytes();

        let arr = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap();
        let arr = arr.try_as_list_offset().unwrap();
        assert!(arr.offsets().ptr_eq(offsets.try_as_buffer::<i64>().unwrap()));
        assert_eq!(reserved, manager.reserved_bytes());
    }

    #[test]
    fn round_trip() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let identity = Identity::try_new(
            Identity::new_reference(),
            vec![(0, "x".to_string())],
            1,
            offsets_buffer(&manager, &[0, 1, 2]),
        )
        .unwrap();
        let arr = list_offset_array(&manager, &[0, 2, 2, 5], &[10, 20, 30, 40, 50])
            .with_identity(Some(identity.clone()));
        let arr = Array::ListOffset(arr);

        let boxed = marshaler.box_array(&arr).unwrap();
        let unboxed = marshaler.unbox(&arr.datatype(), &boxed).unwrap();

        let orig = arr.try_as_list_offset().unwrap();
        let back = unboxed.try_as_list_offset().unwrap();
        assert_eq!(orig.offsets(), back.offsets());
        assert!(back.offsets().ptr_eq(orig.offsets()));

        let orig_content = orig.content().try_as_primitive().unwrap();
        let back_content = back.content().try_as_primitive().unwrap();
        assert!(orig_content.ptr_eq(back_content));

        assert_eq!(Some(&identity), back.identity());
        assert_eq!(arr, unboxed);

        std::mem::drop(boxed);
        assert_eq!(0, heap.live_objects());
    }

    #[test]
    fn box_value_scalar_and_array() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());
        let arr = Array::ListOffset(list_offset_array(&manager, &[0, 2], &[1, 2]));

        let boxed = marshaler
            .box_value(&ArrayValue::Scalar(ScalarValue::Int64(4)))
            .unwrap();
        assert!(matches!(boxed, HostValue::Scalar(ScalarValue::Int64(4))));
        assert_eq!(0, heap.live_objects());

        let list = arr.get_index(0).unwrap();
        let boxed = marshaler.box_value(&list).unwrap();
        let obj = boxed.try_as_class(HostClass::NumpyArray).unwrap();
        assert_eq!(2, obj.buffer().unwrap().len());
    }

    #[test]
    fn unbox_materializes_narrow_offsets() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let offsets = PrimitiveArray::try_from_vec(&manager, vec![0_i32, 1, 3]).unwrap();
        let value = host_lists(&heap, &manager, offsets, &[1, 2, 3]);

        let arr = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap();
        assert_list_values(&arr.get_index(1).unwrap(), &[2, 3]);
    }

    #[test]
    fn unbox_strict_rejects_narrow_offsets() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let config = MarshalConfig {
            offsets_coercion: OffsetsCoercion::Strict,
            ..Default::default()
        };
        let marshaler = Marshaler::new(&heap, &manager, config);

        let offsets = PrimitiveArray::try_from_vec(&manager, vec![0_i32, 1]).unwrap();
        let value = host_lists(&heap, &manager, offsets, &[1]);
        let live = heap.live_objects();
        let reserved = manager.reserved_bytes();

        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
        assert_eq!(live, heap.live_objects());
        assert_eq!(reserved, manager.reserved_bytes());
    }

    #[test]
    fn unbox_float_offsets_rejected() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        // Index refuses float arrays, so attach them directly.
        let offsets = heap
            .new_array(PrimitiveArray::try_from_vec(&manager, vec![0.0_f64, 1.0]).unwrap())
            .unwrap();
        let content = heap
            .new_array(PrimitiveArray::try_from_vec(&manager, vec![1_i64]).unwrap())
            .unwrap();
        let value = heap.new_object(
            HostClass::ListOffsetArray,
            [
                ("offsets", offsets),
                ("content", content),
                ("identity", HostValue::None),
            ],
        );
        let live = heap.live_objects();
        let reserved = manager.reserved_bytes();

        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
        assert_eq!(live, heap.live_objects());
        assert_eq!(reserved, manager.reserved_bytes());
    }

    #[test]
    fn unbox_wrong_content_type() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let value = host_lists(&heap, &manager, i64_offsets(&manager, &[0, 1]), &[1]);
        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Float32), &value)
            .unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
    }

    #[test]
    fn unbox_validates_offsets() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());
        let datatype = DataType::list_offset(DataType::Int64);

        let value = host_lists(
            &heap,
            &manager,
            i64_offsets(&manager, &[0, 3, 1]),
            &[1, 2, 3],
        );
        let err = marshaler.unbox(&datatype, &value).unwrap_err();
        assert_eq!(ErrorKind::InvalidLayout, err.kind());

        // Without validation the array is built, and access errors instead of
        // reading past content.
        let config = MarshalConfig {
            validate_offsets: false,
            ..Default::default()
        };
        let marshaler = Marshaler::new(&heap, &manager, config);
        let value = host_lists(
            &heap,
            &manager,
            i64_offsets(&manager, &[0, 9]),
            &[1, 2, 3],
        );
        let arr = marshaler.unbox(&datatype, &value).unwrap();
        let err = arr.get_index(0).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());
    }

    #[test]
    fn unbox_empty_offsets_rejected_without_validation() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let config = MarshalConfig {
            validate_offsets: false,
            ..Default::default()
        };
        let marshaler = Marshaler::new(&heap, &manager, config);

        let value = host_lists(&heap, &manager, i64_offsets(&manager, &[]), &[]);
        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidLayout, err.kind());
    }

    #[test]
    fn unbox_missing_attribute_releases_resources() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        // Narrow offsets get materialized before content is looked up.
        let offsets = heap
            .new_array(PrimitiveArray::try_from_vec(&manager, vec![0_i32, 1]).unwrap())
            .unwrap();
        let offsets = heap.construct(HostClass::Index, &[offsets]).unwrap();
        let value = heap.new_object(HostClass::ListOffsetArray, [("offsets", offsets)]);
        let live = heap.live_objects();
        let reserved = manager.reserved_bytes();
        let reservations = manager.live_reservations();

        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &value)
            .unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());

        assert_eq!(live, heap.live_objects());
        assert_eq!(reserved, manager.reserved_bytes());
        assert_eq!(reservations, manager.live_reservations());
    }

    #[test]
    fn unbox_wrong_class() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let offsets = heap
            .new_array(PrimitiveArray::try_from_vec(&manager, vec![0_i64]).unwrap())
            .unwrap();
        let index = heap.construct(HostClass::Index, &[offsets]).unwrap();

        let err = marshaler
            .unbox(&DataType::list_offset(DataType::Int64), &index)
            .unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());

        let err = marshaler.unbox(&DataType::Int64, &index).unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
    }

    #[test]
    fn unbox_limit_failure_releases_partial_buffers() {
        let heap = HostHeap::new();
        let host_manager = BufferManager::new();

        // [[[1], [2, 3]], [[4], [5], [6]]] with int32 offsets at both levels,
        // so unboxing materializes both.
        let inner_offsets =
            PrimitiveArray::try_from_vec(&host_manager, vec![0_i32, 1, 3, 4, 5, 6]).unwrap();
        let inner = host_lists(&heap, &host_manager, inner_offsets, &[1, 2, 3, 4, 5, 6]);
        let outer_offsets = heap
            .new_array(PrimitiveArray::try_from_vec(&host_manager, vec![0_i32, 2, 5]).unwrap())
            .unwrap();
        let outer_offsets = heap.construct(HostClass::Index, &[outer_offsets]).unwrap();
        let outer = heap
            .construct(
                HostClass::ListOffsetArray,
                &[outer_offsets, inner, HostValue::None],
            )
            .unwrap();
        let live = heap.live_objects();

        // Outer offsets (24 bytes) fit, inner offsets (48 bytes) don't.
        let manager = BufferManager::with_limit(40);
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());
        let datatype = marshaler.typeof_value(&outer).unwrap();

        let err = marshaler.unbox(&datatype, &outer).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
        assert_eq!(0, manager.reserved_bytes());
        assert_eq!(0, manager.live_reservations());
        assert_eq!(live, heap.live_objects());

        // Same value unboxes fine with enough room.
        let manager = BufferManager::with_limit(72);
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());
        let arr = marshaler.unbox(&datatype, &outer).unwrap();
        assert_eq!(72, manager.reserved_bytes());
        std::mem::drop(arr);
        assert_eq!(0, manager.reserved_bytes());
    }

    #[test]
    fn box_failure_releases_intermediates() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());
        let arr = Array::ListOffset(list_offset_array(
            &manager,
            &[0, 2, 2, 5],
            &[10, 20, 30, 40, 50],
        ));

        heap.reject_constructor(HostClass::ListOffsetArray);
        let err = marshaler.box_array(&arr).unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
        assert_eq!(0, heap.live_objects());

        heap.allow_constructor(HostClass::ListOffsetArray);
        heap.reject_constructor(HostClass::Index);
        let err = marshaler.box_array(&arr).unwrap_err();
        assert_eq!(ErrorKind::Marshal, err.kind());
        assert_eq!(0, heap.live_objects());

        // Native storage is untouched by host failures.
        assert_eq!(3, arr.len());
    }

    #[test]
    fn identity_round_trip_through_host() {
        let heap = HostHeap::new();
        let manager = BufferManager::new();
        let marshaler = Marshaler::new(&heap, &manager, MarshalConfig::default());

        let identity = Identity::try_new(
            7,
            vec![(1, "a".to_string()), (3, "b".to_string())],
            2,
            offsets_buffer(&manager, &[0, 0, 0, 1, 1, 0]),
        )
        .unwrap();

        let boxed = marshaler.box_identity(Some(&identity)).unwrap();
        let back = marshaler.unbox_identity(&boxed).unwrap().unwrap();
        assert_eq!(identity, back);
        assert_eq!(7, back.reference());
        assert_eq!(&[(1, "a".to_string()), (3, "b".to_string())], back.fieldloc());
        assert_eq!(Some([1_i64, 0].as_slice()), back.row(2));

        assert!(marshaler.unbox_identity(&HostValue::None).unwrap().is_none());
    }
}
